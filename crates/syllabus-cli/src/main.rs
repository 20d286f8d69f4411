//! Syllabus CLI - inspect and migrate stored syllabus metadata
//!
//! Reads stored JSON blobs, reports their detected schema version and prints
//! them migrated to the latest shape. Nothing is written back.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use syllabus_core::{
    CollectionRef, EntityKind, FilePreferences, MemoryItemFields, Migrator, Syllabus,
    SyllabusConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Command-line arguments for syllabus
#[derive(Parser, Debug)]
#[command(name = "syllabus")]
#[command(about = "Detect and migrate stored syllabus metadata")]
#[command(version)]
struct Args {
    /// Config file (defaults to the standard location)
    #[arg(long, global = true, env = "SYLLABUS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the detected schema version of a stored blob
    Detect {
        /// assignment, item-data or collection-metadata
        entity: EntityKind,
        file: PathBuf,
    },
    /// Print a stored blob migrated to the latest version
    Migrate {
        /// assignment, item-data or collection-metadata
        entity: EntityKind,
        file: PathBuf,
        /// JSON object mapping numeric collection ids to "libraryId:key"
        #[arg(long)]
        collections: Option<PathBuf>,
    },
    /// List every entity with its latest schema version
    Registries,
    /// Print the reading schedule of a collection
    Schedule {
        /// Durable collection reference, e.g. 1:ABCD1234
        collection: CollectionRef,
        /// Preference file holding the collection metadata dictionary
        #[arg(long)]
        prefs: PathBuf,
        /// JSON object mapping item keys to their extra field text
        #[arg(long)]
        items: PathBuf,
        #[arg(long)]
        collections: Option<PathBuf>,
    },
}

fn main() -> CliResult<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => SyllabusConfig::load_from(path)?,
        None => SyllabusConfig::load_standard()?,
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Detect { entity, file } => detect(entity, &file),
        Command::Migrate {
            entity,
            file,
            collections,
        } => migrate(entity, &file, collections.as_deref()),
        Command::Registries => registries(),
        Command::Schedule {
            collection,
            prefs,
            items,
            collections,
        } => schedule(config, &collection, &prefs, &items, collections.as_deref()),
    }
}

fn read_json(path: &Path) -> CliResult<serde_json::Value> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn load_collections(path: Option<&Path>) -> CliResult<BTreeMap<u64, CollectionRef>> {
    match path {
        Some(path) => Ok(serde_json::from_value(read_json(path)?)?),
        None => Ok(BTreeMap::new()),
    }
}

fn detect(entity: EntityKind, file: &Path) -> CliResult<()> {
    let migrator = Migrator::standard()?;
    let raw = read_json(file)?;
    let latest = migrator.registry(entity)?.latest();
    match migrator.detect(entity, &raw)? {
        Some(version) => println!("{entity}: v{version} (latest v{latest})"),
        None => println!("{entity}: unrecognised shape"),
    }
    Ok(())
}

fn migrate(entity: EntityKind, file: &Path, collections: Option<&Path>) -> CliResult<()> {
    let migrator = Migrator::standard()?;
    let resolver = load_collections(collections)?;
    let raw = read_json(file)?;

    let migrated = migrator.migrate(entity, &raw, &resolver)?;
    tracing::info!("Migrated {} from v{}", entity, migrated.source_version);
    for warning in &migrated.warnings {
        eprintln!("warning: {warning}");
    }
    println!("{}", serde_json::to_string_pretty(&migrated.value)?);
    Ok(())
}

fn registries() -> CliResult<()> {
    for info in Migrator::standard()?.registries() {
        println!("{}: v{}", info.entity, info.latest);
    }
    Ok(())
}

fn schedule(
    config: SyllabusConfig,
    collection: &CollectionRef,
    prefs: &Path,
    items: &Path,
    collections: Option<&Path>,
) -> CliResult<()> {
    let extras: BTreeMap<String, String> = serde_json::from_value(read_json(items)?)?;
    let fields = MemoryItemFields::new();
    for (item, extra) in &extras {
        fields.add_item(item, Some(extra.as_str()))?;
    }

    let syllabus = Syllabus::with_config(
        FilePreferences::open(prefs)?,
        fields,
        load_collections(collections)?,
        config,
    )?;
    let keys: Vec<&str> = extras.keys().map(String::as_str).collect();
    let schedule = syllabus.reading_schedule(collection, &keys)?;
    println!("{}", serde_json::to_string_pretty(&schedule)?);
    Ok(())
}
