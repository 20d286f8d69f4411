//! Namespaced `name: value` lines in an item's extra field.

use std::fmt;

/// An item's extra field, split into lines.
///
/// Fields are lines of the form `name: value`. Lines that are not fields
/// are kept verbatim and in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraField {
    lines: Vec<String>,
}

impl ExtraField {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    fn field_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
        let (key, value) = line.split_once(':')?;
        (key.trim() == name).then(|| value.trim_start())
    }

    /// Value of the first line named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.lines
            .iter()
            .find_map(|line| Self::field_value(line, name))
    }

    /// Replace the first line named `name` and drop any duplicates, or
    /// append a new line.
    pub fn set(&mut self, name: &str, value: &str) {
        let line = format!("{name}: {value}");
        let mut replaced = false;
        self.lines.retain_mut(|existing| {
            if Self::field_value(existing, name).is_none() {
                return true;
            }
            if replaced {
                return false;
            }
            *existing = line.clone();
            replaced = true;
            true
        });
        if !replaced {
            self.lines.push(line);
        }
    }

    /// Remove every line named `name`. Returns whether any was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.lines.len();
        self.lines
            .retain(|line| Self::field_value(line, name).is_none());
        self.lines.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }
}

impl fmt::Display for ExtraField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}
