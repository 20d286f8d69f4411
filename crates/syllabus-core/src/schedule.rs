//! Reading schedule: a collection's assignments grouped by class.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::entities::{Assignment, ClassStatus, CollectionMetadata};
use crate::priority::PrioritySet;

/// One item's reading within a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledReading {
    pub item: String,
    pub assignment: Assignment,
}

/// A class with its metadata and ordered readings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledClass {
    pub number: u32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub reading_date: Option<String>,
    pub status: Option<ClassStatus>,
    pub readings: Vec<ScheduledReading>,
}

/// Every class of a collection in ascending order, plus readings that have
/// not been given a class yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSchedule {
    pub nomenclature: String,
    pub classes: Vec<ScheduledClass>,
    pub unscheduled: Vec<ScheduledReading>,
}

impl ReadingSchedule {
    /// Build the schedule from each item's assignments in the collection.
    ///
    /// Classes that have metadata but no readings are included. Within a
    /// class, items listed in `itemOrder` come first in that order; the rest
    /// follow by priority order, then item key.
    pub fn build<I, S>(metadata: &CollectionMetadata, nomenclature: &str, items: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<Assignment>)>,
        S: Into<String>,
    {
        let priorities = PrioritySet::new(metadata.priorities.as_deref());

        let mut by_class: BTreeMap<u32, Vec<ScheduledReading>> = metadata
            .classes
            .keys()
            .map(|number| (*number, Vec::new()))
            .collect();
        let mut unscheduled = Vec::new();

        for (item, assignments) in items {
            let item = item.into();
            for assignment in assignments {
                let reading = ScheduledReading {
                    item: item.clone(),
                    assignment,
                };
                match reading.assignment.class_number {
                    Some(number) => by_class.entry(number).or_default().push(reading),
                    None => unscheduled.push(reading),
                }
            }
        }

        let classes = by_class
            .into_iter()
            .map(|(number, mut readings)| {
                let class = metadata.classes.get(&number);
                let order = class.and_then(|c| c.item_order.as_deref()).unwrap_or(&[]);
                readings.sort_by_cached_key(|r| {
                    (
                        order.iter().position(|key| key == &r.item).unwrap_or(usize::MAX),
                        priorities.rank(r.assignment.priority),
                        r.item.clone(),
                    )
                });
                ScheduledClass {
                    number,
                    title: class.and_then(|c| c.title.clone()),
                    description: class.and_then(|c| c.description.clone()),
                    reading_date: class.and_then(|c| c.reading_date.clone()),
                    status: class.and_then(|c| c.status),
                    readings,
                }
            })
            .collect();

        unscheduled.sort_by_cached_key(|r: &ScheduledReading| {
            (priorities.rank(r.assignment.priority), r.item.clone())
        });

        Self {
            nomenclature: nomenclature.to_string(),
            classes,
            unscheduled,
        }
    }

    pub fn class(&self, number: u32) -> Option<&ScheduledClass> {
        self.classes.iter().find(|c| c.number == number)
    }

    /// Number of readings across all classes, excluding unscheduled ones.
    pub fn reading_count(&self) -> usize {
        self.classes.iter().map(|c| c.readings.len()).sum()
    }
}
