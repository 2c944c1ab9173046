use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single evaluation record. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetItem {
    /// Short plot description fed to the movie identifier step
    pub movie_description: String,
    /// Release decade, e.g. "2000s"
    pub decade: String,
    /// Reference rating the pipeline output is scored against
    pub expected_output: String,
}

/// Behavior of [`Dataset::insert`] on repeated runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// Every insert appends, duplicating records across runs
    #[default]
    Append,
    /// Records identical to an existing row are dropped
    SkipExisting,
}

/// A named collection of dataset items
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    items: Vec<DatasetItem>,
}

impl Dataset {
    /// Insert records according to the chosen mode
    pub fn insert(&mut self, records: Vec<DatasetItem>, mode: InsertMode) {
        match mode {
            InsertMode::Append => self.items.extend(records),
            InsertMode::SkipExisting => {
                for record in records {
                    if !self.items.contains(&record) {
                        self.items.push(record);
                    }
                }
            }
        }
    }

    pub fn items(&self) -> &[DatasetItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// In-memory dataset store keyed by dataset name
#[derive(Debug, Default)]
pub struct DatasetStore {
    datasets: HashMap<String, Dataset>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a dataset, creating an empty one under `name` if absent
    pub fn get_or_create(&mut self, name: &str) -> &mut Dataset {
        self.datasets.entry(name.to_string()).or_insert_with(|| Dataset {
            name: name.to_string(),
            items: Vec::new(),
        })
    }
}
