use std::collections::HashSet;

use crate::record::{KeyStrategy, Record, RecordKey};

/// Insertion-ordered, key-deduplicated record set.
///
/// The first record observed for a key wins; later observations of the same
/// key are dropped without touching the stored record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordAccumulator {
    strategy: KeyStrategy,
    keys: HashSet<RecordKey>,
    records: Vec<Record>,
}

impl RecordAccumulator {
    pub fn new(strategy: KeyStrategy) -> Self {
        Self {
            strategy,
            keys: HashSet::new(),
            records: Vec::new(),
        }
    }

    /// Merges one extraction pass. Returns how many records were new.
    pub fn merge<I>(&mut self, batch: I) -> usize
    where
        I: IntoIterator<Item = Record>,
    {
        let mut added = 0;
        for record in batch {
            if self.keys.insert(self.strategy.key(&record)) {
                self.records.push(record);
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}
