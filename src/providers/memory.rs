//! In-memory provider

use std::collections::VecDeque;

use crate::Result;
use crate::provider::Provider;
use crate::types::Update;

/// Provider that yields a fixed list of updates, as given
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    updates: VecDeque<Update>,
}

impl MemoryProvider {
    pub fn new(updates: impl IntoIterator<Item = Update>) -> Self {
        Self { updates: updates.into_iter().collect() }
    }

    /// Parse capture records held in memory, numbering them from zero.
    /// Parsing stops at the first empty record.
    pub fn from_records(records: &str) -> Result<Self> {
        let mut updates = VecDeque::new();
        for (index, record) in records.lines().enumerate() {
            match Update::parse_record(record, index + 1)? {
                Some(update) => {
                    let sequence = updates.len() as u64;
                    updates.push_back(update.with_sequence(sequence));
                }
                None => break,
            }
        }
        Ok(Self { updates })
    }

    /// Updates not yet yielded
    pub fn remaining(&self) -> usize {
        self.updates.len()
    }
}

#[async_trait::async_trait]
impl Provider for MemoryProvider {
    async fn next_update(&mut self) -> Result<Option<Update>> {
        Ok(self.updates.pop_front())
    }
}
