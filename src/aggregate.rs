use crate::model::CompletedRecord;
use std::sync::{Mutex, PoisonError};

/// Append-only bag of completed records shared by every detail task of one
/// crawl. It has no readers: [`Aggregator::drain`] is the only way out, once
/// the crawl has finished.
#[derive(Debug, Default)]
pub struct Aggregator {
    records: Mutex<Vec<CompletedRecord>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: CompletedRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Takes every record collected so far, in arrival order.
    pub fn drain(&self) -> Vec<CompletedRecord> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
