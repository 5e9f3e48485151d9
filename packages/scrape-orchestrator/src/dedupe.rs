//! Collapse repeated listing entries.
//!
//! Category pages repeat the same product across several sections. Records
//! are identified by `(title, url)`; the first occurrence wins and
//! survivors keep their input order.

use std::collections::HashSet;

use crate::types::record::{NavigationItem, ProductListing};

/// Composite identity used for deduplication.
pub trait DedupeKey {
    fn dedupe_key(&self) -> String;
}

impl DedupeKey for ProductListing {
    fn dedupe_key(&self) -> String {
        format!("{}:{}", self.title, self.source_url)
    }
}

impl DedupeKey for NavigationItem {
    fn dedupe_key(&self) -> String {
        format!("{}:{}", self.title, self.url)
    }
}

/// Keep the first record per identity, preserving order.
pub fn dedupe<T: DedupeKey>(records: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| seen.insert(record.dedupe_key()))
        .collect()
}
