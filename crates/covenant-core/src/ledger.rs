//! Per-mandate usage accounting.
//!
//! The ledger maps a mandate id to its running totals. The outer map lock is
//! held only long enough to fetch or create an entry; the entry's own lock
//! serializes decisions for that mandate, so two concurrent uses of the same
//! mandate cannot both pass a limit check that only admits one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Running usage totals for a single mandate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageEntry {
    /// Cumulative accepted spend, in minor units.
    pub total_spent: u64,
    /// Number of accepted uses.
    pub use_count: u32,
}

/// Thread-safe usage ledger keyed by mandate id.
#[derive(Debug, Default)]
pub struct UsageLedger {
    entries: Mutex<HashMap<String, Arc<Mutex<UsageEntry>>>>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, mandate_id: &str) -> Arc<Mutex<UsageEntry>> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.entry(mandate_id.to_string()).or_default().clone()
    }

    /// Run `f` with exclusive access to the mandate's entry, creating a
    /// zeroed entry on first sight.
    pub fn with_entry<T>(&self, mandate_id: &str, f: impl FnOnce(&mut UsageEntry) -> T) -> T {
        let entry = self.entry(mandate_id);
        let mut guard = entry.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Current totals for a mandate, or `None` if no use has ever been
    /// accepted. A rejected attempt leaves a zeroed entry behind as a lock
    /// object; observably that is the same as never having been seen.
    pub fn snapshot(&self, mandate_id: &str) -> Option<UsageEntry> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(mandate_id)?.clone();
        drop(entries);
        let snapshot = *entry.lock().unwrap_or_else(PoisonError::into_inner);
        (snapshot != UsageEntry::default()).then_some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use std::thread;

    #[test]
    fn first_sight_creates_zeroed_entry() {
        let ledger = UsageLedger::new();
        assert_eq!(ledger.snapshot("m1"), None);

        let count = ledger.with_entry("m1", |entry| {
            entry.use_count += 1;
            entry.total_spent += 500;
            entry.use_count
        });
        assert_eq!(count, 1);
        assert_eq!(
            ledger.snapshot("m1"),
            Some(UsageEntry { total_spent: 500, use_count: 1 })
        );
    }

    #[test]
    fn untouched_entry_stays_invisible() {
        let ledger = UsageLedger::new();

        // A lookup that commits nothing must not make the mandate look seen.
        let entry = ledger.with_entry("m1", |entry| *entry);
        assert_eq!(entry, UsageEntry::default());
        assert_eq!(ledger.snapshot("m1"), None);
    }

    #[test]
    fn entries_are_independent() {
        let ledger = UsageLedger::new();
        ledger.with_entry("m1", |entry| entry.use_count = 3);
        ledger.with_entry("m2", |entry| entry.use_count = 7);

        assert_eq!(ledger.snapshot("m1").map(|e| e.use_count), Some(3));
        assert_eq!(ledger.snapshot("m2").map(|e| e.use_count), Some(7));
    }

    #[test]
    fn concurrent_increments_do_not_lose_updates() {
        let ledger = StdArc::new(UsageLedger::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        ledger.with_entry("m1", |entry| {
                            entry.use_count += 1;
                            entry.total_spent += 1;
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker");
        }

        let entry = ledger.snapshot("m1").expect("entry");
        assert_eq!(entry.use_count, 800);
        assert_eq!(entry.total_spent, 800);
    }
}
