//! Change-tracking update pass
//!
//! The UpdateEngine is responsible for:
//! - Re-sampling every non-blacklisted value record once per tick
//! - Classifying each new sample against the cached one
//! - Moving `last_update_time` / `last_big_update_time` forward
//!
//! ## Tick Flow
//!
//! ```text
//! for each ValueRecord
//!     blacklisted? ── yes ──► skip (no read, no mutation)
//!         │ no
//!         ▼
//!     NameResolver::read(handle)
//!         │
//!         ▼
//!     classify(previous, current) ──► None | Small | Big
//!         │
//!         ▼
//!     Small: last_update_time = now
//!     Big:   last_update_time = last_big_update_time = now
//! ```
//!
//! Records are independent: no ordering between them is implied.

pub mod change;

pub use change::{Change, classify};

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::config::ChangeTolerance;
use crate::store::RecordStore;

/// Counters from one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Records that were read
    pub sampled: usize,
    /// Records skipped because they are blacklisted
    pub skipped: usize,
    /// Records whose value changed at all
    pub changed: usize,
    /// Records whose value changed beyond tolerance
    pub big_changes: usize,
}

/// Per-tick sampler
#[derive(Debug, Clone, Default)]
pub struct UpdateEngine {
    tolerance: ChangeTolerance,
}

impl UpdateEngine {
    /// Create an engine with the given big-change thresholds
    pub fn new(tolerance: ChangeTolerance) -> Self {
        Self { tolerance }
    }

    /// Sample every live value record once
    ///
    /// Safe to call at any rate; unchanged values leave their timestamps
    /// untouched.
    pub fn tick(&self, store: &mut RecordStore, now: DateTime<Utc>) -> TickReport {
        let (resolver, values) = store.sampling_parts();
        let mut report = TickReport::default();

        for record in values.iter_mut() {
            if record.is_blacklisted() {
                report.skipped += 1;
                continue;
            }

            let current = resolver.read(record.handle());
            let change = classify(record.last_value(), &current, &self.tolerance);
            report.sampled += 1;

            if change.is_change() {
                report.changed += 1;
                if change.is_big() {
                    report.big_changes += 1;
                }
                record.record_sample(current, change.is_big(), now);
            }
        }

        trace!(
            "Tick sampled {} values: {} changed, {} big, {} blacklisted",
            report.sampled, report.changed, report.big_changes, report.skipped
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::record::{NEVER, Record, RefSource};
    use crate::traits::SampleValue;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_tick_tracks_small_and_big_changes() {
        let host = MemoryHost::new();
        host.add_value("sim/alt", SampleValue::Float(1000.0));
        let mut store = RecordStore::new(Box::new(host.clone()));
        store.ingest(["sim/alt"], RefSource::Enumerated);
        let engine = UpdateEngine::default();

        let report = engine.tick(&mut store, at(10));
        assert_eq!(report.changed, 0);
        assert_eq!(store.value_by_name("sim/alt").unwrap().last_update_time(), NEVER);

        host.set_value("sim/alt", SampleValue::Float(1000.5)).unwrap();
        let report = engine.tick(&mut store, at(20));
        assert_eq!((report.changed, report.big_changes), (1, 0));

        let record = store.value_by_name("sim/alt").unwrap();
        assert_eq!(record.last_update_time(), at(20));
        assert_eq!(record.last_big_update_time(), NEVER);

        host.set_value("sim/alt", SampleValue::Float(2000.0)).unwrap();
        let report = engine.tick(&mut store, at(30));
        assert_eq!((report.changed, report.big_changes), (1, 1));

        let record = store.value_by_name("sim/alt").unwrap();
        assert_eq!(record.last_update_time(), at(30));
        assert_eq!(record.last_big_update_time(), at(30));
    }

    #[test]
    fn test_tick_skips_blacklisted_without_reading() {
        let host = MemoryHost::new();
        host.add_value("sim/heavy", SampleValue::Int(0));
        let mut store =
            RecordStore::new(Box::new(host.clone())).with_blacklist(["sim/heavy"]);
        store.ingest(["sim/heavy"], RefSource::Enumerated);
        let reads_after_ingest = host.read_count();

        host.set_value("sim/heavy", SampleValue::Int(1)).unwrap();
        let report = UpdateEngine::default().tick(&mut store, at(5));

        assert_eq!(report.skipped, 1);
        assert_eq!(report.sampled, 0);
        assert_eq!(host.read_count(), reads_after_ingest);
        assert_eq!(store.value_by_name("sim/heavy").unwrap().last_update_time(), NEVER);
    }
}
