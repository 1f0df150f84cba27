//! The schedule interval model.
//!
//! Entries are partitioned by date. A write removes every entry on that date
//! whose range overlaps the written range, whole, even if the overlap is a
//! single block, then inserts the new entry. Nothing is ever split or trimmed.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::storage::ScheduleBackend;

pub mod date;
mod entry;

pub use entry::{BlockRange, EntryId, IdGenerator, ScheduleEntry, StoredRecord};

/// What a single upsert changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertOutcome {
    pub removed: Vec<ScheduleEntry>,
    pub inserted: Option<ScheduleEntry>,
}

impl UpsertOutcome {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.inserted.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateSummary {
    pub date: String,
    pub entries: usize,
}

pub struct ScheduleStore {
    records: Vec<StoredRecord>,
    ids: IdGenerator,
    backend: Box<dyn ScheduleBackend>,
}

impl ScheduleStore {
    pub fn load(backend: Box<dyn ScheduleBackend>) -> Self {
        let records = backend.load();
        let ids = IdGenerator::seeded(records.iter().filter_map(StoredRecord::entry));
        tracing::debug!(count = records.len(), "schedule store loaded");
        Self {
            records,
            ids,
            backend,
        }
    }

    /// Every stored element in order, unreadable ones included.
    pub fn records(&self) -> &[StoredRecord] {
        &self.records
    }

    pub fn entries(&self) -> Vec<&ScheduleEntry> {
        self.readable().collect()
    }

    fn readable(&self) -> impl Iterator<Item = &ScheduleEntry> + '_ {
        self.records.iter().filter_map(StoredRecord::entry)
    }

    pub fn find_covering(&self, date: &str, block: usize) -> Option<&ScheduleEntry> {
        self.readable()
            .find(|entry| entry.is_on(date) && entry.covers(block))
    }

    /// Entries on `date` ordered by their first block; unreadable ranges last.
    pub fn entries_on(&self, date: &str) -> Vec<&ScheduleEntry> {
        let mut day: Vec<_> = self.readable().filter(|e| e.is_on(date)).collect();
        day.sort_by_key(|entry| {
            entry
                .range()
                .map(|range| (0, range.start()))
                .unwrap_or((1, 0))
        });
        day
    }

    pub fn dates(&self) -> Vec<DateSummary> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for entry in self.readable() {
            *counts.entry(entry.date.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(date, entries)| DateSummary {
                date: date.to_owned(),
                entries,
            })
            .collect()
    }

    /// Writes `title` over `range` on `date`. A title that trims to nothing
    /// only deletes. The full collection is persisted before returning; a
    /// failed save is logged and the in-memory state stays authoritative.
    pub fn upsert(&mut self, date: &str, range: BlockRange, title: &str) -> UpsertOutcome {
        let outcome = self.apply(date, range, title);
        self.save();
        outcome
    }

    /// Like [`ScheduleStore::upsert`] but hands a failed save back to the
    /// caller. The change is kept in memory either way.
    pub fn try_upsert(&mut self, date: &str, range: BlockRange, title: &str) -> Result<UpsertOutcome> {
        let outcome = self.apply(date, range, title);
        self.try_save()?;
        Ok(outcome)
    }

    pub fn clear(&mut self, date: &str, range: BlockRange) -> UpsertOutcome {
        self.upsert(date, range, "")
    }

    pub fn try_clear(&mut self, date: &str, range: BlockRange) -> Result<UpsertOutcome> {
        self.try_upsert(date, range, "")
    }

    pub fn save(&self) {
        if let Err(err) = self.try_save() {
            tracing::warn!(?err, "failed to persist schedules, keeping in-memory state");
        }
    }

    pub fn try_save(&self) -> Result<()> {
        self.backend.save(&self.records)
    }

    fn apply(&mut self, date: &str, range: BlockRange, title: &str) -> UpsertOutcome {
        let trimmed = title.trim();

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|record| {
                record
                    .entry()
                    .is_some_and(|entry| entry.is_on(date) && entry.overlaps(&range))
            });
        self.records = kept;
        let removed: Vec<_> = removed
            .into_iter()
            .filter_map(StoredRecord::into_entry)
            .collect();

        let inserted = if trimmed.is_empty() {
            None
        } else {
            let entry = ScheduleEntry::new(self.ids.next_id(), date, range, trimmed);
            self.records.push(entry.clone().into());
            Some(entry)
        };

        tracing::debug!(
            date,
            %range,
            removed = removed.len(),
            inserted = inserted.is_some(),
            "schedule upsert"
        );
        UpsertOutcome { removed, inserted }
    }
}
