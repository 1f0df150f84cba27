use anyhow::Result;

use crate::schedule::{BlockRange, ScheduleStore, UpsertOutcome};

/// Store writes triggered from the editor. Each call persists before it
/// returns; on a failed save the change is still applied in memory.
pub struct ActionDispatcher<'a> {
    store: &'a mut ScheduleStore,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(store: &'a mut ScheduleStore) -> Self {
        Self { store }
    }

    pub fn assign(&mut self, date: &str, range: BlockRange, title: &str) -> Result<UpsertOutcome> {
        self.store.try_upsert(date, range, title)
    }

    pub fn clear(&mut self, date: &str, range: BlockRange) -> Result<UpsertOutcome> {
        self.store.try_clear(date, range)
    }

    /// Pastes the clipboard title onto `range`; an empty clipboard does nothing.
    pub fn paste(
        &mut self,
        date: &str,
        range: BlockRange,
        clipboard: Option<&str>,
    ) -> Option<Result<UpsertOutcome>> {
        let title = clipboard.filter(|title| !title.trim().is_empty())?;
        Some(self.store.try_upsert(date, range, title))
    }
}
