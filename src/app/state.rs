use time::Date;
use unicode_segmentation::UnicodeSegmentation;

use crate::app::selection::Selection;
use crate::config::SelectionMode;
use crate::grid::TimeGrid;
use crate::schedule::date::{date_key, parse_date_key, DateError};
use crate::schedule::{BlockRange, ScheduleStore};

const DATE_INPUT_MAX: usize = 10;

/// One painted line of the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRow {
    pub index: usize,
    pub label: String,
    pub title: Option<String>,
    /// Covered by the same entry as the block above.
    pub continuation: bool,
}

/// Title dialog for one target range. Holds the draft only; nothing reaches
/// the store until the caller confirms.
#[derive(Debug, Clone)]
pub struct TitleModal {
    pub range: BlockRange,
    pub range_label: String,
    pub input: String,
    pub max_chars: usize,
}

impl TitleModal {
    pub fn new(range: BlockRange, range_label: String, initial: &str, max_chars: usize) -> Self {
        let input = initial.graphemes(true).take(max_chars).collect();
        Self {
            range,
            range_label,
            input,
            max_chars,
        }
    }

    pub fn char_count(&self) -> usize {
        self.input.graphemes(true).count()
    }

    pub fn counter_label(&self) -> String {
        format!("{} / {}", self.char_count(), self.max_chars)
    }

    pub fn at_limit(&self) -> bool {
        self.char_count() >= self.max_chars
    }

    pub fn push_char(&mut self, ch: char) -> bool {
        let mut candidate = self.input.clone();
        candidate.push(ch);
        // A combining mark joins the previous grapheme, so check the result.
        if candidate.graphemes(true).count() > self.max_chars {
            return false;
        }
        self.input = candidate;
        true
    }

    pub fn pop_char(&mut self) -> bool {
        match self.input.grapheme_indices(true).next_back() {
            Some((offset, _)) => {
                self.input.truncate(offset);
                true
            }
            None => false,
        }
    }

    pub fn can_confirm(&self) -> bool {
        !self.input.trim().is_empty()
    }

    pub fn confirmed_title(&self) -> Option<String> {
        self.can_confirm().then(|| self.input.trim().to_owned())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DateOverlay {
    pub input: String,
}

impl DateOverlay {
    pub fn push_char(&mut self, ch: char) -> bool {
        if (ch.is_ascii_digit() || ch == '-') && self.input.len() < DATE_INPUT_MAX {
            self.input.push(ch);
            true
        } else {
            false
        }
    }

    pub fn pop_char(&mut self) -> bool {
        self.input.pop().is_some()
    }

    pub fn parse(&self) -> Result<Date, DateError> {
        parse_date_key(&self.input)
    }
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    Title(TitleModal),
    GoToDate(DateOverlay),
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub grid: TimeGrid,
    pub date: Date,
    pub selection: Selection,
    pub rows: Vec<BlockRow>,
    pub clipboard: Option<String>,
    pub status_message: Option<String>,
    pub overlay: Option<OverlayState>,
    pub title_max_chars: usize,
}

impl AppState {
    pub fn new(grid: TimeGrid, mode: SelectionMode, date: Date, title_max_chars: usize) -> Self {
        Self {
            grid,
            date,
            selection: Selection::new(mode, grid.block_count()),
            rows: Vec::new(),
            clipboard: None,
            status_message: None,
            overlay: None,
            title_max_chars,
        }
    }

    pub fn date_key(&self) -> String {
        date_key(self.date)
    }

    /// Repaints the row models for the active date, one lookup per block.
    pub fn refresh(&mut self, store: &ScheduleStore) {
        let date = self.date_key();
        let mut previous_id = None;
        self.rows = (0..self.grid.block_count())
            .map(|index| {
                let covering = store.find_covering(&date, index);
                let id = covering.map(|entry| (entry.id.clone(), entry.range()));
                let continuation = id.is_some() && id == previous_id;
                previous_id = id;
                BlockRow {
                    index,
                    label: self.grid.label(index).unwrap_or_default(),
                    title: covering.map(|entry| entry.title.clone()),
                    continuation,
                }
            })
            .collect();
    }

    pub fn set_date(&mut self, date: Date, store: &ScheduleStore) {
        self.date = date;
        self.selection.clear_anchor();
        self.refresh(store);
    }

    pub fn shift_date(&mut self, forward: bool, store: &ScheduleStore) -> bool {
        let next = if forward {
            self.date.next_day()
        } else {
            self.date.previous_day()
        };
        match next {
            Some(date) => {
                self.set_date(date, store);
                true
            }
            None => false,
        }
    }

    pub fn row(&self, index: usize) -> Option<&BlockRow> {
        self.rows.get(index)
    }

    pub fn title_under_cursor(&self) -> Option<&str> {
        self.row(self.selection.cursor())
            .and_then(|row| row.title.as_deref())
    }

    pub fn target_label(&self) -> String {
        self.grid.range_label(self.selection.target())
    }

    /// Opens the title dialog on the current target, prefilled with the title
    /// of whatever covers its first block.
    pub fn open_title_modal(&mut self) {
        let range = self.selection.target();
        let initial = self
            .row(range.start())
            .and_then(|row| row.title.clone())
            .unwrap_or_default();
        self.overlay = Some(OverlayState::Title(TitleModal::new(
            range,
            self.grid.range_label(range),
            &initial,
            self.title_max_chars,
        )));
    }

    pub fn open_date_overlay(&mut self) {
        self.overlay = Some(OverlayState::GoToDate(DateOverlay {
            input: self.date_key(),
        }));
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn title_modal(&self) -> Option<&TitleModal> {
        match self.overlay.as_ref() {
            Some(OverlayState::Title(modal)) => Some(modal),
            _ => None,
        }
    }

    pub fn title_modal_mut(&mut self) -> Option<&mut TitleModal> {
        match self.overlay.as_mut() {
            Some(OverlayState::Title(modal)) => Some(modal),
            _ => None,
        }
    }

    pub fn date_overlay(&self) -> Option<&DateOverlay> {
        match self.overlay.as_ref() {
            Some(OverlayState::GoToDate(overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn date_overlay_mut(&mut self) -> Option<&mut DateOverlay> {
        match self.overlay.as_mut() {
            Some(OverlayState::GoToDate(overlay)) => Some(overlay),
            _ => None,
        }
    }

    /// Copies the title under the cursor. Empty blocks leave the clipboard alone.
    pub fn copy_under_cursor(&mut self) -> Option<String> {
        let title = self.title_under_cursor()?.to_owned();
        self.clipboard = Some(title.clone());
        Some(title)
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }
}
