use thiserror::Error;
use time::macros::format_description;
use time::Time;

use crate::config::GridVariant;
use crate::schedule::BlockRange;

/// Length of one block.
pub const BLOCK_MINUTES: u32 = 30;
const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("block {index} is outside the grid (0..{block_count})")]
    OutOfRange { index: usize, block_count: usize },
    #[error("range ends at block {end} before it starts at block {start}")]
    Inverted { start: usize, end: usize },
    #[error("'{0}' is neither a block index nor a HH:MM label on this grid")]
    UnknownBlock(String),
}

/// The day's sequence of half-hour blocks starting at a fixed wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeGrid {
    block_count: usize,
    label_offset_minutes: u32,
}

impl TimeGrid {
    pub fn new(block_count: usize, label_offset_minutes: u32) -> Self {
        Self {
            block_count,
            label_offset_minutes: label_offset_minutes % MINUTES_PER_DAY,
        }
    }

    pub fn for_variant(variant: GridVariant) -> Self {
        Self::new(variant.block_count(), variant.label_offset_minutes())
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn label_offset_minutes(&self) -> u32 {
        self.label_offset_minutes
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.block_count
    }

    /// Wall-clock start of `index`, wrapping past midnight.
    pub fn start_time(&self, index: usize) -> Option<Time> {
        if !self.contains(index) {
            return None;
        }
        let minutes = (self.label_offset_minutes as usize + index * BLOCK_MINUTES as usize)
            % MINUTES_PER_DAY as usize;
        Time::from_hms((minutes / 60) as u8, (minutes % 60) as u8, 0).ok()
    }

    pub fn label(&self, index: usize) -> Option<String> {
        self.start_time(index).map(format_time)
    }

    /// Label for the end of `index`, i.e. the start of the following block.
    pub fn end_label(&self, index: usize) -> Option<String> {
        let start = self.start_time(index)?;
        Some(format_time(start + time::Duration::minutes(BLOCK_MINUTES as i64)))
    }

    pub fn labels(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.block_count).filter_map(|index| self.label(index))
    }

    pub fn range_label(&self, range: BlockRange) -> String {
        match (self.label(range.start()), self.end_label(range.end())) {
            (Some(from), Some(to)) => format!("{from}–{to}"),
            _ => range.to_string(),
        }
    }

    pub fn block_for_label(&self, label: &str) -> Option<usize> {
        let time = Time::parse(label.trim(), format_description!("[hour]:[minute]")).ok()?;
        let minutes = time.hour() as u32 * 60 + time.minute() as u32;
        let delta = (minutes + MINUTES_PER_DAY - self.label_offset_minutes) % MINUTES_PER_DAY;
        if delta % BLOCK_MINUTES != 0 {
            return None;
        }
        let index = (delta / BLOCK_MINUTES) as usize;
        self.contains(index).then_some(index)
    }

    /// Accepts a block index (`"3"`) or a start label (`"07:30"`).
    pub fn parse_block(&self, input: &str) -> Result<usize, GridError> {
        let trimmed = input.trim();
        if let Ok(index) = trimmed.parse::<usize>() {
            return self.check(index);
        }
        self.block_for_label(trimmed)
            .ok_or_else(|| GridError::UnknownBlock(trimmed.to_owned()))
    }

    pub fn check(&self, index: usize) -> Result<usize, GridError> {
        if self.contains(index) {
            Ok(index)
        } else {
            Err(GridError::OutOfRange {
                index,
                block_count: self.block_count,
            })
        }
    }

    pub fn range(&self, start: usize, end: usize) -> Result<BlockRange, GridError> {
        self.check(start)?;
        self.check(end)?;
        BlockRange::new(start, end).ok_or(GridError::Inverted { start, end })
    }
}

fn format_time(time: Time) -> String {
    time.format(format_description!("[hour]:[minute]"))
        .unwrap_or_else(|_| format!("{:02}:{:02}", time.hour(), time.minute()))
}
