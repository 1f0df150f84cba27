use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Block layout the editor runs with. Each variant owns its own storage key
/// because the two layouts index blocks differently.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum GridVariant {
    /// 06:00 to 24:00, 36 blocks.
    #[default]
    HalfDay,
    /// 00:00 to 24:00, 48 blocks.
    FullDay,
}

impl GridVariant {
    pub fn block_count(self) -> usize {
        match self {
            GridVariant::HalfDay => 36,
            GridVariant::FullDay => 48,
        }
    }

    pub fn label_offset_minutes(self) -> u32 {
        match self {
            GridVariant::HalfDay => 6 * 60,
            GridVariant::FullDay => 0,
        }
    }

    pub fn storage_key(self) -> &'static str {
        match self {
            GridVariant::HalfDay => "timetable_schedules_v2",
            GridVariant::FullDay => "timetable_schedules_v1",
        }
    }

    pub fn default_selection(self) -> SelectionMode {
        match self {
            GridVariant::HalfDay => SelectionMode::SingleCell,
            GridVariant::FullDay => SelectionMode::DragRange,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SelectionMode {
    /// Every action targets the block under the cursor.
    SingleCell,
    /// Mouse drags or an anchored keyboard selection target a contiguous range.
    DragRange,
}
