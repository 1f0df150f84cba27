pub mod app;
pub mod cli;
pub mod config;
pub mod grid;
pub mod schedule;
pub mod storage;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths, GridVariant};
pub use schedule::{BlockRange, ScheduleEntry, ScheduleStore};
