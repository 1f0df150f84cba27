use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use unicode_segmentation::UnicodeSegmentation;

use crate::app::App;
use crate::config::AppConfig;
use crate::grid::TimeGrid;
use crate::schedule::date::{date_key, parse_date_key, today};
use crate::schedule::{BlockRange, ScheduleStore, UpsertOutcome};
use crate::storage::StorageHandle;

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Day to print as YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SetArgs {
    /// Day to edit as YYYY-MM-DD
    #[arg(long)]
    pub date: String,
    /// First block, as an index or a start time such as 07:30
    pub start: String,
    /// Last block, inclusive
    pub end: String,
    /// Title for the range (words are joined with spaces)
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ClearArgs {
    /// Day to edit as YYYY-MM-DD
    #[arg(long)]
    pub date: String,
    /// First block, as an index or a start time
    pub start: String,
    /// Last block, inclusive (defaults to START)
    pub end: Option<String>,
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

pub fn show_day(config: Arc<AppConfig>, storage: StorageHandle, args: ShowArgs) -> Result<()> {
    let output = run_show(&config, &storage, &args)?;
    print!("{output}");
    Ok(())
}

pub fn set_range(config: Arc<AppConfig>, storage: StorageHandle, args: SetArgs) -> Result<()> {
    let output = run_set(&config, &storage, &args)?;
    println!("{output}");
    Ok(())
}

pub fn clear_range(config: Arc<AppConfig>, storage: StorageHandle, args: ClearArgs) -> Result<()> {
    let output = run_clear(&config, &storage, &args)?;
    println!("{output}");
    Ok(())
}

pub fn list_dates(_config: Arc<AppConfig>, storage: StorageHandle) -> Result<()> {
    let output = run_dates(&storage)?;
    print!("{output}");
    Ok(())
}

fn run_show(config: &AppConfig, storage: &StorageHandle, args: &ShowArgs) -> Result<String> {
    let date = match args.date.as_deref() {
        Some(raw) => parse_date_key(raw)?,
        None => today(),
    };
    let key = date_key(date);
    let grid = TimeGrid::for_variant(config.grid.variant);
    let store = ScheduleStore::load(Box::new(storage.clone()));

    let mut output = String::new();
    writeln!(output, "{key} ({})", date.weekday())?;
    let mut previous = None;
    for index in 0..grid.block_count() {
        let label = grid.label(index).unwrap_or_default();
        let covering = store.find_covering(&key, index);
        let marker = covering.map(|entry| (entry.id.clone(), entry.range()));
        match covering {
            Some(_) if marker == previous => writeln!(output, "{label}  |")?,
            Some(entry) => writeln!(output, "{label}  {}", entry.title)?,
            None => writeln!(output, "{label}")?,
        }
        previous = marker;
    }

    let unreadable = store
        .entries_on(&key)
        .into_iter()
        .filter(|entry| entry.range().is_none())
        .count();
    if unreadable > 0 {
        writeln!(
            output,
            "({unreadable} {} with unreadable ranges kept as-is)",
            plural(unreadable, "entry", "entries")
        )?;
    }
    let opaque = store
        .records()
        .iter()
        .filter(|record| record.entry().is_none())
        .count();
    if opaque > 0 {
        writeln!(
            output,
            "({opaque} stored {} could not be read and {} kept as-is)",
            plural(opaque, "record", "records"),
            plural(opaque, "is", "are")
        )?;
    }
    Ok(output)
}

fn run_set(config: &AppConfig, storage: &StorageHandle, args: &SetArgs) -> Result<String> {
    let key = date_key(parse_date_key(&args.date)?);
    let grid = TimeGrid::for_variant(config.grid.variant);
    let range = parse_range(&grid, &args.start, Some(&args.end))?;

    let title = args.title.join(" ");
    let title = title.trim();
    if title.is_empty() {
        bail!("title cannot be empty");
    }
    let max = config.editor.title_max_chars;
    let count = title.graphemes(true).count();
    if count > max {
        bail!("title has {count} characters; the limit is {max}");
    }

    let mut store = ScheduleStore::load(Box::new(storage.clone()));
    let outcome = store
        .try_upsert(&key, range, title)
        .with_context(|| format!("saving schedules to {}", storage.value_path().display()))?;
    Ok(describe(&key, &grid, range, &outcome))
}

fn run_clear(config: &AppConfig, storage: &StorageHandle, args: &ClearArgs) -> Result<String> {
    let key = date_key(parse_date_key(&args.date)?);
    let grid = TimeGrid::for_variant(config.grid.variant);
    let range = parse_range(&grid, &args.start, args.end.as_deref())?;

    let mut store = ScheduleStore::load(Box::new(storage.clone()));
    let outcome = store
        .try_clear(&key, range)
        .with_context(|| format!("saving schedules to {}", storage.value_path().display()))?;
    Ok(describe(&key, &grid, range, &outcome))
}

fn run_dates(storage: &StorageHandle) -> Result<String> {
    let store = ScheduleStore::load(Box::new(storage.clone()));
    let dates = store.dates();
    if dates.is_empty() {
        return Ok("No schedules yet.\n".to_string());
    }
    let mut output = String::new();
    for summary in dates {
        writeln!(
            output,
            "{}  {} {}",
            summary.date,
            summary.entries,
            plural(summary.entries, "entry", "entries")
        )?;
    }
    Ok(output)
}

fn parse_range(grid: &TimeGrid, start: &str, end: Option<&str>) -> Result<BlockRange> {
    let start = grid
        .parse_block(start)
        .with_context(|| format!("reading start block {start:?}"))?;
    let end = match end {
        Some(raw) => grid
            .parse_block(raw)
            .with_context(|| format!("reading end block {raw:?}"))?,
        None => start,
    };
    Ok(grid.range(start, end)?)
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 {
        one
    } else {
        many
    }
}

fn describe(date: &str, grid: &TimeGrid, range: BlockRange, outcome: &UpsertOutcome) -> String {
    let span = grid.range_label(range);
    let mut line = match &outcome.inserted {
        Some(entry) => format!("{date} {span}: \"{}\"", entry.title),
        None => format!("{date} {span}: cleared"),
    };
    if !outcome.removed.is_empty() {
        let titles: Vec<_> = outcome
            .removed
            .iter()
            .map(|entry| format!("\"{}\"", entry.title))
            .collect();
        let _ = write!(line, " (replaced {})", titles.join(", "));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridVariant;
    use std::fs;
    use tempfile::TempDir;

    type TestResult<T = ()> = Result<T>;

    fn setup(variant: GridVariant) -> TestResult<(TempDir, AppConfig, StorageHandle)> {
        let temp_dir = TempDir::new()?;
        let mut config = AppConfig::default();
        config.set_variant(variant);
        let storage = StorageHandle::open(temp_dir.path(), variant.storage_key());
        Ok((temp_dir, config, storage))
    }

    fn set_args(start: &str, end: &str, title: &str) -> SetArgs {
        SetArgs {
            date: "2026-02-01".into(),
            start: start.into(),
            end: end.into(),
            title: title.split(' ').map(str::to_owned).collect(),
        }
    }

    fn show(config: &AppConfig, storage: &StorageHandle) -> TestResult<String> {
        run_show(
            config,
            storage,
            &ShowArgs {
                date: Some("2026-02-01".into()),
            },
        )
    }

    #[test]
    fn set_then_show_prints_each_covered_label() -> TestResult {
        let (_temp_dir, config, storage) = setup(GridVariant::HalfDay)?;
        let message = run_set(&config, &storage, &set_args("07:00", "3", "Deep work"))?;
        assert!(message.contains("07:00–08:00"));

        let output = show(&config, &storage)?;
        assert!(output.starts_with("2026-02-01 (Sunday)"));
        assert!(output.contains("07:00  Deep work\n"));
        assert!(output.contains("07:30  |\n"));
        assert!(output.contains("06:30\n"));
        assert!(output.contains("08:00\n"));
        Ok(())
    }

    #[test]
    fn set_reports_replaced_entries() -> TestResult {
        let (_temp_dir, config, storage) = setup(GridVariant::FullDay)?;
        run_set(&config, &storage, &set_args("2", "5", "Study"))?;
        let message = run_set(&config, &storage, &set_args("4", "4", "Call"))?;
        assert!(message.contains("replaced \"Study\""));

        let output = show(&config, &storage)?;
        assert!(!output.contains("Study"));
        assert!(output.contains("02:00  Call\n"));
        Ok(())
    }

    #[test]
    fn set_rejects_bad_input() -> TestResult {
        let (_temp_dir, config, storage) = setup(GridVariant::HalfDay)?;
        assert!(run_set(&config, &storage, &set_args("0", "0", " ")).is_err());
        assert!(run_set(&config, &storage, &set_args("0", "0", "abcdefghijklmnopqrstu")).is_err());
        assert!(run_set(&config, &storage, &set_args("5", "2", "Backwards")).is_err());
        assert!(run_set(&config, &storage, &set_args("0", "36", "Overflow")).is_err());
        assert!(run_set(&config, &storage, &set_args("05:00", "05:00", "Too early")).is_err());

        let mut bad_date = set_args("0", "0", "x");
        bad_date.date = "2026-02-30".into();
        assert!(run_set(&config, &storage, &bad_date).is_err());
        assert!(!storage.value_path().exists());
        Ok(())
    }

    #[test]
    fn clear_defaults_to_a_single_block() -> TestResult {
        let (_temp_dir, config, storage) = setup(GridVariant::HalfDay)?;
        run_set(&config, &storage, &set_args("0", "1", "Run"))?;
        run_set(&config, &storage, &set_args("4", "4", "Lunch"))?;

        let message = run_clear(
            &config,
            &storage,
            &ClearArgs {
                date: "2026-02-01".into(),
                start: "1".into(),
                end: None,
            },
        )?;
        assert!(message.contains("cleared (replaced \"Run\")"));
        let output = show(&config, &storage)?;
        assert!(!output.contains("Run"));
        assert!(output.contains("08:00  Lunch"));
        Ok(())
    }

    #[test]
    fn dates_lists_counts_in_order() -> TestResult {
        let (_temp_dir, config, storage) = setup(GridVariant::HalfDay)?;
        assert_eq!(run_dates(&storage)?, "No schedules yet.\n");

        run_set(&config, &storage, &set_args("0", "0", "A"))?;
        run_set(&config, &storage, &set_args("2", "2", "B"))?;
        let mut later = set_args("0", "0", "C");
        later.date = "2026-03-01".into();
        run_set(&config, &storage, &later)?;
        let mut earlier = set_args("0", "0", "D");
        earlier.date = "2025-12-31".into();
        run_set(&config, &storage, &earlier)?;

        assert_eq!(
            run_dates(&storage)?,
            "2025-12-31  1 entry\n2026-02-01  2 entries\n2026-03-01  1 entry\n"
        );
        Ok(())
    }

    #[test]
    fn show_mentions_unreadable_entries() -> TestResult {
        let (_temp_dir, config, storage) = setup(GridVariant::HalfDay)?;
        fs::write(
            storage.value_path(),
            r#"[{"id":1,"date":"2026-02-01","startIndex":5,"endIndex":2,"title":"Broken"}]"#,
        )?;
        let output = show(&config, &storage)?;
        assert!(!output.contains("Broken"));
        assert!(output.contains("(1 entry with unreadable ranges kept as-is)"));
        Ok(())
    }

    #[test]
    fn show_counts_records_that_cannot_be_read() -> TestResult {
        let (_temp_dir, config, storage) = setup(GridVariant::HalfDay)?;
        let raw = concat!(
            r#"[{"id":1,"date":"2026-02-01","startIndex":"2","endIndex":3,"title":"Quoted"},"#,
            r#"{"id":2,"date":"2026-02-01","index":1,"title":null},"#,
            r#"{"id":3,"date":"2026-02-01","index":4,"title":"Fine"}]"#
        );
        fs::write(storage.value_path(), raw)?;
        let output = show(&config, &storage)?;
        assert!(output.contains("08:00  Fine\n"));
        assert!(output.contains("(2 stored records could not be read and are kept as-is)"));

        run_set(&config, &storage, &set_args("0", "0", "New"))?;
        let saved = fs::read_to_string(storage.value_path())?;
        assert!(saved.starts_with(&raw[..raw.len() - 1]), "{saved}");
        Ok(())
    }

    #[test]
    fn set_surfaces_save_failures() -> TestResult {
        let temp_dir = TempDir::new()?;
        let blocker = temp_dir.path().join("not-a-dir");
        fs::write(&blocker, "file in the way")?;
        let config = AppConfig::default();
        let storage = StorageHandle::open(blocker.join("data"), "timetable_schedules_v2");

        let err = run_set(&config, &storage, &set_args("0", "0", "Lost"))
            .err()
            .map(|err| format!("{err:#}"))
            .unwrap_or_default();
        assert!(err.contains("saving schedules"), "{err}");
        Ok(())
    }
}
