use thiserror::Error;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

#[derive(Debug, Error)]
#[error("'{input}' is not a calendar date (expected YYYY-MM-DD)")]
pub struct DateError {
    input: String,
    #[source]
    source: time::error::Parse,
}

/// Partition key for a day; entries compare dates as exact strings.
pub fn date_key(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

pub fn parse_date_key(input: &str) -> Result<Date, DateError> {
    let trimmed = input.trim();
    Date::parse(trimmed, format_description!("[year]-[month]-[day]")).map_err(|source| DateError {
        input: trimmed.to_owned(),
        source,
    })
}

pub fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}
