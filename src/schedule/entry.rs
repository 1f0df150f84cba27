use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

/// Inclusive, non-empty run of block indices. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRange {
    start: usize,
    end: usize,
}

impl BlockRange {
    pub fn new(start: usize, end: usize) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn single(index: usize) -> Self {
        Self {
            start: index,
            end: index,
        }
    }

    /// Range spanning both indices, whichever order they come in.
    pub fn spanning(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index <= self.end
    }

    pub fn overlaps(&self, other: &BlockRange) -> bool {
        !(self.end < other.start || self.start > other.end)
    }

    pub fn indices(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "[{}]", self.start)
        } else {
            write!(f, "[{}, {}]", self.start, self.end)
        }
    }
}

/// Ids written by older builds may be numbers or strings; both are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Numeric(value) => write!(f, "{value}"),
            EntryId::Text(value) => f.write_str(value),
        }
    }
}

/// One persisted schedule record.
///
/// The index fields mirror the stored JSON rather than a normalized range so
/// that legacy `index`-only records and records with broken ranges survive a
/// load/save cycle byte-for-byte. Use [`ScheduleEntry::range`] to read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntryId>,
    #[serde(default)]
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScheduleEntry {
    pub fn new(id: EntryId, date: &str, range: BlockRange, title: &str) -> Self {
        Self {
            id: Some(id),
            date: date.to_owned(),
            start_index: Some(range.start as i64),
            end_index: Some(range.end as i64),
            index: None,
            title: title.to_owned(),
            extra: Map::new(),
        }
    }

    /// Legacy `index` records cover one block; a missing end collapses onto
    /// the start. `None` means the record cannot cover anything.
    pub fn range(&self) -> Option<BlockRange> {
        let start = self.start_index.or(self.index)?;
        let end = self.end_index.unwrap_or(start);
        let start = usize::try_from(start).ok()?;
        let end = usize::try_from(end).ok()?;
        BlockRange::new(start, end)
    }

    pub fn is_on(&self, date: &str) -> bool {
        self.date == date
    }

    pub fn covers(&self, block: usize) -> bool {
        self.range().is_some_and(|range| range.contains(block))
    }

    pub fn overlaps(&self, other: &BlockRange) -> bool {
        self.range().is_some_and(|range| range.overlaps(other))
    }
}

/// One element of the stored array.
///
/// Records read from storage keep their source text and are written back
/// exactly as read, including elements that do not read as an entry at all.
/// Those never match a query or an overlap test.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    entry: Option<ScheduleEntry>,
    source: Option<Box<RawValue>>,
}

impl StoredRecord {
    /// Reads one stored element. When it is not entry-shaped the error comes
    /// back together with the verbatim record to keep.
    pub fn decode(source: Box<RawValue>) -> Result<Self, (serde_json::Error, Self)> {
        match serde_json::from_str::<ScheduleEntry>(source.get()) {
            Ok(entry) => Ok(Self {
                entry: Some(entry),
                source: Some(source),
            }),
            Err(err) => Err((
                err,
                Self {
                    entry: None,
                    source: Some(source),
                },
            )),
        }
    }

    pub fn entry(&self) -> Option<&ScheduleEntry> {
        self.entry.as_ref()
    }

    pub fn into_entry(self) -> Option<ScheduleEntry> {
        self.entry
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref().map(RawValue::get)
    }
}

impl From<ScheduleEntry> for StoredRecord {
    fn from(entry: ScheduleEntry) -> Self {
        Self {
            entry: Some(entry),
            source: None,
        }
    }
}

impl PartialEq for StoredRecord {
    fn eq(&self, other: &Self) -> bool {
        match (&self.entry, &other.entry) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.source() == other.source(),
            _ => false,
        }
    }
}

impl Serialize for StoredRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match (&self.source, &self.entry) {
            (Some(source), _) => source.serialize(serializer),
            (None, Some(entry)) => entry.serialize(serializer),
            (None, None) => serializer.serialize_unit(),
        }
    }
}

/// Hands out creation-time ids in Unix milliseconds, strictly increasing even
/// when several entries are created within the same millisecond.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: i64,
}

impl IdGenerator {
    pub fn seeded<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a ScheduleEntry>,
    {
        let last = entries
            .into_iter()
            .filter_map(|entry| match entry.id {
                Some(EntryId::Numeric(value)) => Some(value),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        Self { last }
    }

    pub fn next_id(&mut self) -> EntryId {
        self.next_at(now_millis())
    }

    /// Falls back to a random text id once the numeric space is used up.
    pub fn next_at(&mut self, now_ms: i64) -> EntryId {
        let Some(floor) = self.last.checked_add(1) else {
            return EntryId::Text(Uuid::new_v4().to_string());
        };
        let id = now_ms.max(floor);
        self.last = id;
        EntryId::Numeric(id)
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
