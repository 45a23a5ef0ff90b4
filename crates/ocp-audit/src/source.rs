//! Entry sources: where the auditor fetches archive entries from.
//!
//! Storage and transport live outside this crate; they plug in through
//! [`DataSource`]. [`LocalFirst`] composes a local store with a remote
//! fallback, and [`MemorySource`] holds entries in memory.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use ocp_canonical::{Record, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::SourceError;

/// Capability to fetch archive entries by id.
///
/// Listing operations are optional; the defaults report
/// [`SourceError::Unsupported`].
pub trait DataSource {
    /// Fetches one entry.
    fn get_entry(&self, id: &str) -> Result<Record, SourceError>;

    /// Ids of entries written by `agent_id` at or after `since`.
    fn list_ids(&self, agent_id: &str, since: DateTime<Utc>) -> Result<Vec<String>, SourceError> {
        let _ = (agent_id, since);
        Err(SourceError::Unsupported("list_ids"))
    }

    /// Ids between `start` and `end`, both inclusive, in archive order.
    fn list_range(&self, start: &str, end: &str) -> Result<Vec<String>, SourceError> {
        let _ = (start, end);
        Err(SourceError::Unsupported("list_range"))
    }
}

impl<T: DataSource + ?Sized> DataSource for &T {
    fn get_entry(&self, id: &str) -> Result<Record, SourceError> {
        (**self).get_entry(id)
    }

    fn list_ids(&self, agent_id: &str, since: DateTime<Utc>) -> Result<Vec<String>, SourceError> {
        (**self).list_ids(agent_id, since)
    }

    fn list_range(&self, start: &str, end: &str) -> Result<Vec<String>, SourceError> {
        (**self).list_range(start, end)
    }
}

impl<T: DataSource + ?Sized> DataSource for Arc<T> {
    fn get_entry(&self, id: &str) -> Result<Record, SourceError> {
        (**self).get_entry(id)
    }

    fn list_ids(&self, agent_id: &str, since: DateTime<Utc>) -> Result<Vec<String>, SourceError> {
        (**self).list_ids(agent_id, since)
    }

    fn list_range(&self, start: &str, end: &str) -> Result<Vec<String>, SourceError> {
        (**self).list_range(start, end)
    }
}

/// Local source with a remote fallback.
///
/// The remote is consulted only when the local source misses or fails.
#[derive(Debug, Clone)]
pub struct LocalFirst<L, R> {
    local: L,
    remote: R,
}

impl<L: DataSource, R: DataSource> LocalFirst<L, R> {
    /// Composes two sources.
    pub fn new(local: L, remote: R) -> Self {
        Self { local, remote }
    }

    /// The local source.
    pub fn local(&self) -> &L {
        &self.local
    }

    /// The remote source.
    pub fn remote(&self) -> &R {
        &self.remote
    }
}

impl<L: DataSource, R: DataSource> DataSource for LocalFirst<L, R> {
    fn get_entry(&self, id: &str) -> Result<Record, SourceError> {
        match self.local.get_entry(id) {
            Ok(entry) => Ok(entry),
            Err(SourceError::NotFound(_)) => {
                debug!(entry_id = id, "entry not found locally; trying remote");
                self.remote.get_entry(id)
            }
            Err(err) => {
                warn!(entry_id = id, error = %err, "local source failed; trying remote");
                self.remote.get_entry(id)
            }
        }
    }

    fn list_ids(&self, agent_id: &str, since: DateTime<Utc>) -> Result<Vec<String>, SourceError> {
        match self.local.list_ids(agent_id, since) {
            Ok(ids) => Ok(ids),
            Err(err) => {
                debug!(agent_id, error = %err, "local listing unavailable; trying remote");
                self.remote.list_ids(agent_id, since)
            }
        }
    }

    fn list_range(&self, start: &str, end: &str) -> Result<Vec<String>, SourceError> {
        match self.local.list_range(start, end) {
            Ok(ids) => Ok(ids),
            Err(err) => {
                debug!(start, end, error = %err, "local range unavailable; trying remote");
                self.remote.list_range(start, end)
            }
        }
    }
}

/// In-memory entries keyed and ordered by id.
///
/// Agent listings read the `agent_id` and `timestamp` fields of each entry.
#[derive(Debug, Default)]
pub struct MemorySource {
    entries: BTreeMap<String, Record>,
    fetches: AtomicUsize,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, id: impl Into<String>, entry: Record) -> Option<Record> {
        self.entries.insert(id.into(), entry)
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_entry(mut self, id: impl Into<String>, entry: Record) -> Self {
        self.insert(id, entry);
        self
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of `get_entry` calls served so far, hits and misses alike.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl FromIterator<(String, Record)> for MemorySource {
    fn from_iter<I: IntoIterator<Item = (String, Record)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            fetches: AtomicUsize::new(0),
        }
    }
}

impl DataSource for MemorySource {
    fn get_entry(&self, id: &str) -> Result<Record, SourceError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(id.to_string()))
    }

    fn list_ids(&self, agent_id: &str, since: DateTime<Utc>) -> Result<Vec<String>, SourceError> {
        Ok(self
            .entries
            .iter()
            .filter(|(_, entry)| entry.get("agent_id").and_then(Value::as_str) == Some(agent_id))
            .filter(|(_, entry)| {
                entry
                    .get("timestamp")
                    .and_then(entry_time)
                    .is_some_and(|at| at >= since)
            })
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn list_range(&self, start: &str, end: &str) -> Result<Vec<String>, SourceError> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self
            .entries
            .range(start.to_string()..=end.to_string())
            .map(|(id, _)| id.clone())
            .collect())
    }
}

fn entry_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Timestamp(at) => Some(*at),
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .map(|at| at.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| Utc.from_utc_datetime(&naive))
            }),
        _ => None,
    }
}
