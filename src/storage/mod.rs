//! Document-store primitives the report engine relies on.
//!
//! The engine never touches files directly; it speaks in filters, grouped
//! daily pipelines, unordered bulk upserts, and index definitions. Any backend
//! offering those can serve reports; [`JsonDocumentStore`] is the bundled one.

pub mod json_backend;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{domain::DailyRow, errors::StoreError};

pub use json_backend::JsonDocumentStore;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Raw document as held by the store.
pub type Document = Map<String, Value>;

/// Predicate on a single document field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    Equals(Value),
    Exists(bool),
}

/// Conjunction of field predicates; an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    clauses: Vec<(String, FieldFilter)>,
}

impl DocumentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses
            .push((field.into(), FieldFilter::Equals(value.into())));
        self
    }

    pub fn exists(mut self, field: impl Into<String>, present: bool) -> Self {
        self.clauses
            .push((field.into(), FieldFilter::Exists(present)));
        self
    }

    pub fn clauses(&self) -> &[(String, FieldFilter)] {
        &self.clauses
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses.iter().all(|(field, filter)| match filter {
            FieldFilter::Equals(expected) => doc.get(field) == Some(expected),
            FieldFilter::Exists(present) => doc.contains_key(field) == *present,
        })
    }
}

/// Upsert-by-filter: `$set` on the matched document (or a new one seeded from
/// the equality clauses of the filter), then `$unset`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOne {
    pub filter: DocumentFilter,
    pub set: Document,
    pub unset: Vec<String>,
}

/// Outcome of an unordered bulk write. Failed operations do not stop the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkWriteReport {
    pub matched: usize,
    pub modified: usize,
    pub upserted: usize,
    pub failures: Vec<WriteFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteFailure {
    pub index: usize,
    pub message: String,
}

/// Index definition. Keys are ascending; `expire_after_seconds` makes it a
/// TTL index on its (single, timestamp-valued) key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub keys: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_after_seconds: Option<u64>,
}

impl IndexSpec {
    pub fn ttl(name: impl Into<String>, key: impl Into<String>, seconds: u64) -> Self {
        Self {
            name: name.into(),
            keys: vec![key.into()],
            unique: false,
            expire_after_seconds: Some(seconds),
        }
    }

    pub fn unique<I, S>(name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            keys: keys.into_iter().map(Into::into).collect(),
            unique: true,
            expire_after_seconds: None,
        }
    }
}

/// Grouped aggregation over raw transactions: match, coerce the timestamp
/// field, truncate to a day in `timezone`, sum per day, sort by day.
#[derive(Debug, Clone)]
pub struct DailyPipeline {
    pub filter: DocumentFilter,
    pub timestamp_field: String,
    pub amount_field: String,
    pub timezone: Tz,
}

/// Read side of the raw transaction collection.
pub trait TransactionSource: Send + Sync {
    /// Runs the grouped daily pipeline. Implementations must not require the
    /// matched record set to fit in memory; only the per-day groups may.
    fn aggregate_daily(&self, pipeline: &DailyPipeline) -> Result<Vec<DailyRow>>;
}

/// A named collection of documents with index support.
pub trait DocumentCollection: Send + Sync {
    fn list_indexes(&self) -> Result<Vec<IndexSpec>>;
    fn create_index(&self, spec: &IndexSpec) -> Result<()>;
    /// In-place change of a TTL index's retention.
    fn modify_index_ttl(&self, name: &str, expire_after_seconds: u64) -> Result<()>;
    fn drop_index(&self, name: &str) -> Result<()>;
    fn bulk_upsert(&self, ops: &[UpsertOne]) -> Result<BulkWriteReport>;
    /// Missing collections read as empty.
    fn find(&self, filter: &DocumentFilter) -> Result<Vec<Document>>;
}
