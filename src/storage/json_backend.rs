use chrono::{DateTime, Duration, NaiveDate, Utc};
use fd_lock::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashSet},
    fs::{self, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    domain::{transaction::amount_from_value, DailyRow, RawTimestamp, TransactionRecord},
    errors::StoreError,
    utils::{
        clock::{Clock, SystemClock},
        paths::{canonical_name, ensure_dir, write_atomic},
    },
};

use super::{
    BulkWriteReport, DailyPipeline, Document, DocumentCollection, DocumentFilter, FieldFilter,
    IndexSpec, Result, TransactionSource, UpsertOne, WriteFailure,
};

const COLLECTION_EXTENSION: &str = "json";
const LOG_EXTENSION: &str = "jsonl";
const LOCK_EXTENSION: &str = "lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Shared,
    Exclusive,
}

/// File-backed document store rooted at a directory.
///
/// Indexed collections live in `<name>.json` and are rewritten atomically;
/// append-only transaction logs live in `<name>.jsonl` and are streamed.
/// Every file is guarded by an advisory lock on `<file>.lock`, held across
/// the whole read-modify-write, so any number of handles and processes may
/// share one root.
#[derive(Clone)]
pub struct JsonDocumentStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl JsonDocumentStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        Self::with_clock(root, Arc::new(SystemClock))
    }

    pub fn with_clock(root: PathBuf, clock: Arc<dyn Clock>) -> Result<Self> {
        ensure_dir(&root)?;
        Ok(Self { root, clock })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Handle on an indexed collection; the file is created on first write.
    pub fn collection(&self, name: &str) -> JsonCollection {
        JsonCollection {
            path: self
                .root
                .join(format!("{}.{}", canonical_name(name), COLLECTION_EXTENSION)),
            store: self.clone(),
        }
    }

    /// Handle on an append-only transaction log.
    pub fn transactions(&self, name: &str) -> JsonTransactionLog {
        JsonTransactionLog {
            path: self
                .root
                .join(format!("{}.{}", canonical_name(name), LOG_EXTENSION)),
        }
    }

}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(LOCK_EXTENSION);
    PathBuf::from(name)
}

/// Runs `op` while holding the advisory lock of `path`.
fn with_file_lock<T>(path: &Path, mode: LockMode, op: impl FnOnce() -> Result<T>) -> Result<T> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(lock_path(path))?;
    let mut lock = RwLock::new(file);
    match mode {
        LockMode::Shared => {
            let _held = lock.read()?;
            op()
        }
        LockMode::Exclusive => {
            let _held = lock.write()?;
            op()
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CollectionFile {
    #[serde(default)]
    indexes: Vec<IndexSpec>,
    #[serde(default)]
    documents: Vec<Document>,
}

/// Indexed collection persisted as a single JSON file.
#[derive(Clone)]
pub struct JsonCollection {
    path: PathBuf,
    store: JsonDocumentStore,
}

impl JsonCollection {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<CollectionFile> {
        if !self.path.exists() {
            return Ok(CollectionFile::default());
        }
        let data = fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(CollectionFile::default());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn write(&self, file: &CollectionFile) -> Result<()> {
        let json = serde_json::to_string_pretty(file)?;
        write_atomic(&self.path, &json)?;
        Ok(())
    }

    /// Loads the file with expired documents already removed, persisting the
    /// removal the way a TTL monitor would. Caller holds the exclusive lock.
    fn read_live(&self) -> Result<CollectionFile> {
        let mut file = self.read()?;
        let removed = purge_expired(&mut file, self.store.clock.now());
        if removed > 0 {
            tracing::debug!(
                path = %self.path.display(),
                removed,
                "expired documents removed"
            );
            self.write(&file)?;
        }
        Ok(file)
    }

    fn locked<T>(&self, mode: LockMode, op: impl FnOnce() -> Result<T>) -> Result<T> {
        with_file_lock(&self.path, mode, op)
    }
}

impl DocumentCollection for JsonCollection {
    fn list_indexes(&self) -> Result<Vec<IndexSpec>> {
        self.locked(LockMode::Shared, || Ok(self.read()?.indexes))
    }

    fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        self.locked(LockMode::Exclusive, || self.create_index_locked(spec))
    }

    fn modify_index_ttl(&self, name: &str, expire_after_seconds: u64) -> Result<()> {
        self.locked(LockMode::Exclusive, || {
            self.modify_index_ttl_locked(name, expire_after_seconds)
        })
    }

    fn drop_index(&self, name: &str) -> Result<()> {
        self.locked(LockMode::Exclusive, || {
            let mut file = self.read()?;
            let before = file.indexes.len();
            file.indexes.retain(|index| index.name != name);
            if file.indexes.len() == before {
                return Err(StoreError::IndexNotFound(name.to_string()));
            }
            self.write(&file)
        })
    }

    fn bulk_upsert(&self, ops: &[UpsertOne]) -> Result<BulkWriteReport> {
        self.locked(LockMode::Exclusive, || self.bulk_upsert_locked(ops))
    }

    fn find(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        // Exclusive: the TTL purge may rewrite the file.
        self.locked(LockMode::Exclusive, || {
            Ok(self
                .read_live()?
                .documents
                .into_iter()
                .filter(|doc| filter.matches(doc))
                .collect())
        })
    }
}

impl JsonCollection {
    fn create_index_locked(&self, spec: &IndexSpec) -> Result<()> {
        let mut file = self.read()?;
        if let Some(existing) = file.indexes.iter().find(|index| index.name == spec.name) {
            return if existing == spec {
                Ok(())
            } else {
                Err(StoreError::IndexOptionsConflict(spec.name.clone()))
            };
        }
        if spec.unique {
            let mut seen = HashSet::new();
            for doc in &file.documents {
                let key = index_key(spec, doc);
                if !seen.insert(key.clone()) {
                    return Err(StoreError::DuplicateKey {
                        index: spec.name.clone(),
                        key: describe_key(&key),
                    });
                }
            }
        }
        file.indexes.push(spec.clone());
        self.write(&file)
    }

    fn modify_index_ttl_locked(&self, name: &str, expire_after_seconds: u64) -> Result<()> {
        let mut file = self.read()?;
        let index = file
            .indexes
            .iter_mut()
            .find(|index| index.name == name)
            .ok_or_else(|| StoreError::IndexNotFound(name.to_string()))?;
        // Only an existing TTL index can have its retention changed in place.
        if index.expire_after_seconds.is_none() {
            return Err(StoreError::IndexOptionsConflict(name.to_string()));
        }
        index.expire_after_seconds = Some(expire_after_seconds);
        self.write(&file)
    }

    fn bulk_upsert_locked(&self, ops: &[UpsertOne]) -> Result<BulkWriteReport> {
        let mut file = self.read_live()?;
        let mut report = BulkWriteReport::default();
        for (position, op) in ops.iter().enumerate() {
            match apply_upsert(&mut file, op) {
                Ok(UpsertOutcome::Matched { modified }) => {
                    report.matched += 1;
                    if modified {
                        report.modified += 1;
                    }
                }
                Ok(UpsertOutcome::Inserted) => report.upserted += 1,
                Err(err) => report.failures.push(WriteFailure {
                    index: position,
                    message: err.to_string(),
                }),
            }
        }
        if !ops.is_empty() {
            self.write(&file)?;
        }
        Ok(report)
    }
}

enum UpsertOutcome {
    Matched { modified: bool },
    Inserted,
}

fn apply_upsert(file: &mut CollectionFile, op: &UpsertOne) -> Result<UpsertOutcome> {
    let position = file.documents.iter().position(|doc| op.filter.matches(doc));
    let mut candidate = match position {
        Some(idx) => file.documents[idx].clone(),
        None => seed_from_filter(&op.filter),
    };
    for (field, value) in &op.set {
        candidate.insert(field.clone(), value.clone());
    }
    for field in &op.unset {
        candidate.remove(field);
    }
    ensure_unique(file, &candidate, position)?;
    match position {
        Some(idx) => {
            let modified = file.documents[idx] != candidate;
            file.documents[idx] = candidate;
            Ok(UpsertOutcome::Matched { modified })
        }
        None => {
            file.documents.push(candidate);
            Ok(UpsertOutcome::Inserted)
        }
    }
}

fn seed_from_filter(filter: &DocumentFilter) -> Document {
    let mut doc = Document::new();
    for (field, clause) in filter.clauses() {
        if let FieldFilter::Equals(value) = clause {
            doc.insert(field.clone(), value.clone());
        }
    }
    doc
}

/// A missing field is its own key state, distinct from any present value
/// (including `null`).
type IndexKey = Vec<Option<String>>;

fn index_key(spec: &IndexSpec, doc: &Document) -> IndexKey {
    spec.keys
        .iter()
        .map(|field| doc.get(field).map(Value::to_string))
        .collect()
}

fn describe_key(key: &IndexKey) -> String {
    let parts: Vec<String> = key
        .iter()
        .map(|part| part.clone().unwrap_or_else(|| "<missing>".to_string()))
        .collect();
    format!("({})", parts.join(", "))
}

fn ensure_unique(file: &CollectionFile, candidate: &Document, skip: Option<usize>) -> Result<()> {
    for spec in file.indexes.iter().filter(|index| index.unique) {
        let key = index_key(spec, candidate);
        let clash = file
            .documents
            .iter()
            .enumerate()
            .any(|(idx, doc)| Some(idx) != skip && index_key(spec, doc) == key);
        if clash {
            return Err(StoreError::DuplicateKey {
                index: spec.name.clone(),
                key: describe_key(&key),
            });
        }
    }
    Ok(())
}

fn purge_expired(file: &mut CollectionFile, now: DateTime<Utc>) -> usize {
    let ttl_fields: Vec<(String, u64)> = file
        .indexes
        .iter()
        .filter_map(|index| match (index.expire_after_seconds, index.keys.as_slice()) {
            (Some(seconds), [field]) => Some((field.clone(), seconds)),
            _ => None,
        })
        .collect();
    if ttl_fields.is_empty() {
        return 0;
    }
    let before = file.documents.len();
    file.documents.retain(|doc| {
        ttl_fields.iter().all(|(field, seconds)| {
            let Some(stamp) = doc.get(field).and_then(timestamp_of) else {
                return true;
            };
            let retention = i64::try_from(*seconds).ok().and_then(Duration::try_seconds);
            match retention.and_then(|retention| stamp.checked_add_signed(retention)) {
                Some(expires_at) => expires_at > now,
                None => true,
            }
        })
    });
    before - file.documents.len()
}

fn timestamp_of(value: &Value) -> Option<DateTime<Utc>> {
    serde_json::from_value::<RawTimestamp>(value.clone())
        .ok()
        .and_then(|raw| raw.to_utc())
}

/// Append-only log of raw transaction documents, one JSON object per line.
#[derive(Clone)]
pub struct JsonTransactionLog {
    path: PathBuf,
}

impl JsonTransactionLog {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn insert_transactions(&self, records: &[TransactionRecord]) -> Result<usize> {
        let docs = records
            .iter()
            .map(|record| -> Result<Document> {
                match serde_json::to_value(record)? {
                    Value::Object(map) => Ok(map),
                    _ => Ok(Document::new()),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        self.insert_documents(&docs)
    }

    /// Appends raw documents as-is, including legacy field representations.
    pub fn insert_documents(&self, docs: &[Document]) -> Result<usize> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        with_file_lock(&self.path, LockMode::Exclusive, || {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            for doc in docs {
                let line = serde_json::to_string(doc)?;
                writeln!(file, "{line}")?;
            }
            file.flush()?;
            Ok(docs.len())
        })
    }
}

impl TransactionSource for JsonTransactionLog {
    fn aggregate_daily(&self, pipeline: &DailyPipeline) -> Result<Vec<DailyRow>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        // Shared: scans run side by side, appends wait for them.
        with_file_lock(&self.path, LockMode::Shared, || self.scan_daily(pipeline))
    }
}

impl JsonTransactionLog {
    fn scan_daily(&self, pipeline: &DailyPipeline) -> Result<Vec<DailyRow>> {
        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut groups: BTreeMap<NaiveDate, (u64, Decimal)> = BTreeMap::new();
        let mut scanned = 0usize;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let doc: Document = serde_json::from_str(&line)?;
            scanned += 1;
            if !pipeline.filter.matches(&doc) {
                continue;
            }
            let raw = doc.get(&pipeline.timestamp_field).unwrap_or(&Value::Null);
            let instant = timestamp_of(raw).ok_or_else(|| StoreError::Conversion {
                field: pipeline.timestamp_field.clone(),
                value: raw.to_string(),
            })?;
            let day = instant.with_timezone(&pipeline.timezone).date_naive();
            let amount = doc
                .get(&pipeline.amount_field)
                .and_then(amount_from_value)
                .unwrap_or_default();
            let entry = groups.entry(day).or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += amount;
        }
        tracing::debug!(scanned, days = groups.len(), "daily aggregation finished");
        Ok(groups
            .into_iter()
            .map(|(date, (count, amount))| DailyRow {
                date,
                count,
                amount,
            })
            .collect())
    }
}
