use chrono::{DateTime, Utc};
use serde_json::Value;
use std::{fmt, sync::Arc};
use uuid::Uuid;

use crate::{
    domain::{Granularity, RebuildRequest, RollupRow, SummaryDocument, TenantScope},
    errors::{ReportResult, StoreError},
    storage::{Document, DocumentCollection, DocumentFilter, IndexSpec, UpsertOne, WriteFailure},
    utils::clock::{Clock, SystemClock},
};

use super::{daily_aggregator::MERCHANT_FIELD, DailyAggregator, RollupEngine};

pub const TTL_INDEX_NAME: &str = "ttl_builtAt";
pub const UNIQUE_INDEX_NAME: &str = "u_mode_label_merchant";
pub const BUILT_AT_FIELD: &str = "builtAt";
pub const MODE_FIELD: &str = "mode";
pub const LABEL_FIELD: &str = "label";

/// What index reconciliation did to one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAction {
    Created,
    Unchanged,
    /// Retention changed in place.
    Modified,
    /// In-place change was refused; dropped and created again.
    Recreated,
    /// An index with the expected name but another definition was left alone.
    Mismatched,
}

impl fmt::Display for IndexAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IndexAction::Created => "created",
            IndexAction::Unchanged => "unchanged",
            IndexAction::Modified => "modified",
            IndexAction::Recreated => "recreated",
            IndexAction::Mismatched => "mismatched",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    pub ttl: IndexAction,
    pub unique: IndexAction,
}

/// Summary of one rebuild run. `requested` higher than `upserted + matched`
/// means part of the unordered bulk write failed; written documents stay valid.
#[derive(Debug, Clone)]
pub struct RebuildReport {
    pub run_id: Uuid,
    pub scope: TenantScope,
    pub modes: Vec<Granularity>,
    pub requested: usize,
    pub upserted: usize,
    pub matched: usize,
    pub modified: usize,
    pub failures: Vec<WriteFailure>,
}

impl RebuildReport {
    pub fn written(&self) -> usize {
        self.upserted + self.matched
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.written() == self.requested
    }
}

/// A cached document that could not be served.
#[derive(Debug, Clone)]
pub struct RejectedDocument {
    pub label: Option<String>,
    pub reason: String,
}

/// Cached rows for one `(mode, scope)`, in store order.
#[derive(Debug, Clone, Default)]
pub struct CacheLookup {
    pub documents: Vec<SummaryDocument>,
    pub rejected: Vec<RejectedDocument>,
}

/// Materialized, TTL-bound cache of rollup rows.
pub struct SummaryCache {
    collection: Arc<dyn DocumentCollection>,
    aggregator: Arc<DailyAggregator>,
    ttl_seconds: u64,
    clock: Arc<dyn Clock>,
}

impl SummaryCache {
    pub fn new(
        collection: Arc<dyn DocumentCollection>,
        aggregator: Arc<DailyAggregator>,
        ttl_seconds: u64,
    ) -> Self {
        Self::with_clock(collection, aggregator, ttl_seconds, Arc::new(SystemClock))
    }

    pub fn with_clock(
        collection: Arc<dyn DocumentCollection>,
        aggregator: Arc<DailyAggregator>,
        ttl_seconds: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            collection,
            aggregator,
            ttl_seconds,
            clock,
        }
    }

    /// Builds the cache and reconciles its indexes, as done at startup.
    pub fn open(
        collection: Arc<dyn DocumentCollection>,
        aggregator: Arc<DailyAggregator>,
        ttl_seconds: u64,
    ) -> ReportResult<Self> {
        let cache = Self::new(collection, aggregator, ttl_seconds);
        cache.ensure_indexes()?;
        Ok(cache)
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Ensures the TTL index on `builtAt` carries the configured retention and
    /// the `(mode, label, merchantId)` uniqueness index exists.
    pub fn ensure_indexes(&self) -> ReportResult<IndexReport> {
        let indexes = self.collection.list_indexes()?;
        let ttl = self.reconcile_ttl_index(&indexes)?;
        let unique = self.reconcile_unique_index(&indexes)?;
        tracing::info!(ttl = %ttl, unique = %unique, ttl_seconds = self.ttl_seconds, "summary indexes reconciled");
        Ok(IndexReport { ttl, unique })
    }

    fn reconcile_ttl_index(&self, indexes: &[IndexSpec]) -> ReportResult<IndexAction> {
        let wanted = IndexSpec::ttl(TTL_INDEX_NAME, BUILT_AT_FIELD, self.ttl_seconds);
        let existing = indexes.iter().find(|index| {
            index.name == TTL_INDEX_NAME
                || (index.keys == wanted.keys && index.expire_after_seconds.is_some())
        });
        let Some(existing) = existing else {
            self.collection.create_index(&wanted)?;
            return Ok(IndexAction::Created);
        };
        if existing.keys == wanted.keys && existing.expire_after_seconds == Some(self.ttl_seconds) {
            return Ok(IndexAction::Unchanged);
        }
        if existing.keys == wanted.keys {
            match self
                .collection
                .modify_index_ttl(&existing.name, self.ttl_seconds)
            {
                Ok(()) => {
                    tracing::info!(
                        index = %existing.name,
                        from = ?existing.expire_after_seconds,
                        to = self.ttl_seconds,
                        "ttl index retention modified"
                    );
                    return Ok(IndexAction::Modified);
                }
                Err(err) => {
                    tracing::warn!(index = %existing.name, error = %err, "ttl modification refused, recreating index");
                }
            }
        }
        self.collection.drop_index(&existing.name)?;
        self.collection.create_index(&wanted)?;
        Ok(IndexAction::Recreated)
    }

    fn reconcile_unique_index(&self, indexes: &[IndexSpec]) -> ReportResult<IndexAction> {
        let wanted = IndexSpec::unique(UNIQUE_INDEX_NAME, [MODE_FIELD, LABEL_FIELD, MERCHANT_FIELD]);
        if let Some(existing) = indexes.iter().find(|index| index.name == UNIQUE_INDEX_NAME) {
            if *existing == wanted {
                return Ok(IndexAction::Unchanged);
            }
            tracing::warn!(index = UNIQUE_INDEX_NAME, "unique index exists with a different definition");
            return Ok(IndexAction::Mismatched);
        }
        if indexes
            .iter()
            .any(|index| index.unique && index.keys == wanted.keys)
        {
            return Ok(IndexAction::Unchanged);
        }
        self.collection.create_index(&wanted)?;
        Ok(IndexAction::Created)
    }

    /// Recomputes the requested modes for the scope and upserts one document
    /// per bucket. Safe to re-run and to run alongside other rebuilds.
    pub fn rebuild(&self, request: &RebuildRequest) -> ReportResult<RebuildReport> {
        let run_id = Uuid::new_v4();
        tracing::info!(%run_id, scope = %request.scope, modes = ?request.modes, "summary rebuild started");

        let daily = self.aggregator.aggregate_scope(&request.scope)?;
        let built_at = self.clock.now();
        let mut ops = Vec::new();
        for mode in &request.modes {
            let rows = RollupEngine::rollup(&daily, *mode)?;
            for row in &rows {
                ops.push(upsert_for(*mode, row, &request.scope, built_at)?);
            }
        }

        let result = if ops.is_empty() {
            Default::default()
        } else {
            self.collection.bulk_upsert(&ops)?
        };
        let report = RebuildReport {
            run_id,
            scope: request.scope.clone(),
            modes: request.modes.clone(),
            requested: ops.len(),
            upserted: result.upserted,
            matched: result.matched,
            modified: result.modified,
            failures: result.failures,
        };
        if report.is_complete() {
            tracing::info!(%run_id, requested = report.requested, upserted = report.upserted, matched = report.matched, "summary rebuild finished");
        } else {
            tracing::warn!(
                %run_id,
                requested = report.requested,
                written = report.written(),
                failed = report.failures.len(),
                "summary rebuild finished with failed writes"
            );
        }
        Ok(report)
    }

    /// Reads the cached documents of one mode and scope. Documents that do not
    /// deserialize are reported instead of failing the whole read.
    pub fn lookup(&self, mode: Granularity, scope: &TenantScope) -> ReportResult<CacheLookup> {
        let filter = scoped_filter(
            DocumentFilter::new().eq(MODE_FIELD, mode.as_str()),
            scope,
        );
        let mut lookup = CacheLookup::default();
        for raw in self.collection.find(&filter)? {
            let label = raw
                .get(LABEL_FIELD)
                .and_then(Value::as_str)
                .map(str::to_string);
            match serde_json::from_value::<SummaryDocument>(Value::Object(raw)) {
                Ok(doc) => lookup.documents.push(doc),
                Err(err) => lookup.rejected.push(RejectedDocument {
                    label,
                    reason: err.to_string(),
                }),
            }
        }
        Ok(lookup)
    }
}

/// Adds the tenant predicate; global scope means "field absent", not null.
fn scoped_filter(filter: DocumentFilter, scope: &TenantScope) -> DocumentFilter {
    match scope {
        TenantScope::Global => filter.exists(MERCHANT_FIELD, false),
        TenantScope::Tenant(merchant) => filter.eq(MERCHANT_FIELD, merchant.as_str()),
    }
}

fn upsert_for(
    mode: Granularity,
    row: &RollupRow,
    scope: &TenantScope,
    built_at: DateTime<Utc>,
) -> Result<UpsertOne, StoreError> {
    let doc = SummaryDocument::from_rollup(mode, row, scope, built_at);
    let set: Document = match serde_json::to_value(&doc)? {
        Value::Object(map) => map,
        _ => Document::new(),
    };
    let filter = scoped_filter(
        DocumentFilter::new()
            .eq(MODE_FIELD, mode.as_str())
            .eq(LABEL_FIELD, row.label.as_str()),
        scope,
    );
    // `$set` alone cannot drop a field left by an earlier write.
    let unset = match scope {
        TenantScope::Global => vec![MERCHANT_FIELD.to_string()],
        TenantScope::Tenant(_) => Vec::new(),
    };
    Ok(UpsertOne { filter, set, unset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{MerchantId, TransactionRecord},
        storage::JsonDocumentStore,
        utils::clock::FixedClock,
    };
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    const MERCHANT: &str = "65a1b2c3d4e5f60718293a4b";
    const OTHER: &str = "65a1b2c3d4e5f60718293a4c";

    struct Fixture {
        cache: SummaryCache,
        collection: Arc<dyn DocumentCollection>,
        _temp: TempDir,
    }

    fn fixture(ttl_seconds: u64) -> Fixture {
        let now = Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(now));
        let temp = TempDir::new().expect("temp dir");
        let store = JsonDocumentStore::with_clock(temp.path().to_path_buf(), Arc::clone(&clock))
            .expect("store");
        let log = store.transactions("transaction");
        let at = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap();
        let merchant = MerchantId::parse(MERCHANT).unwrap();
        let other = MerchantId::parse(OTHER).unwrap();
        log.insert_transactions(&[
            TransactionRecord::new(merchant.clone(), Decimal::from(50), at(20, 8)),
            TransactionRecord::new(merchant.clone(), Decimal::from(50), at(20, 9)),
            TransactionRecord::new(merchant, Decimal::from(150), at(21, 8)),
            TransactionRecord::new(other, Decimal::from(7), at(21, 10)),
        ])
        .expect("seed transactions");
        let aggregator = Arc::new(DailyAggregator::new(
            Arc::new(log),
            chrono_tz::Asia::Tehran,
        ));
        let collection: Arc<dyn DocumentCollection> =
            Arc::new(store.collection("transaction_summary"));
        let cache =
            SummaryCache::with_clock(Arc::clone(&collection), aggregator, ttl_seconds, clock);
        Fixture {
            cache,
            collection,
            _temp: temp,
        }
    }

    fn tenant(id: &str) -> TenantScope {
        TenantScope::Tenant(MerchantId::parse(id).unwrap())
    }

    #[test]
    fn indexes_are_created_once() {
        let fx = fixture(86_400);
        let first = fx.cache.ensure_indexes().unwrap();
        assert_eq!(first.ttl, IndexAction::Created);
        assert_eq!(first.unique, IndexAction::Created);
        let second = fx.cache.ensure_indexes().unwrap();
        assert_eq!(second.ttl, IndexAction::Unchanged);
        assert_eq!(second.unique, IndexAction::Unchanged);
    }

    #[test]
    fn ttl_drift_is_modified_in_place() {
        let fx = fixture(600);
        fx.collection
            .create_index(&IndexSpec::ttl(TTL_INDEX_NAME, BUILT_AT_FIELD, 86_400))
            .unwrap();
        let report = fx.cache.ensure_indexes().unwrap();
        assert_eq!(report.ttl, IndexAction::Modified);
        let ttl = fx
            .collection
            .list_indexes()
            .unwrap()
            .into_iter()
            .find(|index| index.name == TTL_INDEX_NAME)
            .unwrap();
        assert_eq!(ttl.expire_after_seconds, Some(600));
    }

    #[test]
    fn refused_modification_falls_back_to_recreate() {
        let fx = fixture(600);
        // Same name and key, but not a TTL index: retention cannot be edited.
        fx.collection
            .create_index(&IndexSpec::unique(TTL_INDEX_NAME, [BUILT_AT_FIELD]))
            .unwrap();
        let report = fx.cache.ensure_indexes().unwrap();
        assert_eq!(report.ttl, IndexAction::Recreated);
        let indexes = fx.collection.list_indexes().unwrap();
        let ttl = indexes
            .iter()
            .find(|index| index.name == TTL_INDEX_NAME)
            .unwrap();
        assert_eq!(*ttl, IndexSpec::ttl(TTL_INDEX_NAME, BUILT_AT_FIELD, 600));
    }

    #[test]
    fn mismatched_unique_index_is_left_alone() {
        let fx = fixture(86_400);
        let odd = IndexSpec::unique(UNIQUE_INDEX_NAME, [MODE_FIELD, LABEL_FIELD]);
        fx.collection.create_index(&odd).unwrap();
        let report = fx.cache.ensure_indexes().unwrap();
        assert_eq!(report.unique, IndexAction::Mismatched);
        assert!(fx.collection.list_indexes().unwrap().contains(&odd));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let fx = fixture(86_400);
        fx.cache.ensure_indexes().unwrap();
        let request = RebuildRequest::all(TenantScope::Global);
        let first = fx.cache.rebuild(&request).unwrap();
        // Two days, one week, one month.
        assert_eq!(first.requested, 4);
        assert_eq!(first.upserted, 4);
        assert!(first.is_complete());

        let second = fx.cache.rebuild(&request).unwrap();
        assert_eq!(second.upserted, 0);
        assert_eq!(second.matched, second.requested);
        assert_eq!(second.modified, 0);
        assert_eq!(fx.collection.find(&DocumentFilter::new()).unwrap().len(), 4);
    }

    #[test]
    fn global_and_tenant_rows_stay_apart() {
        let fx = fixture(86_400);
        fx.cache.ensure_indexes().unwrap();
        fx.cache
            .rebuild(&RebuildRequest::new(vec![Granularity::Month], TenantScope::Global))
            .unwrap();
        fx.cache
            .rebuild(&RebuildRequest::new(vec![Granularity::Month], tenant(MERCHANT)))
            .unwrap();

        let global = fx.cache.lookup(Granularity::Month, &TenantScope::Global).unwrap();
        assert_eq!(global.documents.len(), 1);
        assert_eq!(global.documents[0].count, 4);
        assert_eq!(global.documents[0].merchant_id, None);

        let merchant = fx.cache.lookup(Granularity::Month, &tenant(MERCHANT)).unwrap();
        assert_eq!(merchant.documents.len(), 1);
        assert_eq!(merchant.documents[0].count, 3);
        assert_eq!(merchant.documents[0].amount, Decimal::from(250));

        let raw_global = fx
            .collection
            .find(&DocumentFilter::new().exists(MERCHANT_FIELD, false))
            .unwrap();
        assert_eq!(raw_global.len(), 1);
        assert!(!raw_global[0].contains_key(MERCHANT_FIELD));
    }

    #[test]
    fn cache_miss_reads_empty() {
        let fx = fixture(86_400);
        let lookup = fx.cache.lookup(Granularity::Week, &tenant(OTHER)).unwrap();
        assert!(lookup.documents.is_empty());
        assert!(lookup.rejected.is_empty());
    }

    #[test]
    fn partial_write_failure_is_reported() {
        let fx = fixture(86_400);
        // A stricter legacy index makes tenant rows collide with global ones.
        fx.collection
            .create_index(&IndexSpec::unique("u_mode_label", [MODE_FIELD, LABEL_FIELD]))
            .unwrap();
        fx.cache
            .rebuild(&RebuildRequest::new(vec![Granularity::Day], TenantScope::Global))
            .unwrap();
        let report = fx
            .cache
            .rebuild(&RebuildRequest::new(
                vec![Granularity::Day, Granularity::Month],
                tenant(MERCHANT),
            ))
            .unwrap();
        assert_eq!(report.requested, 3);
        assert_eq!(report.upserted, 1);
        assert_eq!(report.failures.len(), 2);
        assert!(!report.is_complete());
    }
}
