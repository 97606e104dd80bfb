use std::sync::Arc;

use crate::{
    config::Config,
    core::services::{
        CachedSeries, DailyAggregator, IndexReport, RebuildReport, ReportQueryService,
        SummaryCache,
    },
    domain::{RebuildRequest, ReportQuery, SeriesPoint, TransactionRecord},
    errors::ReportResult,
    storage::{
        json_backend::JsonTransactionLog, DocumentCollection, JsonDocumentStore,
        TransactionSource,
    },
};

/// Facade wiring the aggregation, cache, and query services to one store.
pub struct ReportManager {
    config: Config,
    transactions: JsonTransactionLog,
    cache: Arc<SummaryCache>,
    reports: ReportQueryService,
}

impl ReportManager {
    pub fn new(config: Config, store: &JsonDocumentStore) -> ReportResult<Self> {
        let timezone = config.tz()?;
        let transactions = store.transactions(&config.transaction_collection);
        let source: Arc<dyn TransactionSource> = Arc::new(transactions.clone());
        let summaries: Arc<dyn DocumentCollection> =
            Arc::new(store.collection(&config.summary_collection));
        let aggregator = Arc::new(DailyAggregator::new(source, timezone));
        let cache = Arc::new(SummaryCache::new(
            summaries,
            Arc::clone(&aggregator),
            config.summary_ttl_seconds,
        ));
        let reports = ReportQueryService::new(aggregator, Arc::clone(&cache));
        Ok(Self {
            config,
            transactions,
            cache,
            reports,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn import(&self, records: &[TransactionRecord]) -> ReportResult<usize> {
        let written = self.transactions.insert_transactions(records)?;
        tracing::info!(written, "transactions imported");
        Ok(written)
    }

    pub fn ensure_indexes(&self) -> ReportResult<IndexReport> {
        self.cache.ensure_indexes()
    }

    /// Reconciles indexes, then rebuilds the requested summaries.
    pub fn rebuild(&self, request: &RebuildRequest) -> ReportResult<RebuildReport> {
        self.cache.ensure_indexes()?;
        self.cache.rebuild(request)
    }

    pub fn report(&self, query: &ReportQuery, use_cache: bool) -> ReportResult<Vec<SeriesPoint>> {
        self.reports.query(query, use_cache)
    }

    pub fn cached_report(&self, query: &ReportQuery) -> ReportResult<CachedSeries> {
        self.reports.cached(query)
    }
}
