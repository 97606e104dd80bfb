use std::sync::Arc;

use crate::{
    calendar::CalendarCodec,
    domain::{ReportQuery, SeriesPoint},
    errors::ReportResult,
};

use super::{
    summary_cache::{RejectedDocument, SummaryCache},
    DailyAggregator, RollupEngine,
};

/// Cached series plus the documents that had to be left out of it.
#[derive(Debug, Clone, Default)]
pub struct CachedSeries {
    pub points: Vec<SeriesPoint>,
    pub rejected: Vec<RejectedDocument>,
}

/// Serves `{key, value}` series from the live aggregation or the cache.
pub struct ReportQueryService {
    aggregator: Arc<DailyAggregator>,
    cache: Arc<SummaryCache>,
}

impl ReportQueryService {
    pub fn new(aggregator: Arc<DailyAggregator>, cache: Arc<SummaryCache>) -> Self {
        Self { aggregator, cache }
    }

    pub fn query(&self, query: &ReportQuery, use_cache: bool) -> ReportResult<Vec<SeriesPoint>> {
        if use_cache {
            let cached = self.cached(query)?;
            for rejected in &cached.rejected {
                tracing::warn!(
                    label = rejected.label.as_deref().unwrap_or("<missing>"),
                    reason = %rejected.reason,
                    "skipping unreadable summary document"
                );
            }
            Ok(cached.points)
        } else {
            self.live(query)
        }
    }

    /// One grouped scan of the raw store, rolled up in memory.
    pub fn live(&self, query: &ReportQuery) -> ReportResult<Vec<SeriesPoint>> {
        let daily = self.aggregator.aggregate_scope(&query.scope)?;
        let rows = RollupEngine::rollup(&daily, query.mode)?;
        Ok(rows
            .iter()
            .map(|row| SeriesPoint {
                key: row.label.clone(),
                value: row.metric(query.metric),
            })
            .collect())
    }

    /// Reads the materialized rows and re-sorts them chronologically; store
    /// order follows upsert arrival, not time. An empty cache is not an error.
    pub fn cached(&self, query: &ReportQuery) -> ReportResult<CachedSeries> {
        let lookup = self.cache.lookup(query.mode, &query.scope)?;
        let mut rejected = lookup.rejected;
        let mut dated = Vec::with_capacity(lookup.documents.len());
        for doc in lookup.documents {
            match CalendarCodec::decode(&doc.label, query.mode) {
                Ok(start) => dated.push((start, doc)),
                Err(err) => rejected.push(RejectedDocument {
                    label: Some(doc.label.clone()),
                    reason: err.to_string(),
                }),
            }
        }
        dated.sort_by(|a, b| a.0.cmp(&b.0));
        tracing::debug!(
            mode = %query.mode,
            scope = %query.scope,
            served = dated.len(),
            rejected = rejected.len(),
            "cached report read"
        );
        Ok(CachedSeries {
            points: dated
                .into_iter()
                .map(|(_, doc)| SeriesPoint {
                    value: doc.metric(query.metric),
                    key: doc.label,
                })
                .collect(),
            rejected,
        })
    }
}
