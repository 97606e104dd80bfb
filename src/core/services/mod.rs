pub mod daily_aggregator;
pub mod report_service;
pub mod rollup;
pub mod summary_cache;

pub use daily_aggregator::DailyAggregator;
pub use report_service::{CachedSeries, ReportQueryService};
pub use rollup::RollupEngine;
pub use summary_cache::{
    CacheLookup, IndexAction, IndexReport, RebuildReport, RejectedDocument, SummaryCache,
};
