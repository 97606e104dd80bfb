//! Report domain types shared by the calendar codec, services, and storage.

pub mod common;
pub mod granularity;
pub mod report;
pub mod transaction;

pub use common::{MerchantId, TenantScope};
pub use granularity::{Granularity, Metric};
pub use report::{
    DailyRow, MetricValue, RebuildRequest, ReportQuery, RollupRow, SeriesPoint, SummaryDocument,
};
pub use transaction::{RawTimestamp, TransactionRecord};
