use chrono_tz::Tz;
use std::sync::Arc;

use crate::{
    calendar::CalendarCodec,
    domain::{DailyRow, TenantScope},
    errors::{ReportResult, StoreError},
    storage::{DailyPipeline, DocumentFilter, TransactionSource},
};

pub const MERCHANT_FIELD: &str = "merchantId";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const AMOUNT_FIELD: &str = "amount";

/// Turns the raw transaction collection into per-day totals.
///
/// Day is the finest granularity ever reported, so a single grouped scan per
/// request is enough; week and month buckets are rolled up from these rows in
/// memory without touching the raw store again.
pub struct DailyAggregator {
    source: Arc<dyn TransactionSource>,
    timezone: Tz,
}

impl DailyAggregator {
    pub fn new(source: Arc<dyn TransactionSource>, timezone: Tz) -> Self {
        Self { source, timezone }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Aggregates every record visible to `scope`.
    pub fn aggregate_scope(&self, scope: &TenantScope) -> ReportResult<Vec<DailyRow>> {
        self.aggregate_daily(scope, DocumentFilter::new())
    }

    /// Aggregates records matching `filter`, narrowed to the tenant when the
    /// scope names one.
    pub fn aggregate_daily(
        &self,
        scope: &TenantScope,
        filter: DocumentFilter,
    ) -> ReportResult<Vec<DailyRow>> {
        let filter = match scope.merchant() {
            Some(merchant) => filter.eq(MERCHANT_FIELD, merchant.as_str()),
            None => filter,
        };
        let pipeline = DailyPipeline {
            filter,
            timestamp_field: CREATED_AT_FIELD.into(),
            amount_field: AMOUNT_FIELD.into(),
            timezone: self.timezone,
        };
        let rows = self.source.aggregate_daily(&pipeline)?;
        if let Some(row) = rows.iter().find(|row| !CalendarCodec::supports(row.date)) {
            return Err(StoreError::Conversion {
                field: CREATED_AT_FIELD.into(),
                value: row.date.to_string(),
            }
            .into());
        }
        tracing::debug!(scope = %scope, days = rows.len(), "daily aggregation");
        Ok(rows)
    }
}
