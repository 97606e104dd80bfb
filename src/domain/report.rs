use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

use crate::domain::common::{MerchantId, TenantScope};
use crate::domain::granularity::{Granularity, Metric};
use crate::errors::ReportError;

/// Totals for one storage-calendar day in the reporting timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRow {
    pub date: NaiveDate,
    pub count: u64,
    pub amount: Decimal,
}

/// Totals for one display-calendar bucket. `start` is the decoded start of
/// the bucket and is what rows are ordered by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupRow {
    pub label: String,
    pub start: NaiveDate,
    pub count: u64,
    pub amount: Decimal,
}

impl RollupRow {
    pub fn metric(&self, metric: Metric) -> MetricValue {
        match metric {
            Metric::Count => MetricValue::Count(self.count),
            Metric::Amount => MetricValue::Amount(self.amount),
        }
    }
}

/// Persisted cache row. A global row carries no `merchantId` field at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryDocument {
    pub mode: Granularity,
    pub label: String,
    #[serde(
        rename = "merchantId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub merchant_id: Option<MerchantId>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(rename = "builtAt")]
    pub built_at: DateTime<Utc>,
}

impl SummaryDocument {
    pub fn from_rollup(
        mode: Granularity,
        row: &RollupRow,
        scope: &TenantScope,
        built_at: DateTime<Utc>,
    ) -> Self {
        Self {
            mode,
            label: row.label.clone(),
            merchant_id: scope.merchant().cloned(),
            count: row.count,
            amount: row.amount,
            built_at,
        }
    }

    pub fn scope(&self) -> TenantScope {
        match &self.merchant_id {
            Some(id) => TenantScope::Tenant(id.clone()),
            None => TenantScope::Global,
        }
    }

    pub fn metric(&self, metric: Metric) -> MetricValue {
        match metric {
            Metric::Count => MetricValue::Count(self.count),
            Metric::Amount => MetricValue::Amount(self.amount),
        }
    }
}

/// Projected value of a single series point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricValue {
    Count(u64),
    Amount(Decimal),
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Count(count) => serializer.serialize_u64(*count),
            MetricValue::Amount(amount) => {
                let normalized = amount.normalize();
                if normalized.scale() == 0 {
                    if let Some(whole) = normalized.to_i64() {
                        return serializer.serialize_i64(whole);
                    }
                }
                serializer.serialize_f64(normalized.to_f64().unwrap_or_default())
            }
        }
    }
}

/// One `{key, value}` entry of a report series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub key: String,
    pub value: MetricValue,
}

/// Validated report query handed over by the request front end.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportQuery {
    pub metric: Metric,
    pub mode: Granularity,
    pub scope: TenantScope,
}

impl ReportQuery {
    pub fn new(metric: Metric, mode: Granularity, scope: TenantScope) -> Self {
        Self {
            metric,
            mode,
            scope,
        }
    }

    pub fn parse(metric: &str, mode: &str, merchant_id: Option<&str>) -> Result<Self, ReportError> {
        Ok(Self {
            metric: metric.parse()?,
            mode: mode.parse()?,
            scope: TenantScope::from_optional(merchant_id)?,
        })
    }
}

/// Parameters of one cache rebuild run.
#[derive(Debug, Clone, PartialEq)]
pub struct RebuildRequest {
    pub modes: Vec<Granularity>,
    pub scope: TenantScope,
}

impl RebuildRequest {
    pub fn new(modes: Vec<Granularity>, scope: TenantScope) -> Self {
        let mut modes = if modes.is_empty() {
            Granularity::ALL.to_vec()
        } else {
            modes
        };
        let mut seen = Vec::with_capacity(modes.len());
        modes.retain(|mode| {
            if seen.contains(mode) {
                false
            } else {
                seen.push(*mode);
                true
            }
        });
        Self { modes, scope }
    }

    pub fn all(scope: TenantScope) -> Self {
        Self::new(Vec::new(), scope)
    }

    /// Validates operator input; an invalid merchant id aborts before any write.
    pub fn parse<S: AsRef<str>>(modes: &[S], merchant_id: Option<&str>) -> Result<Self, ReportError> {
        let scope = TenantScope::from_optional(merchant_id)?;
        let modes = modes
            .iter()
            .map(|mode| mode.as_ref().parse())
            .collect::<Result<Vec<Granularity>, _>>()?;
        Ok(Self::new(modes, scope))
    }
}
