use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::ReportError;

/// Bucketing resolution of a report, persisted as `daily`/`weekly`/`monthly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(rename = "daily")]
    Day,
    #[serde(rename = "weekly")]
    Week,
    #[serde(rename = "monthly")]
    Month,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Day, Granularity::Week, Granularity::Month];

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Day => "daily",
            Granularity::Week => "weekly",
            Granularity::Month => "monthly",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Granularity::Day),
            "weekly" => Ok(Granularity::Week),
            "monthly" => Ok(Granularity::Month),
            other => Err(ReportError::Validation(format!(
                "`{other}` is not a valid mode (expected daily, weekly or monthly)"
            ))),
        }
    }
}

/// Which aggregate a report projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Count,
    Amount,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Count => "count",
            Metric::Amount => "amount",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" => Ok(Metric::Count),
            "amount" => Ok(Metric::Amount),
            other => Err(ReportError::Validation(format!(
                "`{other}` is not a valid type (expected count or amount)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn granularity_serializes_as_mode_string() {
        let json = serde_json::to_string(&Granularity::Week).unwrap();
        assert_eq!(json, "\"weekly\"");
        let parsed: Granularity = serde_json::from_str("\"monthly\"").unwrap();
        assert_eq!(parsed, Granularity::Month);
    }

    #[test]
    fn unknown_values_are_validation_errors() {
        assert!(matches!(
            "yearly".parse::<Granularity>(),
            Err(ReportError::Validation(_))
        ));
        assert!(matches!(
            "sum".parse::<Metric>(),
            Err(ReportError::Validation(_))
        ));
    }
}
