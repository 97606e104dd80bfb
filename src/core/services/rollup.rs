use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::{
    calendar::CalendarCodec,
    domain::{DailyRow, Granularity, RollupRow},
    errors::FormatError,
};

/// Buckets daily rows into display-calendar periods.
pub struct RollupEngine;

impl RollupEngine {
    /// Groups `daily` by bucket label and orders the groups by the decoded
    /// start of each bucket, never by the label text.
    pub fn rollup(daily: &[DailyRow], granularity: Granularity) -> Result<Vec<RollupRow>, FormatError> {
        let mut rows = match granularity {
            Granularity::Day => daily
                .iter()
                .map(|row| RollupRow {
                    label: CalendarCodec::encode(row.date, Granularity::Day),
                    start: row.date,
                    count: row.count,
                    amount: row.amount,
                })
                .collect::<Vec<_>>(),
            Granularity::Week | Granularity::Month => {
                let mut groups: HashMap<String, (u64, Decimal)> = HashMap::new();
                for row in daily {
                    let entry = groups
                        .entry(CalendarCodec::encode(row.date, granularity))
                        .or_insert((0, Decimal::ZERO));
                    entry.0 += row.count;
                    entry.1 += row.amount;
                }
                groups
                    .into_iter()
                    .map(|(label, (count, amount))| {
                        Ok(RollupRow {
                            start: CalendarCodec::decode(&label, granularity)?,
                            label,
                            count,
                            amount,
                        })
                    })
                    .collect::<Result<Vec<_>, FormatError>>()?
            }
        };
        rows.sort_by(|a, b| a.start.cmp(&b.start));
        Ok(rows)
    }
}
