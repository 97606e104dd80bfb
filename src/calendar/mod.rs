//! Mapping between storage-calendar dates and display-calendar bucket labels.
//!
//! Labels are not chronologically sortable as strings (month names are words,
//! week numbers are not zero padded), so every label decodes back to the first
//! Gregorian day of its bucket and callers sort on that instead.

pub mod jalali;

use chrono::{Duration, NaiveDate};

use crate::domain::Granularity;
use crate::errors::FormatError;

pub use jalali::{JalaliDate, MONTH_NAMES};

const YEAR_WORD: &str = "سال";
const WEEK_WORD: &str = "هفته";
const DAYS_PER_WEEK: u32 = 7;

/// Stateless codec for bucket labels.
pub struct CalendarCodec;

impl CalendarCodec {
    /// Renders the display-calendar label of the bucket containing `date`.
    pub fn encode(date: NaiveDate, granularity: Granularity) -> String {
        let jalali = JalaliDate::from_gregorian(date);
        match granularity {
            Granularity::Day => jalali.to_string(),
            Granularity::Week => format!(
                "{} {} {} {}",
                jalali.year(),
                YEAR_WORD,
                week_of_year(jalali),
                WEEK_WORD
            ),
            Granularity::Month => format!("{} {}", jalali.year(), jalali.month_name()),
        }
    }

    /// Returns the Gregorian date on which the labelled bucket starts.
    pub fn decode(label: &str, granularity: Granularity) -> Result<NaiveDate, FormatError> {
        let malformed = || FormatError::MalformedLabel {
            granularity,
            label: label.to_string(),
        };
        let start = match granularity {
            Granularity::Day => {
                let mut parts = label.trim().split('/');
                let (Some(year), Some(month), Some(day), None) =
                    (parts.next(), parts.next(), parts.next(), parts.next())
                else {
                    return Err(malformed());
                };
                if year.len() != 4 || month.len() != 2 || day.len() != 2 {
                    return Err(malformed());
                }
                JalaliDate::from_ymd(
                    parse_number(year).ok_or_else(malformed)?,
                    parse_number(month).ok_or_else(malformed)?,
                    parse_number(day).ok_or_else(malformed)?,
                )?
            }
            Granularity::Week => {
                let tokens: Vec<&str> = label.split_whitespace().collect();
                let [year, YEAR_WORD, week, WEEK_WORD] = tokens.as_slice() else {
                    return Err(malformed());
                };
                let year: i32 = parse_number(year).ok_or_else(malformed)?;
                let week: u32 = parse_number(week).ok_or_else(malformed)?;
                let first = JalaliDate::from_ymd(year, 1, 1)?;
                let year_days = jalali::year_length(year) as u32;
                if week == 0 || (week - 1) * DAYS_PER_WEEK >= year_days {
                    return Err(FormatError::InvalidWeek { year, week });
                }
                let start = first.to_gregorian()?
                    + Duration::days(((week - 1) * DAYS_PER_WEEK) as i64);
                return Ok(start);
            }
            Granularity::Month => {
                let (year, name) = label.trim().split_once(' ').ok_or_else(malformed)?;
                let year = parse_number(year).ok_or_else(malformed)?;
                let name = name.trim();
                let month = MONTH_NAMES
                    .iter()
                    .position(|candidate| *candidate == name)
                    .ok_or_else(|| FormatError::UnknownMonth(name.to_string()))?;
                JalaliDate::from_ymd(year, month as u32 + 1, 1)?
            }
        };
        start.to_gregorian()
    }

    /// Whether labels of `date` decode back; Jalali years 1 to 9999 only.
    pub fn supports(date: NaiveDate) -> bool {
        JalaliDate::from_gregorian(date).is_representable()
    }

    /// First Gregorian day of the bucket containing `date`.
    pub fn bucket_start(date: NaiveDate, granularity: Granularity) -> Result<NaiveDate, FormatError> {
        Self::decode(&Self::encode(date, granularity), granularity)
    }
}

/// One-based week number counted in 7-day blocks from 1 Farvardin.
fn week_of_year(date: JalaliDate) -> u32 {
    date.day_of_year() / DAYS_PER_WEEK + 1
}

fn parse_number<T: std::str::FromStr>(token: &str) -> Option<T> {
    if token.is_empty() || token.len() > 4 || !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}
