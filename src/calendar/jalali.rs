use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::errors::FormatError;

/// Persian month names, Farvardin first.
pub const MONTH_NAMES: [&str; 12] = [
    "فروردین",
    "اردیبهشت",
    "خرداد",
    "تیر",
    "مرداد",
    "شهریور",
    "مهر",
    "آبان",
    "آذر",
    "دی",
    "بهمن",
    "اسفند",
];

const CYCLE_YEARS: i32 = 33;
const CYCLE_DAYS: i32 = 33 * 365 + 8;
const LEAP_REMAINDERS: [i32; 8] = [1, 5, 9, 13, 17, 22, 26, 30];
// Days-from-CE of 1 Farvardin of year 0; pinned so that 1403/01/01 is 2024-03-20.
const EPOCH_DAYS_FROM_CE: i32 = 226_530;
const MAX_YEAR: i32 = 9999;

/// A date in the solar Hijri (Jalali) calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JalaliDate {
    year: i32,
    month: u32,
    day: u32,
}

impl JalaliDate {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, FormatError> {
        if !(1..=MAX_YEAR).contains(&year) {
            return Err(FormatError::OutOfRange);
        }
        if !(1..=12).contains(&month) || day == 0 || day > month_length(year, month) {
            return Err(FormatError::InvalidDate { year, month, day });
        }
        Ok(Self { year, month, day })
    }

    pub fn from_gregorian(date: NaiveDate) -> Self {
        let offset = date.num_days_from_ce() - EPOCH_DAYS_FROM_CE;
        let cycle = offset.div_euclid(CYCLE_DAYS);
        let mut remaining = offset.rem_euclid(CYCLE_DAYS);
        let mut year = cycle * CYCLE_YEARS;
        loop {
            let length = year_length(year);
            if remaining < length {
                break;
            }
            remaining -= length;
            year += 1;
        }
        let (month, day) = if remaining < 186 {
            (remaining / 31 + 1, remaining % 31 + 1)
        } else {
            let rest = remaining - 186;
            (rest / 30 + 7, rest % 30 + 1)
        };
        Self {
            year,
            month: month as u32,
            day: day as u32,
        }
    }

    pub fn to_gregorian(self) -> Result<NaiveDate, FormatError> {
        let days = EPOCH_DAYS_FROM_CE
            + days_before_year(self.year)
            + days_before_month(self.month)
            + self.day as i32
            - 1;
        NaiveDate::from_num_days_from_ce_opt(days).ok_or(FormatError::OutOfRange)
    }

    /// 1 Farvardin of this date's year.
    pub fn start_of_year(self) -> Self {
        Self {
            year: self.year,
            month: 1,
            day: 1,
        }
    }

    /// Zero-based offset of this date from 1 Farvardin.
    pub fn day_of_year(self) -> u32 {
        days_before_month(self.month) as u32 + self.day - 1
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn day(self) -> u32 {
        self.day
    }

    /// Whether the year fits the four-digit label range.
    pub fn is_representable(self) -> bool {
        (1..=MAX_YEAR).contains(&self.year)
    }

    pub fn month_name(self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }
}

impl fmt::Display for JalaliDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}/{:02}/{:02}", self.year, self.month, self.day)
    }
}

pub fn is_leap_year(year: i32) -> bool {
    LEAP_REMAINDERS.contains(&year.rem_euclid(CYCLE_YEARS))
}

pub fn year_length(year: i32) -> i32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

pub fn month_length(year: i32, month: u32) -> u32 {
    match month {
        1..=6 => 31,
        7..=11 => 30,
        12 if is_leap_year(year) => 30,
        12 => 29,
        _ => 0,
    }
}

fn days_before_year(year: i32) -> i32 {
    let cycles = year.div_euclid(CYCLE_YEARS);
    let rest = year.rem_euclid(CYCLE_YEARS);
    let leaps = LEAP_REMAINDERS.iter().filter(|r| **r < rest).count() as i32;
    cycles * CYCLE_DAYS + rest * 365 + leaps
}

fn days_before_month(month: u32) -> i32 {
    let month = month as i32;
    if month <= 7 {
        (month - 1) * 31
    } else {
        186 + (month - 7) * 30
    }
}
