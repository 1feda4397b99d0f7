use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, mem::replace, str::FromStr};

/// A calendar month, ordered chronologically and labelled "YYYY-MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

/// Error returned when a "YYYY-MM" label cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid month label: {0:?}")]
pub struct YearMonthParseError(pub String);

impl YearMonth {
    /// Returns `None` unless `month` is in 1..=12.
    pub fn new(year: i32, month: u32) -> Option<YearMonth> {
        if (1..=12).contains(&month) {
            Some(YearMonth { year, month })
        } else {
            None
        }
    }

    /// January of `year`.
    pub fn first_of(year: i32) -> YearMonth {
        YearMonth { year, month: 1 }
    }

    /// December of `year`.
    pub fn last_of(year: i32) -> YearMonth {
        YearMonth { year, month: 12 }
    }

    /// The following calendar month.
    pub fn succ(&self) -> YearMonth {
        if self.month == 12 {
            YearMonth {
                year: self.year + 1,
                month: 1,
            }
        } else {
            YearMonth {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = YearMonthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || YearMonthParseError(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(err)?;
        let digits = |part: &str, len: usize| {
            part.len() == len && part.bytes().all(|b| b.is_ascii_digit())
        };
        if !digits(year, 4) || !digits(month, 2) {
            return Err(err());
        }
        let year = year.parse::<i32>().map_err(|_| err())?;
        let month = month.parse::<u32>().map_err(|_| err())?;
        YearMonth::new(year, month).ok_or_else(err)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(de::Error::custom)
    }
}

/// An iterator over each month from the first month through the last
/// month (inclusive).
#[derive(Clone, Eq, PartialEq, Copy, Debug)]
pub struct MonthRange(pub YearMonth, pub YearMonth);

impl MonthRange {
    /// Every month of `start_year` through `end_year`.
    pub fn years(start_year: i32, end_year: i32) -> MonthRange {
        MonthRange(YearMonth::first_of(start_year), YearMonth::last_of(end_year))
    }

    pub fn start(&self) -> YearMonth {
        self.0
    }

    pub fn end(&self) -> YearMonth {
        self.1
    }

    pub fn is_empty(&self) -> bool {
        self.0 > self.1
    }

    pub fn contains(&self, month: &YearMonth) -> bool {
        self.0 <= *month && *month <= self.1
    }
}

impl Iterator for MonthRange {
    type Item = YearMonth;
    fn next(&mut self) -> Option<Self::Item> {
        if self.0 <= self.1 {
            let next = self.0.succ();
            Some(replace(&mut self.0, next))
        } else {
            None
        }
    }
}
