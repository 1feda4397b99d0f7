use crate::{error::ParameterError, year_month::MonthRange};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Earliest year covered by the projection archive.
pub const MIN_YEAR: i32 = 1950;

/// Latest year covered by the projection archive.
pub const MAX_YEAR: i32 = 2100;

/// A future-emissions trajectory selecting which projection runs to query.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Ssp126,
    Ssp245,
    Ssp370,
    Ssp585,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Ssp126,
        Scenario::Ssp245,
        Scenario::Ssp370,
        Scenario::Ssp585,
    ];

    /// Identifier used by the projection collection's `scenario` property.
    pub fn id(&self) -> &'static str {
        match self {
            Scenario::Ssp126 => "ssp126",
            Scenario::Ssp245 => "ssp245",
            Scenario::Ssp370 => "ssp370",
            Scenario::Ssp585 => "ssp585",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Scenario {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParameterError::UnknownScenario(s.to_string()))
    }
}

/// A geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

/// Validated, immutable parameters of one point query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueryParameters {
    latitude: f64,
    longitude: f64,
    start_year: i32,
    end_year: i32,
    scenario: Scenario,
}

impl QueryParameters {
    pub fn new(
        latitude: f64,
        longitude: f64,
        start_year: i32,
        end_year: i32,
        scenario: Scenario,
    ) -> Result<QueryParameters, ParameterError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ParameterError::Latitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ParameterError::Longitude(longitude));
        }
        for year in [start_year, end_year] {
            if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
                return Err(ParameterError::YearOutOfRange {
                    year,
                    min: MIN_YEAR,
                    max: MAX_YEAR,
                });
            }
        }
        if start_year >= end_year {
            return Err(ParameterError::InvertedYears {
                start: start_year,
                end: end_year,
            });
        }
        Ok(QueryParameters {
            latitude,
            longitude,
            start_year,
            end_year,
            scenario,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn end_year(&self) -> i32 {
        self.end_year
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    pub fn point(&self) -> Point {
        Point {
            lat: self.latitude,
            lon: self.longitude,
        }
    }

    /// Every month of the requested span, January of the start year
    /// through December of the end year.
    pub fn months(&self) -> MonthRange {
        MonthRange::years(self.start_year, self.end_year)
    }
}
