//! Content-based cache keys for point queries.

use cpt_core::params::QueryParameters;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Decimal digits of latitude/longitude that distinguish two queries.
pub const COORDINATE_DECIMALS: i32 = 4;

/// Version tag of the canonical form.
const CANONICAL_FORM: &str = "cpt-point-v1";

/// Hex SHA-256 digest identifying a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field order here is the canonical order.
#[derive(Serialize)]
struct CanonicalQuery {
    form: &'static str,
    lat: i64,
    lon: i64,
    start_year: i32,
    end_year: i32,
    scenario: &'static str,
}

/// Coordinate as an integer count of 10^-4 degrees, rounded half away
/// from zero. `-0.0` and `0.0` both become `0`.
fn quantize(degrees: f64) -> i64 {
    (degrees * 10f64.powi(COORDINATE_DECIMALS)).round() as i64
}

pub fn fingerprint(params: &QueryParameters) -> CacheKey {
    let canonical = CanonicalQuery {
        form: CANONICAL_FORM,
        lat: quantize(params.latitude()),
        lon: quantize(params.longitude()),
        start_year: params.start_year(),
        end_year: params.end_year(),
        scenario: params.scenario().id(),
    };
    let mut hasher = Sha256::new();
    let canonical_json = serde_json::to_string(&canonical).unwrap_or_default();
    hasher.update(canonical_json.as_bytes());
    CacheKey(format!("{:x}", hasher.finalize()))
}
