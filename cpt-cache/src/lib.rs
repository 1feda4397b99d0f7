//! Cache layer for point queries: a deterministic fingerprint of the
//! query parameters and a bounded memo store keyed by it.

pub mod fingerprint;
pub mod store;

pub use fingerprint::{fingerprint, CacheKey};
pub use store::PointCache;
