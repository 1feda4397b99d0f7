/// Error types for point climate retrieval
use std::fmt;
use thiserror::Error;

/// Query parameters rejected before any remote call is made.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),

    #[error("start year {start} must precede end year {end}")]
    InvertedYears { start: i32, end: i32 },

    #[error("year {year} is outside the supported span {min}..={max}")]
    YearOutOfRange { year: i32, min: i32, max: i32 },

    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
}

/// A single remote gateway call failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("request timed out")]
    Timeout,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("gateway responded with status {0}")]
    Status(u16),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Timeouts, transport failures, throttling and server-side statuses
    /// are worth another attempt; everything else is final.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Timeout | GatewayError::Transport(_) => true,
            GatewayError::Status(code) => *code == 429 || (500..600).contains(code),
            GatewayError::Malformed(_) => false,
        }
    }
}

/// Identifies which remote query of a retrieval failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubQuery {
    Historical,
    ModelList,
    Model(String),
}

impl fmt::Display for SubQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubQuery::Historical => write!(f, "historical"),
            SubQuery::ModelList => write!(f, "model list"),
            SubQuery::Model(id) => write!(f, "model {id}"),
        }
    }
}

/// Retrieval of a point dataset failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrievalError {
    #[error("{query} query failed: {source}")]
    Gateway {
        query: SubQuery,
        #[source]
        source: GatewayError,
    },
}

impl RetrievalError {
    pub fn query(&self) -> &SubQuery {
        match self {
            RetrievalError::Gateway { query, .. } => query,
        }
    }
}

/// The point has no usable data, as opposed to a transient failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmptyResult {
    #[error("no projection models are available for scenario {scenario}")]
    NoModels { scenario: String },

    #[error("the historical collection has no data for this point")]
    NoHistoricalData,
}

/// Type alias for Results using RetrievalError
pub type Result<T> = std::result::Result<T, RetrievalError>;
