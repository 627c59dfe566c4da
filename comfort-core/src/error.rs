use thiserror::Error;

/// Caller input that cannot be turned into a query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("Missing {0}; expected lat, lon and date (YYYYMMDD or YYYY-MM-DD)")]
    MissingParameter(&'static str),

    #[error("Invalid {name} '{value}': expected a number")]
    InvalidCoordinate { name: &'static str, value: String },

    #[error("{name} {value} is out of range (allowed {min}..={max})")]
    CoordinateOutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid date '{0}': expected YYYYMMDD or YYYY-MM-DD")]
    InvalidDate(String),
}

/// Failure of a pipeline run. Missing data is not an error.
#[derive(Debug, Error)]
pub enum ComfortError {
    #[error(transparent)]
    InvalidRequest(#[from] RequestError),

    #[error("Internal pipeline fault: {0}")]
    Internal(String),
}

impl ComfortError {
    /// True when the caller, not the pipeline, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ComfortError::InvalidRequest(_))
    }
}
