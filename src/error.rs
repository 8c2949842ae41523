//! Error types for the simulation and optimization engine.

use thiserror::Error;

/// Main error type for portfolio simulation and optimization.
#[derive(Error, Debug)]
pub enum SimError {
    /// Weights do not sum to one, are negative, or reference an unknown asset.
    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),

    /// Non-positive horizon, path count or interval, or a level outside (0, 1).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A ratio computation hit a zero-variance series.
    #[error("Degenerate series: {0}")]
    DegenerateSeries(String),

    #[error("Optimization failed: {0}")]
    OptimizationFailure(String),

    #[error("Singular covariance matrix: {0}")]
    SingularCovariance(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type alias for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
