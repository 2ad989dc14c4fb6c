//! Error types for the inference pipeline.
//!
//! Every failure carries a stable machine-readable [`ErrorKind`] plus a
//! human-readable detail string.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable, machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DatasetNotFound,
    SchemaError,
    ModelNotFound,
    EncoderNotFound,
    UnknownSymbol,
    InvalidDate,
    MissingField,
    InvalidFeature,
    PredictionError,
    NotFound,
    ConfigError,
    IoError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DatasetNotFound => "dataset_not_found",
            Self::SchemaError => "schema_error",
            Self::ModelNotFound => "model_not_found",
            Self::EncoderNotFound => "encoder_not_found",
            Self::UnknownSymbol => "unknown_symbol",
            Self::InvalidDate => "invalid_date",
            Self::MissingField => "missing_field",
            Self::InvalidFeature => "invalid_feature",
            Self::PredictionError => "prediction_error",
            Self::NotFound => "not_found",
            Self::ConfigError => "config_error",
            Self::IoError => "io_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while loading data/artifacts or producing predictions.
#[derive(Debug, Error)]
pub enum Error {
    /// The historical dataset file is absent or unreadable.
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    /// No usable symbol/date/price column.
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Regressor artifact missing or corrupt.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Label encoder artifact missing or corrupt.
    #[error("Label encoder not found: {0}")]
    EncoderNotFound(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Invalid date format: {0}. Use YYYY-MM-DD")]
    InvalidDate(String),

    /// Required request fields are absent; lists every missing field.
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingField(Vec<String>),

    #[error("Invalid feature {field}: {reason}")]
    InvalidFeature { field: String, reason: String },

    /// The regressor failed or produced a non-finite value.
    #[error("Prediction failed: {0}")]
    PredictionError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaError(msg.into())
    }

    pub fn model_not_found(msg: impl Into<String>) -> Self {
        Self::ModelNotFound(msg.into())
    }

    pub fn encoder_not_found(msg: impl Into<String>) -> Self {
        Self::EncoderNotFound(msg.into())
    }

    pub fn prediction(msg: impl Into<String>) -> Self {
        Self::PredictionError(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_feature(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFeature {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Machine-readable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DatasetNotFound(_) => ErrorKind::DatasetNotFound,
            Self::SchemaError(_) => ErrorKind::SchemaError,
            Self::ModelNotFound(_) => ErrorKind::ModelNotFound,
            Self::EncoderNotFound(_) => ErrorKind::EncoderNotFound,
            Self::UnknownSymbol(_) => ErrorKind::UnknownSymbol,
            Self::InvalidDate(_) => ErrorKind::InvalidDate,
            Self::MissingField(_) => ErrorKind::MissingField,
            Self::InvalidFeature { .. } => ErrorKind::InvalidFeature,
            Self::PredictionError(_) => ErrorKind::PredictionError,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ConfigError(_) => ErrorKind::ConfigError,
            Self::Io(_) => ErrorKind::IoError,
        }
    }

    /// Whether the failure was caused by the caller's input rather than by
    /// missing data or artifacts on the serving side.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownSymbol(_)
                | Self::InvalidDate(_)
                | Self::MissingField(_)
                | Self::InvalidFeature { .. }
                | Self::NotFound(_)
        )
    }
}
