//! Evaluation metrics recorded at training time.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Test-set scores written next to the model: `{"mse": ..., "r2": ...}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    #[serde(default)]
    pub mse: Option<f64>,
    #[serde(default)]
    pub r2: Option<f64>,
}

impl ModelMetrics {
    /// Read the metrics file. Absent or unreadable metrics are not an error;
    /// they yield `None` and a warning.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            warn!(path = %path.display(), "metrics file not found");
            return Ok(None);
        }

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read metrics");
                return Ok(None);
            }
        };

        match serde_json::from_str::<ModelMetrics>(&text) {
            Ok(metrics) => {
                info!(mse = ?metrics.mse, r2 = ?metrics.r2, "model metrics loaded");
                Ok(Some(metrics))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not parse metrics");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_metrics.json");
        std::fs::write(&path, r#"{"mse": 4.25, "r2": 0.987, "trained_on": "2024-02-01"}"#).unwrap();

        let metrics = ModelMetrics::load(&path).unwrap().unwrap();
        assert_eq!(metrics.mse, Some(4.25));
        assert_eq!(metrics.r2, Some(0.987));
    }

    #[test]
    fn test_partial_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_metrics.json");
        std::fs::write(&path, r#"{"r2": 0.5}"#).unwrap();

        let metrics = ModelMetrics::load(&path).unwrap().unwrap();
        assert_eq!(metrics.mse, None);
    }

    #[test]
    fn test_missing_or_corrupt_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_metrics.json");
        assert_eq!(ModelMetrics::load(&path).unwrap(), None);

        std::fs::write(&path, "mse=4").unwrap();
        assert_eq!(ModelMetrics::load(&path).unwrap(), None);
    }
}
