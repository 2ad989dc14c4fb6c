//! Service configuration.
//!
//! Loaded from an optional TOML file, then overridden by `STOCK_INFERENCE_*`
//! environment variables.

use crate::chart::SortOrder;
use crate::error::{Error, Result};
use crate::predictor::InputPrecision;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "STOCK_INFERENCE_";

/// Top-level configuration for the prediction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Historical dataset (CSV)
    pub dataset_path: PathBuf,

    /// Fitted regressor (`.onnx` or linear `.json`)
    pub model_path: PathBuf,

    /// Fitted label encoder (JSON class list)
    pub encoder_path: PathBuf,

    /// Persisted `{mse, r2}` record from training
    pub metrics_path: PathBuf,

    pub chart: ChartConfig,

    pub inference: InferenceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("dataset.csv"),
            model_path: PathBuf::from("model.onnx"),
            encoder_path: PathBuf::from("labelencoder_name.json"),
            metrics_path: PathBuf::from("model_metrics.json"),
            chart: ChartConfig::default(),
            inference: InferenceConfig::default(),
        }
    }
}

/// Defaults applied to chart requests that omit `limit` / `sort`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub default_limit: usize,
    pub default_sort: SortOrder,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            default_limit: 100,
            default_sort: SortOrder::Asc,
        }
    }
}

/// Regressor runtime options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Enable ONNX graph optimization
    pub optimize_graph: bool,

    /// ONNX intra-op threads
    pub intra_threads: usize,

    /// Element type of the ONNX input tensor
    pub precision: InputPrecision,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            optimize_graph: true,
            intra_threads: 1,
            precision: InputPrecision::F32,
        }
    }
}

impl Config {
    /// Parse a TOML configuration file. Relative artifact paths are resolved
    /// against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
        let mut config: Config =
            toml::from_str(&text).map_err(|e| Error::config(format!("{}: {e}", path.display())))?;

        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    /// Load from an optional file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| env::var(name).ok())
    }

    /// Apply `STOCK_INFERENCE_*` overrides using `lookup` to read variables.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        if let Some(v) = var("DATASET") {
            self.dataset_path = PathBuf::from(v);
        }
        if let Some(v) = var("MODEL") {
            self.model_path = PathBuf::from(v);
        }
        if let Some(v) = var("ENCODER") {
            self.encoder_path = PathBuf::from(v);
        }
        if let Some(v) = var("METRICS") {
            self.metrics_path = PathBuf::from(v);
        }
        if let Some(v) = var("CHART_LIMIT") {
            self.chart.default_limit = v
                .parse()
                .map_err(|_| Error::config(format!("{ENV_PREFIX}CHART_LIMIT: not a count: {v}")))?;
        }
        if let Some(v) = var("PRECISION") {
            self.inference.precision = match v.to_lowercase().as_str() {
                "f32" => InputPrecision::F32,
                "f64" => InputPrecision::F64,
                other => {
                    return Err(Error::config(format!(
                        "{ENV_PREFIX}PRECISION: expected f32 or f64, got {other}"
                    )))
                }
            };
        }

        debug!(config = ?self, "configuration resolved");
        Ok(self)
    }

    fn rebase(&mut self, base: &Path) {
        for path in [
            &mut self.dataset_path,
            &mut self.model_path,
            &mut self.encoder_path,
            &mut self.metrics_path,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.dataset_path, PathBuf::from("dataset.csv"));
        assert_eq!(config.chart.default_limit, 100);
        assert_eq!(config.chart.default_sort, SortOrder::Asc);
        assert_eq!(config.inference.precision, InputPrecision::F32);
    }

    #[test]
    fn test_config_from_file_rebases_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.toml");
        std::fs::write(
            &path,
            r#"
dataset_path = "data/prices.csv"
model_path = "/opt/models/model.onnx"

[chart]
default_limit = 25
default_sort = "desc"

[inference]
precision = "f64"
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.dataset_path, dir.path().join("data/prices.csv"));
        assert_eq!(config.model_path, PathBuf::from("/opt/models/model.onnx"));
        assert_eq!(config.encoder_path, dir.path().join("labelencoder_name.json"));
        assert_eq!(config.chart.default_limit, 25);
        assert_eq!(config.chart.default_sort, SortOrder::Desc);
        assert_eq!(config.inference.precision, InputPrecision::F64);
        assert!(config.inference.optimize_graph);
    }

    #[test]
    fn test_config_from_file_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "dataset_path = [").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConfigError);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("STOCK_INFERENCE_DATASET", "/data/stocks.csv"),
            ("STOCK_INFERENCE_CHART_LIMIT", " 10 "),
            ("STOCK_INFERENCE_PRECISION", "F64"),
            ("STOCK_INFERENCE_MODEL", ""),
        ]
        .into_iter()
        .collect();

        let config = Config::default()
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.dataset_path, PathBuf::from("/data/stocks.csv"));
        assert_eq!(config.chart.default_limit, 10);
        assert_eq!(config.inference.precision, InputPrecision::F64);
        // Empty values are ignored
        assert_eq!(config.model_path, PathBuf::from("model.onnx"));
    }

    #[test]
    fn test_env_override_invalid_limit() {
        let err = Config::default()
            .apply_overrides(|name| {
                (name == "STOCK_INFERENCE_CHART_LIMIT").then(|| "many".to_string())
            })
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConfigError);
    }
}
