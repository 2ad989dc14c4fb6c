//! Model loading and inference.
//!
//! Provides the [`InferenceGateway`], which loads the fitted regressor and
//! label encoder on first use and shares them read-only for the rest of the
//! process lifetime.

use crate::config::{Config, InferenceConfig};
use crate::error::{Error, Result};
use crate::features::{to_matrix, FeatureVector, FEATURE_COUNT};
use crate::symbols::{EncodedSymbol, LabelEncoder, SymbolResolver};
use ndarray::{Array2, ArrayView1};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Element type of the ONNX input tensor.
///
/// skl2onnx exports regressors with `float` inputs unless told otherwise;
/// `F64` suits models converted with a double input type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputPrecision {
    #[default]
    F32,
    F64,
}

/// A fitted regression model: one prediction per input row.
pub trait Regressor: std::fmt::Debug + Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Expected input width, when the backend knows it.
    fn n_features(&self) -> Option<usize>;

    /// Predict one value per row of an `(n, width)` matrix.
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<f64>>;
}

/// Regressor backed by an ONNX model.
pub struct OnnxRegressor {
    /// ONNX Runtime session; running it needs exclusive access
    session: Mutex<Session>,

    /// Name of the output tensor holding the predictions
    output_name: String,

    precision: InputPrecision,
}

impl std::fmt::Debug for OnnxRegressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxRegressor")
            .field("output_name", &self.output_name)
            .field("precision", &self.precision)
            .finish_non_exhaustive()
    }
}

impl OnnxRegressor {
    /// Load an ONNX model and initialize the runtime session.
    ///
    /// # Example
    /// ```no_run
    /// use stock_inference::config::InferenceConfig;
    /// use stock_inference::predictor::OnnxRegressor;
    /// use std::path::Path;
    ///
    /// let regressor = OnnxRegressor::load(
    ///     Path::new("model.onnx"),
    ///     &InferenceConfig::default(),
    /// ).unwrap();
    /// ```
    pub fn load(path: &Path, config: &InferenceConfig) -> Result<Self> {
        let session = build_session(path, config)
            .map_err(|e| Error::model_not_found(format!("{}: {e:#}", path.display())))?;

        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| {
                Error::model_not_found(format!("{}: model has no outputs", path.display()))
            })?;

        info!(
            path = %path.display(),
            output = %output_name,
            precision = ?config.precision,
            "ONNX regressor loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            output_name,
            precision: config.precision,
        })
    }
}

fn build_session(path: &Path, config: &InferenceConfig) -> anyhow::Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(if config.optimize_graph {
            GraphOptimizationLevel::Level3
        } else {
            GraphOptimizationLevel::Level1
        })?
        .with_intra_threads(config.intra_threads.max(1))?
        .commit_from_file(path)?;
    Ok(session)
}

impl Regressor for OnnxRegressor {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn n_features(&self) -> Option<usize> {
        None
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<f64>> {
        let mut session = self.session.lock();
        let run_err = |e: ort::Error| Error::prediction(e.to_string());
        let missing_output = || Error::prediction(format!("missing output {}", self.output_name));

        let values = match self.precision {
            InputPrecision::F32 => {
                let tensor = Tensor::from_array(features.mapv(|v| v as f32)).map_err(run_err)?;
                let outputs = session.run(ort::inputs![tensor]).map_err(run_err)?;
                let output = outputs
                    .get(self.output_name.as_str())
                    .ok_or_else(missing_output)?;
                let (_, data) = output.try_extract_tensor::<f32>().map_err(run_err)?;
                data.iter().map(|v| *v as f64).collect::<Vec<f64>>()
            }
            InputPrecision::F64 => {
                let tensor = Tensor::from_array(features.to_owned()).map_err(run_err)?;
                let outputs = session.run(ort::inputs![tensor]).map_err(run_err)?;
                let output = outputs
                    .get(self.output_name.as_str())
                    .ok_or_else(missing_output)?;
                let (_, data) = output.try_extract_tensor::<f64>().map_err(run_err)?;
                data.to_vec()
            }
        };

        Ok(values)
    }
}

/// Ordinary least squares model: `features · coefficients + intercept`.
///
/// Stored as JSON `{"coefficients": [...], "intercept": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegressor {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::model_not_found(format!("{}: {e}", path.display())))?;
        let model: LinearRegressor = serde_json::from_str(&text)
            .map_err(|e| Error::model_not_found(format!("{}: {e}", path.display())))?;

        info!(
            path = %path.display(),
            coefficients = model.coefficients.len(),
            "linear regressor loaded"
        );
        Ok(model)
    }
}

impl Regressor for LinearRegressor {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<f64>> {
        if features.ncols() != self.coefficients.len() {
            return Err(Error::prediction(format!(
                "expected {} features, got {}",
                self.coefficients.len(),
                features.ncols()
            )));
        }
        let coefficients = ArrayView1::from(self.coefficients.as_slice());
        Ok((features.dot(&coefficients) + self.intercept).to_vec())
    }
}

/// Pick a regressor backend from the model file extension.
pub fn load_regressor(path: &Path, config: &InferenceConfig) -> Result<Box<dyn Regressor>> {
    if !path.exists() {
        return Err(Error::model_not_found(path.display().to_string()));
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("onnx") => Ok(Box::new(OnnxRegressor::load(path, config)?)),
        Some("json") => Ok(Box::new(LinearRegressor::load(path)?)),
        _ => Err(Error::model_not_found(format!(
            "{}: unsupported model format (expected .onnx or .json)",
            path.display()
        ))),
    }
}

/// Fitted regressor plus label encoder. Read-only once constructed.
pub struct ModelArtifact {
    regressor: Box<dyn Regressor>,
    encoder: LabelEncoder,
}

impl std::fmt::Debug for ModelArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelArtifact")
            .field("regressor", &self.regressor.name())
            .field("classes", &self.encoder.len())
            .finish()
    }
}

impl ModelArtifact {
    pub fn new(regressor: Box<dyn Regressor>, encoder: LabelEncoder) -> Self {
        Self { regressor, encoder }
    }

    /// Load both artifacts from disk.
    pub fn load(model_path: &Path, encoder_path: &Path, config: &InferenceConfig) -> Result<Self> {
        let regressor = load_regressor(model_path, config)?;
        let encoder = LabelEncoder::load(encoder_path)?;
        Ok(Self::new(regressor, encoder))
    }

    pub fn resolver(&self) -> SymbolResolver<'_> {
        SymbolResolver::new(&self.encoder)
    }

    pub fn encode(&self, symbol: &str) -> Result<EncodedSymbol> {
        self.resolver().encode(symbol)
    }

    pub fn decode(&self, code: EncodedSymbol) -> Result<String> {
        self.resolver().decode(code)
    }

    pub fn known_symbols(&self) -> &[String] {
        self.encoder.classes()
    }

    /// Predict a single value. Fails with `PredictionError` on a width
    /// mismatch, a runtime failure or a non-finite output.
    pub fn predict(&self, vector: &FeatureVector) -> Result<f64> {
        if let Some(width) = self.regressor.n_features() {
            if width != FEATURE_COUNT {
                return Err(Error::prediction(format!(
                    "model expects {width} features, feature vector has {FEATURE_COUNT}"
                )));
            }
        }

        let matrix = to_matrix(std::slice::from_ref(vector));
        let outputs = self.regressor.predict(&matrix)?;
        let value = outputs
            .first()
            .copied()
            .ok_or_else(|| Error::prediction("model returned no output"))?;

        if !value.is_finite() {
            return Err(Error::prediction(format!("non-finite output {value}")));
        }
        debug!(features = ?vector.as_array(), value, "prediction");
        Ok(value)
    }
}

/// Lazily loads and caches the [`ModelArtifact`].
///
/// Concurrent first callers may each read the files, but exactly one artifact
/// is published and every caller receives that same instance. No lock is held
/// while reading from disk.
#[derive(Debug)]
pub struct InferenceGateway {
    model_path: PathBuf,
    encoder_path: PathBuf,
    config: InferenceConfig,
    artifact: OnceLock<Arc<ModelArtifact>>,
}

impl InferenceGateway {
    pub fn new(model_path: PathBuf, encoder_path: PathBuf, config: InferenceConfig) -> Self {
        Self {
            model_path,
            encoder_path,
            config,
            artifact: OnceLock::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.model_path.clone(),
            config.encoder_path.clone(),
            config.inference.clone(),
        )
    }

    /// Gateway around an already-constructed artifact.
    pub fn with_artifact(artifact: ModelArtifact) -> Self {
        let gateway = Self::new(PathBuf::new(), PathBuf::new(), InferenceConfig::default());
        let _ = gateway.artifact.set(Arc::new(artifact));
        gateway
    }

    /// Return the cached artifact, loading it on first use.
    pub fn load_once(&self) -> Result<Arc<ModelArtifact>> {
        if let Some(artifact) = self.artifact.get() {
            return Ok(Arc::clone(artifact));
        }

        let loaded = ModelArtifact::load(&self.model_path, &self.encoder_path, &self.config)?;
        let artifact = self.artifact.get_or_init(|| Arc::new(loaded));
        Ok(Arc::clone(artifact))
    }

    pub fn is_loaded(&self) -> bool {
        self.artifact.get().is_some()
    }
}
