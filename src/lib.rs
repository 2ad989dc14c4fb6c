//! Next-day close prediction over historical stock data.
//!
//! Materializes the lag features a regressor was trained on (trailing closes,
//! encoded symbol, date timestamp) and runs the model, either across a
//! symbol's history for charting or for a single user-supplied data point.
//!
//! Feature construction here must stay identical to the training pipeline;
//! see [`features`] for the column contract.

pub mod api;
pub mod buffer;
pub mod chart;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod metrics;
pub mod point;
pub mod predictor;
pub mod service;
pub mod symbols;

pub use buffer::{LagWindow, RollingBuffer};
pub use chart::{predict_chart, ChartPoint, ChartRequest, ChartSeries, SortOrder};
pub use config::Config;
pub use dataset::{Dataset, HistoricalRow};
pub use error::{Error, ErrorKind, Result};
pub use features::{derive_lags, FeatureVector, LagFeatureSet};
pub use point::{
    fetch_historical, predict_one, HistoricalRequest, Ohlcv, PointPrediction, PredictRequest,
};
pub use predictor::{InferenceGateway, ModelArtifact, Regressor};
pub use service::PredictionService;
pub use symbols::{LabelEncoder, SymbolResolver};
