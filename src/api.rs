//! JSON response envelopes.
//!
//! Every response carries `success`; failures add the error detail and its
//! stable `kind`.

use crate::chart::ChartSeries;
use crate::dataset::{parse_number, Column, Dataset, HistoricalRow};
use crate::error::{Error, ErrorKind};
use crate::metrics::ModelMetrics;
use crate::point::{NumericInput, Ohlcv, PointPrediction, PredictRequest};
use serde::Serialize;
use serde_json::{Map, Value};

/// Key of the prediction added to every chart row.
pub const PREDICTED_KEY: &str = "Predicted";

/// Common view of the envelopes, used to pick an exit status.
pub trait Envelope: Serialize {
    fn is_success(&self) -> bool;
}

/// Round to cents.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Request scalars echoed back with a prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputFeatures {
    pub open: Option<NumericInput>,
    pub high: Option<NumericInput>,
    pub low: Option<NumericInput>,
    pub close: Option<NumericInput>,
    pub volume: Option<NumericInput>,
}

impl From<&PredictRequest> for InputFeatures {
    fn from(request: &PredictRequest) -> Self {
        Self {
            open: request.open.clone(),
            high: request.high.clone(),
            low: request.low.clone(),
            close: request.close.clone(),
            volume: request.volume.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_features: Option<InputFeatures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl PredictResponse {
    pub fn ok(prediction: &PointPrediction, request: &PredictRequest) -> Self {
        Self {
            success: true,
            prediction: Some(round2(prediction.value)),
            symbol: Some(prediction.symbol.clone()),
            input_features: Some(InputFeatures::from(request)),
            error: None,
            kind: None,
        }
    }

    pub fn failure(err: &Error) -> Self {
        Self {
            success: false,
            prediction: None,
            symbol: None,
            input_features: None,
            error: Some(err.to_string()),
            kind: Some(err.kind()),
        }
    }
}

impl Envelope for PredictResponse {
    fn is_success(&self) -> bool {
        self.success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Ohlcv>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl HistoricalResponse {
    pub fn ok(data: Ohlcv, symbol: &str, date: &str) -> Self {
        Self {
            success: true,
            data: Some(data),
            symbol: Some(symbol.to_string()),
            date: Some(date.to_string()),
            error: None,
            kind: None,
        }
    }

    pub fn failure(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            symbol: None,
            date: None,
            error: Some(err.to_string()),
            kind: Some(err.kind()),
        }
    }
}

impl Envelope for HistoricalResponse {
    fn is_success(&self) -> bool {
        self.success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartResponse {
    pub success: bool,
    pub symbol: String,
    pub data: Vec<Map<String, Value>>,
    pub count: usize,
    pub predicted_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl ChartResponse {
    pub fn ok(dataset: &Dataset, series: &ChartSeries<'_>) -> Self {
        let data: Vec<Map<String, Value>> = series
            .points
            .iter()
            .map(|point| chart_row(dataset, point.row, point.predicted))
            .collect();

        Self {
            success: true,
            symbol: series.symbol.clone(),
            count: data.len(),
            data,
            predicted_count: series.predicted_count,
            error: None,
            kind: None,
        }
    }

    pub fn failure(symbol: &str, err: &Error) -> Self {
        Self {
            success: false,
            symbol: symbol.to_string(),
            data: Vec::new(),
            count: 0,
            predicted_count: 0,
            error: Some(err.to_string()),
            kind: Some(err.kind()),
        }
    }
}

impl Envelope for ChartResponse {
    fn is_success(&self) -> bool {
        self.success
    }
}

/// Render a dataset row with its original columns plus [`PREDICTED_KEY`].
///
/// The date column is normalized to `YYYY-MM-DD`, numeric cells become JSON
/// numbers and empty cells become `null`.
pub fn chart_row(
    dataset: &Dataset,
    row: &HistoricalRow,
    predicted: Option<f64>,
) -> Map<String, Value> {
    let date_column = dataset.columns().get(Column::Date);
    let mut record = Map::with_capacity(dataset.headers().len() + 1);

    for (idx, (header, cell)) in dataset.headers().iter().zip(&row.raw).enumerate() {
        let value = if Some(idx) == date_column {
            match row.date {
                Some(date) => Value::String(date.format("%Y-%m-%d").to_string()),
                None => cell_value(cell),
            }
        } else {
            cell_value(cell)
        };
        record.insert(header.clone(), value);
    }

    record.insert(
        PREDICTED_KEY.to_string(),
        predicted.map(Value::from).unwrap_or(Value::Null),
    );
    record
}

fn cell_value(cell: &str) -> Value {
    let cell = cell.trim();
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = cell.parse::<i64>() {
        return Value::from(int);
    }
    match parse_number(cell) {
        Some(number) => Value::from(number),
        None => Value::String(cell.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StocksResponse {
    pub success: bool,
    pub stocks: Vec<String>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl StocksResponse {
    pub fn ok(stocks: Vec<String>) -> Self {
        Self {
            success: true,
            count: stocks.len(),
            stocks,
            error: None,
            kind: None,
        }
    }

    pub fn failure(err: &Error) -> Self {
        Self {
            success: false,
            stocks: Vec::new(),
            count: 0,
            error: Some(err.to_string()),
            kind: Some(err.kind()),
        }
    }
}

impl Envelope for StocksResponse {
    fn is_success(&self) -> bool {
        self.success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsResponse {
    pub success: bool,
    pub model_metrics: ModelMetrics,
}

impl MetricsResponse {
    pub fn new(metrics: Option<ModelMetrics>) -> Self {
        Self {
            success: true,
            model_metrics: metrics.unwrap_or_default(),
        }
    }
}

impl Envelope for MetricsResponse {
    fn is_success(&self) -> bool {
        self.success
    }
}
