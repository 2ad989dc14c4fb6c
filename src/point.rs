//! Single-point prediction and historical lookup.
//!
//! A request carries the day's scalars; the lags come from the symbol's
//! history strictly before the requested date.

use crate::dataset::{parse_date, parse_number, Column, Dataset, HistoricalRow};
use crate::error::{Error, Result};
use crate::features::{derive_lags, lags_before, FeatureInputs, FeatureVector, LagFeatureSet};
use crate::predictor::ModelArtifact;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A request scalar given either as a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

impl NumericInput {
    /// Coerce to a finite `f64`, naming `field` on failure.
    pub fn to_f64(&self, field: &str) -> Result<f64> {
        match self {
            Self::Number(v) if v.is_finite() => Ok(*v),
            Self::Number(v) => Err(Error::invalid_feature(field, format!("non-finite value {v}"))),
            Self::Text(text) => parse_number(text).ok_or_else(|| {
                Error::invalid_feature(field, format!("{text:?} is not a valid number"))
            }),
        }
    }
}

impl From<f64> for NumericInput {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Prediction request: `{symbol, open, high, low, volume, close?, date?}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub symbol: Option<String>,
    pub open: Option<NumericInput>,
    pub high: Option<NumericInput>,
    pub low: Option<NumericInput>,
    pub volume: Option<NumericInput>,
    /// Only used when the symbol has no history before `date`
    pub close: Option<NumericInput>,
    #[serde(alias = "Date")]
    pub date: Option<String>,
}

impl PredictRequest {
    /// Names of absent required fields, in declaration order.
    pub fn missing_fields(&self) -> Vec<String> {
        [
            ("symbol", self.symbol.is_none()),
            ("open", self.open.is_none()),
            ("high", self.high.is_none()),
            ("low", self.low.is_none()),
            ("volume", self.volume.is_none()),
        ]
        .into_iter()
        .filter(|(_, missing)| *missing)
        .map(|(name, _)| name.to_string())
        .collect()
    }
}

/// Historical lookup request: `{symbol, date}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRequest {
    pub symbol: Option<String>,
    #[serde(alias = "Date")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointPrediction {
    pub symbol: String,
    /// Unrounded model output
    pub value: f64,
    /// Reference datetime the lags were taken before
    pub date: NaiveDateTime,
    pub features: FeatureVector,
}

impl PointPrediction {
    pub fn lags(&self) -> LagFeatureSet {
        self.features.lags()
    }
}

/// One day's market values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlcv {
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

impl From<&HistoricalRow> for Ohlcv {
    fn from(row: &HistoricalRow) -> Self {
        Self {
            open: row.open.unwrap_or(0.0),
            close: row.close.unwrap_or(0.0),
            high: row.high.unwrap_or(0.0),
            low: row.low.unwrap_or(0.0),
            volume: row.volume.unwrap_or(0.0),
        }
    }
}

/// Lags for `symbol` at `reference`. Any gap in the dataset (no dataset, no
/// symbol/date/close column, no usable history) falls back to `current_close`.
fn lookup_lags(
    dataset: Option<&Dataset>,
    symbol: &str,
    reference: NaiveDateTime,
    current_close: Option<f64>,
) -> LagFeatureSet {
    let Some(dataset) = dataset else {
        warn!(symbol, "no dataset available, using default lags");
        return derive_lags(&[], current_close);
    };
    if !dataset.columns().has(Column::Date) || !dataset.columns().has(Column::Close) {
        warn!(symbol, "dataset has no date or close column, using default lags");
        return derive_lags(&[], current_close);
    }

    match dataset.rows_for_symbol(symbol) {
        Ok(rows) => {
            if rows.is_empty() {
                warn!(symbol, "no historical rows, using default lags");
            }
            lags_before(&rows, reference, current_close)
        }
        Err(e) => {
            warn!(symbol, error = %e, "lag lookup failed, using default lags");
            derive_lags(&[], current_close)
        }
    }
}

/// Predict one value from request scalars plus lags looked up in `dataset`.
///
/// `now` is the reference datetime when the request has no date.
pub fn predict_one(
    dataset: Option<&Dataset>,
    artifact: &ModelArtifact,
    request: &PredictRequest,
    now: NaiveDateTime,
) -> Result<PointPrediction> {
    let missing = request.missing_fields();
    if !missing.is_empty() {
        return Err(Error::MissingField(missing));
    }
    let symbol = request.symbol.as_deref().unwrap_or_default();
    let encoded = artifact.encode(symbol)?;

    let date = match request.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(text) => parse_date(text).ok_or_else(|| Error::InvalidDate(text.to_string()))?,
        None => now,
    };

    let scalar = |field: &str, value: &Option<NumericInput>| -> Result<Option<f64>> {
        value.as_ref().map(|v| v.to_f64(field)).transpose()
    };
    let inputs = FeatureInputs {
        timestamp: date.and_utc().timestamp(),
        open: scalar("open", &request.open)?,
        high: scalar("high", &request.high)?,
        low: scalar("low", &request.low)?,
        volume: scalar("volume", &request.volume)?,
    };
    let close = scalar("close", &request.close)?;

    let lags = lookup_lags(dataset, symbol, date, close);
    debug!(symbol, lags = ?lags.as_array(), "lag features");

    let features = FeatureVector::assemble(&inputs, encoded, &lags)?;
    let value = artifact.predict(&features)?;
    info!(symbol, value, "prediction successful");

    Ok(PointPrediction {
        symbol: symbol.to_string(),
        value,
        date,
        features,
    })
}

/// Market values for `symbol` on `date`, or on the most recent earlier day
/// the dataset has.
pub fn fetch_historical(dataset: &Dataset, symbol: &str, date: &str) -> Result<Ohlcv> {
    dataset.require(Column::Symbol)?;
    dataset.require(Column::Date)?;

    let search = parse_date(date).ok_or_else(|| Error::InvalidDate(date.to_string()))?;
    let rows = dataset.rows_for_symbol(symbol)?;

    let exact = rows
        .iter()
        .find(|row| row.date.map(|d| d.date()) == Some(search.date()));

    let row = match exact {
        Some(row) => *row,
        None => {
            let mut earlier: Vec<&HistoricalRow> = rows
                .iter()
                .copied()
                .filter(|row| row.date.is_some_and(|d| d <= search))
                .collect();
            earlier.sort_by(|a, b| b.date.cmp(&a.date));
            let Some(row) = earlier.first().copied() else {
                return Err(Error::not_found(format!("No data found for {symbol} on {date}")));
            };
            debug!(symbol, requested = %date, found = ?row.date, "using previous trading day");
            row
        }
    };

    Ok(Ohlcv::from(row))
}
