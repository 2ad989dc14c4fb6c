//! Feature computation for model inputs.
//!
//! Builds the fixed-order 9-column feature vector the regressor was trained on:
//! `Date, Open, High, Low, Volume, Name, Close_lag1, Close_lag2, Close_lag3`.
//!
//! **Critical for correctness**: the column order and the lag fallback ladder
//! must match the training representation exactly. A reordered vector still
//! produces a number, just a wrong one.

use crate::dataset::HistoricalRow;
use crate::error::{Error, Result};
use crate::symbols::EncodedSymbol;
use chrono::NaiveDateTime;
use ndarray::Array2;
use serde::Serialize;

/// Number of trailing closes fed to the model.
pub const LAG_COUNT: usize = 3;

/// Lag value used when there is neither history nor a current close.
/// The model never saw zero-valued lags during training.
pub const DEGENERATE_LAG: f64 = 1.0;

/// Width of the feature vector.
pub const FEATURE_COUNT: usize = 9;

/// Training-time column names, in vector order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Date",
    "Open",
    "High",
    "Low",
    "Volume",
    "Name",
    "Close_lag1",
    "Close_lag2",
    "Close_lag3",
];

/// Trailing close values relative to a reference point. Always fully populated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LagFeatureSet {
    pub lag1: f64,
    pub lag2: f64,
    pub lag3: f64,
}

impl LagFeatureSet {
    /// The same value in every slot.
    pub fn repeated(value: f64) -> Self {
        Self {
            lag1: value,
            lag2: value,
            lag3: value,
        }
    }

    pub fn as_array(&self) -> [f64; LAG_COUNT] {
        [self.lag1, self.lag2, self.lag3]
    }
}

/// Derive lags from prior closes (most recent first) with the fallback ladder:
///
/// 1. Each slot takes the matching prior close when one exists.
/// 2. With fewer than three priors, an unfilled slot repeats the slot before it.
/// 3. With no priors, the current close fills every slot.
/// 4. With neither, every slot is [`DEGENERATE_LAG`].
///
/// Only the first [`LAG_COUNT`] priors are read.
pub fn derive_lags(prior: &[f64], current_close: Option<f64>) -> LagFeatureSet {
    let Some(&lag1) = prior.first() else {
        return match current_close.filter(|c| c.is_finite()) {
            Some(close) => LagFeatureSet::repeated(close),
            None => LagFeatureSet::repeated(DEGENERATE_LAG),
        };
    };
    let lag2 = prior.get(1).copied().unwrap_or(lag1);
    let lag3 = prior.get(2).copied().unwrap_or(lag2);

    LagFeatureSet { lag1, lag2, lag3 }
}

/// Lags for a lookup at `reference`: only rows with a known date strictly
/// before it and a known close count as history.
pub fn lags_before(
    rows: &[&HistoricalRow],
    reference: NaiveDateTime,
    current_close: Option<f64>,
) -> LagFeatureSet {
    let mut history: Vec<(NaiveDateTime, f64)> = rows
        .iter()
        .filter_map(|row| Some((row.date?, row.close?)))
        .filter(|(date, _)| *date < reference)
        .collect();

    // Most recent first
    history.sort_by(|a, b| b.0.cmp(&a.0));

    let prior: Vec<f64> = history
        .iter()
        .take(LAG_COUNT)
        .map(|(_, close)| *close)
        .collect();

    derive_lags(&prior, current_close)
}

/// Raw per-row scalars before encoding and lag derivation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureInputs {
    /// UNIX epoch seconds
    pub timestamp: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
}

impl From<&HistoricalRow> for FeatureInputs {
    fn from(row: &HistoricalRow) -> Self {
        Self {
            timestamp: row.timestamp(),
            open: row.open,
            high: row.high,
            low: row.low,
            volume: row.volume,
        }
    }
}

/// Canonical model input:
/// `[timestamp, open, high, low, volume, encodedSymbol, lag1, lag2, lag3]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Pack inputs into the training column order.
    ///
    /// Fails with `InvalidFeature` naming the first scalar that is missing or
    /// non-finite.
    pub fn assemble(
        inputs: &FeatureInputs,
        encoded_symbol: EncodedSymbol,
        lags: &LagFeatureSet,
    ) -> Result<Self> {
        let required = |name: &str, value: Option<f64>| -> Result<f64> {
            match value {
                Some(v) if v.is_finite() => Ok(v),
                Some(v) => Err(Error::invalid_feature(name, format!("non-finite value {v}"))),
                None => Err(Error::invalid_feature(name, "missing value")),
            }
        };

        let values = [
            inputs.timestamp as f64,
            required("open", inputs.open)?,
            required("high", inputs.high)?,
            required("low", inputs.low)?,
            required("volume", inputs.volume)?,
            encoded_symbol as f64,
            required("close_lag1", Some(lags.lag1))?,
            required("close_lag2", Some(lags.lag2))?,
            required("close_lag3", Some(lags.lag3))?,
        ];

        Ok(Self(values))
    }

    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn timestamp(&self) -> f64 {
        self.0[0]
    }

    pub fn encoded_symbol(&self) -> f64 {
        self.0[5]
    }

    pub fn lags(&self) -> LagFeatureSet {
        LagFeatureSet {
            lag1: self.0[6],
            lag2: self.0[7],
            lag3: self.0[8],
        }
    }
}

/// Stack feature vectors into an `(n, 9)` matrix, one row per vector.
pub fn to_matrix(vectors: &[FeatureVector]) -> Array2<f64> {
    let mut matrix = Array2::<f64>::zeros((vectors.len(), FEATURE_COUNT));
    for (i, vector) in vectors.iter().enumerate() {
        for (j, value) in vector.as_slice().iter().enumerate() {
            matrix[[i, j]] = *value;
        }
    }
    matrix
}
