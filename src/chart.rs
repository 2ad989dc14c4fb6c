//! Chart prediction pipeline.
//!
//! Walks a symbol's rows in ascending date order, carrying the trailing closes
//! in a [`LagWindow`], and attaches a prediction to every row it can.
//! Per-row failures leave that row's prediction empty; the scan continues.

use crate::buffer::LagWindow;
use crate::dataset::{Dataset, HistoricalRow};
use crate::error::{Error, Result};
use crate::features::{FeatureInputs, FeatureVector, LagFeatureSet};
use crate::predictor::ModelArtifact;
use crate::symbols::EncodedSymbol;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Rows returned when a request does not name a limit.
pub const DEFAULT_LIMIT: usize = 100;

/// Presentation order of chart rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(Error::invalid_feature(
                "sort",
                format!("expected asc or desc, got {other:?}"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    pub symbol: String,
    pub limit: usize,
    pub sort: SortOrder,
}

impl ChartRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            limit: DEFAULT_LIMIT,
            sort: SortOrder::Asc,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }
}

/// A dataset row with its prediction attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint<'a> {
    pub row: &'a HistoricalRow,
    /// Lags the prediction was computed from
    pub lags: LagFeatureSet,
    /// `None` when this row could not be predicted
    pub predicted: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries<'a> {
    pub symbol: String,
    pub points: Vec<ChartPoint<'a>>,
    pub predicted_count: usize,
}

impl ChartSeries<'_> {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Order by date in the given direction. Unknown dates go last either way.
fn compare_dates(
    a: Option<NaiveDateTime>,
    b: Option<NaiveDateTime>,
    order: SortOrder,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match order {
            SortOrder::Asc => a.cmp(&b),
            SortOrder::Desc => b.cmp(&a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Encode the requested spelling, falling back to the spellings the dataset
/// uses for the same symbol.
fn encode_symbol(
    artifact: &ModelArtifact,
    requested: &str,
    rows: &[&HistoricalRow],
) -> Option<EncodedSymbol> {
    if let Ok(code) = artifact.encode(requested) {
        return Some(code);
    }

    let mut tried = vec![requested];
    for row in rows {
        let spelling = row.symbol.as_str();
        if tried.contains(&spelling) {
            continue;
        }
        if let Ok(code) = artifact.encode(spelling) {
            return Some(code);
        }
        tried.push(spelling);
    }

    warn!(symbol = %requested, "symbol not in encoder, skipping predictions");
    None
}

/// Build the prediction series for one symbol.
///
/// The window is chosen in the requested order (the first `limit` rows after
/// sorting), predicted in ascending order, and presented in the requested
/// order again.
pub fn predict_chart<'a>(
    dataset: &'a Dataset,
    artifact: &ModelArtifact,
    request: &ChartRequest,
) -> Result<ChartSeries<'a>> {
    if request.limit == 0 {
        return Err(Error::invalid_feature("limit", "must be at least 1"));
    }

    let mut rows = dataset.rows_for_symbol(&request.symbol)?;
    if rows.is_empty() {
        warn!(symbol = %request.symbol, "no rows for symbol");
        return Err(Error::not_found(format!(
            "No data found for symbol: {}",
            request.symbol
        )));
    }

    rows.sort_by(|a, b| compare_dates(a.date, b.date, request.sort));
    rows.truncate(request.limit);
    rows.sort_by(|a, b| compare_dates(a.date, b.date, SortOrder::Asc));

    let encoded = encode_symbol(artifact, &request.symbol, &rows);

    let mut window = LagWindow::new();
    let mut points = Vec::with_capacity(rows.len());

    for row in rows {
        let lags = window.lags(row.close);
        let predicted = encoded.and_then(|code| {
            let result = FeatureVector::assemble(&FeatureInputs::from(row), code, &lags)
                .and_then(|vector| artifact.predict(&vector));
            match result {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(date = ?row.date, error = %e, "row prediction failed");
                    None
                }
            }
        });
        debug!(
            date = ?row.date,
            depth = window.depth(),
            lags = ?lags.as_array(),
            ?predicted,
            "chart row"
        );

        window.observe(row.close);
        points.push(ChartPoint {
            row,
            lags,
            predicted,
        });
    }

    if request.sort == SortOrder::Desc {
        points.sort_by(|a, b| compare_dates(a.row.date, b.row.date, SortOrder::Desc));
    }

    let predicted_count = points.iter().filter(|p| p.predicted.is_some()).count();
    info!(
        symbol = %request.symbol,
        rows = points.len(),
        predicted = predicted_count,
        "chart predictions generated"
    );

    Ok(ChartSeries {
        symbol: request.symbol.clone(),
        points,
        predicted_count,
    })
}
