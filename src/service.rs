//! Request-level entry points.
//!
//! [`PredictionService`] owns the inference gateway and reloads the dataset
//! on every call, so edits to the CSV are picked up without a restart.

use crate::api::{
    ChartResponse, HistoricalResponse, MetricsResponse, PredictResponse, StocksResponse,
};
use crate::chart::{predict_chart, ChartRequest, SortOrder};
use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::metrics::ModelMetrics;
use crate::point::{fetch_historical, predict_one, HistoricalRequest, PredictRequest};
use crate::predictor::InferenceGateway;
use chrono::Utc;
use std::collections::BTreeSet;
use tracing::{error, warn};

fn log_failure(operation: &str, err: &Error) {
    if err.is_client_error() {
        warn!(operation, kind = %err.kind(), error = %err, "request rejected");
    } else {
        error!(operation, kind = %err.kind(), error = %err, "request failed");
    }
}

/// Shared, thread-safe front of the prediction pipelines.
#[derive(Debug)]
pub struct PredictionService {
    config: Config,
    gateway: InferenceGateway,
}

impl PredictionService {
    pub fn new(config: Config) -> Self {
        let gateway = InferenceGateway::from_config(&config);
        Self { config, gateway }
    }

    /// Service around a caller-supplied gateway.
    pub fn with_gateway(config: Config, gateway: InferenceGateway) -> Self {
        Self { config, gateway }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn gateway(&self) -> &InferenceGateway {
        &self.gateway
    }

    fn load_dataset(&self) -> Result<Dataset> {
        Dataset::load(&self.config.dataset_path)
    }

    /// Chart rows for `symbol` with predictions attached.
    pub fn chart(
        &self,
        symbol: &str,
        limit: Option<usize>,
        sort: Option<SortOrder>,
    ) -> ChartResponse {
        let request = ChartRequest::new(symbol)
            .with_limit(limit.unwrap_or(self.config.chart.default_limit))
            .with_sort(sort.unwrap_or(self.config.chart.default_sort));

        let result = self.load_dataset().and_then(|dataset| {
            let artifact = self.gateway.load_once()?;
            let series = predict_chart(&dataset, &artifact, &request)?;
            Ok(ChartResponse::ok(&dataset, &series))
        });

        result.unwrap_or_else(|e| {
            log_failure("chart", &e);
            ChartResponse::failure(symbol, &e)
        })
    }

    /// Single prediction with lags looked up in the dataset.
    ///
    /// A missing or unreadable dataset fails the request with the dataset
    /// error; only columns absent from a loaded dataset degrade the lags.
    pub fn predict(&self, request: &PredictRequest) -> PredictResponse {
        let result = self.gateway.load_once().and_then(|artifact| {
            let dataset = self.load_dataset()?;
            predict_one(Some(&dataset), &artifact, request, Utc::now().naive_utc())
        });

        match result {
            Ok(prediction) => PredictResponse::ok(&prediction, request),
            Err(e) => {
                log_failure("predict", &e);
                PredictResponse::failure(&e)
            }
        }
    }

    /// Market values for a symbol on a date.
    pub fn fetch_historical(&self, request: &HistoricalRequest) -> HistoricalResponse {
        self.try_fetch_historical(request).unwrap_or_else(|e| {
            log_failure("fetch_historical", &e);
            HistoricalResponse::failure(&e)
        })
    }

    fn try_fetch_historical(&self, request: &HistoricalRequest) -> Result<HistoricalResponse> {
        let (Some(symbol), Some(date)) = (request.symbol.as_deref(), request.date.as_deref()) else {
            let missing = [("symbol", request.symbol.is_none()), ("date", request.date.is_none())]
                .into_iter()
                .filter(|(_, missing)| *missing)
                .map(|(name, _)| name.to_string())
                .collect();
            return Err(Error::MissingField(missing));
        };
        let dataset = self.load_dataset()?;
        let data = fetch_historical(&dataset, symbol, date)?;
        Ok(HistoricalResponse::ok(data, symbol, date))
    }

    /// Symbols in the dataset or the encoder, sorted and deduplicated.
    ///
    /// Either source may be unavailable; only both failing is an error.
    pub fn list_symbols(&self) -> StocksResponse {
        let from_dataset = self.load_dataset().map(|dataset| dataset.symbols());
        let from_encoder = self
            .gateway
            .load_once()
            .map(|artifact| artifact.known_symbols().to_vec());

        let stocks = match (from_dataset, from_encoder) {
            (Err(dataset_err), Err(encoder_err)) => {
                warn!(error = %encoder_err, "encoder unavailable for symbol list");
                log_failure("list_symbols", &dataset_err);
                return StocksResponse::failure(&dataset_err);
            }
            (dataset, encoder) => {
                if let Err(e) = &dataset {
                    warn!(error = %e, "dataset unavailable, listing encoder symbols");
                }
                if let Err(e) = &encoder {
                    warn!(error = %e, "encoder unavailable, listing dataset symbols");
                }
                dataset
                    .unwrap_or_default()
                    .into_iter()
                    .chain(encoder.unwrap_or_default())
                    .collect::<BTreeSet<String>>()
            }
        };

        StocksResponse::ok(stocks.into_iter().collect())
    }

    pub fn metrics(&self) -> MetricsResponse {
        // Load never fails outright; unreadable metrics are reported as absent
        let metrics = ModelMetrics::load(&self.config.metrics_path).unwrap_or_else(|e| {
            warn!(error = %e, "metrics unavailable");
            None
        });
        MetricsResponse::new(metrics)
    }
}
