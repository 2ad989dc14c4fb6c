//! End-to-end tests over fixture files: config file, dataset, linear model and
//! label encoder, driven through the service the way the binary drives it.

use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use stock_inference::api::Envelope;
use stock_inference::{
    Config, ErrorKind, HistoricalRequest, PredictRequest, PredictionService, SortOrder,
};
use tempfile::TempDir;

const DATASET: &str = "\
,Date,Open,High,Low,Close,Volume,Name
0,2024-01-10,99.00,101.00,98.50,100.00,1000000,AAPL
1,2024-01-11,100.00,103.00,99.50,102.00,1200000,AAPL
2,2024-01-12,104.00,106.00,103.00,105.00,1500000,AAPL
3,2024-01-16,105.50,107.00,104.00,106.00,1100000,AAPL
4,2024-01-10,370.00,375.00,368.00,372.00,900000,MSFT
5,2024-01-11,372.00,380.00,371.00,379.00,950000,MSFT
";

/// `0.5 * lag1 + 0.3 * lag2 + 0.2 * lag3`, a plausible smoothing regressor.
const MODEL: &str = r#"{
    "coefficients": [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5, 0.3, 0.2],
    "intercept": 0.0
}"#;

const ENCODER: &str = r#"{"classes": ["AAL", "AAPL", "MSFT"]}"#;

const CONFIG: &str = r#"
dataset_path = "data/dataset.csv"
model_path = "artifacts/model.json"
encoder_path = "artifacts/labelencoder_name.json"
metrics_path = "artifacts/model_metrics.json"

[chart]
default_limit = 100
default_sort = "asc"
"#;

fn fixture() -> (TempDir, PredictionService) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("data")).unwrap();
    std::fs::create_dir_all(root.join("artifacts")).unwrap();

    std::fs::write(root.join("data/dataset.csv"), DATASET).unwrap();
    std::fs::write(root.join("artifacts/model.json"), MODEL).unwrap();
    std::fs::write(root.join("artifacts/labelencoder_name.json"), ENCODER).unwrap();
    std::fs::write(
        root.join("artifacts/model_metrics.json"),
        r#"{"mse": 3.42, "r2": 0.9971}"#,
    )
    .unwrap();
    std::fs::write(root.join("config.toml"), CONFIG).unwrap();

    let config = Config::from_file(&root.join("config.toml")).unwrap();
    (dir, PredictionService::new(config))
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap()
}

#[test]
fn config_paths_resolve_against_config_dir() {
    let (dir, service) = fixture();
    assert_eq!(
        service.config().dataset_path,
        dir.path().join("data/dataset.csv")
    );
    assert!(Path::new(&service.config().model_path).exists());
}

#[test]
fn chart_attaches_predictions_from_trailing_closes() {
    let (_dir, service) = fixture();
    let response = service.chart("AAPL", None, None);

    assert!(response.is_success());
    assert_eq!(response.count, 4);
    assert_eq!(response.predicted_count, 4);

    let dates: Vec<&Value> = response.data.iter().map(|row| &row["Date"]).collect();
    assert_eq!(dates, vec!["2024-01-10", "2024-01-11", "2024-01-12", "2024-01-16"]);

    // First row has no history: its own close in every slot
    assert_eq!(response.data[0]["Predicted"], json!(100.0));
    // lags (100, 100, 100)
    assert_eq!(response.data[1]["Predicted"], json!(100.0));
    // lags (102, 100, 100)
    let third = response.data[2]["Predicted"].as_f64().unwrap();
    assert!((third - 101.0).abs() < 1e-9);
    // lags (105, 102, 100)
    let fourth = response.data[3]["Predicted"].as_f64().unwrap();
    assert!((fourth - 103.1).abs() < 1e-9);
}

#[test]
fn chart_desc_with_limit() {
    let (_dir, service) = fixture();
    let response = service.chart("aapl", Some(2), Some(SortOrder::Desc));

    assert_eq!(response.count, 2);
    assert_eq!(response.data[0]["Date"], "2024-01-16");
    assert_eq!(response.data[1]["Date"], "2024-01-12");
    // The 2024-01-12 row opens the window, so it sees only its own close
    let predicted = response.data[1]["Predicted"].as_f64().unwrap();
    assert!((predicted - 105.0).abs() < 1e-9);
}

#[test]
fn chart_unknown_symbol_is_not_found() {
    let (_dir, service) = fixture();
    let response = service.chart("ZZZZ", None, None);

    assert!(!response.is_success());
    let value = to_json(&response);
    assert_eq!(value["kind"], "not_found");
    assert_eq!(value["data"], json!([]));
}

#[test]
fn predict_looks_up_lags_before_date() {
    let (_dir, service) = fixture();
    let request: PredictRequest = serde_json::from_value(json!({
        "symbol": "AAPL",
        "open": 106.0,
        "high": "108.5",
        "low": 105.0,
        "volume": 1300000,
        "Date": "2024-01-16"
    }))
    .unwrap();

    let response = service.predict(&request);
    assert!(response.is_success());
    // lags (105, 102, 100) -> 52.5 + 30.6 + 20.0
    assert_eq!(response.prediction, Some(103.1));

    let value = to_json(&response);
    assert_eq!(value["symbol"], "AAPL");
    assert_eq!(value["input_features"]["high"], "108.5");
    assert_eq!(value["input_features"]["close"], Value::Null);
}

#[test]
fn predict_rejects_unknown_symbol_and_missing_fields() {
    let (_dir, service) = fixture();

    let request: PredictRequest = serde_json::from_value(json!({
        "symbol": "ZZZZ", "open": 1, "high": 1, "low": 1, "volume": 1
    }))
    .unwrap();
    assert_eq!(service.predict(&request).kind, Some(ErrorKind::UnknownSymbol));

    let request: PredictRequest =
        serde_json::from_value(json!({"symbol": "AAPL", "low": 1})).unwrap();
    let response = service.predict(&request);
    assert_eq!(response.kind, Some(ErrorKind::MissingField));
    assert_eq!(
        response.error.as_deref(),
        Some("Missing required fields: open, high, volume")
    );
}

#[test]
fn fetch_falls_back_over_market_holiday() {
    let (_dir, service) = fixture();

    // 2024-01-15 is a market holiday; the lookup lands on 2024-01-12
    let response = service.fetch_historical(&HistoricalRequest {
        symbol: Some("AAPL".into()),
        date: Some("2024-01-15".into()),
    });
    let value = to_json(&response);
    assert_eq!(
        value,
        json!({
            "success": true,
            "data": {
                "open": 104.0,
                "close": 105.0,
                "high": 106.0,
                "low": 103.0,
                "volume": 1500000.0
            },
            "symbol": "AAPL",
            "date": "2024-01-15"
        })
    );
}

#[test]
fn stocks_and_metrics() {
    let (_dir, service) = fixture();

    let stocks = to_json(&service.list_symbols());
    assert_eq!(stocks, json!({"success": true, "stocks": ["AAL", "AAPL", "MSFT"], "count": 3}));

    let metrics = to_json(&service.metrics());
    assert_eq!(metrics["model_metrics"]["r2"], json!(0.9971));
}

#[test]
fn concurrent_requests_share_one_artifact() {
    let (_dir, service) = fixture();
    let service = Arc::new(service);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || service.chart("MSFT", None, None).predicted_count)
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 2);
    }

    let first = service.gateway().load_once().unwrap();
    let second = service.gateway().load_once().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}
