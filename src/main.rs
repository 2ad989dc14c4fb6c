//! stock-inference - command-line front end for the prediction service.
//!
//! Every subcommand prints one JSON envelope on stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stock_inference::api::Envelope;
use stock_inference::{Config, HistoricalRequest, PredictRequest, PredictionService, SortOrder};

#[derive(Parser, Debug)]
#[command(name = "stock-inference")]
#[command(about = "Lag-feature stock price prediction", version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "STOCK_INFERENCE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Historical rows for a symbol with a prediction per row
    Chart(ChartArgs),

    /// Predict from a JSON request (`-` reads stdin)
    Predict {
        request: String,
    },

    /// Look up OHLCV values from a JSON `{symbol, date}` request (`-` reads stdin)
    Fetch {
        request: String,
    },

    /// List symbols known to the dataset or the encoder
    Stocks,

    /// Print the stored model evaluation metrics
    Metrics,
}

#[derive(Args, Debug)]
struct ChartArgs {
    symbol: String,

    /// Maximum rows (defaults to the configured limit)
    #[arg(short, long)]
    limit: Option<usize>,

    /// asc or desc
    #[arg(short, long)]
    sort: Option<SortOrder>,
}

fn read_request(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read request from stdin")?;
        Ok(buf)
    } else {
        Ok(arg.to_string())
    }
}

fn emit<E: Envelope>(envelope: &E) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    Ok(if envelope.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let service = PredictionService::new(config);

    info!(command = ?cli.command, "stock-inference starting");

    match cli.command {
        Commands::Chart(args) => emit(&service.chart(&args.symbol, args.limit, args.sort)),
        Commands::Predict { request } => {
            let request: PredictRequest = serde_json::from_str(&read_request(&request)?)
                .context("prediction request is not valid JSON")?;
            emit(&service.predict(&request))
        }
        Commands::Fetch { request } => {
            let request: HistoricalRequest = serde_json::from_str(&read_request(&request)?)
                .context("lookup request is not valid JSON")?;
            emit(&service.fetch_historical(&request))
        }
        Commands::Stocks => emit(&service.list_symbols()),
        Commands::Metrics => emit(&service.metrics()),
    }
}
