//! CLI entry point for the Getaround analytics tool.
//!
//! Provides subcommands for serving the pricing API, building the delay
//! dashboard report, and pricing a single listing.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use getaround_analytics::{
    api::{self, AppState},
    config::Settings,
    dataset::{LoadOptions, Table},
    model::{LinearPriceModel, PredictionFeatures, PricePredictor},
    output::{append_record, print_json, print_narrative, print_pretty, write_json},
    records::{self, PricingRecord, Record},
    report::DashboardReport,
};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "getaround_analytics")]
#[command(about = "Delay analysis and pricing API for Getaround rentals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the pricing HTTP API
    Serve {
        /// Address to listen on (overrides BIND_ADDR)
        #[arg(short, long)]
        bind: Option<String>,

        /// Pricing CSV path or URL (overrides PRICING_PATH)
        #[arg(long)]
        pricing: Option<String>,

        /// Model artifact path (overrides MODEL_PATH)
        #[arg(long)]
        model: Option<String>,
    },
    /// Build the delay dashboard report
    Dashboard {
        /// Delay records CSV path or URL (overrides DELAY_PATH)
        #[arg(long)]
        delays: Option<String>,

        /// Pricing CSV path or URL (overrides PRICING_PATH)
        #[arg(long)]
        pricing: Option<String>,

        /// Write the full report as JSON to this file
        #[arg(short, long)]
        output: Option<String>,

        /// CSV file to append a one-line summary to
        #[arg(long)]
        history: Option<String>,

        /// Log the full report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Predict the daily rental price of one listing
    Predict {
        /// Listing features as JSON; omitted fields take their defaults
        #[arg(short, long, default_value = "{}")]
        features: String,

        /// Model artifact path (overrides MODEL_PATH)
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/getaround_analytics.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("getaround_analytics.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env()?;

    match cli.command {
        Commands::Serve {
            bind,
            pricing,
            model,
        } => {
            if let Some(bind) = bind {
                settings.bind_addr = bind;
            }
            if let Some(pricing) = pricing {
                settings.pricing_path = pricing;
            }
            if let Some(model) = model {
                settings.model_path = model;
            }
            serve(&settings).await?;
        }
        Commands::Dashboard {
            delays,
            pricing,
            output,
            history,
            json,
        } => {
            if let Some(delays) = delays {
                settings.delay_path = delays;
            }
            if let Some(pricing) = pricing {
                settings.pricing_path = pricing;
            }
            dashboard(&settings, output.as_deref(), history.as_deref(), json).await?;
        }
        Commands::Predict { features, model } => {
            if let Some(model) = model {
                settings.model_path = model;
            }
            let features: PredictionFeatures =
                serde_json::from_str(&features).context("--features must be a JSON object")?;
            let model = LinearPriceModel::load(&settings.model_path)?;
            let prediction = model.predict(&features)?;
            info!(model_key = %features.model_key, prediction, "Prediction");
            print_json(&serde_json::json!({ "prediction": prediction }))?;
        }
    }

    Ok(())
}

/// Loads the pricing table and the model once, then serves the API.
#[tracing::instrument(skip(settings), fields(bind = %settings.bind_addr))]
async fn serve(settings: &Settings) -> Result<()> {
    let pricing = Table::load_source(&settings.pricing_path, LoadOptions { index_column: true })
        .await
        .with_context(|| format!("failed to load pricing table {}", settings.pricing_path))?;
    info!(
        rows = pricing.len(),
        columns = pricing.columns().len(),
        "Pricing table loaded"
    );

    let model: Option<Arc<dyn PricePredictor>> =
        match LinearPriceModel::load(&settings.model_path) {
            Ok(model) => Some(Arc::new(model)),
            Err(e) => {
                warn!(error = %e, "Serving without a price model");
                None
            }
        };

    api::serve(AppState::new(pricing, model), &settings.bind_addr).await
}

/// Runs the dashboard pipeline over the delay records and reports the result.
#[tracing::instrument(skip(settings), fields(delays = %settings.delay_path))]
async fn dashboard(
    settings: &Settings,
    output: Option<&str>,
    history: Option<&str>,
    json: bool,
) -> Result<()> {
    let delays: Vec<Record> = records::load_source(&settings.delay_path)
        .await
        .with_context(|| format!("failed to load delay records {}", settings.delay_path))?;

    // Without pricing the report still builds; only the loss section is skipped.
    let pricing: Vec<PricingRecord> = match records::load_source(&settings.pricing_path).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, "Pricing unavailable, money loss not computed");
            Vec::new()
        }
    };

    let report = DashboardReport::build(&delays, &pricing, &settings.report_options());
    info!(
        records = report.total_records,
        late = report.late_records(),
        canceled = report.canceled_count,
        "Dashboard built"
    );

    print_pretty(&report);
    print_narrative(&report);
    if json {
        print_json(&report)?;
    }
    if let Some(path) = output {
        write_json(path, &report)?;
        info!(path, "Report written");
    }
    if let Some(path) = history {
        append_record(path, &report.summary())?;
    }

    Ok(())
}
