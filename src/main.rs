use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use clap_serde_derive::ClapSerde;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::error::ServiceResult;
use crate::extractors::ValidJson;
use crate::inference::models::exercise::ExerciseClassifier;
use crate::inference::task::classify::{ClassifyHandler, ExerciseInput, PredictionResult};
use crate::telemetry::init_telemetry;

#[macro_export]
macro_rules! exit_err {
    ($msg:expr) => {
        {
            error!($msg);
            std::process::exit(1);
        }
    };
    ($code:expr, $fmt:expr $(, $arg:expr)*) => {
        {
            error!($fmt $(, $arg)*);
            std::process::exit($code);
        }
    };
}

mod config;
mod error;
mod extractors;
mod inference;
mod telemetry;

#[cfg(unix)]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env, default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    /// OTLP collector endpoint, traces and metrics are only exported when set
    #[arg(long, env)]
    otlp_endpoint: Option<String>,

    /// Keep console logging when exporting to an OTLP endpoint
    #[arg(long, env)]
    console: bool,

    /// Configuration options
    #[command(flatten)]
    pub opt_config: <Config as ClapSerde>::Opt,
}

// 10 MB, well above any realistic feature vector
const MAX_BODY_BYTES: usize = 10_000_000;

#[derive(Clone)]
struct AppState {
    classifier: Arc<dyn ClassifyHandler>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = Args::parse();
    if let Err(err) = init_telemetry(&args.otlp_endpoint, args.console) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }

    let config = match Config::load(&args.config_file, &mut args.opt_config) {
        Ok(config) => config,
        Err(err) => exit_err!(1, "{:#}", err),
    };

    let classifier = match ExerciseClassifier::new(Path::new(&config.model_path)) {
        Ok(classifier) => classifier,
        Err(err) => exit_err!(1, "Failed to load model {}: {:#}", config.model_path, err),
    };
    let state = AppState {
        classifier: Arc::new(classifier),
    };

    let listener = match TcpListener::bind(format!("{}:{}", config.address, config.port)).await {
        Ok(listener) => listener,
        Err(err) => exit_err!(
            1,
            "Failed to bind {}:{}: {}",
            config.address,
            config.port,
            err
        ),
    };
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(handle_predict_request))
        .route("/health", get(handle_health_request))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down..."),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}

#[axum_macros::debug_handler]
#[tracing::instrument(level = "info", skip_all, fields(features = input.features.len()))]
async fn handle_predict_request(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<ExerciseInput>,
) -> ServiceResult<(StatusCode, Json<PredictionResult>)> {
    let classifier = state.classifier.clone();
    let result = tokio::task::spawn_blocking(move || classifier.run_classify(input)).await??;
    info!("Predicted class {}", result.prediction);
    Ok((StatusCode::OK, Json(result)))
}

async fn handle_health_request() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
