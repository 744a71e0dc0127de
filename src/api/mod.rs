//! HTTP surface over the pricing table and the price model.
//!
//! Both are loaded once at startup and shared read-only across requests.

pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tracing::{info, warn};

use crate::dataset::Table;
use crate::error::AnalyticsError;
use crate::model::PricePredictor;

#[derive(Clone)]
pub struct AppState {
    pub pricing: Arc<Table>,
    /// `None` when no artifact could be loaded; `/prediction` then answers 503.
    pub model: Option<Arc<dyn PricePredictor>>,
}

impl AppState {
    pub fn new(pricing: Table, model: Option<Arc<dyn PricePredictor>>) -> Self {
        AppState {
            pricing: Arc::new(pricing),
            model,
        }
    }
}

impl AnalyticsError {
    pub fn status(&self) -> StatusCode {
        match self {
            AnalyticsError::SourceNotFound { .. } => StatusCode::NOT_FOUND,
            AnalyticsError::UnknownColumn(_)
            | AnalyticsError::InvalidRange(_)
            | AnalyticsError::ParseError(_)
            | AnalyticsError::InvalidMethod(_) => StatusCode::BAD_REQUEST,
            AnalyticsError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<QueryRejection> for AnalyticsError {
    fn from(rejection: QueryRejection) -> Self {
        AnalyticsError::ParseError(rejection.body_text())
    }
}

impl From<JsonRejection> for AnalyticsError {
    fn from(rejection: JsonRejection) -> Self {
        AnalyticsError::ParseError(rejection.body_text())
    }
}

impl IntoResponse for AnalyticsError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(kind = self.kind(), error = %self, "Request failed");
        let body = Json(json!({ "error": self.to_string(), "kind": self.kind() }));
        (status, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/greetings", get(handlers::greetings))
        .route("/preview", get(handlers::preview))
        .route("/column_names", get(handlers::column_names))
        .route("/unique-values", get(handlers::unique_values))
        .route("/quantile", get(handlers::quantile))
        .route("/filter-by", post(handlers::filter_by))
        .route("/groupby", post(handlers::group_by))
        .route("/prediction", post(handlers::prediction))
        .with_state(state)
}

/// Binds `addr` and serves until the process is stopped.
pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
