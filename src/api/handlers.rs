use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use serde_json::{Value as JsonValue, json};
use tracing::{debug, info};

use super::AppState;
use super::types::{ColumnParams, FilterBy, GreetingsParams, GroupBy, PreviewParams, QuantileParams};
use crate::dataset::{Outcome, Table, Value};
use crate::error::{AnalyticsError, Result};
use crate::model::PredictionFeatures;
use crate::query::{self, AggMethod};

const WELCOME: &str = "Hello world ! This `/` is the most simple and default endpoint for the API. \
If you want to learn more, check out documentation of the api at `/docs`.";

pub async fn index() -> Json<&'static str> {
    Json(WELCOME)
}

/// Says hi to whoever passes their name as a query parameter.
pub async fn greetings(
    params: std::result::Result<Query<GreetingsParams>, QueryRejection>,
) -> Result<Json<JsonValue>> {
    let Query(params) = params?;
    Ok(Json(json!({
        "Message": format!("Hello {} How are you today?", params.name)
    })))
}

/// A random sample of `n_rows` rows, or an advisory when the table is smaller.
pub async fn preview(
    State(state): State<AppState>,
    params: std::result::Result<Query<PreviewParams>, QueryRejection>,
) -> Result<Json<Outcome<Table>>> {
    let Query(params) = params?;
    let mut rng = rand::rng();
    let outcome = state.pricing.sample(params.n_rows, &mut rng);
    debug!(n_rows = params.n_rows, advisory = outcome.is_advisory(), "Preview");
    Ok(Json(outcome))
}

pub async fn column_names(State(state): State<AppState>) -> Json<JsonValue> {
    Json(json!({ "column names :": state.pricing.columns() }))
}

pub async fn unique_values(
    State(state): State<AppState>,
    params: std::result::Result<Query<ColumnParams>, QueryRejection>,
) -> Result<Json<Vec<Value>>> {
    let Query(params) = params?;
    Ok(Json(state.pricing.unique_values(&params.column)?))
}

/// Rows above (`top=true`) or below a quantile of a numeric column.
pub async fn quantile(
    State(state): State<AppState>,
    params: std::result::Result<Query<QuantileParams>, QueryRejection>,
) -> Result<Json<Outcome<Table>>> {
    let Query(params) = params?;
    let outcome =
        query::quantile_filter(&state.pricing, &params.column, params.percent, params.top)?;
    debug!(
        column = %params.column,
        percent = params.percent,
        top = params.top,
        advisory = outcome.is_advisory(),
        "Quantile filter"
    );
    Ok(Json(outcome))
}

pub async fn filter_by(
    State(state): State<AppState>,
    body: std::result::Result<Json<FilterBy>, JsonRejection>,
) -> Result<Json<Table>> {
    let Json(body) = body?;
    let table = query::filter_by_categories(&state.pricing, &body.column, &body.by_category)?;
    Ok(Json(table))
}

pub async fn group_by(
    State(state): State<AppState>,
    body: std::result::Result<Json<GroupBy>, JsonRejection>,
) -> Result<Json<Table>> {
    let Json(body) = body?;
    let method: AggMethod = body.by_method.parse()?;
    let table = query::group_by(&state.pricing, &body.column, method)?;
    Ok(Json(table))
}

/// Daily rental price for one listing.
pub async fn prediction(
    State(state): State<AppState>,
    features: std::result::Result<Json<PredictionFeatures>, JsonRejection>,
) -> Result<Json<JsonValue>> {
    let Json(features) = features?;
    let model = state
        .model
        .as_ref()
        .ok_or_else(|| AnalyticsError::ModelUnavailable("no model loaded".to_string()))?;
    let prediction = model.predict(&features)?;
    info!(model_key = %features.model_key, prediction, "Prediction served");
    Ok(Json(json!({ "prediction": prediction })))
}
