//! Typed rows for the two source files.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::delay::{BinaryLabel, classify_binary};
use crate::error::{AnalyticsError, Result};
use crate::model::PredictionFeatures;
use crate::spreadsheet;

/// Lifecycle state of a rental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RentalState {
    Ended,
    Canceled,
    #[serde(other)]
    Other,
}

/// One rental event from the delay analysis export.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Record {
    pub rental_id: i64,
    #[serde(default, deserialize_with = "opt_id")]
    pub car_id: Option<i64>,
    pub checkin_type: String,
    pub state: RentalState,
    #[serde(default, deserialize_with = "opt_number")]
    pub delay_at_checkout_in_minutes: Option<f64>,
    #[serde(default, deserialize_with = "opt_id")]
    pub previous_ended_rental_id: Option<i64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub time_delta_with_previous_rental_in_minutes: Option<f64>,
}

impl Record {
    pub fn delay(&self) -> Option<f64> {
        self.delay_at_checkout_in_minutes
    }

    pub fn time_delta(&self) -> Option<f64> {
        self.time_delta_with_previous_rental_in_minutes
    }

    pub fn late_label(&self) -> BinaryLabel {
        classify_binary(self.delay())
    }

    pub fn is_canceled(&self) -> bool {
        self.state == RentalState::Canceled
    }
}

/// One vehicle listing from the pricing dataset.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingRecord {
    pub model_key: String,
    pub mileage: f64,
    pub engine_power: f64,
    pub fuel: String,
    pub paint_color: String,
    pub car_type: String,
    #[serde(deserialize_with = "flag")]
    pub private_parking_available: bool,
    #[serde(deserialize_with = "flag")]
    pub has_gps: bool,
    #[serde(deserialize_with = "flag")]
    pub has_air_conditioning: bool,
    #[serde(deserialize_with = "flag")]
    pub automatic_car: bool,
    #[serde(deserialize_with = "flag")]
    pub has_getaround_connect: bool,
    #[serde(deserialize_with = "flag")]
    pub has_speed_regulator: bool,
    #[serde(deserialize_with = "flag")]
    pub winter_tires: bool,
    /// Missing prices are skipped when averaging.
    #[serde(default, deserialize_with = "opt_number")]
    pub rental_price_per_day: Option<f64>,
}

impl PricingRecord {
    /// The listing without its target price.
    pub fn features(&self) -> PredictionFeatures {
        PredictionFeatures {
            model_key: self.model_key.clone(),
            mileage: self.mileage,
            engine_power: self.engine_power,
            fuel: self.fuel.clone(),
            paint_color: self.paint_color.clone(),
            car_type: self.car_type.clone(),
            private_parking_available: self.private_parking_available,
            has_gps: self.has_gps,
            has_air_conditioning: self.has_air_conditioning,
            automatic_car: self.automatic_car,
            has_getaround_connect: self.has_getaround_connect,
            has_speed_regulator: self.has_speed_regulator,
            winter_tires: self.winter_tires,
        }
    }
}

/// Reads every rental event from a CSV export or a workbook.
pub fn load_delays(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    load_rows(path.as_ref())
}

/// Reads every listing from the pricing CSV. A leading index column is ignored.
pub fn load_pricing(path: impl AsRef<Path>) -> Result<Vec<PricingRecord>> {
    load_rows(path.as_ref())
}

fn load_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(AnalyticsError::not_found(path.display().to_string()));
    }
    let bytes =
        std::fs::read(path).map_err(|_| AnalyticsError::not_found(path.display().to_string()))?;
    let csv = spreadsheet::csv_bytes(&path.to_string_lossy(), bytes)?;
    let rows = from_reader(csv.as_slice())?;
    debug!(path = %path.display(), rows = rows.len(), "Records loaded");
    Ok(rows)
}

/// Reads typed rows from a local path or an HTTP(S) URL, CSV or workbook.
pub async fn load_source<T: DeserializeOwned>(source: &str) -> Result<Vec<T>> {
    let bytes = crate::fetch::read_source(source).await?;
    let csv = spreadsheet::csv_bytes(source, bytes)?;
    let rows = from_reader(csv.as_slice())?;
    debug!(source, rows = rows.len(), "Records loaded");
    Ok(rows)
}

/// Deserializes typed rows from CSV content with a header row.
pub fn from_reader<T: DeserializeOwned, R: std::io::Read>(reader: R) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for result in rdr.deserialize() {
        let record: T = result?;
        rows.push(record);
    }

    Ok(rows)
}

fn is_missing(raw: &str) -> bool {
    matches!(raw.trim(), "" | "NA" | "NaN" | "nan" | "null" | "None")
}

/// Optional finite number; missing markers become `None`.
fn opt_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<f64>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if is_missing(&s) => Ok(None),
        Some(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Optional identifier, tolerating float spellings such as `505000.0`.
fn opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<i64>, D::Error> {
    let number = opt_number(deserializer)?;
    match number {
        Some(n) if n.fract() != 0.0 => Err(serde::de::Error::custom(format!(
            "identifier {n} is not an integer"
        ))),
        Some(n) => Ok(Some(n as i64)),
        None => Ok(None),
    }
}

/// Boolean accepting `true`/`True`/`TRUE` and `1`/`0`.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid boolean: {other}"))),
    }
}
