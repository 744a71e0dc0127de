//! Daily price prediction behind a swappable [`PricePredictor`].
//!
//! The shipped implementation is a linear model over scaled numeric
//! features, boolean flags, and one-hot categorical levels, stored as JSON:
//!
//! ```json
//! {
//!   "intercept": 120.0,
//!   "numeric": { "mileage": { "coef": -12.5, "mean": 140000.0, "scale": 60000.0 } },
//!   "flags": { "has_gps": 8.1 },
//!   "categorical": { "fuel": { "diesel": 0.0, "petrol": 3.2 } }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AnalyticsError, Result};

/// Input of a single price prediction.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PredictionFeatures {
    pub model_key: String,
    pub mileage: f64,
    pub engine_power: f64,
    pub fuel: String,
    pub paint_color: String,
    pub car_type: String,
    pub private_parking_available: bool,
    pub has_gps: bool,
    pub has_air_conditioning: bool,
    pub automatic_car: bool,
    pub has_getaround_connect: bool,
    pub has_speed_regulator: bool,
    pub winter_tires: bool,
}

impl Default for PredictionFeatures {
    fn default() -> Self {
        PredictionFeatures {
            model_key: "Citroën".to_string(),
            mileage: 140_411.0,
            engine_power: 100.0,
            fuel: "diesel".to_string(),
            paint_color: "black".to_string(),
            car_type: "convertible".to_string(),
            private_parking_available: true,
            has_gps: true,
            has_air_conditioning: true,
            automatic_car: true,
            has_getaround_connect: true,
            has_speed_regulator: true,
            winter_tires: true,
        }
    }
}

impl PredictionFeatures {
    pub const NUMERIC: [&'static str; 2] = ["mileage", "engine_power"];
    pub const CATEGORICAL: [&'static str; 4] = ["model_key", "fuel", "paint_color", "car_type"];
    pub const FLAGS: [&'static str; 7] = [
        "private_parking_available",
        "has_gps",
        "has_air_conditioning",
        "automatic_car",
        "has_getaround_connect",
        "has_speed_regulator",
        "winter_tires",
    ];

    pub fn numeric(&self, name: &str) -> Option<f64> {
        match name {
            "mileage" => Some(self.mileage),
            "engine_power" => Some(self.engine_power),
            _ => None,
        }
    }

    pub fn category(&self, name: &str) -> Option<&str> {
        match name {
            "model_key" => Some(&self.model_key),
            "fuel" => Some(&self.fuel),
            "paint_color" => Some(&self.paint_color),
            "car_type" => Some(&self.car_type),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        match name {
            "private_parking_available" => Some(self.private_parking_available),
            "has_gps" => Some(self.has_gps),
            "has_air_conditioning" => Some(self.has_air_conditioning),
            "automatic_car" => Some(self.automatic_car),
            "has_getaround_connect" => Some(self.has_getaround_connect),
            "has_speed_regulator" => Some(self.has_speed_regulator),
            "winter_tires" => Some(self.winter_tires),
            _ => None,
        }
    }
}

/// Anything that can price a listing. Implementations are opaque to callers.
pub trait PricePredictor: Send + Sync {
    fn predict(&self, features: &PredictionFeatures) -> Result<f64>;
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NumericTerm {
    pub coef: f64,
    #[serde(default)]
    pub mean: f64,
    #[serde(default = "unit_scale")]
    pub scale: f64,
}

fn unit_scale() -> f64 {
    1.0
}

/// Linear regression artifact.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LinearPriceModel {
    pub intercept: f64,
    #[serde(default)]
    pub numeric: HashMap<String, NumericTerm>,
    #[serde(default)]
    pub flags: HashMap<String, f64>,
    /// Levels absent from the table contribute nothing.
    #[serde(default)]
    pub categorical: HashMap<String, HashMap<String, f64>>,
}

impl LinearPriceModel {
    /// Loads and validates an artifact. Any failure is reported as
    /// [`AnalyticsError::ModelUnavailable`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AnalyticsError::ModelUnavailable(format!("{}: {e}", path.display()))
        })?;
        let model = Self::from_json(&text)?;
        info!(
            path = %path.display(),
            numeric = model.numeric.len(),
            flags = model.flags.len(),
            categorical = model.categorical.len(),
            "Price model loaded"
        );
        Ok(model)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let model: LinearPriceModel = serde_json::from_str(text)
            .map_err(|e| AnalyticsError::ModelUnavailable(format!("incompatible artifact: {e}")))?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        let incompatible = |what: String| Err(AnalyticsError::ModelUnavailable(what));

        for (name, term) in &self.numeric {
            if !PredictionFeatures::NUMERIC.contains(&name.as_str()) {
                return incompatible(format!("unknown numeric feature {name}"));
            }
            if term.scale == 0.0 || !term.scale.is_finite() {
                return incompatible(format!("invalid scale for {name}"));
            }
        }
        if let Some(name) = self
            .flags
            .keys()
            .find(|k| !PredictionFeatures::FLAGS.contains(&k.as_str()))
        {
            return incompatible(format!("unknown flag feature {name}"));
        }
        if let Some(name) = self
            .categorical
            .keys()
            .find(|k| !PredictionFeatures::CATEGORICAL.contains(&k.as_str()))
        {
            return incompatible(format!("unknown categorical feature {name}"));
        }
        Ok(())
    }
}

impl PricePredictor for LinearPriceModel {
    fn predict(&self, features: &PredictionFeatures) -> Result<f64> {
        let mut total = self.intercept;

        for (name, term) in &self.numeric {
            let x = features.numeric(name).ok_or_else(|| {
                AnalyticsError::ModelUnavailable(format!("missing numeric feature {name}"))
            })?;
            total += term.coef * (x - term.mean) / term.scale;
        }

        for (name, coef) in &self.flags {
            if features.flag(name) == Some(true) {
                total += coef;
            }
        }

        for (name, levels) in &self.categorical {
            if let Some(coef) = features.category(name).and_then(|level| levels.get(level)) {
                total += coef;
            }
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    const ARTIFACT: &str = r#"{
        "intercept": 100.0,
        "numeric": {
            "mileage": { "coef": -10.0, "mean": 100000.0, "scale": 50000.0 },
            "engine_power": { "coef": 0.5 }
        },
        "flags": { "has_gps": 5.0, "winter_tires": 2.0 },
        "categorical": { "fuel": { "petrol": 3.0 }, "model_key": { "Citroën": -4.0 } }
    }"#;

    #[test]
    fn test_predict_linear_combination() {
        let model = LinearPriceModel::from_json(ARTIFACT).unwrap();
        let features = PredictionFeatures {
            mileage: 150_000.0,
            engine_power: 120.0,
            fuel: "petrol".into(),
            winter_tires: false,
            ..Default::default()
        };
        // 100 - 10 + 60 + 5 + 3 - 4
        assert_eq!(model.predict(&features).unwrap(), 154.0);
    }

    #[test]
    fn test_unknown_level_contributes_nothing() {
        let model = LinearPriceModel::from_json(ARTIFACT).unwrap();
        let mut features = PredictionFeatures {
            mileage: 100_000.0,
            engine_power: 0.0,
            fuel: "hybrid_petrol".into(),
            model_key: "Tesla".into(),
            ..Default::default()
        };
        features.has_gps = false;
        features.winter_tires = false;
        assert_eq!(model.predict(&features).unwrap(), 100.0);
    }

    #[test]
    fn test_incompatible_artifacts() {
        let bad = [
            "not json",
            r#"{"numeric": {}}"#,
            r#"{"intercept": 1.0, "numeric": {"seats": {"coef": 1.0}}}"#,
            r#"{"intercept": 1.0, "numeric": {"mileage": {"coef": 1.0, "scale": 0.0}}}"#,
            r#"{"intercept": 1.0, "flags": {"has_sunroof": 1.0}}"#,
            r#"{"intercept": 1.0, "categorical": {"brand": {}}}"#,
        ];
        for text in bad {
            let err = LinearPriceModel::from_json(text).unwrap_err();
            assert_eq!(err.kind(), "model_unavailable", "{text}");
        }
    }

    #[test]
    fn test_load_missing_artifact() {
        let path = format!("{}/getaround_no_model.json", env::temp_dir().display());
        let err = LinearPriceModel::load(&path).unwrap_err();
        assert_eq!(err.kind(), "model_unavailable");
    }

    #[test]
    fn test_load_artifact_from_disk() {
        let path = format!("{}/getaround_model.json", env::temp_dir().display());
        fs::write(&path, ARTIFACT).unwrap();

        let model = LinearPriceModel::load(&path).unwrap();
        assert_eq!(model.intercept, 100.0);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_features_defaults_fill_missing_fields() {
        let features: PredictionFeatures =
            serde_json::from_str(r#"{"model_key": "Peugeot", "mileage": 1000}"#).unwrap();
        assert_eq!(features.model_key, "Peugeot");
        assert_eq!(features.mileage, 1000.0);
        assert_eq!(features.engine_power, 100.0);
        assert!(features.winter_tires);
    }
}
