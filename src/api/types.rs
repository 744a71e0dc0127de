//! Query and body shapes accepted by the HTTP endpoints.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GreetingsParams {
    pub name: String,
}

impl Default for GreetingsParams {
    fn default() -> Self {
        GreetingsParams {
            name: "Mr (or Miss) Nobody".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PreviewParams {
    pub n_rows: usize,
}

impl Default for PreviewParams {
    fn default() -> Self {
        PreviewParams { n_rows: 5 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ColumnParams {
    pub column: String,
}

impl Default for ColumnParams {
    fn default() -> Self {
        ColumnParams {
            column: "model_key".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct QuantileParams {
    pub column: String,
    pub percent: f64,
    pub top: bool,
}

impl Default for QuantileParams {
    fn default() -> Self {
        QuantileParams {
            column: "mileage".to_string(),
            percent: 0.1,
            top: true,
        }
    }
}

/// Body of `POST /filter-by`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FilterBy {
    pub column: String,
    pub by_category: Vec<String>,
}

impl Default for FilterBy {
    fn default() -> Self {
        FilterBy {
            column: "model_key".to_string(),
            by_category: vec!["Peugeot".to_string()],
        }
    }
}

/// Body of `POST /groupby`. The method stays a string here and is checked
/// against [`crate::query::AggMethod`] by the handler.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GroupBy {
    pub column: String,
    pub by_method: String,
}

impl Default for GroupBy {
    fn default() -> Self {
        GroupBy {
            column: "model_key".to_string(),
            by_method: "mean".to_string(),
        }
    }
}
