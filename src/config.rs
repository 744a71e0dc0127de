//! Runtime settings read from the environment (and `.env`, loaded by the
//! binary through `dotenvy`).
//!
//! | Variable               | Default                          |
//! |------------------------|----------------------------------|
//! | `PRICING_PATH`         | `get_around_pricing_project.csv` |
//! | `DELAY_PATH`           | `get_around_delay_analysis.csv`  |
//! | `MODEL_PATH`           | `model.json`                     |
//! | `BIND_ADDR`            | `0.0.0.0:4000`                   |
//! | `CANCEL_AVG_HOURS`     | `6`                              |
//! | `CHANNELS_OF_INTEREST` | `mobile,connect`                 |

use anyhow::{Context, Result};

use crate::loss::DEFAULT_AVG_DURATION_HOURS;
use crate::report::ReportOptions;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub pricing_path: String,
    pub delay_path: String,
    pub model_path: String,
    pub bind_addr: String,
    pub avg_duration_hours: f64,
    pub channels_of_interest: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            pricing_path: "get_around_pricing_project.csv".to_string(),
            delay_path: "get_around_delay_analysis.csv".to_string(),
            model_path: "model.json".to_string(),
            bind_addr: "0.0.0.0:4000".to_string(),
            avg_duration_hours: DEFAULT_AVG_DURATION_HOURS,
            channels_of_interest: vec!["mobile".to_string(), "connect".to_string()],
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup; unset keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(v) = lookup("PRICING_PATH") {
            settings.pricing_path = v;
        }
        if let Some(v) = lookup("DELAY_PATH") {
            settings.delay_path = v;
        }
        if let Some(v) = lookup("MODEL_PATH") {
            settings.model_path = v;
        }
        if let Some(v) = lookup("BIND_ADDR") {
            settings.bind_addr = v;
        }
        if let Some(v) = lookup("CANCEL_AVG_HOURS") {
            settings.avg_duration_hours = v
                .trim()
                .parse()
                .with_context(|| format!("CANCEL_AVG_HOURS must be a number, got {v:?}"))?;
        }
        if let Some(v) = lookup("CHANNELS_OF_INTEREST") {
            settings.channels_of_interest = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(settings)
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            channels_of_interest: self.channels_of_interest.clone(),
            avg_duration_hours: self.avg_duration_hours,
        }
    }
}
