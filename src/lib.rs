pub mod api;
pub mod config;
pub mod dataset;
pub mod delay;
pub mod delta;
pub mod error;
pub mod fetch;
pub mod loss;
pub mod model;
pub mod output;
pub mod query;
pub mod records;
pub mod report;
pub mod spreadsheet;
pub mod stats;
pub mod threshold;
