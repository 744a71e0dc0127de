//! Whether the scheduled gap before the next rental absorbed the delay.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::records::Record;
use crate::stats;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShortfallStats {
    pub count: usize,
    pub mean_time_delta: Option<f64>,
    /// Mean of `time_delta - delay`; negative by construction.
    pub mean_delta: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeltaReport {
    /// Records having both a delay and a time delta.
    pub considered: usize,
    pub enough_by_channel: BTreeMap<String, usize>,
    pub not_enough_by_channel: BTreeMap<String, usize>,
    pub enough_mean_time_delta: Option<f64>,
    pub shortfall_by_channel: BTreeMap<String, ShortfallStats>,
}

/// `time_delta - delay`, when both are known.
pub fn slack(record: &Record) -> Option<f64> {
    Some(record.time_delta()? - record.delay()?)
}

impl DeltaReport {
    pub fn from_records(records: &[Record]) -> Self {
        let mut report = DeltaReport::default();
        let mut enough_deltas = Vec::new();
        let mut shortfalls: BTreeMap<String, (Vec<f64>, Vec<f64>)> = BTreeMap::new();

        for record in records {
            let (Some(time_delta), Some(delta)) = (record.time_delta(), slack(record)) else {
                continue;
            };
            report.considered += 1;
            let channel = record.checkin_type.clone();

            if delta >= 0.0 {
                enough_deltas.push(time_delta);
                *report.enough_by_channel.entry(channel).or_default() += 1;
            } else {
                let entry = shortfalls.entry(channel.clone()).or_default();
                entry.0.push(time_delta);
                entry.1.push(delta);
                *report.not_enough_by_channel.entry(channel).or_default() += 1;
            }
        }

        report.enough_mean_time_delta = stats::mean(&enough_deltas);
        report.shortfall_by_channel = shortfalls
            .into_iter()
            .map(|(channel, (time_deltas, deltas))| {
                (
                    channel,
                    ShortfallStats {
                        count: deltas.len(),
                        mean_time_delta: stats::mean(&time_deltas),
                        mean_delta: stats::mean(&deltas),
                    },
                )
            })
            .collect();
        report
    }
}
