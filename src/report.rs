//! Dashboard aggregates over the delay records and the pricing table.
//!
//! [`DashboardReport::build`] runs the whole pipeline once: classification,
//! proportions, trimmed threshold statistics, the time-delta check, and the
//! money-loss projection. Rendering is left to whoever consumes the report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::delay::{BinaryLabel, BucketCounts};
use crate::delta::DeltaReport;
use crate::loss::{self, DEFAULT_AVG_DURATION_HOURS, LossReport};
use crate::records::{PricingRecord, Record, RentalState};
use crate::stats::{self, pct, round2};
use crate::threshold::{self, ThresholdReport};

#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Channels considered when picking the recommended threshold.
    pub channels_of_interest: Vec<String>,
    pub avg_duration_hours: f64,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            channels_of_interest: vec!["mobile".to_string(), "connect".to_string()],
            avg_duration_hours: DEFAULT_AVG_DURATION_HOURS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub generated_at: DateTime<Utc>,
    pub total_records: usize,

    // delays, on-time returns included
    pub mean_delay: Option<f64>,
    pub median_delay: Option<f64>,

    pub late_counts: BTreeMap<BinaryLabel, usize>,
    pub checkin_counts: BTreeMap<String, usize>,
    pub state_counts: BTreeMap<RentalState, usize>,
    pub canceled_count: usize,
    /// Fraction of all records that were canceled.
    pub cancellation_share: f64,

    // percent within each channel
    pub late_share_by_channel: BTreeMap<String, BTreeMap<BinaryLabel, f64>>,
    pub state_share_by_channel: BTreeMap<String, BTreeMap<RentalState, f64>>,

    pub buckets: BucketCounts,
    pub canceled_previous: BTreeMap<String, BTreeMap<BinaryLabel, usize>>,
    pub thresholds: ThresholdReport,
    pub delta: DeltaReport,
    pub loss: Option<LossReport>,
}

/// One line of the report history CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub generated_at: DateTime<Utc>,
    pub total_records: usize,
    pub late_records: usize,
    pub canceled_records: usize,
    pub recommended_channel: Option<String>,
    pub threshold_minutes: Option<f64>,
    pub global_loss: Option<f64>,
}

fn count_by<K: Ord, T>(items: &[T], key: impl Fn(&T) -> K) -> BTreeMap<K, usize> {
    let mut out = BTreeMap::new();
    for item in items {
        *out.entry(key(item)).or_default() += 1;
    }
    out
}

/// Percent of each `label` within each channel.
fn share_by_channel<K: Ord + Copy>(
    records: &[&Record],
    label: impl Fn(&Record) -> K,
) -> BTreeMap<String, BTreeMap<K, f64>> {
    let mut counts: BTreeMap<String, BTreeMap<K, usize>> = BTreeMap::new();
    for &record in records {
        *counts
            .entry(record.checkin_type.clone())
            .or_default()
            .entry(label(record))
            .or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(channel, by_label)| {
            let total: usize = by_label.values().sum();
            let shares = by_label
                .into_iter()
                .map(|(k, n)| (k, pct(n, total)))
                .collect();
            (channel, shares)
        })
        .collect()
}

impl DashboardReport {
    pub fn build(delays: &[Record], pricing: &[PricingRecord], options: &ReportOptions) -> Self {
        let all_delays: Vec<f64> = delays.iter().filter_map(Record::delay).collect();

        let late_counts = count_by(delays, Record::late_label)
            .into_iter()
            .filter(|(label, _)| *label != BinaryLabel::NotApplicable)
            .collect();
        let state_counts = count_by(delays, |r| r.state);
        let canceled_count = state_counts.get(&RentalState::Canceled).copied().unwrap_or(0);

        let with_label: Vec<&Record> = delays
            .iter()
            .filter(|r| r.late_label() != BinaryLabel::NotApplicable)
            .collect();
        let everyone: Vec<&Record> = delays.iter().collect();

        let links = loss::cancellation_links(delays);
        let thresholds = threshold::estimate(delays, &options.channels_of_interest);
        let loss = loss::price_per_minute(pricing).map(|ppm| {
            LossReport::build(&thresholds, &links, ppm, options.avg_duration_hours)
        });

        DashboardReport {
            generated_at: Utc::now(),
            total_records: delays.len(),
            mean_delay: stats::mean(&all_delays),
            median_delay: stats::median(&all_delays),
            late_counts,
            checkin_counts: count_by(delays, |r| r.checkin_type.clone()),
            state_counts,
            canceled_count,
            cancellation_share: if delays.is_empty() {
                0.0
            } else {
                canceled_count as f64 / delays.len() as f64
            },
            late_share_by_channel: share_by_channel(&with_label, Record::late_label),
            state_share_by_channel: share_by_channel(&everyone, |r| r.state),
            buckets: BucketCounts::from_records(delays),
            canceled_previous: loss::link_breakdown(&links),
            thresholds,
            delta: DeltaReport::from_records(delays),
            loss,
        }
    }

    pub fn late_records(&self) -> usize {
        self.late_counts.get(&BinaryLabel::Late).copied().unwrap_or(0)
    }

    pub fn summary(&self) -> SummaryRow {
        let recommended = self.thresholds.recommended.as_ref();
        SummaryRow {
            generated_at: self.generated_at,
            total_records: self.total_records,
            late_records: self.late_records(),
            canceled_records: self.canceled_count,
            recommended_channel: recommended.map(|r| r.channel.clone()),
            threshold_minutes: recommended.map(|r| r.threshold_minutes),
            global_loss: self.loss.as_ref().map(|l| round2(l.global_loss)),
        }
    }

    /// Narrative sentences with figures rounded for display.
    pub fn narrative(&self) -> Vec<String> {
        let fmt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |x| round2(x).to_string());
        let mut lines = Vec::new();

        lines.push(format!(
            "Average delay (including people on time) is {} minutes, and median is {} minutes.",
            fmt(self.mean_delay),
            fmt(self.median_delay)
        ));

        if let Some((channel, n)) = self.checkin_counts.iter().max_by_key(|(_, n)| **n) {
            lines.push(format!(
                "The biggest part of checkin is {channel}. It represents {n} reservations."
            ));
        }

        lines.push(format!(
            "{} of reservations are canceled. It represents {} reservations.",
            round2(self.cancellation_share),
            self.canceled_count
        ));

        for (channel, shares) in &self.late_share_by_channel {
            let late = shares.get(&BinaryLabel::Late).copied().unwrap_or(0.0);
            lines.push(format!(
                "{} percent of {channel} checkins are late.",
                round2(late)
            ));
        }

        let late_total = self.buckets.total();
        if late_total > 0 {
            lines.push(format!(
                "{} percent of delays are under 2h.",
                round2(pct(self.buckets.under_two_hours(), late_total))
            ));
        }

        lines.push(format!(
            "Mean time delta when it absorbed the delay is {} minutes.",
            fmt(self.delta.enough_mean_time_delta)
        ));
        for (channel, s) in &self.delta.shortfall_by_channel {
            lines.push(format!(
                "Time delta mean for late {channel} checkin is {} minutes, and the total delta is {} minutes.",
                fmt(s.mean_time_delta),
                fmt(s.mean_delta)
            ));
        }

        lines.push(format!(
            "Global median is {} minutes.",
            fmt(self.thresholds.global.median)
        ));
        for (channel, est) in &self.thresholds.channels {
            lines.push(format!(
                "Median for {channel} checkin is {} minutes.",
                fmt(est.median)
            ));
        }
        if let Some(rec) = &self.thresholds.recommended {
            lines.push(format!(
                "Median for {} checkin is {} minutes, and it is the threshold we should apply.",
                rec.channel,
                round2(rec.threshold_minutes)
            ));
        }

        if let Some(loss) = &self.loss {
            let shown = loss.rounded();
            for (channel, c) in &shown.channels {
                lines.push(format!(
                    "For {channel} checkin, the money loss is about {} $ for {} delays concerned.",
                    c.loss, c.count
                ));
            }
            lines.push(format!(
                "With a {}h average rental, cancellations after a late return add {} $ of loss.",
                shown.avg_duration_hours, shown.cancellation_loss
            ));
            lines.push(format!(
                "Global money loss without threshold is around {} $.",
                shown.global_loss
            ));
        }

        lines
    }
}
