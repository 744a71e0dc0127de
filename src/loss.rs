//! Projected revenue impact of late returns and the cancellations they cause.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::delay::BinaryLabel;
use crate::records::{PricingRecord, Record};
use crate::stats::{self, round2};
use crate::threshold::ThresholdReport;

/// Average rental length assumed when pricing a lost booking.
pub const DEFAULT_AVG_DURATION_HOURS: f64 = 6.0;

/// Mean daily price spread over the minutes of a day.
pub fn price_per_minute(pricing: &[PricingRecord]) -> Option<f64> {
    let prices: Vec<f64> = pricing.iter().filter_map(|p| p.rental_price_per_day).collect();
    stats::mean(&prices).map(|daily| daily / 24.0 / 60.0)
}

pub fn channel_loss(count: usize, mean_delay: f64, price_per_minute: f64) -> f64 {
    count as f64 * mean_delay * price_per_minute
}

/// A canceled rental joined to the rental that preceded it on the same car.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancellationLink {
    pub canceled_rental_id: i64,
    pub previous_rental_id: i64,
    pub previous_checkin_type: String,
    pub previous_label: BinaryLabel,
}

/// Joins each canceled record with a previous rental reference to that
/// previous record. References with no matching record are dropped.
pub fn cancellation_links(records: &[Record]) -> Vec<CancellationLink> {
    let by_id: HashMap<i64, &Record> = records.iter().map(|r| (r.rental_id, r)).collect();

    records
        .iter()
        .filter(|r| r.is_canceled())
        .filter_map(|canceled| {
            let previous_id = canceled.previous_ended_rental_id?;
            let previous = by_id.get(&previous_id)?;
            Some(CancellationLink {
                canceled_rental_id: canceled.rental_id,
                previous_rental_id: previous_id,
                previous_checkin_type: previous.checkin_type.clone(),
                previous_label: previous.late_label(),
            })
        })
        .collect()
}

/// Count of links per previous channel and previous label, NA excluded.
pub fn link_breakdown(links: &[CancellationLink]) -> BTreeMap<String, BTreeMap<BinaryLabel, usize>> {
    let mut out: BTreeMap<String, BTreeMap<BinaryLabel, usize>> = BTreeMap::new();
    for link in links {
        if link.previous_label == BinaryLabel::NotApplicable {
            continue;
        }
        *out.entry(link.previous_checkin_type.clone())
            .or_default()
            .entry(link.previous_label)
            .or_default() += 1;
    }
    out
}

pub fn cancellation_loss(avg_duration_hours: f64, price_per_minute: f64, late_previous: usize) -> f64 {
    avg_duration_hours * 60.0 * price_per_minute * late_previous as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelLoss {
    pub count: usize,
    pub mean_delay: f64,
    pub loss: f64,
}

/// Full-precision money figures; see [`LossReport::rounded`] for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LossReport {
    pub price_per_minute: f64,
    pub avg_duration_hours: f64,
    pub channels: BTreeMap<String, ChannelLoss>,
    pub canceled_after_late: usize,
    pub cancellation_loss: f64,
    pub global_loss: f64,
}

impl LossReport {
    /// Combines the late-driver statistics with a price rate.
    pub fn build(
        thresholds: &ThresholdReport,
        links: &[CancellationLink],
        price_per_minute: f64,
        avg_duration_hours: f64,
    ) -> Self {
        let channels: BTreeMap<String, ChannelLoss> = thresholds
            .channels
            .iter()
            .filter_map(|(name, est)| {
                let mean_delay = est.mean?;
                Some((
                    name.clone(),
                    ChannelLoss {
                        count: est.count,
                        mean_delay,
                        loss: channel_loss(est.count, mean_delay, price_per_minute),
                    },
                ))
            })
            .collect();

        let canceled_after_late = links
            .iter()
            .filter(|l| l.previous_label == BinaryLabel::Late)
            .count();
        let cancellation =
            cancellation_loss(avg_duration_hours, price_per_minute, canceled_after_late);
        let global_loss = channels.values().map(|c| c.loss).sum::<f64>() + cancellation;

        LossReport {
            price_per_minute,
            avg_duration_hours,
            channels,
            canceled_after_late,
            cancellation_loss: cancellation,
            global_loss,
        }
    }

    /// Copy with every monetary figure rounded to two decimals.
    pub fn rounded(&self) -> Self {
        let mut out = self.clone();
        for channel in out.channels.values_mut() {
            channel.loss = round2(channel.loss);
        }
        out.cancellation_loss = round2(out.cancellation_loss);
        out.global_loss = round2(out.global_loss);
        out
    }
}
