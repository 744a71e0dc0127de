//! Outlier-trimmed delay statistics used to recommend a booking buffer.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::records::Record;
use crate::stats;

/// How many standard deviations above the mean a delay may reach before it
/// is treated as an outlier.
pub const OUTLIER_SIGMAS: f64 = 3.0;

/// Delay statistics over the late drivers of one population.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdEstimate {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub count: usize,
}

impl ThresholdEstimate {
    fn from_delays(delays: &[f64]) -> Self {
        ThresholdEstimate {
            mean: stats::mean(delays),
            median: stats::median(delays),
            count: delays.len(),
        }
    }
}

/// Channel chosen as the basis for the buffer, and the buffer itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub channel: String,
    pub threshold_minutes: f64,
    pub deviation_from_global: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdReport {
    pub population_mean: Option<f64>,
    pub population_std: Option<f64>,
    /// Exclusive upper bound on delays kept as late drivers.
    pub upper_bound: Option<f64>,
    pub global: ThresholdEstimate,
    pub channels: BTreeMap<String, ThresholdEstimate>,
    pub recommended: Option<Recommendation>,
}

/// Records with `0 < delay < μ + 3σ`, where μ and σ come from every record
/// that has a delay. The bounds are computed once from the untrimmed set.
pub fn late_drivers(records: &[Record]) -> (Vec<&Record>, Option<f64>) {
    let delays: Vec<f64> = records.iter().filter_map(Record::delay).collect();
    let upper = match (stats::mean(&delays), stats::sample_std(&delays)) {
        (Some(mean), Some(std)) => Some(mean + OUTLIER_SIGMAS * std),
        _ => None,
    };

    let kept = match upper {
        Some(bound) => records
            .iter()
            .filter(|r| r.delay().is_some_and(|d| d > 0.0 && d < bound))
            .collect(),
        None => Vec::new(),
    };
    (kept, upper)
}

/// Per-channel trimmed statistics plus a global entry.
///
/// The recommended channel is the one among `channels_of_interest` whose
/// median sits furthest from the global median.
pub fn estimate<S: AsRef<str>>(records: &[Record], channels_of_interest: &[S]) -> ThresholdReport {
    let delays: Vec<f64> = records.iter().filter_map(Record::delay).collect();
    let (late, upper_bound) = late_drivers(records);

    let late_delays: Vec<f64> = late.iter().filter_map(|r| r.delay()).collect();
    let global = ThresholdEstimate::from_delays(&late_delays);

    let mut per_channel: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in &late {
        if let Some(d) = record.delay() {
            per_channel
                .entry(record.checkin_type.clone())
                .or_default()
                .push(d);
        }
    }
    let channels: BTreeMap<String, ThresholdEstimate> = per_channel
        .into_iter()
        .map(|(channel, values)| (channel, ThresholdEstimate::from_delays(&values)))
        .collect();

    let recommended = recommend(&global, &channels, channels_of_interest);
    debug!(
        late_drivers = late.len(),
        upper_bound,
        recommended = recommended.as_ref().map(|r| r.channel.as_str()),
        "Threshold estimated"
    );

    ThresholdReport {
        population_mean: stats::mean(&delays),
        population_std: stats::sample_std(&delays),
        upper_bound,
        global,
        channels,
        recommended,
    }
}

fn recommend<S: AsRef<str>>(
    global: &ThresholdEstimate,
    channels: &BTreeMap<String, ThresholdEstimate>,
    channels_of_interest: &[S],
) -> Option<Recommendation> {
    let global_median = global.median?;
    channels_of_interest
        .iter()
        .filter_map(|name| {
            let name = name.as_ref();
            let median = channels.get(name)?.median?;
            Some(Recommendation {
                channel: name.to_string(),
                threshold_minutes: median,
                deviation_from_global: (median - global_median).abs(),
            })
        })
        .fold(None, |best: Option<Recommendation>, candidate| match best {
            Some(b) if b.deviation_from_global >= candidate.deviation_from_global => Some(b),
            _ => Some(candidate),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RentalState;

    fn record(channel: &str, delay: Option<f64>) -> Record {
        Record {
            rental_id: 0,
            car_id: None,
            checkin_type: channel.to_string(),
            state: RentalState::Ended,
            delay_at_checkout_in_minutes: delay,
            previous_ended_rental_id: None,
            time_delta_with_previous_rental_in_minutes: None,
        }
    }

    fn sample() -> Vec<Record> {
        let mut records = vec![
            record("mobile", Some(-10.0)),
            record("mobile", Some(0.0)),
            record("mobile", Some(20.0)),
            record("mobile", Some(60.0)),
            record("mobile", Some(100.0)),
            record("connect", Some(-30.0)),
            record("connect", Some(10.0)),
            record("connect", Some(20.0)),
            record("connect", None),
        ];
        // a single extreme outlier among many ordinary delays
        for _ in 0..20 {
            records.push(record("connect", Some(5.0)));
        }
        records.push(record("mobile", Some(10_000.0)));
        records
    }

    #[test]
    fn test_late_drivers_excludes_non_positive_and_outliers() {
        let records = sample();
        let (late, upper) = late_drivers(&records);
        let bound = upper.unwrap();

        assert!(bound < 10_000.0);
        assert!(late.iter().all(|r| r.delay().unwrap() > 0.0));
        assert!(late.iter().all(|r| r.delay().unwrap() < bound));
        assert_eq!(late.len(), 25);
    }

    #[test]
    fn test_bounds_come_from_untrimmed_population() {
        let records = sample();
        let delays: Vec<f64> = records.iter().filter_map(Record::delay).collect();
        let expected = stats::mean(&delays).unwrap() + 3.0 * stats::sample_std(&delays).unwrap();

        let report = estimate(&records, &["mobile", "connect"]);
        assert_eq!(report.upper_bound, Some(expected));
    }

    #[test]
    fn test_per_channel_statistics() {
        let report = estimate(&sample(), &["mobile", "connect"]);

        let mobile = &report.channels["mobile"];
        assert_eq!(mobile.count, 3);
        assert_eq!(mobile.median, Some(60.0));
        assert_eq!(mobile.mean, Some(60.0));

        let connect = &report.channels["connect"];
        assert_eq!(connect.count, 22);
        assert_eq!(connect.median, Some(5.0));

        assert_eq!(report.global.count, 25);
        assert_eq!(report.global.median, Some(5.0));
    }

    #[test]
    fn test_recommendation_picks_largest_deviation() {
        let report = estimate(&sample(), &["mobile", "connect"]);
        let rec = report.recommended.unwrap();
        assert_eq!(rec.channel, "mobile");
        assert_eq!(rec.threshold_minutes, 60.0);
        assert_eq!(rec.deviation_from_global, 55.0);
    }

    #[test]
    fn test_no_recommendation_without_data() {
        let report = estimate::<&str>(&[], &["mobile"]);
        assert!(report.recommended.is_none());
        assert_eq!(report.global.count, 0);
        assert!(report.upper_bound.is_none());
    }
}
