//! Labels derived from the checkout delay.
//!
//! The two classifiers disagree at exactly zero minutes: the binary one calls
//! it on time, the bucketed one calls it the start of `late -30min`. Both
//! readings feed the dashboard figures, so the boundary is kept as is.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::records::Record;

/// Late / on time, with `NotApplicable` for a missing delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryLabel {
    OnTime,
    Late,
    NotApplicable,
}

impl BinaryLabel {
    pub fn label(&self) -> &'static str {
        match self {
            BinaryLabel::OnTime => "on time",
            BinaryLabel::Late => "late",
            BinaryLabel::NotApplicable => "NA",
        }
    }
}

impl fmt::Display for BinaryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Delay severity, ordered from early to very late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayBucket {
    OnTime,
    LateUnder30m,
    LateUnder1h,
    LateUnder2h,
    LateUnder4h,
    LateOver4h,
    NotApplicable,
}

impl DelayBucket {
    /// Buckets that count as late, in severity order.
    pub const LATE: [DelayBucket; 5] = [
        DelayBucket::LateUnder30m,
        DelayBucket::LateUnder1h,
        DelayBucket::LateUnder2h,
        DelayBucket::LateUnder4h,
        DelayBucket::LateOver4h,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DelayBucket::OnTime => "on time",
            DelayBucket::LateUnder30m => "late -30min",
            DelayBucket::LateUnder1h => "late -1h",
            DelayBucket::LateUnder2h => "late -2h",
            DelayBucket::LateUnder4h => "late -4h",
            DelayBucket::LateOver4h => "late +4h",
            DelayBucket::NotApplicable => "NA",
        }
    }

    pub fn is_late(&self) -> bool {
        !matches!(self, DelayBucket::OnTime | DelayBucket::NotApplicable)
    }
}

impl fmt::Display for DelayBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn classify_binary(delay: Option<f64>) -> BinaryLabel {
    match delay {
        None => BinaryLabel::NotApplicable,
        Some(d) if d <= 0.0 => BinaryLabel::OnTime,
        Some(_) => BinaryLabel::Late,
    }
}

pub fn classify_bucket(delay: Option<f64>) -> DelayBucket {
    match delay {
        None => DelayBucket::NotApplicable,
        Some(d) if d < 0.0 => DelayBucket::OnTime,
        Some(d) if d < 30.0 => DelayBucket::LateUnder30m,
        Some(d) if d < 60.0 => DelayBucket::LateUnder1h,
        Some(d) if d < 120.0 => DelayBucket::LateUnder2h,
        Some(d) if d < 240.0 => DelayBucket::LateUnder4h,
        Some(_) => DelayBucket::LateOver4h,
    }
}

/// Late-bucket histogram, overall and per checkin channel.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BucketCounts {
    pub overall: BTreeMap<DelayBucket, usize>,
    pub by_channel: BTreeMap<String, BTreeMap<DelayBucket, usize>>,
}

impl BucketCounts {
    /// Counts late buckets only; on-time and missing delays are left out.
    pub fn from_records(records: &[Record]) -> Self {
        let mut counts = BucketCounts::default();
        for record in records {
            let bucket = classify_bucket(record.delay());
            if !bucket.is_late() {
                continue;
            }
            *counts.overall.entry(bucket).or_default() += 1;
            *counts
                .by_channel
                .entry(record.checkin_type.clone())
                .or_default()
                .entry(bucket)
                .or_default() += 1;
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.overall.values().sum()
    }

    /// Late records that came back within two hours.
    pub fn under_two_hours(&self) -> usize {
        [
            DelayBucket::LateUnder30m,
            DelayBucket::LateUnder1h,
            DelayBucket::LateUnder2h,
        ]
        .iter()
        .filter_map(|b| self.overall.get(b))
        .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RentalState;

    fn record(channel: &str, delay: Option<f64>) -> Record {
        Record {
            rental_id: 1,
            car_id: None,
            checkin_type: channel.to_string(),
            state: RentalState::Ended,
            delay_at_checkout_in_minutes: delay,
            previous_ended_rental_id: None,
            time_delta_with_previous_rental_in_minutes: None,
        }
    }

    #[test]
    fn test_zero_delay_asymmetry() {
        assert_eq!(classify_binary(Some(0.0)), BinaryLabel::OnTime);
        assert_eq!(classify_bucket(Some(0.0)), DelayBucket::LateUnder30m);
    }

    #[test]
    fn test_absent_delay_is_not_applicable() {
        assert_eq!(classify_binary(None), BinaryLabel::NotApplicable);
        assert_eq!(classify_bucket(None), DelayBucket::NotApplicable);
    }

    #[test]
    fn test_bucket_scenario() {
        let delays = [-5.0, 0.0, 15.0, 45.0, 90.0, 300.0];
        let buckets: Vec<_> = delays.iter().map(|d| classify_bucket(Some(*d))).collect();
        assert_eq!(
            buckets,
            vec![
                DelayBucket::OnTime,
                DelayBucket::LateUnder30m,
                DelayBucket::LateUnder30m,
                DelayBucket::LateUnder1h,
                DelayBucket::LateUnder2h,
                DelayBucket::LateOver4h,
            ]
        );
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(classify_bucket(Some(29.9)), DelayBucket::LateUnder30m);
        assert_eq!(classify_bucket(Some(30.0)), DelayBucket::LateUnder1h);
        assert_eq!(classify_bucket(Some(60.0)), DelayBucket::LateUnder2h);
        assert_eq!(classify_bucket(Some(120.0)), DelayBucket::LateUnder4h);
        assert_eq!(classify_bucket(Some(239.0)), DelayBucket::LateUnder4h);
        assert_eq!(classify_bucket(Some(240.0)), DelayBucket::LateOver4h);
    }

    #[test]
    fn test_buckets_are_monotonic() {
        let mut previous = classify_bucket(Some(-1000.0));
        for d in -1000..2000 {
            let current = classify_bucket(Some(f64::from(d)));
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(BinaryLabel::NotApplicable.to_string(), "NA");
        assert_eq!(DelayBucket::LateOver4h.to_string(), "late +4h");
    }

    #[test]
    fn test_bucket_counts_skip_on_time_and_missing() {
        let records = vec![
            record("mobile", Some(-3.0)),
            record("mobile", Some(0.0)),
            record("mobile", Some(70.0)),
            record("connect", Some(300.0)),
            record("connect", None),
        ];
        let counts = BucketCounts::from_records(&records);

        assert_eq!(counts.total(), 3);
        assert_eq!(counts.under_two_hours(), 2);
        assert_eq!(counts.by_channel["connect"][&DelayBucket::LateOver4h], 1);
        assert_eq!(counts.by_channel["mobile"].len(), 2);
    }
}
