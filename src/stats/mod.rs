//! Shared reporting arithmetic.
//!
//! Every statistics endpoint goes through this module for period-over-period
//! growth and calendar bucketing; none of that arithmetic lives inline in
//! handlers.

use chrono::{Datelike, Duration, Months, NaiveDate};
use rust_decimal::Decimal;

/// Period-over-period growth, as a percentage rounded to 2 decimal places.
///
/// A zero prior-period denominator yields 0 rather than NaN/infinity.
pub fn percent_change(current: Decimal, previous: Decimal) -> Decimal {
    if previous.is_zero() {
        return Decimal::ZERO;
    }
    ((current - previous) / previous * Decimal::ONE_HUNDRED).round_dp(2)
}

/// Share of `part` in `whole` as a percentage rounded to 2 decimal places;
/// 0 when `whole` is zero.
pub fn ratio_pct(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    (part / whole * Decimal::ONE_HUNDRED).round_dp(2)
}

/// Reporting bucket width for time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Daily,
    Monthly,
    Yearly,
}

impl Granularity {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Granularity::Daily),
            "monthly" => Some(Granularity::Monthly),
            "yearly" => Some(Granularity::Yearly),
            _ => None,
        }
    }

    /// Argument for Postgres `date_trunc` matching this bucket width.
    pub fn date_trunc_arg(&self) -> &'static str {
        match self {
            Granularity::Daily => "day",
            Granularity::Monthly => "month",
            Granularity::Yearly => "year",
        }
    }

    /// First day of the bucket containing `date`.
    pub fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Daily => date,
            Granularity::Monthly => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
                .expect("first of month is always valid"),
            Granularity::Yearly => {
                NaiveDate::from_ymd_opt(date.year(), 1, 1).expect("jan 1 is always valid")
            }
        }
    }

    /// First day of the bucket after `bucket`.
    pub fn next_bucket(&self, bucket: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Daily => bucket + Duration::days(1),
            Granularity::Monthly => bucket + Months::new(1),
            Granularity::Yearly => bucket + Months::new(12),
        }
    }

    /// Bucket label: `2025-03-14` / `2025-03` / `2025`.
    pub fn label(&self, bucket: NaiveDate) -> String {
        match self {
            Granularity::Daily => bucket.format("%Y-%m-%d").to_string(),
            Granularity::Monthly => bucket.format("%Y-%m").to_string(),
            Granularity::Yearly => bucket.format("%Y").to_string(),
        }
    }
}

/// Inclusive calendar date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a window; `end` must not precede `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        if end < start {
            return None;
        }
        Some(Self { start, end })
    }

    /// The trailing N-day window ending today.
    pub fn trailing_days(today: NaiveDate, days: i64) -> Self {
        Self {
            start: today - Duration::days(days.max(1) - 1),
            end: today,
        }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// The window of equal day-length immediately preceding this one; used
    /// as the comparison period for growth figures.
    pub fn previous(&self) -> Self {
        let len = self.days();
        Self {
            start: self.start - Duration::days(len),
            end: self.start - Duration::days(1),
        }
    }

    /// Bucket starts covering the whole range, in ascending order.
    pub fn buckets(&self, granularity: Granularity) -> Vec<NaiveDate> {
        let mut buckets = vec![];
        let mut cursor = granularity.bucket_start(self.start);
        while cursor <= self.end {
            buckets.push(cursor);
            cursor = granularity.next_bucket(cursor);
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(v: f64) -> Decimal {
        Decimal::from_f64(v).unwrap()
    }

    #[test]
    fn percent_change_zero_denominator_is_zero() {
        assert_eq!(percent_change(dec(150.0), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percent_change(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn percent_change_growth_and_decline() {
        assert_eq!(percent_change(dec(150.0), dec(100.0)), dec(50.0));
        assert_eq!(percent_change(dec(75.0), dec(100.0)), dec(-25.0));
        assert_eq!(percent_change(dec(100.0), dec(100.0)), Decimal::ZERO);
    }

    #[test]
    fn percent_change_rounds_to_two_places() {
        // 1/3 growth -> 33.33…%
        assert_eq!(percent_change(dec(4.0), dec(3.0)), dec(33.33));
    }

    #[test]
    fn ratio_pct_guards_zero_whole() {
        assert_eq!(ratio_pct(dec(3.0), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(ratio_pct(dec(1.0), dec(3.0)), dec(33.33));
        assert_eq!(ratio_pct(dec(3.0), dec(4.0)), dec(75.0));
    }

    #[test]
    fn monthly_buckets_cover_partial_months() {
        let range = DateRange::new(date(2025, 1, 15), date(2025, 3, 2)).unwrap();
        assert_eq!(
            range.buckets(Granularity::Monthly),
            vec![date(2025, 1, 1), date(2025, 2, 1), date(2025, 3, 1)]
        );
    }

    #[test]
    fn daily_buckets_handle_month_boundaries() {
        let range = DateRange::new(date(2024, 2, 28), date(2024, 3, 1)).unwrap();
        // 2024 is a leap year
        assert_eq!(
            range.buckets(Granularity::Daily),
            vec![date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]
        );
    }

    #[test]
    fn yearly_buckets_and_labels() {
        let range = DateRange::new(date(2023, 6, 1), date(2025, 2, 1)).unwrap();
        let buckets = range.buckets(Granularity::Yearly);
        assert_eq!(buckets, vec![date(2023, 1, 1), date(2024, 1, 1), date(2025, 1, 1)]);
        assert_eq!(Granularity::Yearly.label(buckets[0]), "2023");
        assert_eq!(Granularity::Monthly.label(date(2025, 3, 1)), "2025-03");
        assert_eq!(Granularity::Daily.label(date(2025, 3, 14)), "2025-03-14");
    }

    #[test]
    fn previous_window_has_equal_length() {
        let range = DateRange::new(date(2025, 3, 1), date(2025, 3, 31)).unwrap();
        let prev = range.previous();
        assert_eq!(prev.days(), range.days());
        assert_eq!(prev.end, date(2025, 2, 28));
        assert_eq!(prev.start, date(2025, 1, 29));
    }

    #[test]
    fn range_rejects_inverted_bounds() {
        assert!(DateRange::new(date(2025, 2, 1), date(2025, 1, 1)).is_none());
    }

    #[test]
    fn trailing_days_is_inclusive_of_today() {
        let range = DateRange::trailing_days(date(2025, 3, 30), 30);
        assert_eq!(range.days(), 30);
        assert_eq!(range.start, date(2025, 3, 1));
    }
}
