//! Service timing
//!
//! Intervals are configured as `<int>{m|h|d}` (`m` minutes, `h` hours,
//! anything else days). The timer answers one question per run type: is a
//! service due now? A malformed interval yields "not due for one hour"
//! rather than firing immediately.

use chrono::{DateTime, Duration, Utc};
use log::warn;

use super::service_tracker::ServiceTracker;

/// Parse an interval string into a duration
///
/// `"15m"` → 15 minutes, `"2h"` → 2 hours, `"1d"` or a bare `"1"` → days.
/// Malformed input falls back to one hour.
#[must_use]
pub fn parse_interval(spec: &str) -> Duration {
    let spec = spec.trim();
    let (amount_str, unit) = match spec.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&spec[..spec.len() - 1], c.to_ascii_lowercase()),
        _ => (spec, 'd'),
    };
    let Ok(amount) = amount_str.parse::<i64>() else {
        warn!("Malformed service interval '{spec}'; treating as not due for one hour");
        return Duration::hours(1);
    };
    if amount <= 0 {
        warn!("Non-positive service interval '{spec}'; treating as not due for one hour");
        return Duration::hours(1);
    }
    match unit {
        'm' => Duration::minutes(amount),
        'h' => Duration::hours(amount),
        _ => Duration::days(amount),
    }
}

/// Decides when full and incremental services are due
#[derive(Debug, Clone)]
pub struct ServiceTimer {
    full_interval: Duration,
    incremental_interval: Duration,
}

impl ServiceTimer {
    #[must_use]
    pub fn new(full_spec: &str, incremental_spec: &str) -> Self {
        Self {
            full_interval: parse_interval(full_spec),
            incremental_interval: parse_interval(incremental_spec),
        }
    }

    /// True on the first-ever run or once the full interval has elapsed
    #[must_use]
    pub fn is_time_for_full_service(&self, tracker: &ServiceTracker, now: DateTime<Utc>) -> bool {
        if tracker.is_first_run() {
            return true;
        }
        match tracker.last_full() {
            Some(last) => now > last + self.full_interval,
            None => true,
        }
    }

    /// True once the incremental interval has elapsed
    #[must_use]
    pub fn is_time_for_incremental_service(
        &self,
        tracker: &ServiceTracker,
        now: DateTime<Utc>,
    ) -> bool {
        match tracker.last_incremental() {
            Some(last) => now > last + self.incremental_interval,
            None => !tracker.is_first_run(),
        }
    }

    /// Pick the crawl type for this run; full wins when both are due,
    /// `None` when neither is
    #[must_use]
    pub fn due_crawl_type(
        &self,
        tracker: &ServiceTracker,
        now: DateTime<Utc>,
    ) -> Option<super::CrawlType> {
        if self.is_time_for_full_service(tracker, now) {
            Some(super::CrawlType::Full)
        } else if self.is_time_for_incremental_service(tracker, now) {
            Some(super::CrawlType::Incremental)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::CrawlType;

    #[test]
    fn interval_units_parse() {
        assert_eq!(parse_interval("15m"), Duration::minutes(15));
        assert_eq!(parse_interval("2h"), Duration::hours(2));
        assert_eq!(parse_interval("1d"), Duration::days(1));
        assert_eq!(parse_interval("3"), Duration::days(3));
    }

    #[test]
    fn malformed_intervals_mean_an_hour() {
        assert_eq!(parse_interval("soon"), Duration::hours(1));
        assert_eq!(parse_interval(""), Duration::hours(1));
        assert_eq!(parse_interval("-4h"), Duration::hours(1));
        assert_eq!(parse_interval("h"), Duration::hours(1));
    }

    #[test]
    fn first_run_is_always_full() {
        let timer = ServiceTimer::new("1d", "2h");
        let tracker = ServiceTracker::default();
        let now = Utc::now();
        assert!(timer.is_time_for_full_service(&tracker, now));
        assert_eq!(timer.due_crawl_type(&tracker, now), Some(CrawlType::Full));
    }

    #[test]
    fn full_wins_when_both_due() {
        let timer = ServiceTimer::new("1d", "2h");
        let mut tracker = ServiceTracker::default();
        let now = Utc::now();
        tracker.advance_full(now - Duration::days(2));
        tracker.advance_incremental(now - Duration::hours(5));
        assert_eq!(timer.due_crawl_type(&tracker, now), Some(CrawlType::Full));
    }

    #[test]
    fn incremental_between_full_runs() {
        let timer = ServiceTimer::new("1d", "2h");
        let mut tracker = ServiceTracker::default();
        let now = Utc::now();
        tracker.advance_full(now - Duration::hours(5));
        tracker.advance_incremental(now - Duration::hours(3));
        assert_eq!(
            timer.due_crawl_type(&tracker, now),
            Some(CrawlType::Incremental)
        );
    }

    #[test]
    fn nothing_due_right_after_service() {
        let timer = ServiceTimer::new("1d", "2h");
        let mut tracker = ServiceTracker::default();
        let now = Utc::now();
        tracker.advance_full(now - Duration::minutes(10));
        tracker.advance_incremental(now - Duration::minutes(10));
        assert_eq!(timer.due_crawl_type(&tracker, now), None);
    }
}
