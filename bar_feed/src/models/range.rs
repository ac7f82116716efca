//! Half-open UTC time ranges.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::tz::to_rfc3339_millis;

/// A non-empty half-open interval `[start, end)` of UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Returns `None` unless `start < end`.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    /// True when `other` lies entirely inside `self`.
    pub fn covers(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        Self::between(self.start.max(other.start), self.end.min(other.end))
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            to_rfc3339_millis(self.start),
            to_rfc3339_millis(self.end)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 9, 5, h, 0, 0).unwrap()
    }

    #[test]
    fn empty_ranges_are_rejected() {
        assert!(TimeRange::between(at(3), at(3)).is_none());
        assert!(TimeRange::between(at(4), at(3)).is_none());
    }

    #[test]
    fn half_open_semantics() {
        let r = TimeRange::between(at(1), at(3)).unwrap();
        assert!(r.contains(at(1)));
        assert!(!r.contains(at(3)));

        let touching = TimeRange::between(at(3), at(5)).unwrap();
        assert!(!r.overlaps(&touching));
        assert!(r.intersect(&touching).is_none());

        let inner = TimeRange::between(at(2), at(5)).unwrap();
        assert_eq!(
            r.intersect(&inner),
            TimeRange::between(at(2), at(3))
        );
    }

    #[test]
    fn displays_as_rfc3339() {
        let r = TimeRange::between(at(1), at(3)).unwrap();
        assert_eq!(
            r.to_string(),
            "[2017-09-05T01:00:00.000Z, 2017-09-05T03:00:00.000Z)"
        );
    }
}
