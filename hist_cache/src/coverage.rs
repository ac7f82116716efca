//! Coverage catalogs: which parts of a series are already stored.
//!
//! A [`Coverage`] is a sorted list of disjoint, non-adjacent half-open UTC
//! ranges. Inserting a range merges it with everything it overlaps or
//! touches, so `[a, b) + [b, c)` is stored as `[a, c)`.

use std::fmt;

use bar_feed::{
    BarRow, BarSize, BarUnit, RequestError, TimeRange,
    tz::{local_date, local_midnight},
};
use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use chrono_tz::Tz;

/// Disjoint set of covered ranges for one series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coverage {
    ranges: Vec<TimeRange>,
}

impl Coverage {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the union of `ranges`.
    pub fn from_ranges<I>(ranges: I) -> Self
    where
        I: IntoIterator<Item = TimeRange>,
    {
        let mut cov = Self::new();
        for r in ranges {
            cov.insert(r);
        }
        cov
    }

    /// Ranges in ascending order.
    pub fn ranges(&self) -> &[TimeRange] {
        &self.ranges
    }

    /// True when nothing is covered.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Adds `range`, merging overlapping and adjacent entries.
    pub fn insert(&mut self, range: TimeRange) {
        let mut start = range.start();
        let mut end = range.end();
        // entries strictly before and strictly after the merged span survive
        let first = self.ranges.partition_point(|r| r.end() < start);
        let last = self.ranges.partition_point(|r| r.start() <= end);
        if first < last {
            start = start.min(self.ranges[first].start());
            end = end.max(self.ranges[last - 1].end());
        }
        let merged = TimeRange::between(start, end).unwrap_or(range);
        self.ranges.splice(first..last, [merged]);
    }

    /// Union of two catalogs.
    pub fn union(&self, other: &Coverage) -> Coverage {
        let mut out = self.clone();
        for r in &other.ranges {
            out.insert(*r);
        }
        out
    }

    /// True when every instant of `range` is covered.
    pub fn covers(&self, range: &TimeRange) -> bool {
        self.ranges.iter().any(|r| r.covers(range))
    }

    /// Covered parts of `range`.
    pub fn clip(&self, range: &TimeRange) -> Vec<TimeRange> {
        self.ranges
            .iter()
            .filter_map(|r| r.intersect(range))
            .collect()
    }

    /// Uncovered parts of `range`, ascending.
    pub fn gaps(&self, range: &TimeRange) -> Vec<TimeRange> {
        let mut out = Vec::new();
        let mut cursor = range.start();
        for covered in self.clip(range) {
            if let Some(gap) = TimeRange::between(cursor, covered.start()) {
                out.push(gap);
            }
            cursor = covered.end();
        }
        out.extend(TimeRange::between(cursor, range.end()));
        out
    }

    /// Coverage implied by stored rows.
    ///
    /// An intraday row marks its whole local day in `tz` as covered. A daily,
    /// weekly or monthly row covers its bar period starting at the local
    /// midnight of its timestamp.
    pub fn derive_from_rows<'a, I>(rows: I, tz: Tz) -> Result<Coverage, RequestError>
    where
        I: IntoIterator<Item = &'a BarRow>,
    {
        Ok(Coverage::from_ranges(row_periods(rows, tz)?))
    }

    /// This catalog plus the periods implied by `rows` that no recorded range
    /// touches.
    ///
    /// A period overlapping a recorded range keeps only what was recorded, so
    /// rows from a partial-day download never stand in for their whole day.
    pub fn with_unrecorded_rows<'a, I>(&self, rows: I, tz: Tz) -> Result<Coverage, RequestError>
    where
        I: IntoIterator<Item = &'a BarRow>,
    {
        let mut out = self.clone();
        for period in row_periods(rows, tz)? {
            if self.clip(&period).is_empty() {
                out.insert(period);
            }
        }
        Ok(out)
    }
}

fn row_periods<'a, I>(rows: I, tz: Tz) -> Result<Vec<TimeRange>, RequestError>
where
    I: IntoIterator<Item = &'a BarRow>,
{
    let mut out = Vec::new();
    let mut last: Option<(NaiveDate, BarSize)> = None;
    for row in rows {
        let date = local_date(row.timestamp, tz);
        if last == Some((date, row.bar_size)) {
            continue;
        }
        last = Some((date, row.bar_size));
        out.push(bar_period(date, row.bar_size, tz)?);
    }
    Ok(out)
}

fn bar_period(date: NaiveDate, bar_size: BarSize, tz: Tz) -> Result<TimeRange, RequestError> {
    let n = bar_size.amount().get();
    let end_date = match bar_size.unit() {
        BarUnit::Second | BarUnit::Minute | BarUnit::Hour => date.checked_add_days(Days::new(1)),
        BarUnit::Day => date.checked_add_days(Days::new(u64::from(n))),
        BarUnit::Week => date.checked_add_days(Days::new(7 * u64::from(n))),
        BarUnit::Month => date.checked_add_months(Months::new(n)),
    }
    .ok_or(RequestError::OutOfRange)?;
    let start: DateTime<Utc> = local_midnight(date, tz)?;
    let end = local_midnight(end_date, tz)?;
    TimeRange::between(start, end).ok_or(RequestError::OutOfRange)
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ranges.is_empty() {
            return f.write_str("(nothing)");
        }
        for (i, r) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{r}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bar_feed::tz::parse_tz;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn h(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 9, 5, 0, 0, 0).unwrap() + chrono::Duration::hours(hour)
    }

    fn r(a: i64, b: i64) -> TimeRange {
        TimeRange::between(h(a), h(b)).unwrap()
    }

    #[test]
    fn insert_merges_overlapping_and_adjacent() {
        let mut cov = Coverage::new();
        cov.insert(r(10, 12));
        cov.insert(r(0, 2));
        cov.insert(r(5, 6));
        assert_eq!(cov.ranges(), &[r(0, 2), r(5, 6), r(10, 12)]);

        cov.insert(r(2, 5));
        assert_eq!(cov.ranges(), &[r(0, 6), r(10, 12)]);

        cov.insert(r(4, 11));
        assert_eq!(cov.ranges(), &[r(0, 12)]);
    }

    #[test]
    fn gaps_are_the_complement() {
        let cov = Coverage::from_ranges([r(2, 4), r(6, 8)]);
        assert_eq!(cov.gaps(&r(0, 10)), vec![r(0, 2), r(4, 6), r(8, 10)]);
        assert!(cov.gaps(&r(2, 4)).is_empty());
        assert_eq!(cov.gaps(&r(3, 7)), vec![r(4, 6)]);
        assert!(cov.covers(&r(6, 7)));
        assert!(!cov.covers(&r(3, 7)));
    }

    #[test]
    fn intraday_rows_cover_their_local_day() {
        let ny = parse_tz("US/Eastern").unwrap();
        let bs: BarSize = "1h".parse().unwrap();
        let rows = [
            BarRow::new("GS", bs, Utc.with_ymd_and_hms(2017, 9, 5, 13, 0, 0).unwrap()),
            BarRow::new("GS", bs, Utc.with_ymd_and_hms(2017, 9, 5, 23, 0, 0).unwrap()),
            BarRow::new("GS", bs, Utc.with_ymd_and_hms(2017, 9, 6, 14, 0, 0).unwrap()),
            BarRow::new("GS", bs, Utc.with_ymd_and_hms(2017, 9, 8, 14, 0, 0).unwrap()),
        ];
        let cov = Coverage::derive_from_rows(&rows, ny).unwrap();
        let et = |d: u32| Utc.with_ymd_and_hms(2017, 9, d, 4, 0, 0).unwrap();
        assert_eq!(
            cov.ranges(),
            &[
                TimeRange::between(et(5), et(7)).unwrap(),
                TimeRange::between(et(8), et(9)).unwrap(),
            ]
        );
    }

    #[test]
    fn monthly_rows_cover_their_month() {
        let ny = parse_tz("US/Eastern").unwrap();
        let row = BarRow::new(
            "GS",
            "1M".parse().unwrap(),
            Utc.with_ymd_and_hms(2017, 2, 1, 5, 0, 0).unwrap(),
        );
        let cov = Coverage::derive_from_rows([&row], ny).unwrap();
        assert_eq!(
            cov.ranges(),
            &[TimeRange::between(
                Utc.with_ymd_and_hms(2017, 2, 1, 5, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2017, 3, 1, 5, 0, 0).unwrap()
            )
            .unwrap()]
        );
    }

    #[test]
    fn recorded_ranges_are_not_widened_by_rows() {
        let ny = parse_tz("US/Eastern").unwrap();
        let bs: BarSize = "1h".parse().unwrap();
        let rows = [
            BarRow::new("GS", bs, Utc.with_ymd_and_hms(2017, 9, 5, 13, 0, 0).unwrap()),
            BarRow::new("GS", bs, Utc.with_ymd_and_hms(2017, 9, 6, 14, 0, 0).unwrap()),
        ];
        let et = |d: u32, hour: u32| Utc.with_ymd_and_hms(2017, 9, d, hour, 0, 0).unwrap();
        // 09:00-11:00 New York on the 5th
        let morning = TimeRange::between(et(5, 13), et(5, 15)).unwrap();
        let recorded = Coverage::from_ranges([morning]);

        let cov = recorded.with_unrecorded_rows(&rows, ny).unwrap();
        assert_eq!(
            cov.ranges(),
            &[morning, TimeRange::between(et(6, 4), et(7, 4)).unwrap()]
        );
        assert!(!cov.covers(&TimeRange::between(et(5, 4), et(6, 4)).unwrap()));
    }

    proptest! {
        #[test]
        fn insert_keeps_ranges_sorted_disjoint_and_non_adjacent(
            spans in prop::collection::vec((0i64..200, 1i64..20), 0..30)
        ) {
            let ranges: Vec<TimeRange> = spans.iter().map(|(a, len)| r(*a, a + len)).collect();
            let cov = Coverage::from_ranges(ranges.iter().copied());
            for w in cov.ranges().windows(2) {
                prop_assert!(w[0].end() < w[1].start());
            }
            for x in &ranges {
                prop_assert!(cov.covers(x));
            }
            let total: i64 = ranges.iter().map(|x| x.duration().num_hours()).sum();
            let merged: i64 = cov.ranges().iter().map(|x| x.duration().num_hours()).sum();
            prop_assert!(merged <= total);
        }
    }
}
