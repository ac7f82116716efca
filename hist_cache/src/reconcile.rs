//! Range reconciliation and download planning.
//!
//! [`reconcile`] is the pure set difference between a requested range and a
//! series' coverage catalog. [`plan_downloads`] re-expresses every gap as a
//! broker request (`duration` ending at `end`) whose resolved range contains
//! the gap, because brokers fetch by lookback rather than by explicit start.

use std::{fmt, num::NonZeroU32};

use bar_feed::{
    BarSize, HistDataReq, Lookback, RequestError, TimeRange, TradingCalendar,
    tz::{is_local_midnight, local_date, local_midnight},
};
use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::coverage::Coverage;

/// Split of a requested range into parts to fetch and parts already stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The range that was asked for.
    pub requested: TimeRange,
    /// Maximal uncovered sub-ranges, ascending. Gaps closer than one bar are
    /// coalesced.
    pub gaps: Vec<TimeRange>,
    /// Covered sub-ranges, ascending. Disjoint from `gaps`; together they tile
    /// `requested` exactly.
    pub satisfied: Vec<TimeRange>,
}

/// Set difference `requested - catalog`, with gaps separated by less than
/// one `bar_size` period coalesced into one.
pub fn reconcile(requested: &TimeRange, catalog: &Coverage, bar_size: BarSize) -> Reconciliation {
    let min_separation = bar_size.nominal_span();
    let mut gaps: Vec<TimeRange> = Vec::new();
    for gap in catalog.gaps(requested) {
        if let Some(last) = gaps.last_mut() {
            if gap.start() - last.end() < min_separation {
                if let Some(joined) = TimeRange::between(last.start(), gap.end()) {
                    *last = joined;
                    continue;
                }
            }
        }
        gaps.push(gap);
    }
    let satisfied = Coverage::from_ranges(gaps.iter().copied()).gaps(requested);
    Reconciliation {
        requested: *requested,
        gaps,
        satisfied,
    }
}

/// One broker call of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRequest {
    /// Request to send; same series as the parent, own window.
    pub request: HistDataReq,
    /// Range `request` resolves to. Recorded as covered after a successful
    /// download.
    pub range: TimeRange,
}

/// Everything needed to serve one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    /// The parent request.
    pub request: HistDataReq,
    /// Its resolved range.
    pub requested: TimeRange,
    /// Broker calls, ascending by range.
    pub sub_requests: Vec<SubRequest>,
    /// Parts served from storage.
    pub satisfied: Vec<TimeRange>,
    /// Gap parts with no trading day: nothing to fetch, safe to mark covered.
    pub non_trading: Vec<TimeRange>,
}

impl DownloadPlan {
    /// True when nothing has to be downloaded.
    pub fn is_fully_cached(&self) -> bool {
        self.sub_requests.is_empty()
    }
}

/// Reconciles `requested` against `catalog` and turns each gap into broker
/// requests.
///
/// Daily-or-coarser bars, and gaps bounded by local midnights, are fetched
/// as `"N d"` requests over the trading days of the gap, ending at the
/// midnight after the last one. Other intraday gaps are cut at local
/// midnights: runs of whole days follow the same rule, and each partial day
/// on a trading day becomes a `"<secs>s"` request ending where the piece ends.
pub fn plan_downloads(
    req: &HistDataReq,
    requested: TimeRange,
    catalog: &Coverage,
    calendar: &TradingCalendar,
) -> Result<DownloadPlan, RequestError> {
    let rec = reconcile(&requested, catalog, req.bar_size());

    let mut sub_requests = Vec::new();
    for gap in &rec.gaps {
        sub_requests.extend(express_gap(req, gap, calendar)?);
    }

    let downloaded = Coverage::from_ranges(sub_requests.iter().map(|s: &SubRequest| s.range));
    let non_trading = rec
        .gaps
        .iter()
        .flat_map(|gap| downloaded.gaps(gap))
        .collect();

    debug!(
        series = %req.series_key(),
        %requested,
        gaps = rec.gaps.len(),
        downloads = sub_requests.len(),
        "planned downloads"
    );

    Ok(DownloadPlan {
        request: req.clone(),
        requested,
        sub_requests,
        satisfied: rec.satisfied,
        non_trading,
    })
}

fn express_gap(
    req: &HistDataReq,
    gap: &TimeRange,
    calendar: &TradingCalendar,
) -> Result<Vec<SubRequest>, RequestError> {
    let tz = req.tz();
    let last_instant = gap.end() - Duration::nanoseconds(1);
    let aligned = is_local_midnight(gap.start(), tz) && is_local_midnight(gap.end(), tz);

    if !req.bar_size().is_intraday() || aligned {
        let first = local_date(gap.start(), tz);
        let last = local_date(last_instant, tz);
        return Ok(day_run(req, first, last, calendar)?.into_iter().collect());
    }

    let mut out = Vec::new();
    let mut run: Option<(NaiveDate, NaiveDate)> = None;
    let mut cursor = gap.start();
    while cursor < gap.end() {
        let date = local_date(cursor, tz);
        let next_day = date.succ_opt().ok_or(RequestError::OutOfRange)?;
        let day_start = local_midnight(date, tz)?;
        let day_end = local_midnight(next_day, tz)?;
        let piece_end = day_end.min(gap.end());

        if cursor == day_start && piece_end == day_end {
            run = Some(run.map_or((date, date), |(first, _)| (first, date)));
        } else {
            if let Some((first, last)) = run.take() {
                out.extend(day_run(req, first, last, calendar)?);
            }
            if calendar.is_trading_day(date) {
                if let Some(range) = TimeRange::between(cursor, piece_end) {
                    out.extend(partial_day(req, &range, calendar)?);
                }
            }
        }
        cursor = piece_end;
    }
    if let Some((first, last)) = run {
        out.extend(day_run(req, first, last, calendar)?);
    }
    Ok(out)
}

/// `"N d"` request over the trading days of `first..=last`.
fn day_run(
    req: &HistDataReq,
    first: NaiveDate,
    last: NaiveDate,
    calendar: &TradingCalendar,
) -> Result<Option<SubRequest>, RequestError> {
    let days = calendar.trading_days(first, last);
    let (Some(last_trading), Ok(count)) = (days.last(), u32::try_from(days.len())) else {
        return Ok(None);
    };
    let Some(count) = NonZeroU32::new(count) else {
        return Ok(None);
    };
    let tz = req.tz();
    let end_date = last_trading.succ_opt().ok_or(RequestError::OutOfRange)?;
    let end = local_midnight(end_date, tz)?.with_timezone(&tz);
    let request = req.with_window(Lookback::days(count), end);
    let range = request.resolve(calendar)?;
    Ok(Some(SubRequest { request, range }))
}

/// `"<secs>s"` request covering `piece`, a part of one local day.
fn partial_day(
    req: &HistDataReq,
    piece: &TimeRange,
    calendar: &TradingCalendar,
) -> Result<Option<SubRequest>, RequestError> {
    let secs = piece.duration().num_seconds();
    let Some(secs) = u32::try_from(secs).ok().and_then(NonZeroU32::new) else {
        return Ok(None);
    };
    let tz = req.tz();
    let request = req.with_window(Lookback::seconds(secs), piece.end().with_timezone(&tz));
    let range = request.resolve(calendar)?;
    Ok(Some(SubRequest { request, range }))
}

fn section(f: &mut fmt::Formatter<'_>, title: &str, wrote_any: &mut bool) -> fmt::Result {
    if *wrote_any {
        writeln!(f)?;
    }
    writeln!(f, "{title}")?;
    writeln!(f, "{}", "-".repeat(title.len()))?;
    *wrote_any = true;
    Ok(())
}

impl fmt::Display for DownloadPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.request)?;
        writeln!(f, "resolved to {}", self.requested)?;
        writeln!(f)?;

        if self.sub_requests.is_empty() {
            writeln!(f, "No downloads")?;
        }

        let mut wrote_any = false;
        if !self.sub_requests.is_empty() {
            section(f, "Downloads", &mut wrote_any)?;
            for sub in &self.sub_requests {
                writeln!(
                    f,
                    "+ {} ending {}  {}",
                    sub.request.duration(),
                    sub.request.end().to_rfc3339(),
                    sub.range
                )?;
            }
        }
        if !self.satisfied.is_empty() {
            section(f, "Cached", &mut wrote_any)?;
            for r in &self.satisfied {
                writeln!(f, "= {r}")?;
            }
        }
        if !self.non_trading.is_empty() {
            section(f, "Non-trading", &mut wrote_any)?;
            for r in &self.non_trading {
                writeln!(f, "~ {r}")?;
            }
        }
        Ok(())
    }
}
