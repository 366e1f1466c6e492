//! Revenue figures derived from the entry log and the current occupancy.
//!
//! Every function here is pure: the same entries, occupancy and clock always
//! give the same figures, so the push and poll refresh paths can both call in
//! without coordinating.

use crate::display::Occupancy;
use crate::models::{DailyReport, EntryRecord};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Where a day's revenue figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueSource {
    #[default]
    Empty,
    Registered,
    Occupancy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayRevenue {
    pub date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub revenue: Decimal,
    pub count: u32,
    pub source: RevenueSource,
}

impl DayRevenue {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            revenue: Decimal::ZERO,
            count: 0,
            source: RevenueSource::Empty,
        }
    }

    fn from_entries(date: NaiveDate, entries: &[&EntryRecord], price: Decimal) -> Self {
        if entries.is_empty() {
            return Self::empty(date);
        }
        Self {
            date,
            revenue: entries.iter().map(|entry| entry.amount_or(price)).sum(),
            count: saturating_count(entries.len()),
            source: RevenueSource::Registered,
        }
    }

    fn from_occupancy(date: NaiveDate, occupied: u32, price: Decimal) -> Self {
        if occupied == 0 {
            return Self::empty(date);
        }
        Self {
            date,
            revenue: price * Decimal::from(occupied),
            count: occupied,
            source: RevenueSource::Occupancy,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.revenue.is_zero()
    }
}

/// Entry counts past `u32::MAX` stay pinned at the maximum.
fn saturating_count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Everything the admin panel shows, computed in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregates {
    pub total_revenue: Decimal,
    pub total_entries: usize,
    pub today: DayRevenue,
    pub yesterday: DayRevenue,
    pub reports: Vec<DailyReport>,
}

impl Aggregates {
    pub fn empty(today: NaiveDate) -> Self {
        Self {
            total_revenue: Decimal::ZERO,
            total_entries: 0,
            today: DayRevenue::empty(today),
            yesterday: DayRevenue::empty(today - Duration::days(1)),
            reports: Vec::new(),
        }
    }
}

pub fn aggregate<Tz: TimeZone>(
    entries: &[EntryRecord],
    occupancy: Occupancy,
    now: &DateTime<Tz>,
    price: Decimal,
) -> Aggregates {
    Aggregates {
        total_revenue: total_revenue(entries, price),
        total_entries: entries.len(),
        today: today_revenue(entries, occupancy, now, price),
        yesterday: yesterday_revenue(entries, now, price),
        reports: daily_reports(entries, &now.timezone(), price),
    }
}

/// Sum over every entry ever registered. Cars leaving never lower this.
pub fn total_revenue(entries: &[EntryRecord], price: Decimal) -> Decimal {
    entries.iter().map(|entry| entry.amount_or(price)).sum()
}

pub fn local_date<Tz: TimeZone>(timestamp: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    timestamp.with_timezone(tz).date_naive()
}

pub fn entries_on_date<'a, Tz: TimeZone>(
    entries: &'a [EntryRecord],
    date: NaiveDate,
    tz: &Tz,
) -> Vec<&'a EntryRecord> {
    entries
        .iter()
        .filter(|entry| local_date(&entry.created_at, tz) == date)
        .collect()
}

/// Today's revenue and car count.
///
/// Registered entries are used when there are any; otherwise the occupied
/// spaces stand in for unregistered paid cars. The result is then passed
/// through [`reconcile`] against the same occupancy.
pub fn today_revenue<Tz: TimeZone>(
    entries: &[EntryRecord],
    occupancy: Occupancy,
    now: &DateTime<Tz>,
    price: Decimal,
) -> DayRevenue {
    let today = now.date_naive();
    let todays = entries_on_date(entries, today, &now.timezone());
    let initial = if todays.is_empty() {
        DayRevenue::from_occupancy(today, occupancy.occupied(), price)
    } else {
        DayRevenue::from_entries(today, &todays, price)
    };
    reconcile(initial, occupancy, price)
}

/// Precedence between the registered figure and the occupancy figure.
///
/// While spaces are occupied, the figure must equal `occupied * price`;
/// any other value (including zero) is replaced by it. With no spaces
/// occupied the current figure stands, so cars leaving never erase income.
pub fn reconcile(current: DayRevenue, occupancy: Occupancy, price: Decimal) -> DayRevenue {
    let occupied = occupancy.occupied();
    if occupied == 0 {
        return current;
    }
    let expected = price * Decimal::from(occupied);
    if current.revenue.is_zero() || current.revenue != expected {
        DayRevenue::from_occupancy(current.date, occupied, price)
    } else {
        current
    }
}

/// Keeps a non-zero figure for the same day when a later refresh comes back
/// empty. A new day always starts from the fresh figure.
pub fn carry_forward(previous: Option<&DayRevenue>, next: DayRevenue) -> DayRevenue {
    match previous {
        Some(previous)
            if previous.date == next.date
                && next.revenue.is_zero()
                && previous.revenue > Decimal::ZERO =>
        {
            previous.clone()
        }
        _ => next,
    }
}

/// Yesterday's registered revenue. There is no live occupancy for a past
/// day, so no fallback applies.
pub fn yesterday_revenue<Tz: TimeZone>(
    entries: &[EntryRecord],
    now: &DateTime<Tz>,
    price: Decimal,
) -> DayRevenue {
    let yesterday = now.date_naive() - Duration::days(1);
    let entries = entries_on_date(entries, yesterday, &now.timezone());
    DayRevenue::from_entries(yesterday, &entries, price)
}

/// One report per local calendar date present in the log, newest first.
pub fn daily_reports<Tz: TimeZone>(
    entries: &[EntryRecord],
    tz: &Tz,
    price: Decimal,
) -> Vec<DailyReport> {
    let mut by_date: BTreeMap<NaiveDate, (u32, Decimal)> = BTreeMap::new();
    for entry in entries {
        let day = by_date
            .entry(local_date(&entry.created_at, tz))
            .or_insert((0, Decimal::ZERO));
        day.0 += 1;
        day.1 += entry.amount_or(price);
    }

    by_date
        .into_iter()
        .rev()
        .map(|(date, (total_entries, total_revenue))| DailyReport {
            date,
            total_entries,
            total_revenue,
        })
        .collect()
}

/// The `limit` newest entries, newest first.
pub fn recent_entries(entries: &[EntryRecord], limit: usize) -> Vec<EntryRecord> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted.truncate(limit);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn price() -> Decimal {
        Decimal::from(45)
    }

    fn brt() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    fn at(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    fn entry(id: &str, created_at: &str, amount: Option<i64>) -> EntryRecord {
        EntryRecord {
            id: id.to_string(),
            created_at: at(created_at).with_timezone(&Utc),
            amount_paid: amount.map(Decimal::from),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn total_revenue_never_decreases_as_entries_are_appended() {
        let all = vec![
            entry("a", "2026-10-17T10:00:00-03:00", Some(45)),
            entry("b", "2026-10-18T11:00:00-03:00", None),
            entry("c", "2026-10-19T09:00:00-03:00", Some(0)),
            entry("d", "2026-10-19T09:30:00-03:00", Some(60)),
        ];
        let mut previous = Decimal::ZERO;
        for len in 0..=all.len() {
            let total = total_revenue(&all[..len], price());
            assert!(total >= previous);
            previous = total;
        }
        assert_eq!(previous, Decimal::from(45 + 45 + 45 + 60));
    }

    #[test]
    fn entries_near_midnight_use_local_date() {
        // 01:30 UTC on the 20th is still the evening of the 19th at -03:00.
        let entries = vec![entry("late", "2026-10-20T01:30:00Z", None)];
        assert_eq!(entries_on_date(&entries, date(2026, 10, 19), &brt()).len(), 1);
        assert!(entries_on_date(&entries, date(2026, 10, 20), &brt()).is_empty());
        assert_eq!(entries_on_date(&entries, date(2026, 10, 20), &Utc).len(), 1);
    }

    #[test]
    fn no_entries_and_no_occupancy_is_zero() {
        let today = today_revenue(&[], Occupancy::new(4, 4), &at("2026-10-19T12:00:00-03:00"), price());
        assert_eq!(today.revenue, Decimal::ZERO);
        assert_eq!(today.count, 0);
        assert_eq!(today.source, RevenueSource::Empty);
    }

    #[test]
    fn no_entries_falls_back_to_occupied_spaces() {
        let today = today_revenue(&[], Occupancy::new(1, 4), &at("2026-10-19T12:00:00-03:00"), price());
        assert_eq!(today.revenue, Decimal::from(135));
        assert_eq!(today.count, 3);
        assert_eq!(today.source, RevenueSource::Occupancy);
    }

    #[test]
    fn registered_entries_agreeing_with_occupancy_are_kept() {
        let entries = vec![
            entry("a", "2026-10-19T08:00:00-03:00", Some(45)),
            entry("b", "2026-10-19T09:00:00-03:00", Some(45)),
            entry("old", "2026-10-18T09:00:00-03:00", Some(45)),
        ];
        let today = today_revenue(&entries, Occupancy::new(2, 4), &at("2026-10-19T12:00:00-03:00"), price());
        assert_eq!(today.revenue, Decimal::from(90));
        assert_eq!(today.count, 2);
        assert_eq!(today.source, RevenueSource::Registered);
    }

    #[test]
    fn occupancy_overrides_stale_registered_total() {
        let entries = vec![entry("a", "2026-10-19T08:00:00-03:00", Some(45))];
        let today = today_revenue(&entries, Occupancy::new(1, 4), &at("2026-10-19T12:00:00-03:00"), price());
        assert_eq!(today.revenue, Decimal::from(135));
        assert_eq!(today.count, 3);
        assert_eq!(today.source, RevenueSource::Occupancy);
    }

    #[test]
    fn occupancy_dropping_to_zero_keeps_revenue() {
        let recorded = today_revenue(&[], Occupancy::new(1, 4), &at("2026-10-19T12:00:00-03:00"), price());
        let after = reconcile(recorded.clone(), Occupancy::new(4, 4), price());
        assert_eq!(after, recorded);
        assert_eq!(after.revenue, Decimal::from(135));
    }

    #[test]
    fn carry_forward_keeps_income_within_the_same_day() {
        let recorded = DayRevenue::from_occupancy(date(2026, 10, 19), 3, price());
        let refreshed = DayRevenue::empty(date(2026, 10, 19));
        assert_eq!(carry_forward(Some(&recorded), refreshed), recorded);

        let next_day = DayRevenue::empty(date(2026, 10, 20));
        assert_eq!(carry_forward(Some(&recorded), next_day.clone()), next_day);

        let lower = DayRevenue::from_occupancy(date(2026, 10, 19), 1, price());
        assert_eq!(carry_forward(Some(&recorded), lower.clone()), lower);
    }

    #[test]
    fn recomputing_is_idempotent() {
        let entries = vec![
            entry("a", "2026-10-19T08:00:00-03:00", Some(45)),
            entry("b", "2026-10-18T09:00:00-03:00", None),
        ];
        let now = at("2026-10-19T12:00:00-03:00");
        let first = aggregate(&entries, Occupancy::new(2, 4), &now, price());
        let second = aggregate(&entries, Occupancy::new(2, 4), &now, price());
        assert_eq!(first, second);
    }

    #[test]
    fn yesterday_has_no_occupancy_fallback() {
        let entries = vec![
            entry("a", "2026-10-18T23:59:00-03:00", Some(50)),
            entry("b", "2026-10-19T00:01:00-03:00", Some(45)),
        ];
        let yesterday = yesterday_revenue(&entries, &at("2026-10-19T12:00:00-03:00"), price());
        assert_eq!(yesterday.date, date(2026, 10, 18));
        assert_eq!(yesterday.revenue, Decimal::from(50));
        assert_eq!(yesterday.count, 1);

        let empty = yesterday_revenue(&[], &at("2026-10-19T12:00:00-03:00"), price());
        assert!(empty.is_empty());
    }

    #[test]
    fn daily_reports_group_by_date_newest_first() {
        let entries = vec![
            entry("a", "2026-10-17T10:00:00-03:00", Some(45)),
            entry("b", "2026-10-19T10:00:00-03:00", None),
            entry("c", "2026-10-18T10:00:00-03:00", Some(50)),
            entry("d", "2026-10-19T11:00:00-03:00", Some(45)),
            entry("e", "2026-10-18T22:30:00-03:00", None),
        ];
        let reports = daily_reports(&entries, &brt(), price());
        let dates: Vec<_> = reports.iter().map(|report| report.date).collect();
        assert_eq!(dates, vec![date(2026, 10, 19), date(2026, 10, 18), date(2026, 10, 17)]);
        assert_eq!(reports[0].total_entries, 2);
        assert_eq!(reports[0].total_revenue, Decimal::from(90));
        assert_eq!(reports[1].total_entries, 2);
        assert_eq!(reports[1].total_revenue, Decimal::from(95));
        assert_eq!(reports[2].total_revenue, Decimal::from(45));
    }

    #[test]
    fn recent_entries_are_newest_first() {
        let entries = vec![
            entry("a", "2026-10-17T10:00:00-03:00", None),
            entry("b", "2026-10-19T10:00:00-03:00", None),
            entry("c", "2026-10-18T10:00:00-03:00", None),
        ];
        let recent = recent_entries(&entries, 2);
        let ids: Vec<_> = recent.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn entry_counts_saturate_instead_of_wrapping() {
        assert_eq!(saturating_count(3), 3);
        assert_eq!(saturating_count(u32::MAX as usize), u32::MAX);
        assert_eq!(saturating_count(usize::MAX), u32::MAX);
    }
}
