use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use moonwheel_core::Hemisphere;

/// Event names in calendar order for the northern table.
pub const EVENT_NAMES: [&str; 8] = [
    "Imbolc", "Ostara", "Beltane", "Litha", "Lammas", "Mabon", "Samhain", "Yule",
];

// (name, month, day). Same names in both tables; the south is shifted by
// roughly half a year.
const NORTH: [(&str, u32, u32); 8] = [
    ("Imbolc", 2, 1),
    ("Ostara", 3, 21),
    ("Beltane", 5, 1),
    ("Litha", 6, 21),
    ("Lammas", 8, 1),
    ("Mabon", 9, 21),
    ("Samhain", 10, 31),
    ("Yule", 12, 21),
];

const SOUTH: [(&str, u32, u32); 8] = [
    ("Imbolc", 8, 1),
    ("Ostara", 9, 21),
    ("Beltane", 11, 1),
    ("Litha", 12, 21),
    ("Lammas", 2, 1),
    ("Mabon", 3, 21),
    ("Samhain", 4, 30),
    ("Yule", 6, 21),
];

/// One concrete occurrence of a named seasonal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecurringDate {
    pub name: &'static str,
    pub date: NaiveDate,
}

fn table(hemisphere: Hemisphere) -> &'static [(&'static str, u32, u32); 8] {
    match hemisphere {
        Hemisphere::North => &NORTH,
        Hemisphere::South => &SOUTH,
    }
}

/// All events of `year` for `hemisphere`, sorted by date.
pub fn occurrences(hemisphere: Hemisphere, year: i32) -> Vec<RecurringDate> {
    let mut dates: Vec<RecurringDate> = table(hemisphere)
        .iter()
        .filter_map(|&(name, month, day)| {
            NaiveDate::from_ymd_opt(year, month, day).map(|date| RecurringDate { name, date })
        })
        .collect();
    dates.sort_by_key(|d| d.date);
    dates
}

/// The soonest event on or after `today` (an event falling on `today` counts).
///
/// When every event of the current year has passed, the first event of the
/// following year is returned, so there is always an answer.
pub fn next_recurring_date(hemisphere: Hemisphere, today: NaiveDate) -> RecurringDate {
    let this_year = occurrences(hemisphere, today.year());
    if let Some(next) = this_year.iter().find(|e| e.date >= today) {
        return *next;
    }
    // Table entries are valid dates in every year, so next year is never empty.
    occurrences(hemisphere, today.year() + 1)[0]
}

/// Whole days from `today` until `date` (negative if `date` is in the past).
pub fn days_until(today: NaiveDate, date: NaiveDate) -> i64 {
    (date - today).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn event_on_today_is_returned() {
        let next = next_recurring_date(Hemisphere::North, ymd(2026, 10, 31));
        assert_eq!(next.name, "Samhain");
        assert_eq!(next.date, ymd(2026, 10, 31));
    }

    #[test]
    fn south_table_is_inverted() {
        let north = next_recurring_date(Hemisphere::North, ymd(2026, 6, 1));
        let south = next_recurring_date(Hemisphere::South, ymd(2026, 6, 1));
        assert_eq!(north.name, "Litha");
        assert_eq!(south.name, "Yule");
        assert_eq!(north.date, south.date);
    }

    #[test]
    fn wraps_to_next_year_after_last_event() {
        let next = next_recurring_date(Hemisphere::North, ymd(2026, 12, 22));
        assert_eq!(next.name, "Imbolc");
        assert_eq!(next.date, ymd(2027, 2, 1));

        let next = next_recurring_date(Hemisphere::South, ymd(2026, 12, 22));
        assert_eq!(next.name, "Lammas");
        assert_eq!(next.date, ymd(2027, 2, 1));
    }

    #[test]
    fn never_returns_a_past_date() {
        for hemisphere in [Hemisphere::North, Hemisphere::South] {
            let mut day = ymd(2023, 1, 1);
            while day < ymd(2029, 1, 1) {
                let next = next_recurring_date(hemisphere, day);
                assert!(next.date >= day, "{hemisphere} {day}: got {}", next.date);
                assert!(days_until(day, next.date) <= 366);
                day = day.succ_opt().unwrap();
            }
        }
    }

    #[test]
    fn advancing_past_each_result_cycles_all_events() {
        for hemisphere in [Hemisphere::North, Hemisphere::South] {
            let mut today = ymd(2025, 3, 15);
            let mut seen = Vec::new();
            for _ in 0..EVENT_NAMES.len() {
                let next = next_recurring_date(hemisphere, today);
                seen.push(next.name);
                today = next.date.succ_opt().unwrap();
            }
            let unique: HashSet<_> = seen.iter().collect();
            assert_eq!(unique.len(), EVENT_NAMES.len(), "{hemisphere}: {seen:?}");

            // The ninth result repeats the first.
            let ninth = next_recurring_date(hemisphere, today);
            assert_eq!(ninth.name, seen[0]);
        }
    }

    #[test]
    fn occurrences_are_sorted() {
        let dates = occurrences(Hemisphere::South, 2026);
        assert_eq!(dates.len(), 8);
        assert!(dates.windows(2).all(|w| w[0].date <= w[1].date));
        assert_eq!(dates[0].name, "Lammas");
    }
}
