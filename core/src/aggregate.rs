//! Derived views over the ledger: today's totals, remaining budget and the
//! Saturday-to-Friday week.
//!
//! Everything here is a pure function of the entries, the profile and a
//! reference instant. The caller picks the time zone, which keeps day
//! boundaries testable.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone};

use crate::models::{DEFAULT_DAILY_GOAL, Entry, Macros, Profile, WeeklyBucket};

const DAY_MS: i64 = 86_400_000;

fn local_date<Tz: TimeZone>(tz: &Tz, timestamp_ms: i64) -> Option<NaiveDate> {
    tz.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.date_naive())
}

/// Epoch milliseconds of local midnight on `date`.
pub fn day_start_millis<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        // Zones that skip midnight on DST change start the day an hour later
        .or_else(|| {
            tz.from_local_datetime(&(midnight + Duration::hours(1)))
                .earliest()
        })
        .map_or_else(
            || midnight.and_utc().timestamp_millis(),
            |dt| dt.timestamp_millis(),
        )
}

/// Food entries whose timestamp falls on `date` in `tz`.
pub fn food_entries_on<'a, Tz: TimeZone>(
    entries: &'a [Entry],
    tz: &'a Tz,
    date: NaiveDate,
) -> impl Iterator<Item = &'a Entry> + 'a {
    entries
        .iter()
        .filter(move |e| e.is_food() && local_date(tz, e.timestamp) == Some(date))
}

#[must_use]
pub fn consumed_today<Tz: TimeZone>(entries: &[Entry], now: &DateTime<Tz>) -> f64 {
    let tz = now.timezone();
    food_entries_on(entries, &tz, now.date_naive())
        .map(Entry::calories_or_zero)
        .sum()
}

#[must_use]
pub fn consumed_macros_today<Tz: TimeZone>(entries: &[Entry], now: &DateTime<Tz>) -> Macros {
    let tz = now.timezone();
    let mut total = Macros::default();
    for entry in food_entries_on(entries, &tz, now.date_naive()) {
        total += entry.macros();
    }
    total
}

/// Calories left for today. Never negative, and zero before a profile exists.
#[must_use]
pub fn remaining(profile: Option<&Profile>, consumed: f64) -> f64 {
    profile.map_or(0.0, |p| (p.tdee - consumed).max(0.0))
}

/// Saturday on or before `date`.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let days_from_saturday = (date.weekday().num_days_from_sunday() + 1) % 7;
    date - Duration::days(i64::from(days_from_saturday))
}

/// Seven buckets, Saturday first, covering the week that contains `now`.
#[must_use]
pub fn weekly_breakdown<Tz: TimeZone>(
    entries: &[Entry],
    profile: Option<&Profile>,
    now: &DateTime<Tz>,
) -> Vec<WeeklyBucket> {
    let tz = now.timezone();
    let today = now.date_naive();
    let start = week_start(today);
    let goal = profile.map_or(DEFAULT_DAILY_GOAL, |p| p.tdee);

    (0..7)
        .map(|offset| {
            let date = start + Duration::days(offset);
            let day_start = day_start_millis(&tz, date);
            let day_end = day_start + DAY_MS;

            let mut calories = 0.0;
            let mut macros = Macros::default();
            for entry in entries
                .iter()
                .filter(|e| e.is_food() && e.timestamp >= day_start && e.timestamp < day_end)
            {
                calories += entry.calories_or_zero();
                macros += entry.macros();
            }

            WeeklyBucket {
                date,
                weekday: date.format("%a").to_string(),
                calories,
                protein: macros.protein,
                carbs: macros.carbs,
                fat: macros.fat,
                goal,
                is_future: date > today,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryKind, UserStats};
    use chrono::FixedOffset;

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600 + 1800).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        tz().with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn entry(id: &str, when: DateTime<FixedOffset>, calories: f64) -> Entry {
        Entry {
            id: id.to_string(),
            timestamp: when.timestamp_millis(),
            description: format!("entry {id}"),
            kind: EntryKind::FoodEntry,
            meal_slot: None,
            calories: Some(calories),
            protein: Some(10.0),
            carbs: Some(20.0),
            fat: Some(5.0),
            amount: None,
            unit: None,
        }
    }

    fn profile(tdee: f64) -> Profile {
        Profile {
            stats: UserStats::default(),
            bmr: 1700.0,
            tdee,
        }
    }

    #[test]
    fn test_consumed_today_respects_local_midnight() {
        let now = at(2026, 10, 19, 12, 0);
        let entries = vec![
            entry("late", at(2026, 10, 18, 23, 59), 500.0),
            entry("midnight", at(2026, 10, 19, 0, 0), 300.0),
            entry("lunch", at(2026, 10, 19, 12, 0), 200.0),
            entry("tomorrow", at(2026, 10, 20, 0, 0), 900.0),
        ];

        assert_eq!(consumed_today(&entries, &now), 500.0);
        let macros = consumed_macros_today(&entries, &now);
        assert_eq!(macros.protein, 20.0);
        assert_eq!(macros.carbs, 40.0);
        assert_eq!(macros.fat, 10.0);
    }

    #[test]
    fn test_profile_entries_do_not_count() {
        let now = at(2026, 10, 19, 12, 0);
        let mut setup = entry("setup", at(2026, 10, 19, 8, 0), 2500.0);
        setup.kind = EntryKind::ProfileSetup;
        let entries = vec![setup, entry("tea", at(2026, 10, 19, 9, 0), 40.0)];

        assert_eq!(consumed_today(&entries, &now), 40.0);
    }

    #[test]
    fn test_absent_calories_count_as_zero() {
        let now = at(2026, 10, 19, 12, 0);
        let mut water = entry("water", at(2026, 10, 19, 9, 0), 0.0);
        water.calories = None;
        water.protein = None;
        let entries = vec![water];

        assert_eq!(consumed_today(&entries, &now), 0.0);
        assert_eq!(consumed_macros_today(&entries, &now).protein, 0.0);
    }

    #[test]
    fn test_remaining_never_negative() {
        let p = profile(1800.0);
        assert_eq!(remaining(Some(&p), 1000.0), 800.0);
        assert_eq!(remaining(Some(&p), 2500.0), 0.0);
        assert_eq!(remaining(None, 100.0), 0.0);
    }

    #[test]
    fn test_week_start_is_saturday() {
        // 2026-10-17 is a Saturday
        let saturday = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        for offset in 0..7 {
            let day = saturday + Duration::days(offset);
            assert_eq!(week_start(day), saturday, "day {day}");
        }
        let next_saturday = saturday + Duration::days(7);
        assert_eq!(week_start(next_saturday), next_saturday);
    }

    #[test]
    fn test_weekly_breakdown_shape_for_every_weekday() {
        for day in 17..=23 {
            let now = at(2026, 10, day, 18, 0);
            let buckets = weekly_breakdown(&[], None, &now);

            assert_eq!(buckets.len(), 7);
            assert_eq!(buckets[0].weekday, "Sat");
            assert_eq!(buckets[6].weekday, "Fri");

            let today_idx = buckets
                .iter()
                .position(|b| b.date == now.date_naive())
                .unwrap();
            assert!(!buckets[today_idx].is_future);
            assert!(buckets[..today_idx].iter().all(|b| !b.is_future));
            assert!(buckets[today_idx + 1..].iter().all(|b| b.is_future));
        }
    }

    #[test]
    fn test_weekly_breakdown_sums_per_day() {
        let now = at(2026, 10, 21, 10, 0); // Wednesday
        let entries = vec![
            entry("sat", at(2026, 10, 17, 0, 0), 100.0),
            entry("mon-a", at(2026, 10, 19, 8, 0), 250.0),
            entry("mon-b", at(2026, 10, 19, 23, 59), 150.0),
            entry("last-fri", at(2026, 10, 16, 23, 59), 999.0),
        ];
        let p = profile(1850.0);
        let buckets = weekly_breakdown(&entries, Some(&p), &now);

        assert_eq!(buckets[0].calories, 100.0);
        assert_eq!(buckets[2].calories, 400.0);
        assert_eq!(buckets[2].protein, 20.0);
        assert_eq!(buckets.iter().map(|b| b.calories).sum::<f64>(), 500.0);
        assert!(buckets.iter().all(|b| b.goal == 1850.0));
    }

    #[test]
    fn test_weekly_goal_defaults_without_profile() {
        let now = at(2026, 10, 19, 10, 0);
        let buckets = weekly_breakdown(&[], None, &now);
        assert!(buckets.iter().all(|b| b.goal == DEFAULT_DAILY_GOAL));
    }
}
