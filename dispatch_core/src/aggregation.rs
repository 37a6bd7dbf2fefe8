// dispatch_core/src/aggregation.rs

//! Recomputes 30-minute and daily summaries for dates whose 5-minute data changed.
//!
//! Every dirty date is summarised from scratch. Means divide by the number of observed
//! slots rather than the nominal slot count, so partial days and windows are weighted
//! by what was actually seen; min/max only consider observed slots.

use crate::grid;
use crate::store;

/// Computes the summary for `date`, or `None` if no slot of that day is observed.
pub fn summarise_day(store: &store::DispatchStore, date: chrono::NaiveDate) -> Option<store::DaySummary> {
    let view = store.day_view(date)?;
    let gens = view.generator_count();

    let mut observed = 0usize;
    let mut sum = vec![0f64; gens];
    let mut min = vec![f32::INFINITY; gens];
    let mut max = vec![f32::NEG_INFINITY; gens];
    let mut half_hours = Vec::with_capacity(grid::HALF_HOURS_PER_DAY);

    for window in 0..grid::HALF_HOURS_PER_DAY {
        let mut window_observed = 0usize;
        let mut window_sum = vec![0f64; gens];

        for offset in window * grid::SLOTS_PER_HALF_HOUR..(window + 1) * grid::SLOTS_PER_HALF_HOUR {
            if !view.is_observed(offset) {
                continue;
            }
            let Some(values) = view.values(offset) else {
                continue;
            };
            window_observed += 1;
            for (g, &v) in values.iter().enumerate() {
                window_sum[g] += v as f64;
                min[g] = min[g].min(v);
                max[g] = max[g].max(v);
            }
        }

        if window_observed == 0 {
            half_hours.push(None);
            continue;
        }
        observed += window_observed;
        for (total, partial) in sum.iter_mut().zip(&window_sum) {
            *total += partial;
        }
        half_hours.push(Some(
            window_sum.iter().map(|s| (s / window_observed as f64) as f32).collect(),
        ));
    }

    if observed == 0 {
        return None;
    }

    Some(store::DaySummary {
        date,
        observed,
        mean: sum.iter().map(|s| (s / observed as f64) as f32).collect(),
        min,
        max,
        half_hours,
    })
}

/// Summarises every dirty date in ascending order, clears the set and checkpoints.
///
/// # Returns
/// * Number of dates that had observed data and were summarised.
pub fn update_summaries(store: &mut store::DispatchStore) -> anyhow::Result<usize> {
    let dates = store.take_dirty_dates();
    let mut summarised = 0;

    for date in dates {
        let Some(summary) = summarise_day(store, date) else {
            continue;
        };
        log::info!("Processing summary data for {}", date.format("%Y-%m-%d"));
        store.put_day_summary(&summary)?;
        summarised += 1;
    }

    store.checkpoint()?;
    anyhow::Ok(summarised)
}

/// Marks every observed date dirty, then recomputes all summaries.
pub fn rebuild_summaries(store: &mut store::DispatchStore) -> anyhow::Result<usize> {
    let marked = store.mark_all_dates_dirty();
    log::info!("Rebuilding summaries ({} additional dates marked)", marked);
    update_summaries(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn values(pairs: &[(&str, f32)]) -> std::collections::BTreeMap<String, f32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn open(dir: &tempfile::TempDir) -> store::DispatchStore {
        store::DispatchStore::open(dir.path().join("dispatch.cdf"), crate::settings::DayCompleteness::Aligned).unwrap()
    }

    fn at(day: chrono::NaiveDate, slot: usize) -> chrono::NaiveDateTime {
        day.and_hms_opt(0, 0, 0).unwrap() + chrono::TimeDelta::minutes(5 * slot as i64)
    }

    #[test]
    fn partial_day_mean_uses_observed_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        let day = date(2014, 1, 1);

        let mut total = 0f64;
        for slot in 0..100 {
            let v = (slot * 3 % 17) as f32 + 1.0;
            total += v as f64;
            store.write_row(at(day, slot * 2), &values(&[("G", v)])).unwrap();
        }

        assert_eq!(update_summaries(&mut store).unwrap(), 1);
        let (mean, min, max) = store.daily_summary(day, "G").unwrap();
        assert!((mean as f64 - total / 100.0).abs() < 1e-4);
        assert_eq!(min, 1.0);
        assert_eq!(max, 17.0);
        assert!(store.dirty_dates().is_empty());
    }

    #[test]
    fn min_ignores_unobserved_zero_slots() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        let day = date(2014, 1, 1);
        store.write_row(at(day, 10), &values(&[("G", 40.0)])).unwrap();
        store.write_row(at(day, 20), &values(&[("G", 60.0)])).unwrap();

        update_summaries(&mut store).unwrap();
        assert_eq!(store.daily_summary(day, "G"), Some((50.0, 40.0, 60.0)));
    }

    #[test]
    fn half_hour_windows_average_observed_slots() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        let day = date(2014, 1, 1);
        // Window 1 covers slots 6..12.
        store.write_row(at(day, 6), &values(&[("G", 10.0)])).unwrap();
        store.write_row(at(day, 7), &values(&[("G", 20.0)])).unwrap();
        store.write_row(at(day, 11), &values(&[])).unwrap();

        let summary = summarise_day(&store, day).unwrap();
        assert_eq!(summary.observed, 3);
        assert_eq!(summary.half_hours.len(), grid::HALF_HOURS_PER_DAY);
        assert_eq!(summary.half_hours[0], None);
        assert_eq!(summary.half_hours[1], Some(vec![10.0]));
        assert_eq!(summary.half_hours[2], None);

        update_summaries(&mut store).unwrap();
        assert_eq!(store.half_hour_mean(at(day, 8), "G"), Some(10.0));
    }

    #[test]
    fn unobserved_dirty_date_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        assert!(summarise_day(&store, date(2014, 1, 1)).is_none());
        store.write_row(at(date(2014, 1, 2), 0), &values(&[("G", 1.0)])).unwrap();
        assert!(summarise_day(&store, date(2014, 1, 3)).is_none());
        assert!(summarise_day(&store, date(2014, 1, 1)).is_none());
    }

    #[test]
    fn recompute_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        let day = date(2014, 1, 1);
        store.write_row(at(day, 0), &values(&[("A", 3.0), ("B", 9.0)])).unwrap();
        store.write_row(at(day, 1), &values(&[("A", 5.0)])).unwrap();
        update_summaries(&mut store).unwrap();
        let first = (store.daily_summary(day, "A"), store.daily_summary(day, "B"));

        store.write_row(at(day, 1), &values(&[("A", 5.0)])).unwrap();
        update_summaries(&mut store).unwrap();
        assert_eq!((store.daily_summary(day, "A"), store.daily_summary(day, "B")), first);
        assert_eq!(first.0, Some((4.0, 3.0, 5.0)));
        assert_eq!(first.1, Some((4.5, 0.0, 9.0)));
    }

    #[test]
    fn rebuild_covers_every_observed_day() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        store.write_row(at(date(2014, 1, 1), 0), &values(&[("G", 2.0)])).unwrap();
        store.write_row(at(date(2014, 1, 3), 0), &values(&[("G", 4.0)])).unwrap();
        update_summaries(&mut store).unwrap();

        assert_eq!(rebuild_summaries(&mut store).unwrap(), 2);
        assert_eq!(store.daily_summary(date(2014, 1, 3), "G"), Some((4.0, 4.0, 4.0)));
    }
}
