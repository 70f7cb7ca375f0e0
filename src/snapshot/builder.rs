use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::{
    data::aggregate::CumulativeRow,
    data::event::RankBy,
    foundation::error::{RaceError, RaceResult},
    snapshot::label,
};

/// One ranked slot of a snapshot. Trailing slots of a snapshot with fewer than
/// `top_n` ranked entities are padded with [`Slot::empty`].
#[derive(Clone, Debug, PartialEq)]
pub struct Slot {
    pub name: String,
    /// Parent entity for the caption ("by <artist>"); empty for padding and
    /// when ranking artists.
    pub parent: String,
    /// Display name wrapped to the rank dimension's character width.
    pub label: String,
    pub value: f64,
}

impl Slot {
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            parent: String::new(),
            label: String::new(),
            value: 0.0,
        }
    }

    pub fn is_padding(&self) -> bool {
        self.name.is_empty()
    }
}

/// Top-N ranking at one sampled timestamp. Slots are ordered non-increasing by
/// value, ties broken by name, and the vector always has exactly `top_n`
/// entries.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub at: NaiveDate,
    pub slots: Vec<Slot>,
}

impl Snapshot {
    pub fn names(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.name.clone()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.slots.iter().map(|s| s.value).collect()
    }
}

/// Collect the sample dates: distinct event dates within `[start, end]`,
/// subsampled every `stride_days`-th, with the final sample forced to equal
/// `end` exactly once. The result is strictly increasing.
pub fn sample_dates(
    rows: &[CumulativeRow],
    start: NaiveDate,
    end: NaiveDate,
    stride_days: usize,
) -> RaceResult<Vec<NaiveDate>> {
    if stride_days == 0 {
        return Err(RaceError::validation("sampling stride must be > 0"));
    }

    let mut distinct: Vec<NaiveDate> = rows
        .iter()
        .map(|r| r.date)
        .filter(|d| *d >= start && *d <= end)
        .collect();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.is_empty() {
        return Err(RaceError::data(format!(
            "no events between {start} and {end}"
        )));
    }

    let mut samples: Vec<NaiveDate> = distinct.into_iter().step_by(stride_days).collect();

    // Normalize the tail so the configured end date is always sampled, once.
    if let Some(&last) = samples.last()
        && last != end
    {
        if end < last {
            samples.pop();
        }
        samples.push(end);
        samples.sort_unstable();
        samples.dedup();
    }

    Ok(samples)
}

/// Rank the cumulative table as of `at` (inclusive) into exactly `top_n` slots.
///
/// Entities sharing a display name are merged by taking the maximum cumulative
/// value, which avoids double counting when the composite key is finer than
/// the display name.
pub fn snapshot_at(
    rows: &[CumulativeRow],
    rank_by: RankBy,
    top_n: usize,
    at: NaiveDate,
) -> Snapshot {
    // (max cumulative, first-seen parent) per display name; BTreeMap keeps the
    // merge order deterministic.
    let mut by_name: BTreeMap<&str, (f64, &str)> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.date <= at) {
        let entry = by_name
            .entry(row.name.as_str())
            .or_insert((row.cumulative, row.parent.as_str()));
        if row.cumulative > entry.0 {
            entry.0 = row.cumulative;
        }
    }

    let mut ranked: Vec<(&str, f64, &str)> = by_name
        .into_iter()
        .map(|(name, (value, parent))| (name, value, parent))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(top_n);

    let mut slots: Vec<Slot> = ranked
        .into_iter()
        .map(|(name, value, parent)| Slot {
            name: name.to_string(),
            parent: if rank_by.has_caption() {
                parent.to_string()
            } else {
                String::new()
            },
            label: label::wrap_label(name, rank_by.wrap_width()),
            value,
        })
        .collect();
    slots.resize_with(top_n, Slot::empty);

    Snapshot { at, slots }
}

/// Precompute every snapshot for the run.
pub fn build_snapshots(
    rows: &[CumulativeRow],
    rank_by: RankBy,
    top_n: usize,
    start: NaiveDate,
    end: NaiveDate,
    stride_days: usize,
) -> RaceResult<Vec<Snapshot>> {
    if top_n == 0 {
        return Err(RaceError::validation("top_n must be >= 1"));
    }
    let dates = sample_dates(rows, start, end, stride_days)?;
    Ok(dates
        .into_iter()
        .map(|at| snapshot_at(rows, rank_by, top_n, at))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, day).unwrap()
    }

    fn row(day: u32, name: &str, parent: &str, cumulative: f64) -> CumulativeRow {
        CumulativeRow {
            date: d(day),
            name: name.to_string(),
            parent: parent.to_string(),
            stable_id: None,
            cumulative,
        }
    }

    #[test]
    fn sample_dates_force_end_exactly_once() {
        let rows: Vec<_> = (1..=20).map(|day| row(day, "A", "X", day as f64)).collect();
        let samples = sample_dates(&rows, d(1), d(25), 7).unwrap();
        assert_eq!(samples.last(), Some(&d(25)));
        assert_eq!(samples.iter().filter(|s| **s == d(25)).count(), 1);
        assert!(samples.windows(2).all(|w| w[0] < w[1]));

        // End landing inside the sampled range overwrites the last sample.
        let samples = sample_dates(&rows, d(1), d(18), 7).unwrap();
        assert_eq!(samples.last(), Some(&d(18)));
        assert_eq!(samples.iter().filter(|s| **s == d(18)).count(), 1);
        assert!(samples.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn sample_dates_reject_empty_range() {
        let rows = vec![row(5, "A", "X", 1.0)];
        assert!(sample_dates(&rows, d(10), d(20), 1).is_err());
    }

    #[test]
    fn snapshot_has_exactly_top_n_slots_for_all_n() {
        let rows = vec![
            row(1, "A", "X", 3.0),
            row(1, "B", "Y", 2.0),
            row(1, "C", "Z", 1.0),
        ];
        for n in 1..=10 {
            let snap = snapshot_at(&rows, RankBy::Track, n, d(1));
            assert_eq!(snap.slots.len(), n);
            let values = snap.values();
            assert!(values.windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn fewer_entities_than_n_pads_with_empty_slots() {
        let rows = vec![
            row(1, "A", "X", 3.0),
            row(1, "B", "Y", 2.0),
            row(1, "C", "Z", 1.0),
        ];
        let snap = snapshot_at(&rows, RankBy::Track, 5, d(1));
        assert_eq!(snap.slots.len(), 5);
        assert!(snap.slots[3].is_padding());
        assert!(snap.slots[4].is_padding());
        assert_eq!(snap.slots[3].value, 0.0);
        assert_eq!(snap.slots[4].name, "");
    }

    #[test]
    fn cutoff_takes_max_cumulative_per_name() {
        // Two composite rows share the display name "A"; the snapshot must
        // report the larger running total, not their sum.
        let rows = vec![
            row(1, "A", "X", 5.0),
            row(2, "A", "X", 9.0),
            row(3, "A", "X", 12.0),
        ];
        let snap = snapshot_at(&rows, RankBy::Track, 1, d(2));
        assert_eq!(snap.slots[0].value, 9.0);
    }

    #[test]
    fn ordering_follows_value_then_name() {
        let rows = vec![
            row(1, "A", "X", 100.0),
            row(1, "B", "Y", 80.0),
            row(1, "C", "Z", 50.0),
            row(2, "B", "Y", 150.0),
            row(2, "A", "X", 120.0),
        ];
        let first = snapshot_at(&rows, RankBy::Track, 3, d(1));
        assert_eq!(first.names(), vec!["A", "B", "C"]);
        let second = snapshot_at(&rows, RankBy::Track, 3, d(2));
        assert_eq!(second.names(), vec!["B", "A", "C"]);
        assert_eq!(second.values(), vec![150.0, 120.0, 50.0]);
    }

    #[test]
    fn tie_breaks_are_stable_by_name() {
        let rows = vec![row(1, "Beta", "X", 5.0), row(1, "Alpha", "Y", 5.0)];
        let snap = snapshot_at(&rows, RankBy::Track, 2, d(1));
        assert_eq!(snap.names(), vec!["Alpha", "Beta"]);
    }

    #[test]
    fn artist_ranking_has_no_caption_parent() {
        let rows = vec![row(1, "X", "X", 5.0)];
        let snap = snapshot_at(&rows, RankBy::Artist, 1, d(1));
        assert_eq!(snap.slots[0].parent, "");
    }
}
