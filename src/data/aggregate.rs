use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::data::event::{Metric, PlayEvent, RankBy};

/// One (day, entity) row of the cumulative table: the entity's running metric
/// total up to and including that day.
#[derive(Clone, Debug, PartialEq)]
pub struct CumulativeRow {
    pub date: NaiveDate,
    /// Display name of the ranked entity.
    pub name: String,
    /// Representative parent entity (the artist; equals `name` when ranking
    /// artists), bound by first-seen association.
    pub parent: String,
    /// First-seen stable id for the entity, when the source carried one.
    pub stable_id: Option<String>,
    pub cumulative: f64,
}

/// Full composite identity used for accumulation. Ranking by track keys on
/// (track, artist, uri) so distinct tracks sharing a display name do not merge;
/// albums key on (album, artist); artists on the artist name alone.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct EntityKey {
    name: String,
    qualifier: String,
    stable_id: String,
}

fn key_for(event: &PlayEvent, rank_by: RankBy) -> EntityKey {
    match rank_by {
        RankBy::Track => EntityKey {
            name: event.track.clone(),
            qualifier: event.artist.clone(),
            stable_id: event.track_uri.clone().unwrap_or_default(),
        },
        RankBy::Album => EntityKey {
            name: event.album.clone(),
            qualifier: event.artist.clone(),
            stable_id: String::new(),
        },
        RankBy::Artist => EntityKey {
            name: event.artist.clone(),
            qualifier: String::new(),
            stable_id: String::new(),
        },
    }
}

fn contribution(event: &PlayEvent, metric: Metric) -> f64 {
    match metric {
        Metric::Plays => 1.0,
        // Minutes, so the value text matches the axis caption.
        Metric::DurationMs => event.duration_ms as f64 / 60_000.0,
    }
}

/// Aggregate raw events into the per-day cumulative table, ordered by
/// (date asc, entity key asc). Iteration is fully deterministic for a given
/// input slice.
pub fn accumulate(events: &[PlayEvent], rank_by: RankBy, metric: Metric) -> Vec<CumulativeRow> {
    // Per-day contribution per composite entity.
    let mut daily: BTreeMap<(NaiveDate, EntityKey), f64> = BTreeMap::new();
    // First-seen parent / stable id per composite entity, in event order.
    let mut first_seen: HashMap<EntityKey, (String, Option<String>)> = HashMap::new();

    for event in events {
        let key = key_for(event, rank_by);
        *daily.entry((event.played_at, key.clone())).or_insert(0.0) +=
            contribution(event, metric);
        first_seen
            .entry(key)
            .or_insert_with(|| (event.artist.clone(), event.track_uri.clone()));
    }

    let mut running: HashMap<EntityKey, f64> = HashMap::new();
    let mut rows = Vec::with_capacity(daily.len());
    for ((date, key), delta) in daily {
        let total = running.entry(key.clone()).or_insert(0.0);
        *total += delta;
        let (parent, stable_id) = first_seen
            .get(&key)
            .cloned()
            .unwrap_or((String::new(), None));
        rows.push(CumulativeRow {
            date,
            name: key.name,
            parent,
            stable_id,
            cumulative: *total,
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(day: u32, track: &str, artist: &str, ms: u64) -> PlayEvent {
        PlayEvent {
            played_at: NaiveDate::from_ymd_opt(2023, 1, day).unwrap(),
            track: track.to_string(),
            artist: artist.to_string(),
            album: format!("{track} LP"),
            track_uri: Some(format!("uri:{artist}:{track}")),
            duration_ms: ms,
        }
    }

    #[test]
    fn cumulative_is_running_sum_per_entity() {
        let events = vec![
            ev(1, "A", "X", 60_000),
            ev(1, "A", "X", 60_000),
            ev(2, "A", "X", 60_000),
            ev(2, "B", "Y", 60_000),
        ];
        let rows = accumulate(&events, RankBy::Track, Metric::Plays);
        let a: Vec<_> = rows.iter().filter(|r| r.name == "A").collect();
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].cumulative, 2.0);
        assert_eq!(a[1].cumulative, 3.0);
        let b: Vec<_> = rows.iter().filter(|r| r.name == "B").collect();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].cumulative, 1.0);
        assert_eq!(b[0].parent, "Y");
    }

    #[test]
    fn same_display_name_different_artist_stays_distinct() {
        // Two tracks named "Cover" by different artists must not merge.
        let events = vec![ev(1, "Cover", "X", 60_000), ev(1, "Cover", "Y", 60_000)];
        let rows = accumulate(&events, RankBy::Track, Metric::Plays);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.cumulative == 1.0));
    }

    #[test]
    fn duration_metric_reports_minutes() {
        let events = vec![ev(1, "A", "X", 90_000), ev(2, "A", "X", 30_000)];
        let rows = accumulate(&events, RankBy::Track, Metric::DurationMs);
        assert_eq!(rows[0].cumulative, 1.5);
        assert_eq!(rows[1].cumulative, 2.0);
    }

    #[test]
    fn artist_ranking_uses_artist_as_parent() {
        let events = vec![ev(1, "A", "X", 60_000)];
        let rows = accumulate(&events, RankBy::Artist, Metric::Plays);
        assert_eq!(rows[0].name, "X");
        assert_eq!(rows[0].parent, "X");
        assert_eq!(rows[0].stable_id.as_deref(), Some("uri:X:A"));
    }

    #[test]
    fn rows_ordered_by_date_then_key() {
        let events = vec![ev(2, "B", "Y", 0), ev(1, "A", "X", 0), ev(1, "B", "Y", 0)];
        let rows = accumulate(&events, RankBy::Track, Metric::Plays);
        let order: Vec<_> = rows.iter().map(|r| (r.date, &r.name)).collect();
        assert!(order.windows(2).all(|w| w[0] <= w[1]));
    }
}
