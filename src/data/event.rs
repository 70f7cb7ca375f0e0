use std::{fs::File, io::BufReader, path::Path};

use anyhow::Context as _;
use chrono::NaiveDate;

use crate::foundation::error::{RaceError, RaceResult};

/// One play of one track. The immutable input row of the whole pipeline.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PlayEvent {
    pub played_at: NaiveDate,
    pub track: String,
    pub artist: String,
    pub album: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_uri: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Cumulative metric to rank by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Count of play events.
    #[default]
    Plays,
    /// Summed listening time, reported in minutes.
    DurationMs,
}

impl Metric {
    pub fn axis_caption(self) -> &'static str {
        match self {
            Self::Plays => "Streams",
            Self::DurationMs => "Minutes Listened",
        }
    }
}

/// Which entity dimension the race ranks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    #[default]
    Track,
    Album,
    Artist,
}

impl RankBy {
    /// Character width used when wrapping display names into label lines.
    pub fn wrap_width(self) -> usize {
        match self {
            Self::Track | Self::Album => 22,
            Self::Artist => 20,
        }
    }

    /// Whether slots carry a secondary "by <artist>" caption.
    pub fn has_caption(self) -> bool {
        !matches!(self, Self::Artist)
    }

    pub fn title(self, metric: Metric) -> &'static str {
        let _ = metric;
        match self {
            Self::Track => "Most Played Songs",
            Self::Album => "Most Played Albums",
            Self::Artist => "Most Played Artists",
        }
    }
}

/// Load a JSON array of [`PlayEvent`] rows.
pub fn load_events(path: &Path) -> RaceResult<Vec<PlayEvent>> {
    let f = File::open(path)
        .with_context(|| format!("open events file '{}'", path.display()))?;
    let events: Vec<PlayEvent> = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parse events JSON '{}'", path.display()))?;
    if events.is_empty() {
        return Err(RaceError::data("events file contains no rows"));
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_json_roundtrip() {
        let e = PlayEvent {
            played_at: NaiveDate::from_ymd_opt(2023, 4, 1).unwrap(),
            track: "Song".into(),
            artist: "Band".into(),
            album: "Record".into(),
            track_uri: None,
            duration_ms: 215_000,
        };
        let s = serde_json::to_string(&e).unwrap();
        // Absent uri is omitted, not serialized as null.
        assert!(!s.contains("track_uri"));
        let de: PlayEvent = serde_json::from_str(&s).unwrap();
        assert_eq!(de.track, "Song");
        assert_eq!(de.played_at, e.played_at);
    }

    #[test]
    fn metric_and_rank_by_names() {
        assert_eq!(
            serde_json::to_string(&Metric::DurationMs).unwrap(),
            "\"duration_ms\""
        );
        assert_eq!(serde_json::to_string(&RankBy::Album).unwrap(), "\"album\"");
        assert_eq!(RankBy::Track.wrap_width(), 22);
        assert_eq!(RankBy::Artist.wrap_width(), 20);
        assert!(!RankBy::Artist.has_caption());
    }
}
