use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    anim::ease::Ease,
    data::event::{Metric, RankBy},
    foundation::{
        core::Fps,
        error::{RaceError, RaceResult},
    },
};

/// Everything that shapes one render run. Deserialized from a JSON file; every
/// field except the date range has a default.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RaceConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default)]
    pub metric: Metric,
    #[serde(default)]
    pub rank_by: RankBy,
    /// Keep every k-th sampled day.
    #[serde(default = "default_stride_days")]
    pub stride_days: usize,
    /// Interpolated frames per snapshot segment.
    #[serde(default = "default_interp_steps")]
    pub interp_steps: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: Fps,
    #[serde(default)]
    pub ease: Ease,
    /// Overrides the title derived from the rank dimension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

fn default_top_n() -> usize {
    10
}

fn default_stride_days() -> usize {
    30
}

fn default_interp_steps() -> usize {
    14
}

fn default_width() -> u32 {
    1160
}

fn default_height() -> u32 {
    1534
}

fn default_fps() -> Fps {
    Fps { num: 30, den: 1 }
}

impl RaceConfig {
    pub fn load(path: &Path) -> RaceResult<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("parse config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Return the first violated constraint, if any.
    pub fn validate(&self) -> RaceResult<()> {
        if self.top_n == 0 {
            return Err(RaceError::validation("top_n must be >= 1"));
        }
        if self.stride_days == 0 {
            return Err(RaceError::validation("stride_days must be >= 1"));
        }
        if self.interp_steps == 0 {
            return Err(RaceError::validation("interp_steps must be >= 1"));
        }
        if self.start > self.end {
            return Err(RaceError::validation(format!(
                "start {} must not be after end {}",
                self.start, self.end
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(RaceError::validation("width/height must be non-zero"));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(RaceError::validation("fps must be non-zero"));
        }
        Ok(())
    }
}
