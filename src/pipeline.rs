//! End-to-end runs: events in, frames or an MP4 out.

use std::path::Path;

use tracing::info;

use crate::{
    anim::{interp, state::AnimationState},
    assets::{fonts::FontSet, thumbs::ThumbCache},
    config::RaceConfig,
    data::{aggregate, event::PlayEvent},
    encode::ffmpeg::{Mp4Config, Mp4Encoder},
    foundation::{
        core::{Canvas, FrameIndex, Rgba8},
        error::{RaceError, RaceResult},
    },
    render::{backend::FrameRGBA, scene::SceneRenderer},
    snapshot::builder::{self, Snapshot},
};

/// Precomputed snapshot sequence plus the interpolation density. Frame count
/// is snapshots times steps; frame `f` belongs to segment `f / interp_steps`.
#[derive(Clone, Debug)]
pub struct Timeline {
    pub top_n: usize,
    pub interp_steps: usize,
    pub snapshots: Vec<Snapshot>,
}

impl Timeline {
    pub fn total_frames(&self) -> usize {
        self.snapshots.len() * self.interp_steps
    }
}

#[tracing::instrument(skip(events, cfg))]
pub fn build_timeline(events: &[PlayEvent], cfg: &RaceConfig) -> RaceResult<Timeline> {
    cfg.validate()?;
    let rows = aggregate::accumulate(events, cfg.rank_by, cfg.metric);
    let snapshots = builder::build_snapshots(
        &rows,
        cfg.rank_by,
        cfg.top_n,
        cfg.start,
        cfg.end,
        cfg.stride_days,
    )?;
    info!(
        events = events.len(),
        snapshots = snapshots.len(),
        frames = snapshots.len() * cfg.interp_steps,
        "timeline built"
    );
    Ok(Timeline {
        top_n: cfg.top_n,
        interp_steps: cfg.interp_steps,
        snapshots,
    })
}

fn load_thumbs(dir: Option<&Path>, top_n: usize) -> RaceResult<ThumbCache> {
    let mut thumbs = ThumbCache::new();
    if let Some(dir) = dir {
        let loaded = thumbs.load_dir(dir, top_n)?;
        info!(loaded, dir = %dir.display(), "thumbnails loaded");
    }
    Ok(thumbs)
}

fn renderer_for(cfg: &RaceConfig, fonts: FontSet) -> RaceResult<SceneRenderer> {
    SceneRenderer::new(
        Canvas {
            width: cfg.width,
            height: cfg.height,
        },
        cfg.rank_by,
        cfg.metric,
        cfg.top_n,
        cfg.title.clone(),
        fonts,
    )
}

/// Render the whole race and stream it into an MP4 file.
pub fn render_to_mp4(
    events: &[PlayEvent],
    cfg: &RaceConfig,
    fonts: FontSet,
    thumbs_dir: Option<&Path>,
    out_path: &Path,
) -> RaceResult<()> {
    let timeline = build_timeline(events, cfg)?;
    let thumbs = load_thumbs(thumbs_dir, cfg.top_n)?;
    let mut renderer = renderer_for(cfg, fonts)?;

    let mut mp4 = Mp4Config::new(cfg.width, cfg.height, cfg.fps, out_path);
    mp4.bg = Rgba8::opaque(0xF0, 0xF0, 0xF0);
    let mut encoder = Mp4Encoder::start(mp4)?;

    let mut state = AnimationState::new(cfg.top_n);
    for frame in 0..timeline.total_frames() {
        let spec = interp::compute_frame(
            &timeline.snapshots,
            cfg.rank_by,
            cfg.interp_steps,
            cfg.ease,
            &mut state,
            frame,
        )?;
        let rgba = renderer.render_frame(&spec, &thumbs)?;
        encoder.push_frame(FrameIndex(frame as u64), &rgba)?;
    }
    encoder.finish()?;
    info!(out = %out_path.display(), "mp4 written");
    Ok(())
}

/// Render a single frame of the race.
///
/// Frame geometry depends on every earlier segment boundary, so the frame
/// specs are replayed from zero; only the requested frame is rasterized.
pub fn render_single_frame(
    events: &[PlayEvent],
    cfg: &RaceConfig,
    fonts: FontSet,
    thumbs_dir: Option<&Path>,
    frame: usize,
) -> RaceResult<FrameRGBA> {
    let timeline = build_timeline(events, cfg)?;
    if frame >= timeline.total_frames() {
        return Err(RaceError::animation(format!(
            "frame {frame} out of range (total {})",
            timeline.total_frames()
        )));
    }
    let thumbs = load_thumbs(thumbs_dir, cfg.top_n)?;
    let mut renderer = renderer_for(cfg, fonts)?;

    let mut state = AnimationState::new(cfg.top_n);
    let mut spec = None;
    for f in 0..=frame {
        spec = Some(interp::compute_frame(
            &timeline.snapshots,
            cfg.rank_by,
            cfg.interp_steps,
            cfg.ease,
            &mut state,
            f,
        )?);
    }
    let spec = spec.ok_or_else(|| RaceError::animation("no frame computed"))?;
    renderer.render_frame(&spec, &thumbs)
}
