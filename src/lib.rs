//! Animated ranked bar-chart ("bar chart race") renderer for listening
//! history.
//!
//! Play events are aggregated into cumulative per-entity totals, sampled into
//! top-N snapshots over a date range, and interpolated into smooth rank
//! transitions. Frames are rasterized on the CPU with `vello_cpu` and Parley
//! text, then encoded to MP4 through the system `ffmpeg` binary.

#![forbid(unsafe_code)]

pub mod anim;
pub mod assets;
pub mod config;
pub mod data;
pub mod encode;
pub mod foundation;
pub mod pipeline;
pub mod render;
pub mod snapshot;

pub use anim::ease::Ease;
pub use config::RaceConfig;
pub use data::event::{Metric, PlayEvent, RankBy};
pub use foundation::core::{Canvas, Fps, FrameIndex, Rgba8};
pub use foundation::error::{RaceError, RaceResult};
pub use pipeline::{Timeline, build_timeline, render_single_frame, render_to_mp4};
pub use render::backend::FrameRGBA;
pub use snapshot::builder::{Slot, Snapshot};
