//! MP4 output through the system `ffmpeg` binary.
//!
//! Raw frames are streamed to ffmpeg's stdin as opaque RGBA. The renderer
//! produces premultiplied pixels, so each frame is flattened over the chart
//! background before it is written.

use std::{
    io::Read,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::{
    foundation::{
        core::{Fps, FrameIndex, Rgba8},
        error::{RaceError, RaceResult},
    },
    render::backend::FrameRGBA,
};

#[derive(Clone, Debug)]
pub struct Mp4Config {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub out_path: PathBuf,
    /// Overwrite the output file if it already exists.
    pub overwrite: bool,
    /// Background the alpha channel is flattened over.
    pub bg: Rgba8,
}

impl Mp4Config {
    pub fn new(width: u32, height: u32, fps: Fps, out_path: impl Into<PathBuf>) -> Self {
        Self {
            width,
            height,
            fps,
            out_path: out_path.into(),
            overwrite: true,
            bg: Rgba8::opaque(0, 0, 0),
        }
    }

    pub fn validate(&self) -> RaceResult<()> {
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(RaceError::validation("fps must be non-zero"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(RaceError::validation("output width/height must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(RaceError::validation(
                "output width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        Ok(())
    }
}

/// Streams frames into a spawned `ffmpeg` process, one run per encoder.
pub struct Mp4Encoder {
    cfg: Mp4Config,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    scratch: Vec<u8>,
    last_idx: Option<FrameIndex>,
}

impl Mp4Encoder {
    pub fn start(cfg: Mp4Config) -> RaceResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;
        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(RaceError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(RaceError::render(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        if cfg.overwrite {
            cmd.arg("-y");
        } else {
            cmd.arg("-n");
        }

        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ]);
        cmd.arg(&cfg.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            RaceError::render(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RaceError::render("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| RaceError::render("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        let scratch = vec![0u8; (cfg.width * cfg.height * 4) as usize];
        Ok(Self {
            cfg,
            child: Some(child),
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
            scratch,
            last_idx: None,
        })
    }

    pub fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> RaceResult<()> {
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(RaceError::render(
                "encoder received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);

        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(RaceError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(RaceError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        flatten_premul_over_bg(&mut self.scratch, &frame.data, self.cfg.bg)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(RaceError::render("encoder is already finalized"));
        };
        use std::io::Write as _;
        stdin
            .write_all(&self.scratch)
            .map_err(|e| RaceError::render(format!("failed to write frame to ffmpeg stdin: {e}")))
    }

    /// Close stdin, wait for ffmpeg, and surface its stderr on failure.
    pub fn finish(mut self) -> RaceResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| RaceError::render("encoder not started"))?;

        let status = child
            .wait()
            .map_err(|e| RaceError::render(format!("failed to wait for ffmpeg to finish: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| RaceError::render("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| RaceError::render(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(RaceError::render(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Flatten premultiplied RGBA8 over an opaque background into `dst`.
fn flatten_premul_over_bg(dst: &mut [u8], src_premul: &[u8], bg: Rgba8) -> RaceResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(RaceError::validation(
            "flatten expects equal-length rgba8 buffers",
        ));
    }

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            d[3] = 255;
            continue;
        }

        let inv = 255u16 - a;
        d[0] = (s[0] as u16 + mul_div255(bg.r as u16, inv)).min(255) as u8;
        d[1] = (s[1] as u16 + mul_div255(bg.g as u16, inv)).min(255) as u8;
        d[2] = (s[2] as u16 + mul_div255(bg.b as u16, inv)).min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (x * y + 127) / 255
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> RaceResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
