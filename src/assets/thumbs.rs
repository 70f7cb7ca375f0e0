//! Thumbnail artwork cache.
//!
//! Thumbnails are loaded from a directory of image files whose stem is the
//! entity's display name. A lookup that previously failed to decode is cached
//! as [`ThumbEntry::Unavailable`] so the renderer does not retry it every
//! frame.

use std::{collections::BTreeMap, path::Path, sync::Arc};

use anyhow::Context;
use tracing::debug;

use crate::foundation::{core::Rgba8, error::RaceResult};

/// Cache key for one entity at one slot count. The slot count is part of the
/// key because artwork is sized for a specific layout.
pub fn thumb_key(name: &str, top_n: usize) -> String {
    format!("{name}_top_n_{top_n}")
}

/// Decoded, premultiplied thumbnail plus the colour its bar is tinted with.
#[derive(Clone, Debug)]
pub struct ThumbImage {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Arc<Vec<u8>>,
    pub dominant: Rgba8,
}

#[derive(Clone, Debug)]
pub enum ThumbEntry {
    Ready(ThumbImage),
    Unavailable,
}

#[derive(Debug, Default)]
pub struct ThumbCache {
    entries: BTreeMap<String, ThumbEntry>,
}

impl ThumbCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, entry: ThumbEntry) {
        self.entries.insert(key, entry);
    }

    pub fn lookup(&self, name: &str, top_n: usize) -> Option<&ThumbEntry> {
        self.entries.get(&thumb_key(name, top_n))
    }

    pub fn ready(&self, name: &str, top_n: usize) -> Option<&ThumbImage> {
        match self.lookup(name, top_n)? {
            ThumbEntry::Ready(img) => Some(img),
            ThumbEntry::Unavailable => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load every png/jpg in `dir`, keyed by file stem. Files that fail to
    /// decode are cached as unavailable rather than failing the run.
    pub fn load_dir(&mut self, dir: &Path, top_n: usize) -> RaceResult<usize> {
        let mut loaded = 0;
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("read thumbnail dir {}", dir.display()))?;
        for entry in entries {
            let path = entry.context("read thumbnail dir entry")?.path();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase);
            if !matches!(ext.as_deref(), Some("png" | "jpg" | "jpeg")) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let key = thumb_key(stem, top_n);
            match std::fs::read(&path)
                .map_err(anyhow::Error::from)
                .and_then(|bytes| decode_thumb(&bytes))
            {
                Ok(img) => {
                    self.entries.insert(key, ThumbEntry::Ready(img));
                    loaded += 1;
                }
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "thumbnail unusable");
                    self.entries.insert(key, ThumbEntry::Unavailable);
                }
            }
        }
        Ok(loaded)
    }
}

fn decode_thumb(bytes: &[u8]) -> anyhow::Result<ThumbImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode thumbnail")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    let dominant = average_color(&rgba8_premul);
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(ThumbImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
        dominant,
    })
}

/// Average of the non-transparent pixels; opaque mid grey when there are none.
fn average_color(rgba: &[u8]) -> Rgba8 {
    let mut sum = [0u64; 3];
    let mut count = 0u64;
    for px in rgba.chunks_exact(4) {
        if px[3] == 0 {
            continue;
        }
        sum[0] += px[0] as u64;
        sum[1] += px[1] as u64;
        sum[2] += px[2] as u64;
        count += 1;
    }
    if count == 0 {
        return Rgba8::opaque(128, 128, 128);
    }
    Rgba8::opaque(
        (sum[0] / count) as u8,
        (sum[1] / count) as u8,
        (sum[2] / count) as u8,
    )
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn png_bytes(pixels: Vec<u8>, w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_raw(w, h, pixels).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn key_embeds_slot_count() {
        assert_eq!(thumb_key("Wish You Were Here", 5), "Wish You Were Here_top_n_5");
    }

    #[test]
    fn decode_premultiplies_and_averages() {
        let bytes = png_bytes(vec![100, 50, 200, 128], 1, 1);
        let img = decode_thumb(&bytes).unwrap();
        assert_eq!(img.width, 1);
        assert_eq!(img.height, 1);
        assert_eq!(
            img.rgba8_premul.as_slice(),
            &[
                ((100u16 * 128 + 127) / 255) as u8,
                ((50u16 * 128 + 127) / 255) as u8,
                ((200u16 * 128 + 127) / 255) as u8,
                128
            ]
        );
        assert_eq!(img.dominant, Rgba8::opaque(100, 50, 200));
    }

    #[test]
    fn fully_transparent_art_gets_grey_tint() {
        let bytes = png_bytes(vec![10, 20, 30, 0], 1, 1);
        let img = decode_thumb(&bytes).unwrap();
        assert_eq!(img.dominant, Rgba8::opaque(128, 128, 128));
    }

    #[test]
    fn unavailable_entries_are_cached_misses() {
        let mut cache = ThumbCache::new();
        cache.insert(thumb_key("A", 3), ThumbEntry::Unavailable);
        assert!(cache.lookup("A", 3).is_some());
        assert!(cache.ready("A", 3).is_none());
        assert!(cache.lookup("A", 5).is_none());
    }
}
