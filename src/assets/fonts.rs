use std::{path::Path, sync::Arc};

use anyhow::Context;

use crate::foundation::error::RaceResult;

/// Font bytes used by the renderer. Both faces are optional; text for a
/// missing face is simply not drawn, so a chart can still be rendered (bars,
/// thumbnails) without shipping fonts.
#[derive(Clone, Debug, Default)]
pub struct FontSet {
    /// Title, year and month text.
    pub heading: Option<Arc<Vec<u8>>>,
    /// Bar labels, captions and value text.
    pub label: Option<Arc<Vec<u8>>>,
}

impl FontSet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_paths(
        heading: Option<&Path>,
        label: Option<&Path>,
    ) -> RaceResult<Self> {
        let read = |path: &Path| -> RaceResult<Arc<Vec<u8>>> {
            let bytes = std::fs::read(path)
                .with_context(|| format!("read font {}", path.display()))?;
            Ok(Arc::new(bytes))
        };
        Ok(Self {
            heading: heading.map(read).transpose()?,
            label: label.map(read).transpose()?,
        })
    }
}
