//! Storage layout classification.

use crate::container::ScanlineSource;
use crate::error::{Error, Result};
use retile_tiff::{tag, TiffReader};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// How a container stores its pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layout {
    /// Fixed-size rectangular tiles. `tile_height` is 0 if the file omits it.
    Tiled { tile_width: u32, tile_height: u32 },
    /// Full-width rows, top to bottom.
    Scanline,
}

impl Layout {
    pub fn is_tiled(&self) -> bool {
        matches!(self, Layout::Tiled { .. })
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Tiled {
                tile_width,
                tile_height,
            } => write!(f, "tiled {}x{}", tile_width, tile_height),
            Layout::Scanline => write!(f, "scanline"),
        }
    }
}

/// Classify an open source from its metadata alone.
///
/// A present, nonzero TileWidth field means tiled. No pixel data is touched,
/// so repeated calls always agree.
pub fn classify<S: ScanlineSource + ?Sized>(source: &S) -> Layout {
    match source.field(tag::TILE_WIDTH) {
        Some(tile_width) if tile_width != 0 => Layout::Tiled {
            tile_width,
            tile_height: source.field(tag::TILE_LENGTH).unwrap_or(0),
        },
        _ => Layout::Scanline,
    }
}

/// Open the container at `path` and classify it.
///
/// A file that cannot be opened is [`Error::ContainerOpen`], never
/// "not tiled".
pub fn classify_path(path: impl AsRef<Path>) -> Result<Layout> {
    let path = path.as_ref();
    let reader = TiffReader::open(path).map_err(|source| Error::ContainerOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let layout = classify(&reader);
    debug!(path = %path.display(), %layout, "classified container");
    Ok(layout)
}
