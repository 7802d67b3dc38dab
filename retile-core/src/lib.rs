//! Raster layout transcoding for tagged image containers.
//!
//! retile converts a TIFF image between a row-major scanline layout and a
//! tile-major layout, and round-trips the pixels through a JPEG stream.
//!
//! # Modules
//!
//! - [`raster`]: the in-memory image and the reader that populates it
//! - [`layout`]: scanline/tiled classification from metadata alone
//! - [`tiling`]: tile grid geometry and the scanline to tile transcoder
//! - [`codec`]: row-at-a-time JPEG compression and decompression
//! - [`pipeline`]: the full classify, tile, compress, decompress run
//!
//! # Example
//!
//! ```no_run
//! use retile_core::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::new("scan.tif").with_tile_size(256, 256);
//! let report = Pipeline::new(config).run()?;
//! println!("{} -> {} bytes", report.layout, report.compressed_bytes);
//! # Ok::<(), retile_core::StageError>(())
//! ```
//!
//! # Features
//!
//! - `parallel`: fill tiles on a rayon thread pool during conversion

pub mod codec;
pub mod config;
pub mod container;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod raster;
pub mod tiling;

pub use codec::{
    compress, compress_to_file, decompress, decompress_file, EncodeParams, JpegScanlineDecoder,
    JpegScanlineEncoder, Quality, ScanlineDecoder, ScanlineEncoder, StreamHeader,
};
pub use config::PipelineConfig;
pub use container::{RowSink, ScanlineSource, TileSink};
pub use error::{CodecError, Error, Result};
pub use layout::{classify, classify_path, Layout};
pub use pipeline::{Pipeline, PipelineReport, Stage, StageError};
pub use raster::{read_raster, read_raster_from, RasterBuffer};
pub use tiling::{convert_to_tiled, tile_raster, TileGrid, TileRegion, TileSize, Tiler};

#[cfg(feature = "parallel")]
pub use tiling::tile_raster_parallel;
