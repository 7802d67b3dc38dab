//! Error types for retile.
//!
//! Every failure a pipeline stage can hit is a distinct variant, and the
//! variants tied to a file carry its path.

use retile_tiff::TiffError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for retile operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for retile.
#[derive(Error, Debug)]
pub enum Error {
    /// The source container could not be opened or parsed.
    #[error("Cannot open container {}: {source}", .path.display())]
    ContainerOpen {
        path: PathBuf,
        #[source]
        source: TiffError,
    },

    /// The target container could not be created.
    #[error("Cannot create container {}: {source}", .path.display())]
    TargetCreate {
        path: PathBuf,
        #[source]
        source: TiffError,
    },

    /// A row of the source could not be read.
    #[error("Failed to read source row {row}: {source}")]
    SourceRead {
        row: u32,
        #[source]
        source: TiffError,
    },

    /// The compressed output file could not be created.
    #[error("Cannot create compressed output {}: {source}", .path.display())]
    SinkCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The compressed input file could not be opened.
    #[error("Cannot open compressed input {}: {source}", .path.display())]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The compressed stream ended before its declared height.
    #[error("Compressed stream truncated: decoded {decoded} of {expected} rows")]
    TruncatedStream { expected: u32, decoded: u32 },

    /// A transform was handed the zero-sized raster.
    #[error("Raster is empty")]
    EmptyRaster,

    /// Raster fields disagree with its pixel buffer.
    #[error("Invalid raster: {0}")]
    InvalidRaster(String),

    /// Tile dimensions must be nonzero.
    #[error("Invalid tile size: {width}x{height}")]
    InvalidTileSize { width: u32, height: u32 },

    /// Sample layout outside the supported set.
    #[error("Unsupported layout: {0}")]
    UnsupportedLayout(String),

    /// A tile could not be written to the target.
    #[error("Failed to write tile ({col}, {row}): {source}")]
    TileWrite {
        col: u32,
        row: u32,
        #[source]
        source: TiffError,
    },

    /// Any other container failure (metadata, finalisation).
    #[error("Container error: {0}")]
    Container(#[from] TiffError),

    /// Codec failure.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    InvalidConfig(String),
}

/// Codec errors raised by scanline encoders and decoders.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Error from the underlying image codec.
    #[error("{0}")]
    Image(#[from] image::ImageError),

    /// I/O error on the compressed stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Row submitted before `begin` or after `finish`.
    #[error("Encoder not started")]
    NotStarted,

    /// Row length disagrees with the declared geometry.
    #[error("Row length mismatch: expected {expected} bytes, got {actual}")]
    RowLength { expected: usize, actual: usize },

    /// Component count the codec cannot carry.
    #[error("Unsupported component count: {0}")]
    UnsupportedComponents(u16),

    /// More rows submitted than the declared height.
    #[error("Too many rows: stream declared {0}")]
    TooManyRows(u32),

    /// `finish` called before every declared row was supplied.
    #[error("Incomplete image: {written} of {expected} rows encoded")]
    IncompleteImage { written: u32, expected: u32 },

    /// Image dimensions the codec cannot represent.
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}
