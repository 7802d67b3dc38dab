//! TIFF error types

use thiserror::Error;

/// Result type for TIFF operations
pub type Result<T> = std::result::Result<T, TiffError>;

/// TIFF error types
#[derive(Error, Debug)]
pub enum TiffError {
    /// Invalid byte order marker
    #[error("Invalid TIFF magic number")]
    InvalidMagic,

    /// Invalid version
    #[error("Unsupported TIFF version: {version}")]
    UnsupportedVersion { version: u16 },

    /// Unsupported compression
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(u16),

    /// Invalid IFD
    #[error("Invalid IFD: {0}")]
    InvalidIfd(String),

    /// Missing required tag
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Sample layout this crate does not read or write
    #[error("Unsupported layout: {0}")]
    UnsupportedLayout(String),

    /// Invalid image dimensions
    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Row index past the image height
    #[error("Row {row} out of range for image height {height}")]
    RowOutOfRange { row: u32, height: u32 },

    /// Tile origin not on the tile grid
    #[error("Tile origin ({x}, {y}) is not on the {tile_width}x{tile_height} tile grid")]
    TileOutOfGrid {
        x: u32,
        y: u32,
        tile_width: u32,
        tile_height: u32,
    },

    /// Tile written twice
    #[error("Tile at ({x}, {y}) already written")]
    TileAlreadyWritten { x: u32, y: u32 },

    /// Row written twice
    #[error("Row {0} already written")]
    RowAlreadyWritten(u32),

    /// Geometry field changed after pixel data was written
    #[error("Tag {0} cannot change after image data has been written")]
    FieldLocked(&'static str),

    /// Image closed before every tile or strip was written
    #[error("Incomplete image: {written} of {expected} chunks written")]
    IncompleteImage { written: usize, expected: usize },

    /// Insufficient data
    #[error("Insufficient data: needed {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// Buffer too small
    #[error("Buffer too small: needed {needed} bytes, got {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Offsets no longer fit the classic 32-bit layout
    #[error("File exceeds the 4 GiB classic TIFF limit")]
    FileTooLarge,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
