//! Baseline TIFF container access by scanline and by tile
//!
//! Tagged Image File Format (TIFF) stores raster data either as strips of
//! full-width rows or as a grid of fixed-size tiles. This crate reads and
//! writes uncompressed, 8-bit, interleaved images in both organisations
//! without ever holding more than one row or tile in memory.
//!
//! # Features
//!
//! - Little and big endian files on read, little endian on write
//! - Row reads from striped and tiled files alike
//! - Tile writes with grid checks and exactly-once bookkeeping
//! - One-strip-per-row scanline writes
//!
//! # Example
//!
//! ```ignore
//! use retile_tiff::{tag, IfdEntry, TiffReader, TiffWriter};
//!
//! let mut reader = TiffReader::open("input.tif")?;
//! let info = reader.info().clone();
//! let mut row = vec![0u8; info.bytes_per_row()];
//! reader.read_row(0, &mut row)?;
//!
//! let mut writer = TiffWriter::create("output.tif")?;
//! writer.set_field(IfdEntry::long(tag::IMAGE_WIDTH, info.width))?;
//! writer.set_field(IfdEntry::long(tag::IMAGE_LENGTH, 1))?;
//! writer.write_row(&row, 0)?;
//! writer.close()?;
//! ```

pub mod error;
pub mod ifd;
pub mod reader;
pub mod tags;
pub mod types;
pub mod writer;

pub use error::{Result, TiffError};
pub use ifd::{Endian, Ifd, IfdEntry, IfdValue};
pub use reader::TiffReader;
pub use tags::{tag, value};
pub use types::{ChunkLayout, Photometric, TiffInfo};
pub use writer::TiffWriter;

/// TIFF magic number - little endian "II"
pub const TIFF_MAGIC_LE: [u8; 2] = [0x49, 0x49];

/// TIFF magic number - big endian "MM"
pub const TIFF_MAGIC_BE: [u8; 2] = [0x4D, 0x4D];

/// TIFF version (42)
pub const TIFF_VERSION: u16 = 42;
