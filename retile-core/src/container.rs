//! Container seams used by the transforms.
//!
//! The transforms only ever need three things from a tagged container: field
//! lookups and row reads on the source side, and tile or row writes on the
//! target side. Keeping those behind traits lets the tests drive every
//! transform from memory.

use crate::error::Result;
use retile_tiff::{TiffReader, TiffWriter};
use std::io::{Read, Seek, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Row-addressable source with integer metadata fields.
pub trait ScanlineSource {
    /// First value of a metadata field, if present.
    fn field(&self, tag: u16) -> Option<u32>;

    /// Read row `row` into the front of `buf`.
    fn read_row(&mut self, row: u32, buf: &mut [u8]) -> retile_tiff::Result<()>;

    /// Check the described pixel data is readable before any row is pulled.
    fn validate(&mut self) -> retile_tiff::Result<()> {
        Ok(())
    }
}

/// Target accepting full nominal-size tiles by origin.
pub trait TileSink {
    /// Write one tile whose top-left pixel is `(x, y)`.
    fn write_tile(&mut self, tile: &[u8], x: u32, y: u32) -> retile_tiff::Result<()>;
}

/// Target accepting rows by index.
pub trait RowSink {
    /// Write `row` at `index`.
    fn write_row(&mut self, row: &[u8], index: u32) -> retile_tiff::Result<()>;
}

impl<R: Read + Seek> ScanlineSource for TiffReader<R> {
    fn field(&self, tag: u16) -> Option<u32> {
        self.field_u32(tag)
    }

    fn read_row(&mut self, row: u32, buf: &mut [u8]) -> retile_tiff::Result<()> {
        TiffReader::read_row(self, row, buf)
    }

    fn validate(&mut self) -> retile_tiff::Result<()> {
        TiffReader::validate(self)
    }
}

impl<W: Write + Seek> TileSink for TiffWriter<W> {
    fn write_tile(&mut self, tile: &[u8], x: u32, y: u32) -> retile_tiff::Result<()> {
        TiffWriter::write_tile(self, tile, x, y)
    }
}

impl<W: Write + Seek> RowSink for TiffWriter<W> {
    fn write_row(&mut self, row: &[u8], index: u32) -> retile_tiff::Result<()> {
        TiffWriter::write_row(self, row, index)
    }
}

impl<S: ScanlineSource + ?Sized> ScanlineSource for &mut S {
    fn field(&self, tag: u16) -> Option<u32> {
        (**self).field(tag)
    }

    fn read_row(&mut self, row: u32, buf: &mut [u8]) -> retile_tiff::Result<()> {
        (**self).read_row(row, buf)
    }

    fn validate(&mut self) -> retile_tiff::Result<()> {
        (**self).validate()
    }
}

impl<T: TileSink + ?Sized> TileSink for &mut T {
    fn write_tile(&mut self, tile: &[u8], x: u32, y: u32) -> retile_tiff::Result<()> {
        (**self).write_tile(tile, x, y)
    }
}

impl<T: RowSink + ?Sized> RowSink for &mut T {
    fn write_row(&mut self, row: &[u8], index: u32) -> retile_tiff::Result<()> {
        (**self).write_row(row, index)
    }
}

/// Remove an output this crate created if filling it failed.
///
/// A half-written container has no directory and is not a valid file.
pub(crate) fn discard_on_error<T>(path: &Path, result: Result<T>) -> Result<T> {
    if result.is_err() {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed partial output"),
            Err(err) => warn!(path = %path.display(), %err, "could not remove partial output"),
        }
    }
    result
}

/// In-memory recorders shared by unit tests across modules.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use retile_tiff::{tag, TiffError};
    use std::collections::HashMap;

    /// Source backed by a flat pixel buffer.
    pub struct MemorySource {
        pub fields: HashMap<u16, u32>,
        pub pixels: Vec<u8>,
        pub row_bytes: usize,
        /// Row at which reads start failing.
        pub fail_at: Option<u32>,
        pub reads: Vec<u32>,
    }

    impl MemorySource {
        pub fn new(width: u32, height: u32, samples: u32, pixels: Vec<u8>) -> Self {
            let fields = HashMap::from([
                (tag::IMAGE_WIDTH, width),
                (tag::IMAGE_LENGTH, height),
                (tag::SAMPLES_PER_PIXEL, samples),
                (tag::BITS_PER_SAMPLE, 8),
            ]);
            MemorySource {
                fields,
                pixels,
                row_bytes: (width * samples) as usize,
                fail_at: None,
                reads: Vec::new(),
            }
        }
    }

    impl ScanlineSource for MemorySource {
        fn field(&self, tag: u16) -> Option<u32> {
            self.fields.get(&tag).copied()
        }

        fn read_row(&mut self, row: u32, buf: &mut [u8]) -> retile_tiff::Result<()> {
            if self.fail_at.is_some_and(|fail| row >= fail) {
                return Err(TiffError::InsufficientData {
                    needed: self.row_bytes,
                    available: 0,
                });
            }
            self.reads.push(row);
            let start = row as usize * self.row_bytes;
            buf[..self.row_bytes].copy_from_slice(&self.pixels[start..start + self.row_bytes]);
            Ok(())
        }
    }

    /// Sink recording every tile or row it receives, in call order.
    #[derive(Default)]
    pub struct RecordingSink {
        pub tiles: Vec<(u32, u32, Vec<u8>)>,
        pub rows: Vec<(u32, Vec<u8>)>,
    }

    impl TileSink for RecordingSink {
        fn write_tile(&mut self, tile: &[u8], x: u32, y: u32) -> retile_tiff::Result<()> {
            self.tiles.push((x, y, tile.to_vec()));
            Ok(())
        }
    }

    impl RowSink for RecordingSink {
        fn write_row(&mut self, row: &[u8], index: u32) -> retile_tiff::Result<()> {
            self.rows.push((index, row.to_vec()));
            Ok(())
        }
    }
}
