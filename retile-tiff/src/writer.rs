//! Incremental TIFF writer for tile-at-a-time and row-at-a-time output

use crate::error::{Result, TiffError};
use crate::ifd::{offset_u32, Ifd, IfdEntry, IfdValue};
use crate::tags::{is_geometry_tag, tag, tag_name, value};
use crate::{TIFF_MAGIC_LE, TIFF_VERSION};
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, trace};

/// Position of the first-IFD offset in the header
const IFD_OFFSET_POS: u64 = 4;

/// Geometry fixed at the first chunk write
#[derive(Debug, Clone, Copy)]
struct Plan {
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
    tiles: Option<(u32, u32)>,
}

impl Plan {
    fn chunk_count(&self) -> usize {
        match self.tiles {
            Some((tw, th)) => self.width.div_ceil(tw) as usize * self.height.div_ceil(th) as usize,
            None => self.height as usize,
        }
    }

    fn chunk_bytes(&self) -> usize {
        match self.tiles {
            Some((tw, th)) => tw as usize * th as usize * self.bytes_per_pixel,
            None => self.width as usize * self.bytes_per_pixel,
        }
    }
}

/// Little-endian TIFF writer.
///
/// Fields are staged with [`set_field`](TiffWriter::set_field); pixel data is
/// appended either tile by tile or row by row (one strip per row). The first
/// chunk write fixes the geometry. [`close`](TiffWriter::close) refuses to
/// finish an image with missing chunks, then writes the directory and patches
/// the header to point at it.
pub struct TiffWriter<W: Write + Seek> {
    writer: W,
    ifd: Ifd,
    plan: Option<Plan>,
    offsets: Vec<u32>,
    byte_counts: Vec<u32>,
    written: Vec<bool>,
    chunks_written: usize,
    end: u64,
}

impl TiffWriter<BufWriter<File>> {
    /// Create (or truncate) a TIFF file on disk
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "creating TIFF");
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write + Seek> TiffWriter<W> {
    /// Start a TIFF stream on `writer`, emitting the header immediately
    pub fn new(mut writer: W) -> Result<Self> {
        writer.write_all(&TIFF_MAGIC_LE)?;
        writer.write_u16::<LittleEndian>(TIFF_VERSION)?;
        // Patched by close()
        writer.write_u32::<LittleEndian>(0)?;

        Ok(TiffWriter {
            writer,
            ifd: Ifd::new(),
            plan: None,
            offsets: Vec::new(),
            byte_counts: Vec::new(),
            written: Vec::new(),
            chunks_written: 0,
            end: 8,
        })
    }

    /// Stage a directory entry, replacing any earlier value for the tag.
    ///
    /// Geometry tags are locked once pixel data has been written.
    pub fn set_field(&mut self, entry: IfdEntry) -> Result<()> {
        if self.plan.is_some() && is_geometry_tag(entry.tag) {
            return Err(TiffError::FieldLocked(tag_name(entry.tag)));
        }
        self.ifd.add(entry);
        Ok(())
    }

    /// Staged value of a tag
    pub fn field(&self, tag: u16) -> Option<&IfdValue> {
        self.ifd.get_value(tag)
    }

    /// Number of tiles or rows written so far
    pub fn chunks_written(&self) -> usize {
        self.chunks_written
    }

    /// Write one full nominal-size tile whose top-left pixel is `(x, y)`.
    ///
    /// Edge tiles are written at full size; the caller pads them.
    pub fn write_tile(&mut self, tile: &[u8], x: u32, y: u32) -> Result<()> {
        let plan = self.begin(true)?;
        let Some((tile_width, tile_height)) = plan.tiles else {
            return Err(TiffError::MissingTag(tag_name(tag::TILE_WIDTH)));
        };

        if x % tile_width != 0 || y % tile_height != 0 || x >= plan.width || y >= plan.height {
            return Err(TiffError::TileOutOfGrid {
                x,
                y,
                tile_width,
                tile_height,
            });
        }

        let cols = plan.width.div_ceil(tile_width);
        let index = ((y / tile_height) * cols + x / tile_width) as usize;
        if self.written[index] {
            return Err(TiffError::TileAlreadyWritten { x, y });
        }

        trace!(x, y, index, "writing tile");
        self.append_chunk(index, tile, plan.chunk_bytes())
    }

    /// Write row `row` as its own strip
    pub fn write_row(&mut self, row_data: &[u8], row: u32) -> Result<()> {
        let plan = self.begin(false)?;
        if plan.tiles.is_some() {
            return Err(TiffError::UnsupportedLayout(
                "row writes into a tiled image".into(),
            ));
        }
        if row >= plan.height {
            return Err(TiffError::RowOutOfRange {
                row,
                height: plan.height,
            });
        }
        let index = row as usize;
        if self.written[index] {
            return Err(TiffError::RowAlreadyWritten(row));
        }

        trace!(row, "writing row");
        self.append_chunk(index, row_data, plan.chunk_bytes())
    }

    /// Finish the image and return the underlying stream.
    ///
    /// Fails with [`TiffError::IncompleteImage`] unless every tile or row has
    /// been written exactly once.
    pub fn close(mut self) -> Result<W> {
        let plan = match self.plan {
            Some(plan) => plan,
            None => self.plan_from_fields()?,
        };
        let expected = plan.chunk_count();
        if self.chunks_written != expected {
            return Err(TiffError::IncompleteImage {
                written: self.chunks_written,
                expected,
            });
        }

        let offsets = IfdValue::Longs(std::mem::take(&mut self.offsets));
        let byte_counts = IfdValue::Longs(std::mem::take(&mut self.byte_counts));
        self.ifd.add(IfdEntry::short(tag::COMPRESSION, value::COMPRESSION_NONE));
        match plan.tiles {
            Some(_) => {
                self.ifd.add(IfdEntry::new(tag::TILE_OFFSETS, offsets));
                self.ifd.add(IfdEntry::new(tag::TILE_BYTE_COUNTS, byte_counts));
            }
            None => {
                self.ifd.add(IfdEntry::long(tag::ROWS_PER_STRIP, 1));
                self.ifd.add(IfdEntry::new(tag::STRIP_OFFSETS, offsets));
                self.ifd.add(IfdEntry::new(tag::STRIP_BYTE_COUNTS, byte_counts));
            }
        }

        // IFDs start on a word boundary
        if self.end % 2 != 0 {
            self.writer.write_u8(0)?;
        }
        let ifd_offset = self.ifd.write::<_, LittleEndian>(&mut self.writer)?;

        self.writer.seek(SeekFrom::Start(IFD_OFFSET_POS))?;
        self.writer.write_u32::<LittleEndian>(ifd_offset)?;
        self.writer.seek(SeekFrom::End(0))?;
        self.writer.flush()?;

        debug!(
            chunks = expected,
            ifd_offset,
            tiled = plan.tiles.is_some(),
            "closed TIFF"
        );
        Ok(self.writer)
    }

    /// Fix the geometry on the first chunk write
    fn begin(&mut self, tiled: bool) -> Result<Plan> {
        if let Some(plan) = self.plan {
            return Ok(plan);
        }
        let plan = self.plan_from_fields()?;
        if tiled && plan.tiles.is_none() {
            return Err(TiffError::MissingTag(tag_name(tag::TILE_WIDTH)));
        }
        if !tiled && plan.tiles.is_some() {
            return Err(TiffError::UnsupportedLayout(
                "row writes into a tiled image".into(),
            ));
        }

        let count = plan.chunk_count();
        self.offsets = vec![0; count];
        self.byte_counts = vec![0; count];
        self.written = vec![false; count];
        self.plan = Some(plan);
        debug!(
            width = plan.width,
            height = plan.height,
            chunks = count,
            tiled,
            "image geometry fixed"
        );
        Ok(plan)
    }

    fn plan_from_fields(&self) -> Result<Plan> {
        let width = self.ifd.get_required_u32(tag::IMAGE_WIDTH)?;
        let height = self.ifd.get_required_u32(tag::IMAGE_LENGTH)?;
        if width == 0 || height == 0 {
            return Err(TiffError::InvalidDimensions { width, height });
        }
        let bits = self.ifd.get_u32_or(tag::BITS_PER_SAMPLE, 8);
        if bits != 8 {
            return Err(TiffError::UnsupportedLayout(format!(
                "{} bits per sample",
                bits
            )));
        }
        let samples = self.ifd.get_u32_or(tag::SAMPLES_PER_PIXEL, 1).max(1);

        let tiles = match self.ifd.get_u32(tag::TILE_WIDTH) {
            Some(tw) => {
                let th = self.ifd.get_required_u32(tag::TILE_LENGTH)?;
                if tw == 0 || th == 0 {
                    return Err(TiffError::UnsupportedLayout(format!("{}x{} tiles", tw, th)));
                }
                Some((tw, th))
            }
            None => None,
        };

        Ok(Plan {
            width,
            height,
            bytes_per_pixel: samples as usize,
            tiles,
        })
    }

    fn append_chunk(&mut self, index: usize, data: &[u8], chunk_bytes: usize) -> Result<()> {
        if data.len() < chunk_bytes {
            return Err(TiffError::BufferTooSmall {
                needed: chunk_bytes,
                available: data.len(),
            });
        }

        let offset = offset_u32(self.end)?;
        let end = self.end + chunk_bytes as u64;
        offset_u32(end)?;
        self.writer.write_all(&data[..chunk_bytes])?;
        self.end = end;

        self.offsets[index] = offset;
        self.byte_counts[index] = chunk_bytes as u32;
        self.written[index] = true;
        self.chunks_written += 1;
        Ok(())
    }
}
