//! In-memory raster and the reader that fills it from a container.

use crate::container::ScanlineSource;
use crate::error::{Error, Result};
use retile_tiff::{tag, value, TiffReader};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, trace};

/// A fully decoded image held row-major in memory.
///
/// Samples are interleaved per pixel and rows are packed with no padding, so
/// `pixels.len() == height * bytes_per_row()` for every populated buffer.
/// The zero-sized value returned by [`RasterBuffer::empty`] stands for "not
/// yet populated" and is rejected by every transform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    samples_per_pixel: u16,
    bits_per_sample: u16,
    tile_width: u32,
    tile_height: u32,
    pixels: Vec<u8>,
}

/// Serializable description of a raster, without its pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RasterSummary {
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u16,
    pub bits_per_sample: u16,
    pub bytes: usize,
}

impl RasterBuffer {
    /// The unpopulated sentinel.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a raster from packed, interleaved 8-bit samples.
    pub fn from_pixels(
        width: u32,
        height: u32,
        samples_per_pixel: u16,
        bits_per_sample: u16,
        pixels: Vec<u8>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidRaster(format!(
                "dimensions {}x{} must be nonzero",
                width, height
            )));
        }
        if samples_per_pixel == 0 {
            return Err(Error::InvalidRaster("zero samples per pixel".into()));
        }
        if bits_per_sample != 8 {
            return Err(Error::UnsupportedLayout(format!(
                "{} bits per sample",
                bits_per_sample
            )));
        }

        let expected = packed_len(width, height, samples_per_pixel).ok_or_else(|| {
            Error::InvalidRaster(format!(
                "{}x{}x{} does not fit in memory",
                width, height, samples_per_pixel
            ))
        })?;
        if pixels.len() != expected {
            return Err(Error::InvalidRaster(format!(
                "{}x{}x{} needs {} bytes, got {}",
                width,
                height,
                samples_per_pixel,
                expected,
                pixels.len()
            )));
        }

        Ok(RasterBuffer {
            width,
            height,
            samples_per_pixel,
            bits_per_sample,
            tile_width: 0,
            tile_height: 0,
            pixels,
        })
    }

    /// Record the tile size the source was stored with.
    ///
    /// Advisory only: the pixels are always row-major.
    pub fn with_source_tiling(mut self, tile_width: u32, tile_height: u32) -> Self {
        self.tile_width = tile_width;
        self.tile_height = tile_height;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn samples_per_pixel(&self) -> u16 {
        self.samples_per_pixel
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    /// Source tile width, 0 when the source was scanline.
    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    /// Source tile height, 0 when the source was scanline.
    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.samples_per_pixel as usize * self.bits_per_sample as usize / 8
    }

    pub fn bytes_per_row(&self) -> usize {
        self.width as usize * self.bytes_per_pixel()
    }

    /// Row `r`, or `None` past the last row.
    pub fn row(&self, r: u32) -> Option<&[u8]> {
        if r >= self.height {
            return None;
        }
        let stride = self.bytes_per_row();
        let start = r as usize * stride;
        self.pixels.get(start..start + stride)
    }

    /// Rows top to bottom.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[u8]> {
        // max(1) keeps chunks_exact happy on the empty sentinel
        self.pixels.chunks_exact(self.bytes_per_row().max(1))
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }

    pub fn is_source_tiled(&self) -> bool {
        self.tile_width != 0
    }

    /// Fail with [`Error::EmptyRaster`] unless the buffer holds an image.
    pub fn ensure_populated(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptyRaster);
        }
        Ok(())
    }

    pub fn summary(&self) -> RasterSummary {
        RasterSummary {
            width: self.width,
            height: self.height,
            samples_per_pixel: self.samples_per_pixel,
            bits_per_sample: self.bits_per_sample,
            bytes: self.pixels.len(),
        }
    }
}

/// Open the container at `path` and decode every row into a raster.
pub fn read_raster(path: impl AsRef<Path>) -> Result<RasterBuffer> {
    let path = path.as_ref();
    let mut reader = TiffReader::open(path).map_err(|source| Error::ContainerOpen {
        path: path.to_path_buf(),
        source,
    })?;
    read_raster_from(&mut reader)
}

/// Decode every row of an already open source.
///
/// Rows are read in increasing order straight into their slot of the pixel
/// buffer. Nothing is returned unless every row was read.
pub fn read_raster_from<S: ScanlineSource + ?Sized>(source: &mut S) -> Result<RasterBuffer> {
    let width = required_field(source, tag::IMAGE_WIDTH, "ImageWidth")?;
    let height = required_field(source, tag::IMAGE_LENGTH, "ImageLength")?;
    let samples = source.field(tag::SAMPLES_PER_PIXEL).unwrap_or(1);
    let bits = source.field(tag::BITS_PER_SAMPLE).unwrap_or(1);
    let compression = source
        .field(tag::COMPRESSION)
        .unwrap_or(value::COMPRESSION_NONE as u32);
    let planar = source
        .field(tag::PLANAR_CONFIGURATION)
        .unwrap_or(value::PLANAR_CONTIG as u32);

    if compression != value::COMPRESSION_NONE as u32 {
        return Err(Error::UnsupportedLayout(format!(
            "compressed source (scheme {})",
            compression
        )));
    }
    if bits != 8 {
        return Err(Error::UnsupportedLayout(format!("{} bits per sample", bits)));
    }
    if planar == value::PLANAR_SEPARATE as u32 && samples > 1 {
        return Err(Error::UnsupportedLayout("planar sample storage".into()));
    }
    let samples = u16::try_from(samples)
        .map_err(|_| Error::UnsupportedLayout(format!("{} samples per pixel", samples)))?;

    source.validate()?;
    let len = packed_len(width, height, samples).ok_or_else(|| {
        Error::UnsupportedLayout(format!(
            "{}x{}x{} raster does not fit in memory",
            width, height, samples
        ))
    })?;
    debug!(width, height, samples, len, "reading raster");

    let stride = width as usize * samples as usize;
    let mut pixels = vec![0u8; len];
    for (row, slot) in (0..height).zip(pixels.chunks_exact_mut(stride.max(1))) {
        trace!(row, "reading row");
        source
            .read_row(row, slot)
            .map_err(|source| Error::SourceRead { row, source })?;
    }

    let mut raster = RasterBuffer::from_pixels(width, height, samples, 8, pixels)?;
    if let Some(tile_width) = source.field(tag::TILE_WIDTH).filter(|&tw| tw != 0) {
        let tile_height = source.field(tag::TILE_LENGTH).unwrap_or(0);
        raster = raster.with_source_tiling(tile_width, tile_height);
    }

    info!(
        width,
        height,
        samples,
        tiled = raster.is_source_tiled(),
        "raster read"
    );
    Ok(raster)
}

/// Byte length of a packed 8-bit raster, `None` on overflow.
fn packed_len(width: u32, height: u32, samples_per_pixel: u16) -> Option<usize> {
    (width as usize)
        .checked_mul(samples_per_pixel as usize)?
        .checked_mul(height as usize)
}

fn required_field<S: ScanlineSource + ?Sized>(
    source: &S,
    tag: u16,
    name: &'static str,
) -> Result<u32> {
    source
        .field(tag)
        .ok_or(Error::Container(retile_tiff::TiffError::MissingTag(name)))
}
