//! Bridge between rasters and a lossy scanline codec.
//!
//! The codec is driven strictly one row at a time through
//! [`ScanlineEncoder`] and [`ScanlineDecoder`]; [`jpeg`] provides the JPEG
//! implementations used by the pipeline.

pub mod jpeg;

pub use jpeg::{JpegScanlineDecoder, JpegScanlineEncoder};

use crate::container::{discard_on_error, RowSink};
use crate::error::{CodecError, Error, Result};
use crate::raster::RasterBuffer;
use retile_tiff::{tag, value, IfdEntry, IfdValue, Photometric, TiffWriter};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, Write};
use std::path::Path;
use tracing::{debug, info, trace, warn};

/// Encoder quality, 1 (smallest) to 100 (best).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(u8);

impl Quality {
    pub const MAX: Quality = Quality(100);

    /// Clamp `value` into the codec's 1..=100 range.
    pub fn new(value: u8) -> Self {
        let clamped = value.clamp(1, 100);
        if clamped != value {
            warn!(requested = value, used = clamped, "quality clamped");
        }
        Quality(clamped)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality::MAX
    }
}

/// Geometry and settings announced to an encoder before the first row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub width: u32,
    pub height: u32,
    pub components: u16,
    pub quality: Quality,
}

impl EncodeParams {
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.components as usize
    }
}

/// Geometry recovered from a compressed stream's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamHeader {
    pub width: u32,
    pub height: u32,
    pub components: u16,
}

impl StreamHeader {
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.components as usize
    }
}

/// Push-style row encoder.
pub trait ScanlineEncoder {
    /// Start a stream with the given geometry.
    fn begin(&mut self, params: EncodeParams) -> std::result::Result<(), CodecError>;

    /// Encode the next row, top to bottom.
    fn encode_row(&mut self, row: &[u8]) -> std::result::Result<(), CodecError>;

    /// Complete the stream once every row has been supplied.
    fn finish(&mut self) -> std::result::Result<(), CodecError>;
}

/// Pull-style row decoder.
pub trait ScanlineDecoder {
    /// Geometry declared by the stream.
    fn header(&self) -> StreamHeader;

    /// Decode the next row into `buf`. Returns `false` once the stream has no
    /// more rows.
    fn decode_row(&mut self, buf: &mut [u8]) -> std::result::Result<bool, CodecError>;

    /// Release the stream.
    fn finish(&mut self) -> std::result::Result<(), CodecError>;
}

/// Compress every row of an 8-bit RGB raster through `encoder`.
///
/// Each row is copied into one reusable scratch buffer and submitted from
/// there, in order, exactly once, between `begin` and `finish`.
pub fn compress<E: ScanlineEncoder + ?Sized>(
    raster: &RasterBuffer,
    encoder: &mut E,
    quality: Quality,
) -> Result<()> {
    ensure_compressible(raster)?;

    let params = EncodeParams {
        width: raster.width(),
        height: raster.height(),
        components: raster.samples_per_pixel(),
        quality,
    };
    debug!(
        width = params.width,
        height = params.height,
        quality = quality.get(),
        "compressing raster"
    );
    encoder.begin(params)?;

    let mut scratch = vec![0u8; params.row_bytes()];
    for (index, row) in raster.rows().enumerate() {
        scratch.copy_from_slice(row);
        trace!(row = index, "encoding row");
        encoder.encode_row(&scratch)?;
    }

    encoder.finish()?;
    Ok(())
}

/// Compress `raster` to a JPEG file, returning the bytes written.
pub fn compress_to_file(
    raster: &RasterBuffer,
    path: impl AsRef<Path>,
    quality: Quality,
) -> Result<u64> {
    let path = path.as_ref();
    // Refuse before touching the filesystem
    ensure_compressible(raster)?;
    let file = File::create(path).map_err(|source| Error::SinkCreate {
        path: path.to_path_buf(),
        source,
    })?;

    discard_on_error(path, encode_to(raster, file, quality))?;

    let bytes = std::fs::metadata(path).map_err(CodecError::from)?.len();
    info!(path = %path.display(), bytes, "wrote compressed stream");
    Ok(bytes)
}

/// Only populated 3 x 8-bit rasters can be compressed.
fn ensure_compressible(raster: &RasterBuffer) -> Result<()> {
    raster.ensure_populated()?;
    if raster.samples_per_pixel() != 3 || raster.bits_per_sample() != 8 {
        return Err(Error::UnsupportedLayout(format!(
            "compression needs 3 samples of 8 bits, raster has {} of {}",
            raster.samples_per_pixel(),
            raster.bits_per_sample()
        )));
    }
    Ok(())
}

/// Decode every row of `decoder` into `sink`.
///
/// Row `i` of the stream is written at index `i`. A stream that runs out of
/// rows before its declared height is [`Error::TruncatedStream`].
pub fn decompress<D, S>(decoder: &mut D, sink: &mut S) -> Result<StreamHeader>
where
    D: ScanlineDecoder + ?Sized,
    S: RowSink + ?Sized,
{
    let header = decoder.header();
    debug!(
        width = header.width,
        height = header.height,
        components = header.components,
        "decompressing stream"
    );

    let mut row = vec![0u8; header.row_bytes()];
    for index in 0..header.height {
        if !decoder.decode_row(&mut row)? {
            return Err(Error::TruncatedStream {
                expected: header.height,
                decoded: index,
            });
        }
        trace!(row = index, "writing decoded row");
        sink.write_row(&row, index)?;
    }

    decoder.finish()?;
    Ok(header)
}

fn encode_to(raster: &RasterBuffer, file: File, quality: Quality) -> Result<()> {
    let mut encoder = JpegScanlineEncoder::new(BufWriter::new(file));
    compress(raster, &mut encoder, quality)?;
    let mut writer = encoder.into_inner();
    writer.flush().map_err(CodecError::from)?;
    Ok(())
}

/// Decode a JPEG file into a scanline TIFF.
///
/// A stream that fails part way leaves no output behind.
pub fn decompress_file(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<StreamHeader> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let file = File::open(input).map_err(|source| Error::SourceOpen {
        path: input.to_path_buf(),
        source,
    })?;
    let mut decoder = JpegScanlineDecoder::new(BufReader::new(file))?;
    let header = decoder.header();

    let target_err = |source: retile_tiff::TiffError| Error::TargetCreate {
        path: output.to_path_buf(),
        source,
    };
    let writer = TiffWriter::create(output).map_err(target_err)?;
    discard_on_error(output, write_scanlines(&mut decoder, &header, writer, target_err))?;
    info!(
        output = %output.display(),
        rows = header.height,
        "wrote decompressed container"
    );
    Ok(header)
}

fn write_scanlines<W: Write + Seek>(
    decoder: &mut JpegScanlineDecoder,
    header: &StreamHeader,
    mut writer: TiffWriter<W>,
    target_err: impl Fn(retile_tiff::TiffError) -> Error,
) -> Result<()> {
    for entry in scanline_fields(header) {
        writer.set_field(entry).map_err(&target_err)?;
    }
    decompress(decoder, &mut writer)?;
    writer.close()?;
    Ok(())
}

/// Directory entries for a scanline container holding a decoded stream.
fn scanline_fields(header: &StreamHeader) -> Vec<IfdEntry> {
    vec![
        IfdEntry::long(tag::IMAGE_WIDTH, header.width),
        IfdEntry::long(tag::IMAGE_LENGTH, header.height),
        IfdEntry::new(
            tag::BITS_PER_SAMPLE,
            IfdValue::Shorts(vec![8; header.components as usize]),
        ),
        IfdEntry::short(tag::SAMPLES_PER_PIXEL, header.components),
        IfdEntry::short(
            tag::PHOTOMETRIC_INTERPRETATION,
            Photometric::for_samples(header.components).to_u16(),
        ),
        IfdEntry::short(tag::PLANAR_CONFIGURATION, value::PLANAR_CONTIG),
        IfdEntry::short(tag::ORIENTATION, value::ORIENTATION_TOP_LEFT),
    ]
}
