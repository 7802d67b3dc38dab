//! JPEG scanline codec backed by the `image` crate.
//!
//! The underlying encoder and decoder work on whole frames, so the encoder
//! stages rows until `finish` and the decoder decodes once at open and then
//! serves rows one at a time. A stream cut off before its end-of-image marker
//! serves no rows at all, since the frame decoder fills missing data silently.

use super::{EncodeParams, ScanlineDecoder, ScanlineEncoder, StreamHeader};
use crate::error::CodecError;
use image::codecs::jpeg::{JpegDecoder, JpegEncoder};
use image::{ColorType, ExtendedColorType, ImageDecoder};
use std::io::{Cursor, Read, Write};
use tracing::{debug, warn};

/// Largest dimension a baseline JPEG frame header can carry.
const MAX_DIMENSION: u32 = u16::MAX as u32;

type Result<T> = std::result::Result<T, CodecError>;

fn color_type(components: u16) -> Result<ExtendedColorType> {
    match components {
        1 => Ok(ExtendedColorType::L8),
        3 => Ok(ExtendedColorType::Rgb8),
        other => Err(CodecError::UnsupportedComponents(other)),
    }
}

/// JPEG encoder fed one row at a time.
pub struct JpegScanlineEncoder<W: Write> {
    writer: W,
    params: Option<EncodeParams>,
    staged: Vec<u8>,
    rows: u32,
}

impl<W: Write> JpegScanlineEncoder<W> {
    pub fn new(writer: W) -> Self {
        JpegScanlineEncoder {
            writer,
            params: None,
            staged: Vec::new(),
            rows: 0,
        }
    }

    /// Return the output stream.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ScanlineEncoder for JpegScanlineEncoder<W> {
    fn begin(&mut self, params: EncodeParams) -> Result<()> {
        color_type(params.components)?;
        if params.width == 0
            || params.height == 0
            || params.width > MAX_DIMENSION
            || params.height > MAX_DIMENSION
        {
            return Err(CodecError::InvalidDimensions {
                width: params.width,
                height: params.height,
            });
        }

        self.staged = Vec::with_capacity(params.row_bytes() * params.height as usize);
        self.rows = 0;
        self.params = Some(params);
        Ok(())
    }

    fn encode_row(&mut self, row: &[u8]) -> Result<()> {
        let params = self.params.ok_or(CodecError::NotStarted)?;
        if row.len() != params.row_bytes() {
            return Err(CodecError::RowLength {
                expected: params.row_bytes(),
                actual: row.len(),
            });
        }
        if self.rows == params.height {
            return Err(CodecError::TooManyRows(params.height));
        }
        self.staged.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let params = self.params.take().ok_or(CodecError::NotStarted)?;
        if self.rows != params.height {
            return Err(CodecError::IncompleteImage {
                written: self.rows,
                expected: params.height,
            });
        }

        let staged = std::mem::take(&mut self.staged);
        JpegEncoder::new_with_quality(&mut self.writer, params.quality.get()).encode(
            &staged,
            params.width,
            params.height,
            color_type(params.components)?,
        )?;
        self.writer.flush()?;
        debug!(
            width = params.width,
            height = params.height,
            quality = params.quality.get(),
            "JPEG stream written"
        );
        Ok(())
    }
}

/// JPEG decoder serving rows top to bottom.
pub struct JpegScanlineDecoder {
    header: StreamHeader,
    pixels: Vec<u8>,
    next_row: u32,
}

impl JpegScanlineDecoder {
    /// Parse and decode a JPEG stream.
    pub fn new<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let complete = has_end_of_image(&data);

        let decoder = JpegDecoder::new(Cursor::new(data.as_slice()))?;
        let (width, height) = decoder.dimensions();
        let components = match decoder.color_type() {
            ColorType::L8 => 1,
            ColorType::Rgb8 => 3,
            other => return Err(CodecError::UnsupportedComponents(other.channel_count() as u16)),
        };

        let pixels = if complete {
            let total = usize::try_from(decoder.total_bytes())
                .map_err(|_| CodecError::InvalidDimensions { width, height })?;
            let mut pixels = vec![0u8; total];
            decoder.read_image(&mut pixels)?;
            debug!(width, height, components, "JPEG stream decoded");
            pixels
        } else {
            warn!(width, height, "JPEG stream ends before its end-of-image marker");
            Vec::new()
        };

        Ok(JpegScanlineDecoder {
            header: StreamHeader {
                width,
                height,
                components,
            },
            pixels,
            next_row: 0,
        })
    }
}

/// Whether an end-of-image marker follows the last start-of-scan marker.
///
/// Entropy-coded data stuffs every 0xFF byte, so neither marker can appear
/// inside a scan.
fn has_end_of_image(data: &[u8]) -> bool {
    match data.windows(2).rposition(|w| *w == [0xFF, 0xDA]) {
        Some(scan) => data[scan..].windows(2).any(|w| *w == [0xFF, 0xD9]),
        None => false,
    }
}

impl ScanlineDecoder for JpegScanlineDecoder {
    fn header(&self) -> StreamHeader {
        self.header
    }

    fn decode_row(&mut self, buf: &mut [u8]) -> Result<bool> {
        if self.next_row >= self.header.height {
            return Ok(false);
        }
        let stride = self.header.row_bytes();
        if buf.len() < stride {
            return Err(CodecError::RowLength {
                expected: stride,
                actual: buf.len(),
            });
        }
        let start = self.next_row as usize * stride;
        let Some(row) = self.pixels.get(start..start + stride) else {
            return Ok(false);
        };
        buf[..stride].copy_from_slice(row);
        self.next_row += 1;
        Ok(true)
    }

    fn finish(&mut self) -> Result<()> {
        self.pixels = Vec::new();
        Ok(())
    }
}
