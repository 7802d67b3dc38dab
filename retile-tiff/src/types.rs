//! TIFF type definitions

use crate::error::{Result, TiffError};
use crate::ifd::Ifd;
use crate::tags::{tag, value};
use std::fmt;

/// Photometric interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Photometric {
    /// WhiteIsZero - min value is white
    WhiteIsZero,
    /// BlackIsZero - min value is black
    BlackIsZero,
    /// RGB color
    #[default]
    Rgb,
    /// Any other interpretation, carried through untouched
    Other(u16),
}

impl Photometric {
    /// Create from TIFF value
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => Photometric::WhiteIsZero,
            1 => Photometric::BlackIsZero,
            2 => Photometric::Rgb,
            other => Photometric::Other(other),
        }
    }

    /// Convert to TIFF value
    pub fn to_u16(self) -> u16 {
        match self {
            Photometric::WhiteIsZero => 0,
            Photometric::BlackIsZero => 1,
            Photometric::Rgb => 2,
            Photometric::Other(v) => v,
        }
    }

    /// Interpretation a writer should record for interleaved 8-bit samples
    pub fn for_samples(samples_per_pixel: u16) -> Self {
        if samples_per_pixel >= 3 {
            Photometric::Rgb
        } else {
            Photometric::BlackIsZero
        }
    }
}

/// How pixel data is split into independently addressable chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkLayout {
    /// Bands of full-width rows
    Strips {
        rows_per_strip: u32,
        offsets: Vec<u32>,
        byte_counts: Vec<u32>,
    },
    /// Grid of fixed-size rectangular blocks
    Tiles {
        tile_width: u32,
        tile_height: u32,
        offsets: Vec<u32>,
        byte_counts: Vec<u32>,
    },
}

impl ChunkLayout {
    /// Tile dimensions, if tiled
    pub fn tile_size(&self) -> Option<(u32, u32)> {
        match self {
            ChunkLayout::Tiles {
                tile_width,
                tile_height,
                ..
            } => Some((*tile_width, *tile_height)),
            ChunkLayout::Strips { .. } => None,
        }
    }

    /// Number of chunks recorded in the directory
    pub fn chunk_count(&self) -> usize {
        match self {
            ChunkLayout::Strips { offsets, .. } | ChunkLayout::Tiles { offsets, .. } => {
                offsets.len()
            }
        }
    }
}

/// Image properties parsed from the first IFD
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TiffInfo {
    /// Image width
    pub width: u32,
    /// Image height
    pub height: u32,
    /// Bits per sample (first sample; all samples share it in supported files)
    pub bits_per_sample: u16,
    /// Samples per pixel
    pub samples_per_pixel: u16,
    /// Photometric interpretation
    pub photometric: Photometric,
    /// Planar configuration tag value
    pub planar_config: u16,
    /// Compression tag value
    pub compression: u16,
    /// Strip or tile organisation
    pub layout: ChunkLayout,
}

impl TiffInfo {
    /// Extract image properties from a directory
    pub fn from_ifd(ifd: &Ifd) -> Result<Self> {
        let width = ifd.get_required_u32(tag::IMAGE_WIDTH)?;
        let height = ifd.get_required_u32(tag::IMAGE_LENGTH)?;
        let bits_per_sample = short_field(ifd, tag::BITS_PER_SAMPLE, 1)?;
        let samples_per_pixel = short_field(ifd, tag::SAMPLES_PER_PIXEL, 1)?;
        let photometric = Photometric::from_u16(short_field(
            ifd,
            tag::PHOTOMETRIC_INTERPRETATION,
            value::PHOTOMETRIC_RGB,
        )?);
        let planar_config = short_field(ifd, tag::PLANAR_CONFIGURATION, value::PLANAR_CONTIG)?;
        let compression = short_field(ifd, tag::COMPRESSION, value::COMPRESSION_NONE)?;

        let layout = match ifd.get_u32(tag::TILE_WIDTH) {
            Some(tile_width) if tile_width != 0 => ChunkLayout::Tiles {
                tile_width,
                tile_height: ifd.get_required_u32(tag::TILE_LENGTH)?,
                offsets: ifd.get_required_u32_vec(tag::TILE_OFFSETS)?,
                byte_counts: ifd.get_required_u32_vec(tag::TILE_BYTE_COUNTS)?,
            },
            _ => ChunkLayout::Strips {
                rows_per_strip: ifd.get_u32_or(tag::ROWS_PER_STRIP, height).clamp(1, height.max(1)),
                offsets: ifd.get_required_u32_vec(tag::STRIP_OFFSETS)?,
                byte_counts: ifd.get_required_u32_vec(tag::STRIP_BYTE_COUNTS)?,
            },
        };

        Ok(TiffInfo {
            width,
            height,
            bits_per_sample,
            samples_per_pixel,
            photometric,
            planar_config,
            compression,
            layout,
        })
    }

    /// Bytes per pixel for interleaved samples
    pub fn bytes_per_pixel(&self) -> usize {
        (self.bits_per_sample as usize * self.samples_per_pixel as usize).div_ceil(8)
    }

    /// Bytes per row
    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_pixel() * self.width as usize
    }

    /// Size of the decoded image in bytes, `None` if it overflows a u64
    pub fn image_bytes(&self) -> Option<u64> {
        (self.bytes_per_pixel() as u64)
            .checked_mul(self.width as u64)?
            .checked_mul(self.height as u64)
    }

    /// Whether the image is stored as tiles
    pub fn is_tiled(&self) -> bool {
        self.layout.tile_size().is_some()
    }

    /// Check that rows can be read directly from the file
    pub fn ensure_readable(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(TiffError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.compression != value::COMPRESSION_NONE {
            return Err(TiffError::UnsupportedCompression(self.compression));
        }
        if self.planar_config != value::PLANAR_CONTIG && self.samples_per_pixel > 1 {
            return Err(TiffError::UnsupportedLayout(
                "planar (separate) sample storage".into(),
            ));
        }
        if self.bits_per_sample != 8 {
            return Err(TiffError::UnsupportedLayout(format!(
                "{} bits per sample",
                self.bits_per_sample
            )));
        }
        if let ChunkLayout::Tiles {
            tile_width,
            tile_height,
            ..
        } = self.layout
        {
            if tile_height == 0 {
                return Err(TiffError::UnsupportedLayout(format!(
                    "{}x{} tiles",
                    tile_width, tile_height
                )));
            }
        }

        let (expected, offsets, counts) = match &self.layout {
            ChunkLayout::Strips {
                rows_per_strip,
                offsets,
                byte_counts,
            } => (self.height.div_ceil(*rows_per_strip) as usize, offsets, byte_counts),
            ChunkLayout::Tiles {
                tile_width,
                tile_height,
                offsets,
                byte_counts,
            } => (
                self.width.div_ceil(*tile_width) as usize
                    * self.height.div_ceil(*tile_height) as usize,
                offsets,
                byte_counts,
            ),
        };
        if offsets.len() < expected || counts.len() < expected {
            return Err(TiffError::InvalidIfd(format!(
                "expected {} chunks, directory lists {} offsets and {} byte counts",
                expected,
                offsets.len(),
                counts.len()
            )));
        }

        Ok(())
    }
}

/// A SHORT-sized field, rejecting values that do not fit in 16 bits
fn short_field(ifd: &Ifd, tag: u16, default: u16) -> Result<u16> {
    let value = ifd.get_u32_or(tag, default as u32);
    u16::try_from(value)
        .map_err(|_| TiffError::InvalidIfd(format!("tag {} value {} exceeds 16 bits", tag, value)))
}

impl fmt::Display for TiffInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TIFF {}x{} {}x{}bit",
            self.width, self.height, self.samples_per_pixel, self.bits_per_sample
        )?;
        if let Some((tw, th)) = self.layout.tile_size() {
            write!(f, " tiled {}x{}", tw, th)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ifd::{IfdEntry, IfdValue};

    fn striped_ifd() -> Ifd {
        let mut ifd = Ifd::new();
        ifd.add(IfdEntry::long(tag::IMAGE_WIDTH, 10));
        ifd.add(IfdEntry::long(tag::IMAGE_LENGTH, 4));
        ifd.add(IfdEntry::new(tag::BITS_PER_SAMPLE, IfdValue::Shorts(vec![8, 8, 8])));
        ifd.add(IfdEntry::short(tag::SAMPLES_PER_PIXEL, 3));
        ifd.add(IfdEntry::long(tag::ROWS_PER_STRIP, 2));
        ifd.add(IfdEntry::new(tag::STRIP_OFFSETS, IfdValue::Longs(vec![8, 68])));
        ifd.add(IfdEntry::new(tag::STRIP_BYTE_COUNTS, IfdValue::Longs(vec![60, 60])));
        ifd
    }

    #[test]
    fn test_photometric() {
        assert_eq!(Photometric::from_u16(2), Photometric::Rgb);
        assert_eq!(Photometric::Rgb.to_u16(), 2);
        assert_eq!(Photometric::from_u16(6), Photometric::Other(6));
        assert_eq!(Photometric::for_samples(1), Photometric::BlackIsZero);
        assert_eq!(Photometric::for_samples(3), Photometric::Rgb);
    }

    #[test]
    fn test_info_from_striped_ifd() {
        let info = TiffInfo::from_ifd(&striped_ifd()).unwrap();
        assert_eq!(info.width, 10);
        assert_eq!(info.bytes_per_pixel(), 3);
        assert_eq!(info.bytes_per_row(), 30);
        assert!(!info.is_tiled());
        assert!(info.ensure_readable().is_ok());
        assert_eq!(info.to_string(), "TIFF 10x4 3x8bit");
    }

    #[test]
    fn test_info_from_tiled_ifd() {
        let mut ifd = striped_ifd();
        ifd.add(IfdEntry::long(tag::TILE_WIDTH, 16));
        ifd.add(IfdEntry::long(tag::TILE_LENGTH, 16));
        ifd.add(IfdEntry::new(tag::TILE_OFFSETS, IfdValue::Longs(vec![8])));
        ifd.add(IfdEntry::new(tag::TILE_BYTE_COUNTS, IfdValue::Longs(vec![768])));

        let info = TiffInfo::from_ifd(&ifd).unwrap();
        assert_eq!(info.layout.tile_size(), Some((16, 16)));
        assert_eq!(info.layout.chunk_count(), 1);
        assert!(info.ensure_readable().is_ok());
    }

    #[test]
    fn test_oversized_short_fields_rejected() {
        let mut ifd = striped_ifd();
        ifd.add(IfdEntry::long(tag::BITS_PER_SAMPLE, 65544));
        assert!(matches!(TiffInfo::from_ifd(&ifd), Err(TiffError::InvalidIfd(_))));

        let mut ifd = striped_ifd();
        ifd.add(IfdEntry::long(tag::SAMPLES_PER_PIXEL, 0x1_0003));
        assert!(matches!(TiffInfo::from_ifd(&ifd), Err(TiffError::InvalidIfd(_))));
    }

    #[test]
    fn test_image_bytes() {
        let info = TiffInfo::from_ifd(&striped_ifd()).unwrap();
        assert_eq!(info.image_bytes(), Some(120));

        let mut ifd = striped_ifd();
        ifd.add(IfdEntry::long(tag::IMAGE_WIDTH, u32::MAX));
        ifd.add(IfdEntry::long(tag::IMAGE_LENGTH, u32::MAX));
        ifd.add(IfdEntry::short(tag::SAMPLES_PER_PIXEL, u16::MAX));
        let info = TiffInfo::from_ifd(&ifd).unwrap();
        assert_eq!(info.image_bytes(), None);
    }

    #[test]
    fn test_zero_tile_width_means_striped() {
        let mut ifd = striped_ifd();
        ifd.add(IfdEntry::long(tag::TILE_WIDTH, 0));
        let info = TiffInfo::from_ifd(&ifd).unwrap();
        assert!(!info.is_tiled());
    }

    #[test]
    fn test_unreadable_layouts() {
        let mut info = TiffInfo::from_ifd(&striped_ifd()).unwrap();
        info.compression = 5;
        assert!(matches!(
            info.ensure_readable(),
            Err(TiffError::UnsupportedCompression(5))
        ));

        let mut info = TiffInfo::from_ifd(&striped_ifd()).unwrap();
        info.bits_per_sample = 16;
        assert!(matches!(
            info.ensure_readable(),
            Err(TiffError::UnsupportedLayout(_))
        ));

        let mut info = TiffInfo::from_ifd(&striped_ifd()).unwrap();
        info.planar_config = value::PLANAR_SEPARATE;
        assert!(matches!(
            info.ensure_readable(),
            Err(TiffError::UnsupportedLayout(_))
        ));
    }

    #[test]
    fn test_missing_strip_offsets() {
        let mut ifd = Ifd::new();
        ifd.add(IfdEntry::long(tag::IMAGE_WIDTH, 10));
        ifd.add(IfdEntry::long(tag::IMAGE_LENGTH, 4));
        assert!(matches!(
            TiffInfo::from_ifd(&ifd),
            Err(TiffError::MissingTag("StripOffsets"))
        ));
    }
}
