//! Row access to striped and tiled TIFF files

use crate::error::{Result, TiffError};
use crate::ifd::{Endian, Ifd, IfdValue};
use crate::types::{ChunkLayout, TiffInfo};
use crate::TIFF_VERSION;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, trace};

/// Reader over the first image of a TIFF file.
///
/// Opening parses only the header and the first directory, so metadata
/// queries stay cheap. Pixel data is pulled one row at a time with
/// [`TiffReader::read_row`], which works for both strip and tile layouts.
pub struct TiffReader<R> {
    reader: R,
    endian: Endian,
    ifd: Ifd,
    info: TiffInfo,
    validated: bool,
}

impl TiffReader<BufReader<File>> {
    /// Open a TIFF file from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening TIFF");
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> TiffReader<R> {
    /// Parse the header and first IFD of `reader`
    pub fn new(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 2];
        reader.read_exact(&mut magic)?;
        let endian = Endian::from_magic(magic)?;

        let version = endian.read_u16(&mut reader)?;
        if version != TIFF_VERSION {
            return Err(TiffError::UnsupportedVersion { version });
        }

        let ifd_offset = endian.read_u32(&mut reader)?;
        let ifd = Ifd::read(&mut reader, ifd_offset, endian)?;
        let info = TiffInfo::from_ifd(&ifd)?;
        debug!(%info, ?endian, entries = ifd.len(), "parsed first IFD");

        Ok(TiffReader {
            reader,
            endian,
            ifd,
            info,
            validated: false,
        })
    }

    /// Byte order of the file
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Image properties
    pub fn info(&self) -> &TiffInfo {
        &self.info
    }

    /// Raw value of a tag in the first directory
    pub fn field(&self, tag: u16) -> Option<&IfdValue> {
        self.ifd.get_value(tag)
    }

    /// First value of a tag as u32
    pub fn field_u32(&self, tag: u16) -> Option<u32> {
        self.ifd.get_u32(tag)
    }

    /// Check that the pixel data the directory describes can be read.
    ///
    /// On top of [`TiffInfo::ensure_readable`], the decoded image must not be
    /// larger than the stream holding it, so a forged header cannot make a
    /// caller allocate more than the file could ever fill.
    pub fn validate(&mut self) -> Result<()> {
        if self.validated {
            return Ok(());
        }
        self.info.ensure_readable()?;

        let stream_len = self.reader.seek(SeekFrom::End(0))?;
        let image_bytes = self.info.image_bytes().ok_or(TiffError::InvalidDimensions {
            width: self.info.width,
            height: self.info.height,
        })?;
        if image_bytes > stream_len {
            return Err(TiffError::InsufficientData {
                needed: usize::try_from(image_bytes).unwrap_or(usize::MAX),
                available: usize::try_from(stream_len).unwrap_or(usize::MAX),
            });
        }

        self.validated = true;
        Ok(())
    }

    /// Read row `row` into the front of `buf`.
    ///
    /// `buf` must hold at least [`TiffInfo::bytes_per_row`] bytes. Tiled
    /// files are stitched from the tiles crossing the row, cropped to the
    /// image width.
    pub fn read_row(&mut self, row: u32, buf: &mut [u8]) -> Result<()> {
        self.validate()?;
        if row >= self.info.height {
            return Err(TiffError::RowOutOfRange {
                row,
                height: self.info.height,
            });
        }
        let row_bytes = self.info.bytes_per_row();
        if buf.len() < row_bytes {
            return Err(TiffError::BufferTooSmall {
                needed: row_bytes,
                available: buf.len(),
            });
        }

        match &self.info.layout {
            ChunkLayout::Strips {
                rows_per_strip,
                offsets,
                byte_counts,
            } => {
                let strip = (row / rows_per_strip) as usize;
                let within = (row % rows_per_strip) as usize;
                let start = within * row_bytes;
                check_extent(byte_counts[strip], start + row_bytes)?;

                trace!(row, strip, "reading strip row");
                self.reader
                    .seek(SeekFrom::Start(offsets[strip] as u64 + start as u64))?;
                self.reader.read_exact(&mut buf[..row_bytes])?;
            }
            ChunkLayout::Tiles {
                tile_width,
                tile_height,
                offsets,
                byte_counts,
            } => {
                let bpp = self.info.bytes_per_pixel();
                let tile_row_bytes = *tile_width as usize * bpp;
                let cols = self.info.width.div_ceil(*tile_width);
                let tile_row = row / tile_height;
                let start = (row % tile_height) as usize * tile_row_bytes;

                for col in 0..cols {
                    let index = (tile_row * cols + col) as usize;
                    check_extent(byte_counts[index], start + tile_row_bytes)?;

                    let x = (col * tile_width) as usize;
                    let span = (*tile_width as usize).min(self.info.width as usize - x) * bpp;
                    let dest = x * bpp;

                    trace!(row, tile = index, "reading tile row");
                    self.reader
                        .seek(SeekFrom::Start(offsets[index] as u64 + start as u64))?;
                    self.reader.read_exact(&mut buf[dest..dest + span])?;
                }
            }
        }

        Ok(())
    }

    /// Consume the reader, returning the underlying stream
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Make sure a chunk's declared byte count covers `needed` bytes
fn check_extent(byte_count: u32, needed: usize) -> Result<()> {
    if (byte_count as usize) < needed {
        return Err(TiffError::InsufficientData {
            needed,
            available: byte_count as usize,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ifd::IfdEntry;
    use crate::tags::tag;
    use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
    use std::io::{Cursor, Write};

    /// Build a striped file by hand: header, pixel data at offset 8, IFD after.
    fn striped_file<B: ByteOrder>(magic: [u8; 2], width: u32, rows: &[Vec<u8>], rps: u32) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_all(&magic).unwrap();
        cursor.write_u16::<B>(TIFF_VERSION).unwrap();
        cursor.write_u32::<B>(0).unwrap();

        let row_bytes = rows[0].len() as u32;
        let mut offsets = Vec::new();
        let mut counts = Vec::new();
        for strip in rows.chunks(rps as usize) {
            offsets.push(cursor.position() as u32);
            counts.push(strip.len() as u32 * row_bytes);
            for row in strip {
                cursor.write_all(row).unwrap();
            }
        }

        let mut ifd = Ifd::new();
        ifd.add(IfdEntry::long(tag::IMAGE_WIDTH, width));
        ifd.add(IfdEntry::long(tag::IMAGE_LENGTH, rows.len() as u32));
        ifd.add(IfdEntry::short(tag::BITS_PER_SAMPLE, 8));
        ifd.add(IfdEntry::short(tag::SAMPLES_PER_PIXEL, (row_bytes / width) as u16));
        ifd.add(IfdEntry::long(tag::ROWS_PER_STRIP, rps));
        ifd.add(IfdEntry::new(tag::STRIP_OFFSETS, IfdValue::Longs(offsets)));
        ifd.add(IfdEntry::new(tag::STRIP_BYTE_COUNTS, IfdValue::Longs(counts)));

        if cursor.position() % 2 != 0 {
            cursor.write_u8(0).unwrap();
        }
        let ifd_offset = ifd.write::<_, B>(&mut cursor).unwrap();
        cursor.set_position(4);
        cursor.write_u32::<B>(ifd_offset).unwrap();
        cursor.into_inner()
    }

    fn gray_rows(width: u32, height: u32) -> Vec<Vec<u8>> {
        (0..height)
            .map(|y| (0..width).map(|x| (y * width + x) as u8).collect())
            .collect()
    }

    #[test]
    fn test_read_striped_rows() {
        let rows = gray_rows(5, 7);
        let data = striped_file::<LittleEndian>(*b"II", 5, &rows, 3);
        let mut reader = TiffReader::new(Cursor::new(data)).unwrap();

        assert_eq!(reader.info().width, 5);
        assert_eq!(reader.info().height, 7);
        assert!(!reader.info().is_tiled());

        let mut buf = vec![0u8; 5];
        for (y, expected) in rows.iter().enumerate() {
            reader.read_row(y as u32, &mut buf).unwrap();
            assert_eq!(&buf, expected);
        }
    }

    #[test]
    fn test_read_big_endian_file() {
        let rows = gray_rows(4, 2);
        let data = striped_file::<BigEndian>(*b"MM", 4, &rows, 1);
        let mut reader = TiffReader::new(Cursor::new(data)).unwrap();
        assert_eq!(reader.endian(), Endian::Big);

        let mut buf = vec![0u8; 4];
        reader.read_row(1, &mut buf).unwrap();
        assert_eq!(buf, rows[1]);
    }

    #[test]
    fn test_field_queries() {
        let data = striped_file::<LittleEndian>(*b"II", 3, &gray_rows(3, 2), 2);
        let reader = TiffReader::new(Cursor::new(data)).unwrap();
        assert_eq!(reader.field_u32(tag::ROWS_PER_STRIP), Some(2));
        assert_eq!(reader.field_u32(tag::TILE_WIDTH), None);
        assert!(reader.field(tag::STRIP_OFFSETS).is_some());
    }

    #[test]
    fn test_row_out_of_range() {
        let data = striped_file::<LittleEndian>(*b"II", 3, &gray_rows(3, 2), 2);
        let mut reader = TiffReader::new(Cursor::new(data)).unwrap();
        let mut buf = vec![0u8; 3];
        assert!(matches!(
            reader.read_row(2, &mut buf),
            Err(TiffError::RowOutOfRange { row: 2, height: 2 })
        ));
    }

    #[test]
    fn test_short_buffer() {
        let data = striped_file::<LittleEndian>(*b"II", 3, &gray_rows(3, 2), 2);
        let mut reader = TiffReader::new(Cursor::new(data)).unwrap();
        let mut buf = vec![0u8; 2];
        assert!(matches!(
            reader.read_row(0, &mut buf),
            Err(TiffError::BufferTooSmall { needed: 3, available: 2 })
        ));
    }

    #[test]
    fn test_bad_magic_and_version() {
        let err = TiffReader::new(Cursor::new(b"PK\x03\x04\0\0\0\0".to_vec()))
            .err()
            .unwrap();
        assert!(matches!(err, TiffError::InvalidMagic));

        let err = TiffReader::new(Cursor::new(b"II\x2b\x00\x08\0\0\0".to_vec()))
            .err()
            .unwrap();
        assert!(matches!(err, TiffError::UnsupportedVersion { version: 43 }));
    }

    /// Header claiming `width`x`height` with one 16-byte strip behind it.
    fn forged_file(width: u32, height: u32, samples: u16) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_all(b"II").unwrap();
        cursor.write_u16::<LittleEndian>(TIFF_VERSION).unwrap();
        cursor.write_u32::<LittleEndian>(0).unwrap();
        cursor.write_all(&[0x5a; 16]).unwrap();

        let mut ifd = Ifd::new();
        ifd.add(IfdEntry::long(tag::IMAGE_WIDTH, width));
        ifd.add(IfdEntry::long(tag::IMAGE_LENGTH, height));
        ifd.add(IfdEntry::short(tag::BITS_PER_SAMPLE, 8));
        ifd.add(IfdEntry::short(tag::SAMPLES_PER_PIXEL, samples));
        ifd.add(IfdEntry::new(tag::STRIP_OFFSETS, IfdValue::Longs(vec![8])));
        ifd.add(IfdEntry::new(tag::STRIP_BYTE_COUNTS, IfdValue::Longs(vec![16])));
        let ifd_offset = ifd.write::<_, LittleEndian>(&mut cursor).unwrap();
        cursor.set_position(4);
        cursor.write_u32::<LittleEndian>(ifd_offset).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_overflowing_geometry_rejected() {
        let data = forged_file(2_776_772_498, 949_033_151, 7);
        let mut reader = TiffReader::new(Cursor::new(data)).unwrap();
        assert!(matches!(
            reader.validate(),
            Err(TiffError::InvalidDimensions {
                width: 2_776_772_498,
                height: 949_033_151
            })
        ));
        let mut buf = vec![0u8; 16];
        assert!(reader.read_row(0, &mut buf).is_err());
    }

    #[test]
    fn test_image_larger_than_file_rejected() {
        let data = forged_file(1000, 1000, 3);
        let len = data.len();
        let mut reader = TiffReader::new(Cursor::new(data)).unwrap();
        match reader.validate() {
            Err(TiffError::InsufficientData { needed, available }) => {
                assert_eq!(needed, 3_000_000);
                assert_eq!(available, len);
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_file() {
        let data = striped_file::<LittleEndian>(*b"II", 3, &gray_rows(3, 2), 2);
        let mut reader = TiffReader::new(Cursor::new(data)).unwrap();
        assert!(reader.validate().is_ok());
        assert!(reader.validate().is_ok());
    }

    #[test]
    fn test_truncated_header() {
        let err = TiffReader::new(Cursor::new(b"II".to_vec())).err().unwrap();
        assert!(matches!(err, TiffError::Io(_)));
    }
}
