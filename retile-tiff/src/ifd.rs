//! TIFF Image File Directory (IFD) handling

use crate::error::{Result, TiffError};
use crate::tags::{data_type, tag_name};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom, Write};

/// Upper bound for a single out-of-line tag value.
const MAX_VALUE_BYTES: usize = 64 * 1024 * 1024;

/// Byte order of a TIFF file, fixed by its first two bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// "II" - Intel
    Little,
    /// "MM" - Motorola
    Big,
}

impl Endian {
    /// Parse the byte order marker
    pub fn from_magic(magic: [u8; 2]) -> Result<Self> {
        match magic {
            crate::TIFF_MAGIC_LE => Ok(Endian::Little),
            crate::TIFF_MAGIC_BE => Ok(Endian::Big),
            _ => Err(TiffError::InvalidMagic),
        }
    }

    /// Byte order marker for this endianness
    pub fn magic(self) -> [u8; 2] {
        match self {
            Endian::Little => crate::TIFF_MAGIC_LE,
            Endian::Big => crate::TIFF_MAGIC_BE,
        }
    }

    pub(crate) fn read_u16<R: Read>(self, reader: &mut R) -> std::io::Result<u16> {
        match self {
            Endian::Little => reader.read_u16::<LittleEndian>(),
            Endian::Big => reader.read_u16::<BigEndian>(),
        }
    }

    pub(crate) fn read_u32<R: Read>(self, reader: &mut R) -> std::io::Result<u32> {
        match self {
            Endian::Little => reader.read_u32::<LittleEndian>(),
            Endian::Big => reader.read_u32::<BigEndian>(),
        }
    }

    fn u16_at(self, bytes: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(bytes),
            Endian::Big => BigEndian::read_u16(bytes),
        }
    }

    fn u32_at(self, bytes: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(bytes),
            Endian::Big => BigEndian::read_u32(bytes),
        }
    }
}

/// IFD entry value
#[derive(Debug, Clone, PartialEq)]
pub enum IfdValue {
    /// Byte values
    Bytes(Vec<u8>),
    /// ASCII string
    Ascii(String),
    /// Short (u16) values
    Shorts(Vec<u16>),
    /// Long (u32) values
    Longs(Vec<u32>),
    /// Rational (numerator/denominator) values
    Rationals(Vec<(u32, u32)>),
    /// Raw bytes of any type this crate does not interpret
    Undefined(Vec<u8>),
}

impl IfdValue {
    /// Get first value as u16
    pub fn as_u16(&self) -> Option<u16> {
        self.as_u32().and_then(|v| u16::try_from(v).ok())
    }

    /// Get first value as u32
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            IfdValue::Bytes(v) => v.first().map(|&b| b as u32),
            IfdValue::Shorts(v) => v.first().map(|&s| s as u32),
            IfdValue::Longs(v) => v.first().copied(),
            _ => None,
        }
    }

    /// Get all values as u32
    pub fn as_u32_vec(&self) -> Option<Vec<u32>> {
        match self {
            IfdValue::Bytes(v) => Some(v.iter().map(|&b| b as u32).collect()),
            IfdValue::Shorts(v) => Some(v.iter().map(|&s| s as u32).collect()),
            IfdValue::Longs(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            IfdValue::Ascii(s) => Some(s),
            _ => None,
        }
    }

    /// Get data type ID
    pub fn type_id(&self) -> u16 {
        match self {
            IfdValue::Bytes(_) => data_type::BYTE,
            IfdValue::Ascii(_) => data_type::ASCII,
            IfdValue::Shorts(_) => data_type::SHORT,
            IfdValue::Longs(_) => data_type::LONG,
            IfdValue::Rationals(_) => data_type::RATIONAL,
            IfdValue::Undefined(_) => data_type::UNDEFINED,
        }
    }

    /// Get count of values
    pub fn count(&self) -> u32 {
        let count = match self {
            IfdValue::Bytes(v) | IfdValue::Undefined(v) => v.len(),
            IfdValue::Ascii(s) => s.len() + 1, // Include null terminator
            IfdValue::Shorts(v) => v.len(),
            IfdValue::Longs(v) => v.len(),
            IfdValue::Rationals(v) => v.len(),
        };
        count as u32
    }

    /// Get total byte size
    pub fn byte_size(&self) -> usize {
        data_type::size(self.type_id()) * self.count() as usize
    }
}

/// IFD entry
#[derive(Debug, Clone, PartialEq)]
pub struct IfdEntry {
    /// Tag ID
    pub tag: u16,
    /// Value
    pub value: IfdValue,
}

impl IfdEntry {
    /// Create new entry
    pub fn new(tag: u16, value: IfdValue) -> Self {
        IfdEntry { tag, value }
    }

    /// Create short entry
    pub fn short(tag: u16, value: u16) -> Self {
        IfdEntry::new(tag, IfdValue::Shorts(vec![value]))
    }

    /// Create long entry
    pub fn long(tag: u16, value: u32) -> Self {
        IfdEntry::new(tag, IfdValue::Longs(vec![value]))
    }

    /// Create ASCII entry
    pub fn ascii(tag: u16, value: &str) -> Self {
        IfdEntry::new(tag, IfdValue::Ascii(value.to_string()))
    }
}

/// Image File Directory
#[derive(Debug, Clone, Default)]
pub struct Ifd {
    /// Entries by tag, kept in ascending tag order as the format requires
    entries: BTreeMap<u16, IfdEntry>,
    /// Offset to next IFD (0 if none)
    pub next_ifd_offset: u32,
}

impl Ifd {
    /// Create new empty IFD
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry
    pub fn add(&mut self, entry: IfdEntry) {
        self.entries.insert(entry.tag, entry);
    }

    /// Get value by tag
    pub fn get_value(&self, tag: u16) -> Option<&IfdValue> {
        self.entries.get(&tag).map(|e| &e.value)
    }

    /// Get first value of a tag as u32
    pub fn get_u32(&self, tag: u16) -> Option<u32> {
        self.get_value(tag).and_then(IfdValue::as_u32)
    }

    /// Get required u32 value
    pub fn get_required_u32(&self, tag: u16) -> Result<u32> {
        self.get_u32(tag)
            .ok_or(TiffError::MissingTag(tag_name(tag)))
    }

    /// Get optional u32 value with default
    pub fn get_u32_or(&self, tag: u16, default: u32) -> u32 {
        self.get_u32(tag).unwrap_or(default)
    }

    /// Get required list of u32 values
    pub fn get_required_u32_vec(&self, tag: u16) -> Result<Vec<u32>> {
        self.get_value(tag)
            .and_then(IfdValue::as_u32_vec)
            .ok_or(TiffError::MissingTag(tag_name(tag)))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in tag order
    pub fn entries(&self) -> impl Iterator<Item = &IfdEntry> {
        self.entries.values()
    }

    /// Read IFD at `offset`
    pub fn read<R: Read + Seek>(reader: &mut R, offset: u32, endian: Endian) -> Result<Self> {
        reader.seek(SeekFrom::Start(offset as u64))?;

        let num_entries = endian.read_u16(reader)?;
        if num_entries == 0 {
            return Err(TiffError::InvalidIfd("directory has no entries".into()));
        }

        let mut ifd = Ifd::new();
        for _ in 0..num_entries {
            let entry = Self::read_entry(reader, endian)?;
            ifd.add(entry);
        }

        ifd.next_ifd_offset = endian.read_u32(reader)?;

        Ok(ifd)
    }

    /// Read single entry
    fn read_entry<R: Read + Seek>(reader: &mut R, endian: Endian) -> Result<IfdEntry> {
        let tag = endian.read_u16(reader)?;
        let type_id = endian.read_u16(reader)?;
        let count = endian.read_u32(reader)?;

        let total_size = data_type::size(type_id)
            .checked_mul(count as usize)
            .filter(|&size| size <= MAX_VALUE_BYTES)
            .ok_or_else(|| {
                TiffError::InvalidIfd(format!("tag {} declares {} values", tag_name(tag), count))
            })?;

        // Value/offset field (4 bytes)
        let mut value_bytes = [0u8; 4];
        reader.read_exact(&mut value_bytes)?;

        let value = if total_size <= 4 {
            Self::parse_value(type_id, count, &value_bytes[..total_size], endian)
        } else {
            let offset = endian.u32_at(&value_bytes);
            let resume = reader.stream_position()?;
            reader.seek(SeekFrom::Start(offset as u64))?;

            let mut data = vec![0u8; total_size];
            reader.read_exact(&mut data)?;

            reader.seek(SeekFrom::Start(resume))?;
            Self::parse_value(type_id, count, &data, endian)
        };

        Ok(IfdEntry { tag, value })
    }

    /// Parse `count` values of `type_id` from `data`
    fn parse_value(type_id: u16, count: u32, data: &[u8], endian: Endian) -> IfdValue {
        let count = count as usize;
        match type_id {
            data_type::BYTE => IfdValue::Bytes(data[..count].to_vec()),
            data_type::ASCII => {
                let s = String::from_utf8_lossy(&data[..count]);
                IfdValue::Ascii(s.trim_end_matches('\0').to_string())
            }
            data_type::SHORT => IfdValue::Shorts(
                data.chunks_exact(2).take(count).map(|c| endian.u16_at(c)).collect(),
            ),
            data_type::LONG => IfdValue::Longs(
                data.chunks_exact(4).take(count).map(|c| endian.u32_at(c)).collect(),
            ),
            data_type::RATIONAL => IfdValue::Rationals(
                data.chunks_exact(8)
                    .take(count)
                    .map(|c| (endian.u32_at(&c[..4]), endian.u32_at(&c[4..])))
                    .collect(),
            ),
            _ => IfdValue::Undefined(data.to_vec()),
        }
    }

    /// Write IFD at the current (word-aligned) position, returning its offset
    pub fn write<W: Write + Seek, B: ByteOrder>(&self, writer: &mut W) -> Result<u32> {
        let ifd_start = offset_u32(writer.stream_position()?)?;

        writer.write_u16::<B>(self.entries.len() as u16)?;

        // Out-of-line values follow the directory: count + entries + next offset
        let entries_size = 2 + self.entries.len() * 12 + 4;
        let mut value_offset = ifd_start as usize + entries_size;
        let mut large_values: Vec<&IfdValue> = Vec::new();

        for entry in self.entries.values() {
            writer.write_u16::<B>(entry.tag)?;
            writer.write_u16::<B>(entry.value.type_id())?;
            writer.write_u32::<B>(entry.value.count())?;

            let byte_size = entry.value.byte_size();
            if byte_size <= 4 {
                let mut value_bytes = [0u8; 4];
                Self::write_inline::<B>(&entry.value, &mut value_bytes);
                writer.write_all(&value_bytes)?;
            } else {
                writer.write_u32::<B>(offset_u32(value_offset as u64)?)?;
                large_values.push(&entry.value);
                value_offset += byte_size + byte_size % 2;
            }
        }

        writer.write_u32::<B>(self.next_ifd_offset)?;

        for value in large_values {
            Self::write_value::<W, B>(writer, value)?;
            if value.byte_size() % 2 != 0 {
                writer.write_u8(0)?;
            }
        }

        Ok(ifd_start)
    }

    /// Pack a value of at most four bytes into the entry's value field
    fn write_inline<B: ByteOrder>(value: &IfdValue, bytes: &mut [u8; 4]) {
        match value {
            IfdValue::Bytes(v) | IfdValue::Undefined(v) => {
                for (slot, &b) in bytes.iter_mut().zip(v) {
                    *slot = b;
                }
            }
            IfdValue::Ascii(s) => {
                for (slot, &b) in bytes.iter_mut().zip(s.as_bytes()) {
                    *slot = b;
                }
            }
            IfdValue::Shorts(v) => {
                for (i, &s) in v.iter().take(2).enumerate() {
                    B::write_u16(&mut bytes[i * 2..], s);
                }
            }
            IfdValue::Longs(v) => {
                if let Some(&l) = v.first() {
                    B::write_u32(bytes, l);
                }
            }
            IfdValue::Rationals(_) => {}
        }
    }

    /// Write an out-of-line value
    fn write_value<W: Write, B: ByteOrder>(writer: &mut W, value: &IfdValue) -> Result<()> {
        match value {
            IfdValue::Bytes(v) | IfdValue::Undefined(v) => writer.write_all(v)?,
            IfdValue::Ascii(s) => {
                writer.write_all(s.as_bytes())?;
                writer.write_u8(0)?;
            }
            IfdValue::Shorts(v) => {
                for &val in v {
                    writer.write_u16::<B>(val)?;
                }
            }
            IfdValue::Longs(v) => {
                for &val in v {
                    writer.write_u32::<B>(val)?;
                }
            }
            IfdValue::Rationals(v) => {
                for &(n, d) in v {
                    writer.write_u32::<B>(n)?;
                    writer.write_u32::<B>(d)?;
                }
            }
        }
        Ok(())
    }
}

/// Narrow a stream position to a classic TIFF offset
pub(crate) fn offset_u32(pos: u64) -> Result<u32> {
    u32::try_from(pos).map_err(|_| TiffError::FileTooLarge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::tag;
    use std::io::Cursor;

    #[test]
    fn test_ifd_entry_short() {
        let entry = IfdEntry::short(tag::IMAGE_WIDTH, 1920);
        assert_eq!(entry.tag, tag::IMAGE_WIDTH);
        assert_eq!(entry.value.as_u16(), Some(1920));
        assert_eq!(entry.value.as_u32(), Some(1920));
    }

    #[test]
    fn test_as_u16_rejects_wide_long() {
        let entry = IfdEntry::long(tag::IMAGE_LENGTH, 70_000);
        assert_eq!(entry.value.as_u16(), None);
        assert_eq!(entry.value.as_u32(), Some(70_000));
    }

    #[test]
    fn test_ifd_add_get() {
        let mut ifd = Ifd::new();
        ifd.add(IfdEntry::short(tag::IMAGE_WIDTH, 640));
        ifd.add(IfdEntry::long(tag::IMAGE_LENGTH, 480));

        assert_eq!(ifd.len(), 2);
        assert_eq!(ifd.get_required_u32(tag::IMAGE_WIDTH).unwrap(), 640);
        assert_eq!(ifd.get_required_u32(tag::IMAGE_LENGTH).unwrap(), 480);
        assert_eq!(ifd.get_u32_or(tag::TILE_WIDTH, 0), 0);
        assert!(matches!(
            ifd.get_required_u32(tag::TILE_WIDTH),
            Err(TiffError::MissingTag("TileWidth"))
        ));
    }

    #[test]
    fn test_ifd_value_byte_size() {
        assert_eq!(IfdValue::Shorts(vec![1, 2, 3]).byte_size(), 6);
        assert_eq!(IfdValue::Longs(vec![1, 2]).byte_size(), 8);
        assert_eq!(IfdValue::Rationals(vec![(1, 2), (3, 4)]).byte_size(), 16);
        assert_eq!(IfdValue::Ascii("abc".into()).byte_size(), 4);
    }

    #[test]
    fn test_write_then_read_both_inline_and_offset_values() {
        let mut ifd = Ifd::new();
        ifd.add(IfdEntry::long(tag::IMAGE_WIDTH, 300));
        ifd.add(IfdEntry::new(tag::BITS_PER_SAMPLE, IfdValue::Shorts(vec![8, 8, 8])));
        ifd.add(IfdEntry::new(tag::TILE_OFFSETS, IfdValue::Longs(vec![10, 20, 30, 40])));
        ifd.add(IfdEntry::ascii(tag::SOFTWARE, "retile"));

        let mut cursor = Cursor::new(vec![0u8; 8]);
        cursor.seek(SeekFrom::End(0)).unwrap();
        let offset = ifd.write::<_, LittleEndian>(&mut cursor).unwrap();
        assert_eq!(offset, 8);

        let read = Ifd::read(&mut cursor, offset, Endian::Little).unwrap();
        assert_eq!(read.len(), 4);
        assert_eq!(read.get_u32(tag::IMAGE_WIDTH), Some(300));
        assert_eq!(
            read.get_value(tag::BITS_PER_SAMPLE),
            Some(&IfdValue::Shorts(vec![8, 8, 8]))
        );
        assert_eq!(
            read.get_required_u32_vec(tag::TILE_OFFSETS).unwrap(),
            vec![10, 20, 30, 40]
        );
        assert_eq!(
            read.get_value(tag::SOFTWARE).and_then(IfdValue::as_str),
            Some("retile")
        );
    }

    #[test]
    fn test_read_big_endian_entry() {
        // One SHORT entry: ImageWidth = 0x0102
        let mut data = vec![0u8; 8];
        data.extend_from_slice(&[0x00, 0x01]);
        data.extend_from_slice(&[0x01, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
        data.extend_from_slice(&[0x01, 0x02, 0x00, 0x00]);
        data.extend_from_slice(&[0, 0, 0, 0]);

        let mut cursor = Cursor::new(data);
        let ifd = Ifd::read(&mut cursor, 8, Endian::Big).unwrap();
        assert_eq!(ifd.get_u32(tag::IMAGE_WIDTH), Some(0x0102));
    }

    #[test]
    fn test_endian_magic() {
        assert_eq!(Endian::from_magic(*b"II").unwrap(), Endian::Little);
        assert_eq!(Endian::from_magic(*b"MM").unwrap(), Endian::Big);
        assert!(matches!(Endian::from_magic(*b"PK"), Err(TiffError::InvalidMagic)));
        assert_eq!(Endian::Big.magic(), *b"MM");
    }

    #[test]
    fn test_empty_directory_rejected() {
        let mut cursor = Cursor::new(vec![0u8; 16]);
        assert!(matches!(
            Ifd::read(&mut cursor, 8, Endian::Little),
            Err(TiffError::InvalidIfd(_))
        ));
    }
}
