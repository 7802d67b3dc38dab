//! TIFF tag definitions

/// Baseline and tiling tags used by the reader and writer
pub mod tag {
    // Basic tags
    pub const IMAGE_WIDTH: u16 = 256;
    pub const IMAGE_LENGTH: u16 = 257;
    pub const BITS_PER_SAMPLE: u16 = 258;
    pub const COMPRESSION: u16 = 259;
    pub const PHOTOMETRIC_INTERPRETATION: u16 = 262;

    // Strip organization
    pub const STRIP_OFFSETS: u16 = 273;
    pub const ORIENTATION: u16 = 274;
    pub const SAMPLES_PER_PIXEL: u16 = 277;
    pub const ROWS_PER_STRIP: u16 = 278;
    pub const STRIP_BYTE_COUNTS: u16 = 279;

    pub const PLANAR_CONFIGURATION: u16 = 284;
    pub const SOFTWARE: u16 = 305;

    // Tile organization
    pub const TILE_WIDTH: u16 = 322;
    pub const TILE_LENGTH: u16 = 323;
    pub const TILE_OFFSETS: u16 = 324;
    pub const TILE_BYTE_COUNTS: u16 = 325;

    pub const SAMPLE_FORMAT: u16 = 339;
}

/// Values of enumerated tags
pub mod value {
    pub const COMPRESSION_NONE: u16 = 1;

    pub const PHOTOMETRIC_MIN_IS_BLACK: u16 = 1;
    pub const PHOTOMETRIC_RGB: u16 = 2;

    pub const PLANAR_CONTIG: u16 = 1;
    pub const PLANAR_SEPARATE: u16 = 2;

    pub const ORIENTATION_TOP_LEFT: u16 = 1;
}

/// TIFF data types
pub mod data_type {
    pub const BYTE: u16 = 1;
    pub const ASCII: u16 = 2;
    pub const SHORT: u16 = 3;
    pub const LONG: u16 = 4;
    pub const RATIONAL: u16 = 5;
    pub const SBYTE: u16 = 6;
    pub const UNDEFINED: u16 = 7;
    pub const SSHORT: u16 = 8;
    pub const SLONG: u16 = 9;
    pub const SRATIONAL: u16 = 10;
    pub const FLOAT: u16 = 11;
    pub const DOUBLE: u16 = 12;

    /// Get byte size of data type
    pub fn size(type_id: u16) -> usize {
        match type_id {
            BYTE | ASCII | SBYTE | UNDEFINED => 1,
            SHORT | SSHORT => 2,
            LONG | SLONG | FLOAT => 4,
            RATIONAL | SRATIONAL | DOUBLE => 8,
            _ => 0,
        }
    }
}

/// Get tag name
pub fn tag_name(tag_id: u16) -> &'static str {
    match tag_id {
        tag::IMAGE_WIDTH => "ImageWidth",
        tag::IMAGE_LENGTH => "ImageLength",
        tag::BITS_PER_SAMPLE => "BitsPerSample",
        tag::COMPRESSION => "Compression",
        tag::PHOTOMETRIC_INTERPRETATION => "PhotometricInterpretation",
        tag::STRIP_OFFSETS => "StripOffsets",
        tag::ORIENTATION => "Orientation",
        tag::SAMPLES_PER_PIXEL => "SamplesPerPixel",
        tag::ROWS_PER_STRIP => "RowsPerStrip",
        tag::STRIP_BYTE_COUNTS => "StripByteCounts",
        tag::PLANAR_CONFIGURATION => "PlanarConfiguration",
        tag::SOFTWARE => "Software",
        tag::TILE_WIDTH => "TileWidth",
        tag::TILE_LENGTH => "TileLength",
        tag::TILE_OFFSETS => "TileOffsets",
        tag::TILE_BYTE_COUNTS => "TileByteCounts",
        tag::SAMPLE_FORMAT => "SampleFormat",
        _ => "Unknown",
    }
}

/// Tags that fix the pixel geometry and must not change once data is written
pub fn is_geometry_tag(tag_id: u16) -> bool {
    matches!(
        tag_id,
        tag::IMAGE_WIDTH
            | tag::IMAGE_LENGTH
            | tag::BITS_PER_SAMPLE
            | tag::SAMPLES_PER_PIXEL
            | tag::TILE_WIDTH
            | tag::TILE_LENGTH
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_size() {
        assert_eq!(data_type::size(data_type::BYTE), 1);
        assert_eq!(data_type::size(data_type::SHORT), 2);
        assert_eq!(data_type::size(data_type::LONG), 4);
        assert_eq!(data_type::size(data_type::RATIONAL), 8);
        assert_eq!(data_type::size(99), 0);
    }

    #[test]
    fn test_tag_name() {
        assert_eq!(tag_name(tag::IMAGE_WIDTH), "ImageWidth");
        assert_eq!(tag_name(tag::TILE_LENGTH), "TileLength");
        assert_eq!(tag_name(1), "Unknown");
    }

    #[test]
    fn test_geometry_tags() {
        assert!(is_geometry_tag(tag::TILE_WIDTH));
        assert!(is_geometry_tag(tag::IMAGE_LENGTH));
        assert!(!is_geometry_tag(tag::SOFTWARE));
        assert!(!is_geometry_tag(tag::PHOTOMETRIC_INTERPRETATION));
    }
}
