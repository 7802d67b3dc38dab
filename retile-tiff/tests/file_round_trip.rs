//! On-disk write/read round trips through `TiffWriter` and `TiffReader`.

use retile_tiff::{tag, value, IfdEntry, IfdValue, TiffError, TiffReader, TiffWriter};

fn rgb_fields(writer: &mut TiffWriter<impl std::io::Write + std::io::Seek>, w: u32, h: u32) {
    writer.set_field(IfdEntry::long(tag::IMAGE_WIDTH, w)).unwrap();
    writer.set_field(IfdEntry::long(tag::IMAGE_LENGTH, h)).unwrap();
    writer
        .set_field(IfdEntry::new(tag::BITS_PER_SAMPLE, IfdValue::Shorts(vec![8, 8, 8])))
        .unwrap();
    writer.set_field(IfdEntry::short(tag::SAMPLES_PER_PIXEL, 3)).unwrap();
    writer
        .set_field(IfdEntry::short(tag::PHOTOMETRIC_INTERPRETATION, value::PHOTOMETRIC_RGB))
        .unwrap();
    writer
        .set_field(IfdEntry::short(tag::PLANAR_CONFIGURATION, value::PLANAR_CONTIG))
        .unwrap();
}

fn pixel(x: u32, y: u32, c: u32) -> u8 {
    (x * 7 + y * 13 + c * 61) as u8
}

#[test]
fn scanline_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.tif");
    let (w, h) = (17, 9);

    let mut writer = TiffWriter::create(&path).unwrap();
    rgb_fields(&mut writer, w, h);
    for y in 0..h {
        let row: Vec<u8> = (0..w)
            .flat_map(|x| (0..3).map(move |c| pixel(x, y, c)))
            .collect();
        writer.write_row(&row, y).unwrap();
    }
    writer.close().unwrap();

    let mut reader = TiffReader::open(&path).unwrap();
    let info = reader.info().clone();
    assert_eq!((info.width, info.height, info.samples_per_pixel), (w, h, 3));
    assert!(!info.is_tiled());

    let mut row = vec![0u8; info.bytes_per_row()];
    for y in 0..h {
        reader.read_row(y, &mut row).unwrap();
        for x in 0..w {
            for c in 0..3 {
                assert_eq!(row[(x * 3 + c) as usize], pixel(x, y, c));
            }
        }
    }
}

#[test]
fn tiled_file_round_trip_with_partial_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiles.tif");
    let (w, h, t) = (20, 11, 8);

    let mut writer = TiffWriter::create(&path).unwrap();
    rgb_fields(&mut writer, w, h);
    writer.set_field(IfdEntry::long(tag::TILE_WIDTH, t)).unwrap();
    writer.set_field(IfdEntry::long(tag::TILE_LENGTH, t)).unwrap();

    for ty in (0..h).step_by(t as usize) {
        for tx in (0..w).step_by(t as usize) {
            let mut tile = vec![0u8; (t * t * 3) as usize];
            for y in 0..t {
                for x in 0..t {
                    if tx + x < w && ty + y < h {
                        for c in 0..3 {
                            tile[((y * t + x) * 3 + c) as usize] = pixel(tx + x, ty + y, c);
                        }
                    }
                }
            }
            writer.write_tile(&tile, tx, ty).unwrap();
        }
    }
    writer.close().unwrap();

    let mut reader = TiffReader::open(&path).unwrap();
    assert_eq!(reader.info().layout.tile_size(), Some((t, t)));
    assert_eq!(reader.info().layout.chunk_count(), 6);

    let mut row = vec![0u8; (w * 3) as usize];
    for y in 0..h {
        reader.read_row(y, &mut row).unwrap();
        for x in 0..w {
            assert_eq!(row[(x * 3) as usize], pixel(x, y, 0));
            assert_eq!(row[(x * 3 + 2) as usize], pixel(x, y, 2));
        }
    }
}

#[test]
fn open_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = TiffReader::open(dir.path().join("absent.tif")).err().unwrap();
    assert!(matches!(err, TiffError::Io(_)));
}
