//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use retile_core::RasterBuffer;
use retile_tiff::{tag, value, IfdEntry, IfdValue, TiffWriter};
use std::path::Path;

/// Smooth, channel-offset gradient; compresses well and exposes misplaced pixels.
pub fn gradient(width: u32, height: u32, samples: u16) -> RasterBuffer {
    let mut pixels = Vec::with_capacity((width * height * samples as u32) as usize);
    for y in 0..height {
        for x in 0..width {
            for c in 0..samples as u32 {
                pixels.push(((x + y) / 3 + c * 20) as u8);
            }
        }
    }
    RasterBuffer::from_pixels(width, height, samples, 8, pixels).unwrap()
}

/// Pixel value unique to its position modulo 251, for exact-placement checks.
pub fn fingerprint(width: u32, height: u32, samples: u16) -> RasterBuffer {
    let total = width as usize * height as usize * samples as usize;
    let pixels = (0..total).map(|i| (i % 251) as u8).collect();
    RasterBuffer::from_pixels(width, height, samples, 8, pixels).unwrap()
}

/// Write `raster` as a scanline TIFF, one strip per row.
pub fn write_scanline_tiff(path: &Path, raster: &RasterBuffer) {
    let samples = raster.samples_per_pixel();
    let mut writer = TiffWriter::create(path).unwrap();
    writer.set_field(IfdEntry::long(tag::IMAGE_WIDTH, raster.width())).unwrap();
    writer.set_field(IfdEntry::long(tag::IMAGE_LENGTH, raster.height())).unwrap();
    writer
        .set_field(IfdEntry::new(
            tag::BITS_PER_SAMPLE,
            IfdValue::Shorts(vec![8; samples as usize]),
        ))
        .unwrap();
    writer.set_field(IfdEntry::short(tag::SAMPLES_PER_PIXEL, samples)).unwrap();
    let photometric = if samples >= 3 {
        value::PHOTOMETRIC_RGB
    } else {
        value::PHOTOMETRIC_MIN_IS_BLACK
    };
    writer
        .set_field(IfdEntry::short(tag::PHOTOMETRIC_INTERPRETATION, photometric))
        .unwrap();
    for (index, row) in raster.rows().enumerate() {
        writer.write_row(row, index as u32).unwrap();
    }
    writer.close().unwrap();
}

/// Mean absolute difference between two equally sized sample buffers.
pub fn mean_abs_error(a: &[u8], b: &[u8]) -> f64 {
    assert_eq!(a.len(), b.len());
    let total: u64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| (x as i32 - y as i32).unsigned_abs() as u64)
        .sum();
    total as f64 / a.len() as f64
}
