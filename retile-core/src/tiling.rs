//! Scanline to tile transcoding.
//!
//! A raster is cut into a grid of fixed-size tiles in row-major order. Tiles
//! on the right and bottom edges usually cover less than a full tile of
//! image; they are still emitted at full nominal size, with the area outside
//! the image zero-filled, because tiled containers store every tile at the
//! same size.
//!
//! # Memory
//!
//! The sequential path owns exactly one tile of scratch memory, reused for
//! every tile. With the `parallel` feature each rayon worker owns its own
//! scratch and tiles are produced one grid row at a time, so peak extra
//! memory is one row of tiles.

use crate::container::{discard_on_error, TileSink};
use crate::error::{Error, Result};
use crate::raster::{read_raster, RasterBuffer};
use retile_tiff::{tag, value, IfdEntry, IfdValue, Photometric, TiffWriter};
use serde::{Deserialize, Serialize};
use std::io::{Seek, Write};
use std::path::Path;
use tracing::{debug, info, trace};

/// Target tile dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSize {
    pub width: u32,
    pub height: u32,
}

impl TileSize {
    /// Both dimensions must be nonzero.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidTileSize { width, height });
        }
        Ok(TileSize { width, height })
    }

    /// Square tiles.
    pub fn square(size: u32) -> Result<Self> {
        Self::new(size, size)
    }

    fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for TileSize {
    fn default() -> Self {
        TileSize {
            width: 256,
            height: 256,
        }
    }
}

/// One cell of the tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRegion {
    /// Grid column.
    pub col: u32,
    /// Grid row.
    pub row: u32,
    /// Left edge in image pixels.
    pub x: u32,
    /// Top edge in image pixels.
    pub y: u32,
    /// Columns of the tile that lie inside the image.
    pub valid_width: u32,
    /// Rows of the tile that lie inside the image.
    pub valid_height: u32,
}

impl TileRegion {
    /// Whether part of the tile hangs past the image.
    pub fn is_edge(&self, tile: TileSize) -> bool {
        self.valid_width < tile.width || self.valid_height < tile.height
    }
}

/// Grid of tiles covering an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    image_width: u32,
    image_height: u32,
    tile: TileSize,
    cols: u32,
    rows: u32,
}

/// Serializable shape of a tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridSummary {
    pub tile_width: u32,
    pub tile_height: u32,
    pub cols: u32,
    pub rows: u32,
    pub tiles: usize,
}

impl TileGrid {
    pub fn new(image_width: u32, image_height: u32, tile: TileSize) -> Self {
        TileGrid {
            image_width,
            image_height,
            tile,
            cols: image_width.div_ceil(tile.width),
            rows: image_height.div_ceil(tile.height),
        }
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn tile(&self) -> TileSize {
        self.tile
    }

    /// Total number of tiles.
    pub fn len(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Region at grid position `(col, row)`, or `None` outside the grid.
    pub fn region(&self, col: u32, row: u32) -> Option<TileRegion> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        let x = col * self.tile.width;
        let y = row * self.tile.height;
        Some(TileRegion {
            col,
            row,
            x,
            y,
            valid_width: self.tile.width.min(self.image_width - x),
            valid_height: self.tile.height.min(self.image_height - y),
        })
    }

    /// Every region, row-major.
    pub fn regions(&self) -> impl Iterator<Item = TileRegion> + '_ {
        (0..self.rows).flat_map(move |row| self.row_regions(row))
    }

    /// Regions of one grid row, left to right.
    pub fn row_regions(&self, row: u32) -> impl Iterator<Item = TileRegion> + '_ {
        (0..self.cols).filter_map(move |col| self.region(col, row))
    }

    pub fn summary(&self) -> GridSummary {
        GridSummary {
            tile_width: self.tile.width,
            tile_height: self.tile.height,
            cols: self.cols,
            rows: self.rows,
            tiles: self.len(),
        }
    }
}

/// Copies raster regions into a reusable tile-sized scratch buffer.
pub struct Tiler {
    tile: TileSize,
    bytes_per_pixel: usize,
    scratch: Vec<u8>,
}

impl Tiler {
    pub fn new(tile: TileSize, bytes_per_pixel: usize) -> Self {
        Tiler {
            tile,
            bytes_per_pixel,
            scratch: vec![0u8; tile.area() * bytes_per_pixel],
        }
    }

    /// Tiler sized for `raster`'s pixel format.
    pub fn for_raster(raster: &RasterBuffer, tile: TileSize) -> Self {
        Self::new(tile, raster.bytes_per_pixel())
    }

    /// Fill the scratch tile from `region` of `raster`.
    ///
    /// Every byte of the scratch is rewritten: the valid extent is copied row
    /// by row and everything outside it is zeroed.
    pub fn fill(&mut self, raster: &RasterBuffer, region: TileRegion) -> Result<&[u8]> {
        let bpp = self.bytes_per_pixel;
        if raster.bytes_per_pixel() != bpp {
            return Err(Error::InvalidRaster(format!(
                "tiler built for {} bytes per pixel, raster has {}",
                bpp,
                raster.bytes_per_pixel()
            )));
        }
        if region.x + region.valid_width > raster.width()
            || region.y + region.valid_height > raster.height()
            || region.valid_width > self.tile.width
            || region.valid_height > self.tile.height
        {
            return Err(Error::InvalidRaster(format!(
                "region at ({}, {}) exceeds the raster",
                region.x, region.y
            )));
        }

        let tile_stride = self.tile.width as usize * bpp;
        let src_stride = raster.bytes_per_row();
        let valid = region.valid_width as usize * bpp;
        let x_offset = region.x as usize * bpp;
        let pixels = raster.pixels();

        for (ty, dst) in self.scratch.chunks_exact_mut(tile_stride.max(1)).enumerate() {
            if ty < region.valid_height as usize {
                let start = (region.y as usize + ty) * src_stride + x_offset;
                dst[..valid].copy_from_slice(&pixels[start..start + valid]);
                dst[valid..].fill(0);
            } else {
                dst.fill(0);
            }
        }

        Ok(&self.scratch)
    }

    /// Fill and hand every tile of `raster` to `sink`, row-major.
    ///
    /// Returns the number of tiles written.
    pub fn write_tiles<S: TileSink + ?Sized>(
        &mut self,
        raster: &RasterBuffer,
        sink: &mut S,
    ) -> Result<usize> {
        let grid = TileGrid::new(raster.width(), raster.height(), self.tile);
        let mut written = 0;
        for region in grid.regions() {
            let tile = self.fill(raster, region)?;
            trace!(col = region.col, row = region.row, "writing tile");
            sink.write_tile(tile, region.x, region.y)
                .map_err(|source| Error::TileWrite {
                    col: region.col,
                    row: region.row,
                    source,
                })?;
            written += 1;
        }
        Ok(written)
    }
}

/// Cut a populated raster into tiles and write each one to `sink`.
pub fn tile_raster<S: TileSink + ?Sized>(
    raster: &RasterBuffer,
    tile: TileSize,
    sink: &mut S,
) -> Result<TileGrid> {
    raster.ensure_populated()?;
    let tile = TileSize::new(tile.width, tile.height)?;
    let grid = TileGrid::new(raster.width(), raster.height(), tile);
    debug!(
        cols = grid.cols(),
        rows = grid.rows(),
        tile_width = tile.width,
        tile_height = tile.height,
        "tiling raster"
    );

    Tiler::for_raster(raster, tile).write_tiles(raster, sink)?;
    Ok(grid)
}

/// Like [`tile_raster`], but fills tiles on the rayon pool.
///
/// Workers only read the raster and each owns a private scratch tile. Tiles
/// reach `sink` in the same row-major order as the sequential path.
#[cfg(feature = "parallel")]
pub fn tile_raster_parallel<S: TileSink + ?Sized>(
    raster: &RasterBuffer,
    tile: TileSize,
    sink: &mut S,
) -> Result<TileGrid> {
    use rayon::prelude::*;

    raster.ensure_populated()?;
    let tile = TileSize::new(tile.width, tile.height)?;
    let grid = TileGrid::new(raster.width(), raster.height(), tile);
    let bpp = raster.bytes_per_pixel();
    debug!(
        cols = grid.cols(),
        rows = grid.rows(),
        threads = rayon::current_num_threads(),
        "tiling raster in parallel"
    );

    for grid_row in 0..grid.rows() {
        let regions: Vec<TileRegion> = grid.row_regions(grid_row).collect();
        let tiles: Vec<Vec<u8>> = regions
            .par_iter()
            .map_init(
                || Tiler::new(tile, bpp),
                |tiler, region| tiler.fill(raster, *region).map(<[u8]>::to_vec),
            )
            .collect::<Result<_>>()?;

        for (region, data) in regions.iter().zip(&tiles) {
            trace!(col = region.col, row = region.row, "writing tile");
            sink.write_tile(data, region.x, region.y)
                .map_err(|source| Error::TileWrite {
                    col: region.col,
                    row: region.row,
                    source,
                })?;
        }
    }

    Ok(grid)
}

/// Read a container and rewrite it tiled.
///
/// The source is fully read before the target is created, so a failed read
/// leaves no output behind. A target that fails part way is removed. Returns the source raster for further stages.
pub fn convert_to_tiled(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    tile: TileSize,
) -> Result<RasterBuffer> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let tile = TileSize::new(tile.width, tile.height)?;
    let raster = read_raster(input)?;
    raster.ensure_populated()?;

    let target_err = |source: retile_tiff::TiffError| Error::TargetCreate {
        path: output.to_path_buf(),
        source,
    };
    let writer = TiffWriter::create(output).map_err(target_err)?;
    let grid = discard_on_error(output, write_tiled(&raster, tile, writer, target_err))?;
    info!(
        output = %output.display(),
        tiles = grid.len(),
        "wrote tiled container"
    );
    Ok(raster)
}

fn write_tiled<W: Write + Seek>(
    raster: &RasterBuffer,
    tile: TileSize,
    mut writer: TiffWriter<W>,
    target_err: impl Fn(retile_tiff::TiffError) -> Error,
) -> Result<TileGrid> {
    for entry in tiled_fields(raster, tile) {
        writer.set_field(entry).map_err(&target_err)?;
    }

    #[cfg(feature = "parallel")]
    let grid = tile_raster_parallel(raster, tile, &mut writer)?;
    #[cfg(not(feature = "parallel"))]
    let grid = tile_raster(raster, tile, &mut writer)?;

    writer.close()?;
    Ok(grid)
}

/// Directory entries describing `raster` stored as `tile`-sized tiles.
fn tiled_fields(raster: &RasterBuffer, tile: TileSize) -> Vec<IfdEntry> {
    let samples = raster.samples_per_pixel();
    vec![
        IfdEntry::long(tag::IMAGE_WIDTH, raster.width()),
        IfdEntry::long(tag::IMAGE_LENGTH, raster.height()),
        IfdEntry::new(
            tag::BITS_PER_SAMPLE,
            IfdValue::Shorts(vec![raster.bits_per_sample(); samples as usize]),
        ),
        IfdEntry::short(tag::SAMPLES_PER_PIXEL, samples),
        IfdEntry::short(
            tag::PHOTOMETRIC_INTERPRETATION,
            Photometric::for_samples(samples).to_u16(),
        ),
        IfdEntry::short(tag::PLANAR_CONFIGURATION, value::PLANAR_CONTIG),
        IfdEntry::long(tag::TILE_WIDTH, tile.width),
        IfdEntry::long(tag::TILE_LENGTH, tile.height),
        IfdEntry::ascii(tag::SOFTWARE, concat!("retile ", env!("CARGO_PKG_VERSION"))),
    ]
}
