#![no_main]

//! Fuzz target for tile grid geometry.
//!
//! Every region must lie inside the image and the regions must cover it
//! exactly once.

use libfuzzer_sys::fuzz_target;
use arbitrary::Arbitrary;
use retile_core::{TileGrid, TileSize};

#[derive(Arbitrary, Debug)]
struct GridInput {
    width: u16,
    height: u16,
    tile_width: u8,
    tile_height: u8,
}

fuzz_target!(|input: GridInput| {
    let Ok(tile) = TileSize::new(input.tile_width as u32, input.tile_height as u32) else {
        return;
    };
    let (width, height) = (input.width as u32, input.height as u32);
    let grid = TileGrid::new(width, height, tile);

    let mut covered = 0u64;
    for region in grid.regions() {
        assert!(region.valid_width >= 1 && region.valid_width <= tile.width);
        assert!(region.valid_height >= 1 && region.valid_height <= tile.height);
        assert!(region.x + region.valid_width <= width);
        assert!(region.y + region.valid_height <= height);
        covered += region.valid_width as u64 * region.valid_height as u64;
    }
    assert_eq!(covered, width as u64 * height as u64);
});
