//! End-to-end run: classify, tile or read, compress, decompress.

use crate::codec::{compress_to_file, decompress_file, StreamHeader};
use crate::config::PipelineConfig;
use crate::error::Error;
use crate::layout::{classify_path, Layout};
use crate::raster::{read_raster, RasterSummary};
use crate::tiling::{convert_to_tiled, GridSummary, TileGrid};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error as ThisError;
use tracing::{debug, info};

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classify,
    Read,
    Tile,
    Compress,
    Decompress,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Classify => "classify",
            Stage::Read => "read",
            Stage::Tile => "tile",
            Stage::Compress => "compress",
            Stage::Decompress => "decompress",
        };
        f.write_str(name)
    }
}

/// A failed stage and its cause.
#[derive(ThisError, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

/// What a successful run did.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub input: PathBuf,
    pub layout: Layout,
    pub raster: RasterSummary,
    /// Present when the input was converted to tiles.
    pub tiled: Option<TiledOutput>,
    pub compressed_output: PathBuf,
    pub compressed_bytes: u64,
    pub decompressed_output: PathBuf,
    pub decoded: StreamHeader,
}

/// The tiled container written for a scanline input.
#[derive(Debug, Clone, Serialize)]
pub struct TiledOutput {
    pub path: PathBuf,
    pub grid: GridSummary,
}

/// Runs the stages for one configuration.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage, stopping at the first failure.
    ///
    /// A tiled input is read as is; a scanline input is rewritten tiled first.
    /// Either way the raster handed to the codec is fully populated.
    pub fn run(&self) -> Result<PipelineReport, StageError> {
        let config = &self.config;
        let tile = config.tile_size().map_err(at(Stage::Tile))?;
        config.validate().map_err(at(Stage::Classify))?;

        let layout = classify_path(&config.input).map_err(at(Stage::Classify))?;
        info!(input = %config.input.display(), %layout, "classified input");

        let (raster, tiled) = if layout.is_tiled() {
            let raster = read_raster(&config.input).map_err(at(Stage::Read))?;
            (raster, None)
        } else {
            let raster = convert_to_tiled(&config.input, &config.tiled_output, tile)
                .map_err(at(Stage::Tile))?;
            let grid = TileGrid::new(raster.width(), raster.height(), tile);
            let tiled = TiledOutput {
                path: config.tiled_output.clone(),
                grid: grid.summary(),
            };
            (raster, Some(tiled))
        };
        debug!(
            width = raster.width(),
            height = raster.height(),
            "raster ready for compression"
        );

        let compressed_bytes =
            compress_to_file(&raster, &config.compressed_output, config.codec_quality())
                .map_err(at(Stage::Compress))?;

        let decoded = decompress_file(&config.compressed_output, &config.decompressed_output)
            .map_err(at(Stage::Decompress))?;

        info!(
            compressed_bytes,
            rows = decoded.height,
            "pipeline complete"
        );
        Ok(PipelineReport {
            input: config.input.clone(),
            layout,
            raster: raster.summary(),
            tiled,
            compressed_output: config.compressed_output.clone(),
            compressed_bytes,
            decompressed_output: config.decompressed_output.clone(),
            decoded,
        })
    }
}

fn at(stage: Stage) -> impl Fn(Error) -> StageError {
    move |source| StageError { stage, source }
}
