//! Pipeline configuration.

use crate::codec::Quality;
use crate::error::{Error, Result};
use crate::tiling::TileSize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Paths and parameters for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Source container.
    pub input: PathBuf,
    /// Tiled container written when the source is scanline.
    pub tiled_output: PathBuf,
    /// Compressed stream.
    pub compressed_output: PathBuf,
    /// Scanline container rebuilt from the compressed stream.
    pub decompressed_output: PathBuf,
    /// Tile width in pixels.
    pub tile_width: u32,
    /// Tile height in pixels.
    pub tile_height: u32,
    /// Encoder quality, 0-100.
    pub quality: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("input.tif"),
            tiled_output: PathBuf::from("tiled.tif"),
            compressed_output: PathBuf::from("compressed.jpg"),
            decompressed_output: PathBuf::from("decompressed.tif"),
            tile_width: 256,
            tile_height: 256,
            quality: 100,
        }
    }
}

impl PipelineConfig {
    /// Default configuration reading `input`.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    /// Set the tiled output path.
    pub fn with_tiled_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.tiled_output = path.into();
        self
    }

    /// Set the compressed output path.
    pub fn with_compressed_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.compressed_output = path.into();
        self
    }

    /// Set the decompressed output path.
    pub fn with_decompressed_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.decompressed_output = path.into();
        self
    }

    /// Set the tile size.
    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    /// Set the encoder quality.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Validated tile size.
    pub fn tile_size(&self) -> Result<TileSize> {
        TileSize::new(self.tile_width, self.tile_height)
    }

    /// Quality clamped to the codec range.
    pub fn codec_quality(&self) -> Quality {
        Quality::new(self.quality)
    }

    /// Reject configurations no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        self.tile_size()?;
        if self.quality > 100 {
            return Err(Error::InvalidConfig(format!(
                "quality {} is above 100",
                self.quality
            )));
        }

        let outputs = [
            &self.tiled_output,
            &self.compressed_output,
            &self.decompressed_output,
        ];
        for (i, output) in outputs.iter().enumerate() {
            if **output == self.input {
                return Err(Error::InvalidConfig(format!(
                    "output {} would overwrite the input",
                    output.display()
                )));
            }
            if outputs[i + 1..].contains(output) {
                return Err(Error::InvalidConfig(format!(
                    "{} is used for more than one output",
                    output.display()
                )));
            }
        }
        Ok(())
    }
}
