//! Retile CLI - classify, tile, compress and restore a TIFF image.

use anyhow::Context;
use clap::Parser;
use console::style;
use retile_core::{Pipeline, PipelineConfig, PipelineReport, StageError};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

/// Output mode for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    /// Normal output with a stage summary.
    Normal,
    /// JSON output for programmatic parsing.
    Json,
    /// Quiet mode with minimal output.
    Quiet,
    /// Verbose mode with debug logging.
    Verbose,
}

/// Command-line arguments for the retile tool.
#[derive(Parser, Debug)]
#[command(name = "retile")]
#[command(version)]
#[command(about = "Convert scanline TIFF images to tiles and round-trip them through JPEG")]
#[command(long_about = "Retile classifies a TIFF image as scanline or tiled, rewrites \n\
    scanline images as tiles, compresses the pixels to JPEG and decodes \n\
    the JPEG back into a scanline TIFF.\n\n\
    EXAMPLES:\n    \
    retile -i scan.tif\n    \
    retile -i scan.tif --tile-width 512 --tile-height 512\n    \
    retile -i scan.tif --quality 85 --json\n    \
    retile --config run.json --verbose")]
struct Args {
    /// Input TIFF path
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// JSON file with a pipeline configuration; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tiled TIFF written for scanline inputs
    #[arg(long)]
    tiled_output: Option<PathBuf>,

    /// JPEG output path
    #[arg(long)]
    compressed_output: Option<PathBuf>,

    /// Scanline TIFF decoded from the JPEG
    #[arg(long)]
    decompressed_output: Option<PathBuf>,

    /// Tile width in pixels
    #[arg(long)]
    tile_width: Option<u32>,

    /// Tile height in pixels
    #[arg(long)]
    tile_height: Option<u32>,

    /// JPEG quality (0-100, 0 is treated as 1)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: Option<u8>,

    /// Verbose output (debug logging)
    #[arg(short, long, conflicts_with = "quiet", conflicts_with = "json")]
    verbose: bool,

    /// Quiet mode (no output on success)
    #[arg(long, conflicts_with = "verbose", conflicts_with = "json")]
    quiet: bool,

    /// JSON output mode for programmatic parsing
    #[arg(long, conflicts_with = "verbose", conflicts_with = "quiet")]
    json: bool,
}

impl Args {
    /// Determine the output mode based on flags.
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else if self.verbose {
            OutputMode::Verbose
        } else {
            OutputMode::Normal
        }
    }

    /// Build the pipeline configuration: defaults, then the config file, then flags.
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => PipelineConfig::default(),
        };

        if let Some(input) = &self.input {
            config.input = input.clone();
        }
        if let Some(path) = &self.tiled_output {
            config.tiled_output = path.clone();
        }
        if let Some(path) = &self.compressed_output {
            config.compressed_output = path.clone();
        }
        if let Some(path) = &self.decompressed_output {
            config.decompressed_output = path.clone();
        }
        if let Some(width) = self.tile_width {
            config.tile_width = width;
        }
        if let Some(height) = self.tile_height {
            config.tile_height = height;
        }
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        Ok(config)
    }
}

/// JSON failure output structure.
#[derive(Debug, Serialize)]
struct JsonFailure {
    /// Type of message.
    #[serde(rename = "type")]
    msg_type: &'static str,
    /// Stage that failed.
    stage: String,
    /// Error message.
    error: String,
}

/// JSON completion output structure.
#[derive(Debug, Serialize)]
struct JsonComplete<'a> {
    #[serde(rename = "type")]
    msg_type: &'static str,
    elapsed_seconds: f64,
    #[serde(flatten)]
    report: &'a PipelineReport,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let output_mode = args.output_mode();

    // Initialize logging (not in JSON or quiet mode)
    if output_mode != OutputMode::Json && output_mode != OutputMode::Quiet {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(if args.verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            })
            .with_target(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    let config = args.pipeline_config()?;
    debug!(?config, "resolved configuration");

    if output_mode == OutputMode::Normal || output_mode == OutputMode::Verbose {
        print_config(&config);
    }

    let start = Instant::now();
    match Pipeline::new(config).run() {
        Ok(report) => {
            let elapsed = start.elapsed().as_secs_f64();
            match output_mode {
                OutputMode::Json => {
                    let output = JsonComplete {
                        msg_type: "complete",
                        elapsed_seconds: elapsed,
                        report: &report,
                    };
                    println!("{}", serde_json::to_string(&output)?);
                }
                OutputMode::Quiet => {}
                OutputMode::Normal | OutputMode::Verbose => print_report(&report, elapsed),
            }
            Ok(())
        }
        Err(err) => {
            report_failure(output_mode, &err)?;
            std::process::exit(1);
        }
    }
}

fn print_config(config: &PipelineConfig) {
    println!();
    println!("{}", style("Retile").cyan().bold());
    println!("  Input:        {}", style(config.input.display()).white());
    println!(
        "  Tile size:    {}x{}",
        style(config.tile_width).white(),
        style(config.tile_height).white()
    );
    println!("  Quality:      {}", style(config.quality).white());
    println!();
}

fn print_report(report: &PipelineReport, elapsed: f64) {
    println!();
    println!("{}", style("Complete:").green().bold());
    println!("  Layout:       {}", report.layout);
    println!(
        "  Raster:       {}x{} x{}",
        report.raster.width, report.raster.height, report.raster.samples_per_pixel
    );
    if let Some(tiled) = &report.tiled {
        println!(
            "  Tiled:        {} ({} tiles, {}x{} grid)",
            style(tiled.path.display()).white(),
            tiled.grid.tiles,
            tiled.grid.cols,
            tiled.grid.rows
        );
    }
    println!(
        "  Compressed:   {} ({} bytes)",
        style(report.compressed_output.display()).white(),
        report.compressed_bytes
    );
    println!(
        "  Restored:     {} ({} rows)",
        style(report.decompressed_output.display()).white(),
        report.decoded.height
    );
    println!("  Time:         {:.2}s", elapsed);
}

fn report_failure(output_mode: OutputMode, err: &StageError) -> anyhow::Result<()> {
    match output_mode {
        OutputMode::Json => {
            let output = JsonFailure {
                msg_type: "error",
                stage: err.stage.to_string(),
                error: err.source.to_string(),
            };
            println!("{}", serde_json::to_string(&output)?);
        }
        _ => {
            eprintln!(
                "{} {} stage failed: {}",
                style("Error:").red().bold(),
                err.stage,
                err.source
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "retile",
            "-i",
            "scan.tif",
            "--tile-width",
            "128",
            "--quality",
            "70",
        ]);
        let config = args.pipeline_config().unwrap();
        assert_eq!(config.input, PathBuf::from("scan.tif"));
        assert_eq!(config.tile_width, 128);
        assert_eq!(config.tile_height, 256);
        assert_eq!(config.quality, 70);
    }

    #[test]
    fn test_output_modes() {
        assert_eq!(
            Args::parse_from(["retile", "--json"]).output_mode(),
            OutputMode::Json
        );
        assert_eq!(
            Args::parse_from(["retile", "-v"]).output_mode(),
            OutputMode::Verbose
        );
        assert!(Args::try_parse_from(["retile", "--json", "--quiet"]).is_err());
    }

    #[test]
    fn test_quality_range_enforced() {
        assert!(Args::try_parse_from(["retile", "--quality", "101"]).is_err());
    }
}
