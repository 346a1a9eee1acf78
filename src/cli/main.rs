//! Cutout CLI tool
//!
//! Command-line interface for repairing cutouts, cropping them, and adding
//! drop shadows.

use super::config::CliConfigBuilder;
use crate::{
    config::{PipelineConfig, RefineStrategy},
    pipeline::{CutoutPipeline, ProcessOptions},
    segmentation::SegmentationSession,
    services::{ConsoleProgressReporter, ImageIOService},
    shadow::create_placeholder,
    tracing_config::init_cli_tracing,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use instant::Instant;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Cut out subjects, crop them tight and add drop shadows
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "cutout")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input images or directories of images
    #[arg(value_name = "INPUT", required_unless_present = "placeholder")]
    pub input: Vec<PathBuf>,

    /// Output file (single input) or directory (several inputs)
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// JSON pipeline configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// ONNX segmentation model (overrides the configuration file)
    #[arg(short, long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Skip background removal; inputs are only normalised to RGBA
    #[arg(long)]
    pub no_remove: bool,

    /// Add the collage drop shadow
    #[arg(long)]
    pub shadow: bool,

    /// Shadow opacity (0-255, default 70); implies --shadow
    #[arg(long, value_name = "N")]
    pub shadow_intensity: Option<u8>,

    /// Mask refiner implementation
    #[arg(long, value_enum)]
    pub strategy: Option<CliRefineStrategy>,

    /// Images processed concurrently (0 = number of CPUs)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write a placeholder tile of the given size instead of processing
    #[arg(long, value_name = "WxH", value_parser = parse_dimensions)]
    pub placeholder: Option<(u32, u32)>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliRefineStrategy {
    Vectorized,
    Scalar,
}

impl From<CliRefineStrategy> for RefineStrategy {
    fn from(strategy: CliRefineStrategy) -> Self {
        match strategy {
            CliRefineStrategy::Vectorized => RefineStrategy::Vectorized,
            CliRefineStrategy::Scalar => RefineStrategy::Scalar,
        }
    }
}

/// Parse `WIDTHxHEIGHT`
fn parse_dimensions(value: &str) -> std::result::Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let parse = |side: &str| {
        side.trim()
            .parse::<u32>()
            .ok()
            .filter(|&v| v > 0)
            .ok_or_else(|| format!("invalid dimension '{side}' in '{value}'"))
    };
    Ok((parse(width)?, parse(height)?))
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;

    if let Some((width, height)) = cli.placeholder {
        return write_placeholder(width, height, cli.output.as_deref());
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    let files = collect_inputs(&cli.input)?;
    if files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(());
    }

    let jobs = plan_outputs(&files, cli.output.as_deref())?;
    let options = CliConfigBuilder::process_options(&cli);
    let processed = process_all(&cli, config, jobs, options).await?;
    info!("Processed {processed} image(s)");
    Ok(())
}

fn write_placeholder(width: u32, height: u32, output: Option<&Path>) -> Result<()> {
    let output = output.context("--placeholder requires --output")?;
    let tile = create_placeholder(width, height).context("Failed to create placeholder")?;
    ImageIOService::save_png(&tile, output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(
        width = tile.width(),
        height = tile.height(),
        "Placeholder written to {}",
        output.display()
    );
    Ok(())
}

async fn process_all(
    cli: &Cli,
    config: PipelineConfig,
    jobs: Vec<(PathBuf, PathBuf)>,
    options: Option<ProcessOptions>,
) -> Result<usize> {
    let session = Arc::new(SegmentationSession::from_config(&config.segmentation));
    let mut pipeline = CutoutPipeline::new(config, session).context("Invalid pipeline configuration")?;
    if jobs.len() == 1 {
        pipeline = pipeline.with_reporter(Arc::new(ConsoleProgressReporter::new(cli.verbose > 0)));
    }
    let pipeline = Arc::new(pipeline);

    let concurrency = match cli.jobs {
        0 => std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
        n => n,
    };
    let total = jobs.len();
    let batch_start = Instant::now();
    info!(files = total, concurrency, "Starting cutout batch");
    let progress = batch_progress(total)?;

    let outcomes: Vec<(PathBuf, Result<String>)> = stream::iter(jobs)
        .map(|(input, output)| {
            let pipeline = Arc::clone(&pipeline);
            let progress = progress.clone();
            async move {
                let label = input.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    process_one(&pipeline, &input, &output, options)
                })
                .await
                .map_err(anyhow::Error::from)
                .and_then(|r| r);
                if let Some(pb) = &progress {
                    pb.set_message(format!("Processed {}", label.display()));
                    pb.inc(1);
                }
                (label, outcome)
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut failed = 0usize;
    for (input, outcome) in &outcomes {
        match outcome {
            Ok(summary) => info!("{}: {summary}", input.display()),
            Err(e) => {
                failed += 1;
                error!("{}: {e:#}", input.display());
            },
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "Completed! Processed: {}, Failed: {failed}",
            total - failed
        ));
    }
    info!(
        succeeded = total - failed,
        failed,
        elapsed_ms = batch_start.elapsed().as_millis() as u64,
        "Batch finished"
    );
    if failed > 0 {
        anyhow::bail!("{failed} of {total} image(s) failed");
    }
    Ok(total)
}

/// Progress bar for multi-file batches; single files report per stage instead
fn batch_progress(total: usize) -> Result<Option<ProgressBar>> {
    if total <= 1 {
        return Ok(None);
    }
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .context("Invalid progress bar template")?
    .progress_chars("#>-");
    Ok(Some(ProgressBar::new(total as u64).with_style(style)))
}

fn process_one(
    pipeline: &CutoutPipeline,
    input: &Path,
    output: &Path,
    options: Option<ProcessOptions>,
) -> Result<String> {
    let image = ImageIOService::load(input)
        .with_context(|| format!("Failed to load {}", input.display()))?;
    let result = match options {
        Some(options) => pipeline.process_with(image, &options)?,
        None => pipeline.process(image)?,
    };
    ImageIOService::save_png(&result.image, output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let report = &result.report;
    debug!(?report, "Pipeline report");
    Ok(format!(
        "{}x{} -> {}x{} ({:?}, {}ms) -> {}",
        report.original_dimensions.0,
        report.original_dimensions.1,
        report.final_dimensions.0,
        report.final_dimensions.1,
        report.repair,
        report.timings.total_ms,
        output.display()
    ))
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Expand directories (non-recursively) and keep supported image files, sorted
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            if is_image_file(input) {
                files.push(input.clone());
            } else {
                warn!("Skipping unsupported file: {}", input.display());
            }
        } else if input.is_dir() {
            let entries = std::fs::read_dir(input)
                .with_context(|| format!("Failed to read directory {}", input.display()))?;
            for entry in entries {
                let path = entry?.path();
                if path.is_file() && is_image_file(&path) {
                    files.push(path);
                }
            }
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                input.display()
            );
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn default_output(input: &Path, dir: Option<&Path>) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let dir = dir.unwrap_or_else(|| input.parent().unwrap_or(Path::new(".")));
    dir.join(format!("{stem}_cutout.png"))
}

/// Pair every input with its output path
fn plan_outputs(files: &[PathBuf], output: Option<&Path>) -> Result<Vec<(PathBuf, PathBuf)>> {
    match (files, output) {
        ([single], Some(output)) if !output.is_dir() => Ok(vec![(single.clone(), output.to_path_buf())]),
        (_, Some(dir)) => {
            if dir.is_file() {
                anyhow::bail!(
                    "Output path exists and is a file, not a directory: {}",
                    dir.display()
                );
            }
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
            Ok(files
                .iter()
                .map(|f| (f.clone(), default_output(f, Some(dir))))
                .collect())
        },
        (_, None) => Ok(files.iter().map(|f| (f.clone(), default_output(f, None))).collect()),
    }
}
