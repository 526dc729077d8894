use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, bail};
use clap::{CommandFactory, Parser};
use rayon::prelude::*;
use tracing::{error, info, warn};

use hdrfuse_rs::image_pipeline::{
    ClaheParams, HdrConfig, OutputConfig, PixelMode, RetinexParams, StackToTiffPipeline,
    TiffCompression,
};
use hdrfuse_rs::logger;

#[derive(Parser)]
#[command(name = "hdrfuse")]
#[command(version, about = "Fuses an exposure stack into one HDR image and tone-maps it for display", long_about = None)]
struct Cli {
    /// Folder holding the exposure stack as grayscale TIFF frames, sorted
    /// by filename in ascending exposure order. A folder with no matching
    /// frames but with subfolders that have them is processed as a batch,
    /// one independent stack per subfolder.
    #[arg(value_name = "SOURCE_DIR")]
    source: PathBuf,

    /// Output file (single stack) or output folder (batch mode)
    #[arg(short, long, value_name = "PATH")]
    out: PathBuf,

    /// Only include frames whose filename starts with this prefix
    #[arg(long, value_name = "PREFIX")]
    prefix: Option<String>,

    /// Only include frames whose filename (without extension) ends with this suffix
    #[arg(long, value_name = "SUFFIX")]
    suffix: Option<String>,

    /// Exposure time list: one ASCII float per line, one per frame, at
    /// least as many lines as frames. Without it every frame gets unit weight.
    #[arg(long, value_name = "FILE")]
    exposure_file: Option<PathBuf>,

    /// Apply CLAHE tone mapping to the fused image
    #[arg(long)]
    clahe: bool,

    /// CLAHE tile grid size per axis
    #[arg(long, value_name = "N", default_value = "8")]
    clahe_tiles: usize,

    /// CLAHE histogram bins per tile
    #[arg(long, value_name = "N", default_value = "128")]
    clahe_bins: usize,

    /// CLAHE clip limit as a fraction of the average pixels per tile
    #[arg(long, value_name = "FRACTION", default_value = "0.01")]
    clahe_clip: f64,

    /// Apply the Retinex local-contrast filter
    #[arg(long)]
    retinex: bool,

    /// Gaussian sigma of the Retinex surround
    #[arg(long, value_name = "SIGMA", default_value = "5.0")]
    retinex_sigma: f64,

    /// Write 32-bit unsigned output instead of 8-bit
    #[arg(long)]
    bit32: bool,

    /// Write 32-bit float output
    #[arg(long, conflicts_with = "bit32")]
    float: bool,

    /// TIFF compression: none, lzw, or deflate
    #[arg(long, value_name = "METHOD", default_value = "none")]
    compression: String,

    /// Saturation threshold for exposure selection, in (0, 1)
    #[arg(long, value_name = "T", default_value = "0.5")]
    threshold: f64,

    /// Number of parallel worker threads for batch mode
    #[arg(short = 'j', long, value_name = "N")]
    threads: Option<usize>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    if !cli.source.is_dir() {
        eprintln!(
            "error: source folder '{}' does not exist\n",
            cli.source.display()
        );
        let _ = Cli::command().print_help();
        return ExitCode::from(2);
    }
    if let Some(exposure_file) = &cli.exposure_file {
        if !exposure_file.is_file() {
            eprintln!(
                "error: exposure file '{}' does not exist\n",
                exposure_file.display()
            );
            let _ = Cli::command().print_help();
            return ExitCode::from(2);
        }
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Processing failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
    }

    let config = build_config(cli)?;

    let frames = collect_frames(&cli.source, cli.prefix.as_deref(), cli.suffix.as_deref())?;
    if !frames.is_empty() {
        let output_path = single_stack_output(&cli.source, &cli.out);
        return process_stack(&config, &frames, cli.exposure_file.as_deref(), &output_path);
    }

    // No frames at the top level: treat every subfolder with frames as an
    // independent stack. Stacks are independent, so they fan out across the
    // rayon pool; each stack itself runs strictly sequentially.
    let stacks = collect_stack_dirs(&cli.source, cli.prefix.as_deref(), cli.suffix.as_deref())?;
    if stacks.is_empty() {
        bail!(
            "no TIFF frames found in '{}' (or its subfolders)",
            cli.source.display()
        );
    }

    info!(stacks = stacks.len(), "batch processing exposure stacks");
    std::fs::create_dir_all(&cli.out)
        .with_context(|| format!("failed to create output folder '{}'", cli.out.display()))?;

    let failures = AtomicUsize::new(0);
    stacks.par_iter().for_each(|(name, frames)| {
        let output_path = cli.out.join(format!("{name}.tiff"));
        if let Err(e) = process_stack(&config, frames, cli.exposure_file.as_deref(), &output_path)
        {
            error!(stack = %name, "skipping stack: {e:#}");
            failures.fetch_add(1, Ordering::Relaxed);
        }
    });

    let failed = failures.load(Ordering::Relaxed);
    if failed == stacks.len() {
        bail!("all {failed} stacks failed");
    }
    if failed > 0 {
        warn!(failed, total = stacks.len(), "some stacks were skipped");
    }
    Ok(())
}

fn build_config(cli: &Cli) -> anyhow::Result<HdrConfig> {
    let compression = match cli.compression.as_str() {
        "none" => TiffCompression::None,
        "lzw" => TiffCompression::Lzw,
        "deflate" => TiffCompression::DeflateBalanced,
        other => bail!("unknown compression method '{other}' (expected none, lzw, or deflate)"),
    };

    let output_mode = if cli.bit32 {
        PixelMode::Gray32
    } else if cli.float {
        PixelMode::Float32
    } else {
        PixelMode::Gray8
    };

    let clahe = cli.clahe.then(|| ClaheParams {
        tiles_x: cli.clahe_tiles,
        tiles_y: cli.clahe_tiles,
        num_bins: cli.clahe_bins,
        clip_limit: cli.clahe_clip,
    });
    let retinex = cli
        .retinex
        .then(|| RetinexParams::single_scale(cli.retinex_sigma));

    Ok(HdrConfig::builder()
        .saturation_threshold(cli.threshold)
        .clahe(clahe)
        .retinex(retinex)
        .output(
            OutputConfig::builder()
                .compression(compression)
                .output_mode(output_mode)
                .build(),
        )
        .build())
}

fn process_stack(
    config: &HdrConfig,
    frames: &[PathBuf],
    exposure_file: Option<&Path>,
    output_path: &Path,
) -> anyhow::Result<()> {
    let exposures = load_exposures(exposure_file, frames.len())?;
    let pipeline = StackToTiffPipeline::new(config.clone());

    info!(
        frames = frames.len(),
        output = %output_path.display(),
        "processing exposure stack"
    );
    pipeline.convert_files(frames, &exposures, output_path)?;
    Ok(())
}

/// Matching TIFF frames in `dir`, sorted by filename (the exposure order
/// contract).
fn collect_frames(
    dir: &Path,
    prefix: Option<&str>,
    suffix: Option<&str>,
) -> anyhow::Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read source folder '{}'", dir.display()))?
    {
        let path = entry?.path();
        if !path.is_file() || !has_tiff_extension(&path) {
            continue;
        }

        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if let Some(prefix) = prefix {
            if !name.starts_with(prefix) {
                continue;
            }
        }
        if let Some(suffix) = suffix {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
            if !stem.ends_with(suffix) {
                continue;
            }
        }
        frames.push(path);
    }
    frames.sort();
    Ok(frames)
}

fn collect_stack_dirs(
    dir: &Path,
    prefix: Option<&str>,
    suffix: Option<&str>,
) -> anyhow::Result<Vec<(String, Vec<PathBuf>)>> {
    let mut stacks = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let frames = collect_frames(&path, prefix, suffix)?;
        if frames.is_empty() {
            continue;
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("stack")
            .to_string();
        stacks.push((name, frames));
    }
    stacks.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(stacks)
}

fn has_tiff_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false)
}

/// Parses the exposure-time list: one float per line, at least one line
/// per frame. Without a file every frame gets unit weight.
fn load_exposures(path: Option<&Path>, frame_count: usize) -> anyhow::Result<Vec<f64>> {
    let Some(path) = path else {
        return Ok(vec![1.0; frame_count]);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read exposure file '{}'", path.display()))?;
    let mut exposures = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let exposure: f64 = line.parse().with_context(|| {
            format!("invalid exposure time on line {} of '{}'", number + 1, path.display())
        })?;
        exposures.push(exposure);
    }

    if exposures.len() < frame_count {
        bail!(
            "exposure file '{}' lists {} times for {} frames",
            path.display(),
            exposures.len(),
            frame_count
        );
    }
    exposures.truncate(frame_count);
    Ok(exposures)
}

fn single_stack_output(source: &Path, out: &Path) -> PathBuf {
    if out.is_dir() {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("hdr_output");
        out.join(format!("{name}.tiff"))
    } else {
        out.to_path_buf()
    }
}
