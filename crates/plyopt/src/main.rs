use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info};
use std::{fs, path::PathBuf, process::ExitCode, time::Instant};

mod outliers;
mod voxel;

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Parser, Debug, Clone)]
#[command(name = "plyopt", version, about = "Clean and compress a scanned PLY point cloud")]
struct Args {
    /// Input PLY (ascii or binary).
    input: PathBuf,

    /// Output path; written as binary little-endian PLY.
    output: PathBuf,

    /// Edge length of the downsampling voxel grid. Larger compresses more.
    #[arg(long, default_value_t = 0.02)]
    voxel_size: f32,

    /// Neighbours considered when scoring outliers.
    #[arg(long, default_value_t = 20)]
    nb_neighbors: usize,

    /// Standard deviations above the mean neighbour distance before a point
    /// counts as an outlier. Larger removes less.
    #[arg(long, default_value_t = 5.0)]
    std_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Report {
    original: usize,
    after_outliers: usize,
    after_voxel: usize,
    original_bytes: u64,
    final_bytes: u64,
}

impl Report {
    fn ratio(&self) -> f64 {
        if self.final_bytes == 0 {
            0.0
        } else {
            self.original_bytes as f64 / self.final_bytes as f64
        }
    }
}

fn optimize(args: &Args) -> Result<Report> {
    if !args.input.exists() {
        bail!("input file '{}' not found", args.input.display());
    }
    if !(args.voxel_size.is_finite() && args.voxel_size > 0.0) {
        bail!("--voxel-size must be positive, got {}", args.voxel_size);
    }

    info!("Loading '{}'", args.input.display());
    let cloud = plyfmt::read_file(&args.input)
        .with_context(|| format!("failed to read '{}'", args.input.display()))?;
    if cloud.is_empty() {
        bail!("'{}' contains no points", args.input.display());
    }
    let original = cloud.len();
    info!("Points before optimization: {original}");

    let t = Instant::now();
    let (cloud, stats) =
        outliers::remove_statistical_outliers(&cloud, args.nb_neighbors, args.std_ratio);
    let after_outliers = cloud.len();
    if let Some(s) = stats {
        info!(
            "Outlier removal: {after_outliers} points ({} removed; mean {:.4}, std {:.4}, cutoff {:.4}) in {:.2?}",
            original - after_outliers,
            s.mean,
            s.std,
            s.threshold,
            t.elapsed()
        );
    } else {
        info!("Outlier removal skipped: too few points");
    }

    let t = Instant::now();
    let cloud = voxel::voxel_downsample(&cloud, args.voxel_size);
    let after_voxel = cloud.len();
    info!(
        "Voxel downsampling ({}): {after_voxel} points ({} removed) in {:.2?}",
        args.voxel_size,
        after_outliers - after_voxel,
        t.elapsed()
    );

    plyfmt::write_file(&args.output, &cloud)
        .with_context(|| format!("failed to write '{}'", args.output.display()))?;

    let report = Report {
        original,
        after_outliers,
        after_voxel,
        original_bytes: fs::metadata(&args.input)?.len(),
        final_bytes: fs::metadata(&args.output)?.len(),
    };

    info!("Wrote '{}'", args.output.display());
    info!("Final points: {}", report.after_voxel);
    info!("Final size: {:.2} MiB", report.final_bytes as f64 / MIB);
    info!("Original size: {:.2} MiB", report.original_bytes as f64 / MIB);
    info!("Compression: {:.2}x", report.ratio());

    Ok(report)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match optimize(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
