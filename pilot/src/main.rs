use anyhow::Context;
use clap::Parser;
use log::error;
use reflexcore::control::StopReason;
use reflexcore::interface::RegionConfig;
use reflexcore::prelude::Region;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use workflow::config::WorkflowConfig;
use workflow::runner::{Backend, Runner};

mod devices;
mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Screen-region reflex pilot for side-scrolling games")]
struct Args {
    /// Load tunables from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Region configuration written by calibration
    #[arg(long)]
    roi_config: Option<PathBuf>,
    /// Play-history JSON file the session summary is appended to
    #[arg(long)]
    report: Option<PathBuf>,
    /// Folder for per-jump debug images
    #[arg(long)]
    debug_dir: Option<PathBuf>,
    /// Seconds to count down before the loop starts
    #[arg(long, default_value_t = 3)]
    countdown: u64,
    /// Stop automatically after this many seconds
    #[arg(long)]
    duration: Option<f64>,
    /// Drive the loop with generated frames and logged key presses
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    /// Save a region configuration from two corners and exit
    #[arg(long, value_delimiter = ',', value_name = "X1,Y1,X2,Y2")]
    calibrate: Option<Vec<u32>>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut config = match &args.workflow {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::default(),
    };
    if let Some(path) = args.roi_config {
        config.paths.roi_config = path;
    }
    if let Some(path) = args.report {
        config.paths.report = path;
    }
    if let Some(path) = args.debug_dir {
        config.paths.debug_dir = path;
    }
    if args.duration.is_some() {
        config.session_limit_secs = args.duration;
    }

    if let Some(corners) = args.calibrate {
        return calibrate(&corners, &config);
    }

    config.validate()?;
    let region_config = RegionConfig::load(&config.paths.roi_config)
        .context("loading region configuration")?;
    let roi = region_config.roi;
    println!(
        "Region: ({}, {}) ~ ({}, {}), {} x {}",
        roi.x1, roi.y1, roi.x2, roi.y2, region_config.width, region_config.height
    );

    let backend = if args.synthetic {
        Backend::Synthetic
    } else {
        Backend::Live
    };
    if backend == Backend::Live {
        println!("Open the game, place it inside the calibrated region and get ready.");
    }
    println!("Debug images: {}/", config.paths.debug_dir.display());
    println!("Press Ctrl+C to stop.");
    for remaining in (1..=args.countdown).rev() {
        println!("{}...", remaining);
        thread::sleep(Duration::from_secs(1));
    }
    println!("Go!");

    let runner = Runner::new(config.clone());
    let outcome = runner.execute(roi, backend)?;

    println!(
        "Session over: {:.2}s played, {} jumps, {} debug images, final speed x{:.2}",
        outcome.report.total_play_time_seconds,
        outcome.report.jump_count,
        outcome.report.debug_image_count,
        outcome.final_speed_factor
    );
    println!("History: {}", config.paths.report.display());
    if let StopReason::CollaboratorFailure(message) = outcome.stop_reason {
        anyhow::bail!("session ended early: {}", message);
    }
    Ok(())
}

fn calibrate(corners: &[u32], config: &WorkflowConfig) -> anyhow::Result<()> {
    let [x1, y1, x2, y2] = corners else {
        anyhow::bail!("--calibrate expects exactly four values: x1,y1,x2,y2");
    };
    let region = Region::from_corners((*x1, *y1), (*x2, *y2)).context("normalizing corners")?;
    let region_config = RegionConfig::new(region);
    region_config
        .save(&config.paths.roi_config)
        .context("saving region configuration")?;
    println!(
        "Saved region ({}, {}) ~ ({}, {}), {} x {} to {}",
        region.x1,
        region.y1,
        region.x2,
        region.y2,
        region_config.width,
        region_config.height,
        config.paths.roi_config.display()
    );
    Ok(())
}
