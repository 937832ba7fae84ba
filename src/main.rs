use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod capture;
mod config;
mod error;
mod state;
mod timelapse;

use capture::{Coordinator, HttpFetcher, PollConfig};
use config::{Layout, Settings};
use error::{AppError, CatalogueError, TimelapseError};
use state::catalogue::Catalogue;
use timelapse::{build_video, list_frames, output_path, DateRange, Encoder, Quality};

/// Download traffic camera images and turn them into timelapse videos
#[derive(Parser)]
#[command(name = "traffic-timelapse", version)]
struct Cli {
    /// Settings file (JSON); defaults to the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Camera table (JSON) to use instead of the built-in one
    #[arg(long, global = true)]
    cameras_file: Option<PathBuf>,

    /// Directory holding downloaded frames
    #[arg(long, global = true)]
    images_dir: Option<PathBuf>,

    /// Keep each camera's frames in its own subdirectory
    #[arg(long, global = true)]
    per_camera_dirs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll one or more cameras until Ctrl+C
    Download {
        /// Camera to download from (repeatable)
        #[arg(short = 'c', long = "camera", default_value = "anzacbr")]
        cameras: Vec<String>,

        /// Download interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after this many poll cycles per camera
        #[arg(long)]
        cycles: Option<u64>,

        /// HTTP timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Encode a camera's frames into a video
    Timelapse {
        /// Camera to create the timelapse from
        #[arg(short, long)]
        camera: String,

        /// Video framerate
        #[arg(short, long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
        framerate: u32,

        /// Output quality
        #[arg(short, long, value_enum, default_value_t = Quality::High)]
        quality: Quality,

        #[command(flatten)]
        dates: DateArgs,

        /// Where to write the video
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// List available cameras and how many frames each has
    Cameras {
        /// Print the camera table as JSON (usable with --cameras-file)
        #[arg(long)]
        json: bool,
    },

    /// List stored frames for a camera
    Images {
        #[arg(short, long)]
        camera: String,

        #[command(flatten)]
        dates: DateArgs,
    },
}

#[derive(Args)]
struct DateArgs {
    /// First day to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    start_date: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    end_date: Option<NaiveDate>,
}

impl DateArgs {
    fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}', expected YYYY-MM-DD", value))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logging: RUST_LOG=traffic_timelapse=debug for per-request detail
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("traffic_timelapse=info,warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, AppError> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(dir) = cli.images_dir {
        settings.images_dir = dir;
    }
    if cli.per_camera_dirs {
        settings.layout = Layout::PerCamera;
    }
    if let Some(path) = cli.cameras_file {
        settings.cameras_file = Some(path);
    }

    let catalogue = match &settings.cameras_file {
        Some(path) => Catalogue::from_file(path)?,
        None => Catalogue::builtin()?,
    };

    match cli.command {
        Command::Download {
            cameras,
            interval,
            cycles,
            timeout,
        } => {
            if let Some(secs) = interval {
                settings.interval_secs = secs;
            }
            if let Some(secs) = timeout {
                settings.fetch_timeout_secs = secs;
            }
            settings.validate()?;
            download(&settings, &catalogue, &cameras, cycles).await
        }
        Command::Timelapse {
            camera,
            framerate,
            quality,
            dates,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                settings.timelapse_dir = dir;
            }
            make_timelapse(&settings, &catalogue, &camera, framerate, quality, dates.range()).await
        }
        Command::Cameras { json: true } => {
            println!("{}", catalogue.to_json()?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Cameras { json: false } => {
            list_cameras(&settings, &catalogue);
            Ok(ExitCode::SUCCESS)
        }
        Command::Images { camera, dates } => {
            list_images(&settings, &catalogue, &camera, dates.range())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Poll the requested cameras until Ctrl+C or the cycle limit
async fn download(
    settings: &Settings,
    catalogue: &Catalogue,
    requested: &[String],
    cycles: Option<u64>,
) -> Result<ExitCode, AppError> {
    let resolved = catalogue.resolve(requested);
    for slug in &resolved.unknown {
        eprintln!("⚠️  Unknown camera '{}', skipping (see `cameras` for the list)", slug);
    }
    if resolved.cameras.is_empty() {
        return Err(CatalogueError::NoValidCameras(resolved.unknown).into());
    }

    println!("Traffic Camera Image Downloader");
    for camera in &resolved.cameras {
        println!("Camera: {} ({})", camera.name, camera.slug);
        println!("  Downloading from: {}", camera.url);
    }
    println!("Interval: {} seconds", settings.interval_secs);
    println!("Saving to: {}", settings.images_dir.display());
    println!("Press Ctrl+C to stop");
    println!("{}", "-".repeat(50));

    let fetcher = HttpFetcher::new(settings.fetch_timeout())?;
    let coordinator = Coordinator::new(
        PollConfig {
            images_dir: settings.images_dir.clone(),
            layout: settings.layout,
            interval: settings.interval(),
            max_cycles: cycles,
        },
        fetcher,
    );

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl+C received, stopping all cameras");
                cancel.cancel();
            }
        })
    };

    let summary = coordinator.run(resolved.cameras, cancel).await;
    ctrl_c.abort();

    println!();
    for state in &summary.per_camera {
        let last = state
            .last_timestamp
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!("  {:15} {} images (last: {})", state.slug, state.download_count, last);
    }
    for failure in &summary.failed {
        eprintln!(
            "  {:15} {} images, stopped: {}",
            failure.state.slug, failure.state.download_count, failure.error
        );
    }
    println!("🛑 Stopped. Total images downloaded: {}", summary.total());

    if summary.per_camera.is_empty() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Encode one camera's frames with the external encoder
async fn make_timelapse(
    settings: &Settings,
    catalogue: &Catalogue,
    slug: &str,
    framerate: u32,
    quality: Quality,
    range: DateRange,
) -> Result<ExitCode, AppError> {
    let camera = catalogue.lookup(slug)?;

    let encoder = Encoder::new(&settings.encoder);
    if let Err(e) = encoder.check_available().await {
        eprintln!("❌ FFmpeg is not installed or not available in PATH");
        eprintln!("Please install FFmpeg:");
        eprintln!("  macOS: brew install ffmpeg");
        eprintln!("  Ubuntu/Debian: sudo apt install ffmpeg");
        eprintln!("  Windows: Download from https://ffmpeg.org/download.html");
        return Err(e.into());
    }

    let frames = list_frames(&settings.images_dir, settings.layout, slug, range)?;
    if frames.is_empty() {
        println!("No images found for camera '{}' ({})", slug, camera.name);
        println!(
            "Looking for {}_*.jpeg in {}",
            slug,
            settings.layout.camera_dir(&settings.images_dir, slug).display()
        );
        return Err(TimelapseError::NoFramesMatched.into());
    }
    println!("Found {} images for {}", frames.len(), camera.name);

    let output = output_path(&settings.timelapse_dir, slug, &range, Local::now().naive_local());

    println!("Creating timelapse video...");
    println!("Framerate: {} fps", framerate);
    println!("Quality: {:?} (crf {})", quality, quality.crf());
    println!("Output: {}", output.display());
    println!("{}", "-".repeat(50));

    let written = build_video(&encoder, &frames, framerate, quality, &output).await?;

    println!("✅ Timelapse created successfully: {}", written.display());
    if let Ok(meta) = std::fs::metadata(&written) {
        println!("File size: {:.1} MB", meta.len() as f64 / (1024.0 * 1024.0));
    }
    println!("\n🎬 Timelapse creation completed!");

    Ok(ExitCode::SUCCESS)
}

fn list_cameras(settings: &Settings, catalogue: &Catalogue) {
    println!("Available cameras:");
    println!("{}", "-".repeat(50));
    for camera in catalogue.list_all() {
        let count = list_frames(&settings.images_dir, settings.layout, &camera.slug, DateRange::default())
            .map(|frames| frames.len())
            .unwrap_or(0);
        println!("  {:15} - {} ({} images)", camera.slug, camera.name, count);
    }
    println!();
}

fn list_images(
    settings: &Settings,
    catalogue: &Catalogue,
    slug: &str,
    range: DateRange,
) -> Result<(), AppError> {
    let camera = catalogue.lookup(slug)?;
    let frames = list_frames(&settings.images_dir, settings.layout, slug, range)?;

    if frames.is_empty() {
        println!("No images found for camera '{}' ({})", slug, camera.name);
        return Ok(());
    }

    println!("Images for {} ({} total):", camera.name, frames.len());
    println!("{}", "-".repeat(70));
    for frame in &frames {
        println!(
            "  {:50} {} ({:6.1} KB)",
            frame.file_name(),
            frame.captured_at.format("%Y-%m-%d %H:%M:%S"),
            frame.size_bytes as f64 / 1024.0
        );
    }
    Ok(())
}
