// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Docscan — command-line document scanner.
//
// Entry point. Initialises logging, loads configuration, brings up the
// detection capability, and dispatches to a subcommand.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use docscan_core::human_errors::humanize_error;
use docscan_core::{DocscanError, FilterKind, Point2D, ScanConfig};
use docscan_document::codec::{self, Compressed, Quality};
use docscan_document::crop::{PreviewOptions, Viewport, render_preview};
use docscan_document::{RasterImage, ScanJob, ScanPipeline, order_corners};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "docscan")]
#[command(about = "Find, flatten, and clean up photographed documents")]
#[command(version)]
struct Cli {
    /// JSON configuration file; missing fields use defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip loading the detector (every capture uses the default rectangle).
    #[arg(long, global = true)]
    no_detector: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the document corners in an image and print them as JSON.
    Detect {
        /// Path to the input image.
        #[arg(long)]
        image: PathBuf,

        /// Fail instead of reporting the default rectangle when the
        /// detector is unavailable.
        #[arg(long)]
        strict: bool,
    },

    /// Detect, correct, and filter a capture.
    Scan(ScanArgs),

    /// Shrink an image for upload.
    Compress {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },

    /// List the filters offered to users.
    Filters,

    /// Print the default configuration as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Output path; `.png` writes PNG, anything else JPEG.
    #[arg(long)]
    out: PathBuf,

    /// Filter to apply (auto, bw, grayscale, color).
    #[arg(long)]
    filter: Option<FilterKind>,

    /// Override corners as `x,y` pairs in TL,TR,BR,BL order (8 numbers).
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    corners: Option<Vec<f64>>,

    /// Quarter turns clockwise before correction.
    #[arg(long, default_value = "0")]
    rotate: u8,

    /// JPEG quality 1-100; defaults to the configured export quality.
    #[arg(long)]
    quality: Option<u8>,

    /// Write the masked crop preview to this PNG.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Draw rule-of-thirds guides in the preview.
    #[arg(long)]
    grid: bool,

    /// Preview canvas size, `WIDTHxHEIGHT`.
    #[arg(long, default_value = "1080x1440", value_parser = parse_viewport)]
    viewport: Viewport,
}

fn parse_viewport(s: &str) -> Result<Viewport, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s}"))?;
    let width: u32 = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let height: u32 = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    if width == 0 || height == 0 {
        return Err("viewport must be non-empty".into());
    }
    Ok(Viewport::new(width, height))
}

fn corner_points(values: &[f64]) -> CliResult<[Point2D; 4]> {
    if values.len() != 8 {
        return Err(format!("--corners needs exactly 8 numbers, got {}", values.len()).into());
    }
    Ok(std::array::from_fn(|i| Point2D::new(values[2 * i], values[2 * i + 1])))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(err.as_ref());
            ExitCode::FAILURE
        }
    }
}

fn report(err: &(dyn std::error::Error + 'static)) {
    match err.downcast_ref::<DocscanError>() {
        Some(scan_err) => {
            let human = humanize_error(scan_err);
            eprintln!("error: {}", human.message);
            eprintln!("  {}", human.suggestion);
        }
        None => eprintln!("error: {err}"),
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = match &cli.config {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };

    match cli.command {
        Commands::Filters => {
            for kind in FilterKind::EXPOSED {
                println!("{kind}");
            }
            Ok(())
        }
        Commands::DefaultConfig => {
            println!("{}", ScanConfig::default().to_json()?);
            Ok(())
        }
        Commands::Compress { input, out } => compress(&config, &input, &out),
        Commands::Detect { image, strict } => {
            let pipeline = build_pipeline(config, cli.no_detector).await;
            if strict {
                pipeline.detector_state().require()?;
            }
            detect(&pipeline, &image)
        }
        Commands::Scan(args) => {
            let pipeline = build_pipeline(config, cli.no_detector).await;
            scan(&pipeline, args).await
        }
    }
}

async fn build_pipeline(config: ScanConfig, no_detector: bool) -> ScanPipeline {
    let mut pipeline = ScanPipeline::new(config);
    if no_detector {
        info!("Detector disabled; using default rectangle");
    } else {
        pipeline.initialize_detector().await;
    }
    pipeline
}

fn detect(pipeline: &ScanPipeline, image: &Path) -> CliResult<()> {
    let raster = codec::open(image)?;
    let detection = pipeline.detect(&raster);
    let out = json!({
        "width": raster.width(),
        "height": raster.height(),
        "detection": detection,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

async fn scan(pipeline: &ScanPipeline, args: ScanArgs) -> CliResult<()> {
    let data = std::fs::read(&args.image)?;
    let mut job = ScanJob::start(pipeline, &data, args.viewport)?;
    let source = job.detection().source;
    let job_id = job.id();

    {
        let session = job.session_mut()?;
        if let Some(values) = &args.corners {
            let ordered = order_corners(corner_points(values)?);
            let proj = session.projection();
            for (index, target) in ordered.points().iter().enumerate() {
                session.begin_drag(index);
                session.drag(proj.to_display(*target));
                session.end_drag();
            }
        }
        for _ in 0..args.rotate % 4 {
            session.rotate();
        }
    }

    if let Some(path) = &args.preview {
        let options = PreviewOptions {
            show_grid: args.grid,
            ..PreviewOptions::default()
        };
        let canvas = render_preview(job.original(), job.session()?, &options);
        let png = codec::encode_png(&RasterImage::from_rgba(canvas)?)?;
        std::fs::write(path, png)?;
        info!(path = %path.display(), "Preview written");
    }

    let kind = args.filter.unwrap_or(pipeline.config().output.default_filter);
    let outcome = job.finish(pipeline, kind).await?;
    if !outcome.corrected {
        warn!("Corners were degenerate; page was not flattened");
    }
    if !outcome.filtered.is_applied() {
        warn!(filter = %kind, "Filter could not be applied; writing unfiltered page");
    }

    let image = outcome.image();
    let is_png = args
        .out
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
    let bytes = if is_png {
        image.encode_png()?
    } else {
        image.encode_jpeg(args.quality.unwrap_or(pipeline.config().output.jpeg_quality))?
    };
    std::fs::write(&args.out, &bytes)?;

    let summary = json!({
        "job_id": job_id.to_string(),
        "out": args.out.display().to_string(),
        "sha256": hex::encode(Sha256::digest(&bytes)),
        "width": image.width(),
        "height": image.height(),
        "filter": image.applied_filter(),
        "filter_applied": outcome.filtered.is_applied(),
        "corrected": outcome.corrected,
        "detection": source,
        "bytes": bytes.len(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn compress(config: &ScanConfig, input: &Path, out: &Path) -> CliResult<()> {
    let data = std::fs::read(input)?;
    let result = codec::compress_image(&data, &config.compression);
    let summary = match &result {
        Compressed::Unchanged { reason, .. } => json!({
            "changed": false,
            "reason": format!("{reason:?}"),
            "bytes": data.len(),
        }),
        Compressed::Recompressed(bytes) => json!({
            "changed": true,
            "from": data.len(),
            "bytes": bytes.len(),
            "quality": Quality::new(config.compression.quality).value(),
        }),
    };
    std::fs::write(out, result.bytes())?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
