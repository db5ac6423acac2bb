use anyhow::Context;
use canvas_capture::capture::{Canvas, MediaStream};
use canvas_capture::commands::{log_events, run_console};
use canvas_capture::export::FfmpegRecorder;
use canvas_capture::recorder::{CaptureController, RecorderOptions};
use clap::Parser;
use std::f64::consts::TAU;
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Record an animated canvas from the terminal.
///
/// Type `start`, `stop` and `save [filename]` at the prompt.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Canvas width in pixels
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Canvas height in pixels
    #[arg(long, default_value_t = 360)]
    height: u32,

    /// Capture frame rate, at most 1000
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Container and codec to record
    #[arg(long, default_value = "video/webm")]
    mime_type: String,

    /// Encoder bitrate
    #[arg(long)]
    bits_per_second: Option<NonZeroU64>,

    /// Directory recordings are saved to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// FFmpeg executable
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,
}

/// Orb circling over a dark background
fn draw_scene(canvas: &Canvas, t: f64) {
    canvas.draw(|pixels, width, height| {
        let (w, h) = (width as f64, height as f64);
        let radius = w.min(h) / 10.0;
        let cx = w / 2.0 + (w / 3.0) * (t * 0.7 * TAU / 4.0).cos();
        let cy = h / 2.0 + (h / 4.0) * (t * 1.3 * TAU / 4.0).sin();

        for (i, px) in pixels.chunks_exact_mut(4).enumerate() {
            let x = (i as u32 % width) as f64;
            let y = (i as u32 / width) as f64;
            let d = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt();
            let glow = (1.0 - d / (radius * 3.0)).clamp(0.0, 1.0).powi(2);
            let core = if d < radius { 1.0 } else { 0.0 };
            let light = (glow * 0.8 + core * 0.2).min(1.0);

            px[0] = (10.0 + 180.0 * light) as u8;
            px[1] = (20.0 + 220.0 * light) as u8;
            px[2] = (40.0 + 215.0 * light) as u8;
            px[3] = 255;
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canvas_capture=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    tracing::info!("Starting canvas-capture v{}", env!("CARGO_PKG_VERSION"));

    let canvas = Arc::new(Canvas::new(args.width, args.height));
    draw_scene(&canvas, 0.0);

    let stream =
        MediaStream::capture(canvas.clone(), Some(args.fps)).context("canvas cannot be captured")?;

    let animator = canvas;
    let frame_period = stream.frame_period();
    tokio::spawn(async move {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(frame_period);
        loop {
            ticker.tick().await;
            draw_scene(&animator, started.elapsed().as_secs_f64());
        }
    });

    let options = RecorderOptions {
        target_bits_per_second: args.bits_per_second,
        mime_type: args.mime_type.clone(),
    };
    let recorder = FfmpegRecorder::new(&options)
        .context("unsupported --mime-type")?
        .with_ffmpeg_path(&args.ffmpeg);
    let mut controller = CaptureController::from_stream(stream, options, Box::new(recorder))?
        .with_download_dir(&args.out_dir);

    tokio::spawn(log_events(controller.subscribe()));

    println!("canvas-capture: type 'start', 'stop', 'save [filename]' or 'help'");
    run_console(
        &mut controller,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
    .context("console failed")?;

    Ok(())
}
