mod cancel;
mod capture;
mod classifier;
mod debounce;
mod output;
mod preview;
mod report;
mod session;
mod status;

use anyhow::{anyhow, Context, Result};
use cancel::CancellationToken;
use capture::WebcamCapture;
use clap::Parser;
use classifier::{Classifier, Preprocessor, TensorLayout};
use debounce::{DebounceEngine, DEFAULT_ALERT_LABEL, DEFAULT_THRESHOLD};
use output::{Compositor, V4L2Output};
use preview::Presenter;
use report::SerialSink;
use session::{LoopConfig, PollLoop};
use status::StatusBoard;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Webcam posture monitor with an Arduino alert link", long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Capture resolution width
    #[arg(long, default_value_t = 640)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 480)]
    capture_height: u32,

    /// Path to the posture classifier (ONNX file)
    #[arg(short, long, required_unless_present_any = ["list_ports", "list_cameras"])]
    model: Option<PathBuf>,

    /// Class labels: Teachable Machine metadata.json or one label per line.
    /// Defaults to metadata.json next to the model
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Model input edge length in pixels
    #[arg(long, default_value_t = 224)]
    input_size: u32,

    /// Model input tensor layout
    #[arg(long, value_enum, default_value_t = TensorLayout::Nhwc)]
    layout: TensorLayout,

    /// Apply softmax to the model output (for models that emit logits)
    #[arg(long)]
    softmax: bool,

    /// Label that raises the alert when held
    #[arg(long, default_value = DEFAULT_ALERT_LABEL)]
    alert_label: String,

    /// How long the alert label must be held before alerting, in milliseconds
    #[arg(long, default_value_t = DEFAULT_THRESHOLD.as_millis() as u64)]
    threshold_ms: u64,

    /// Pause after each poll cycle, in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_delay_ms: u64,

    /// Serial port of the Arduino (e.g. /dev/ttyACM0).
    /// Without it, posture is monitored but not reported
    #[arg(short = 'p', long)]
    serial_port: Option<String>,

    /// Serial baud rate
    #[arg(long, default_value_t = 9600)]
    baud_rate: u32,

    /// Minimum wait between attempts to (re)open the serial port, in milliseconds
    #[arg(long, default_value_t = 2000)]
    reconnect_ms: u64,

    /// v4l2loopback device for the preview feed (e.g. /dev/video10)
    #[arg(long)]
    preview_device: Option<PathBuf>,

    /// Preview width
    #[arg(long, default_value_t = 640)]
    preview_width: u32,

    /// Preview height
    #[arg(long, default_value_t = 480)]
    preview_height: u32,

    /// Preview frames per second
    #[arg(long, default_value_t = 30)]
    preview_fps: u32,

    /// Show the preview unmirrored
    #[arg(long)]
    no_mirror: bool,

    /// Ring the terminal bell while the alert is active
    #[arg(long)]
    bell: bool,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// List cameras and exit
    #[arg(long)]
    list_cameras: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    if args.list_ports || args.list_cameras {
        if args.list_ports {
            report::list_ports()?;
        }
        if args.list_cameras {
            capture::list_cameras()?;
        }
        return Ok(());
    }

    let model_path = args
        .model
        .clone()
        .ok_or_else(|| anyhow!("--model is required"))?;
    let labels_path = args
        .labels
        .clone()
        .unwrap_or_else(|| model_path.with_file_name("metadata.json"));

    tracing::info!("Posture alarm starting");
    tracing::info!("Capture: {}x{}", args.capture_width, args.capture_height);
    tracing::info!(
        "Alert: {} held for {}ms",
        args.alert_label,
        args.threshold_ms
    );

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Interrupted, shutting down");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl+C handler")?;

    // Initialize capture
    let capture = WebcamCapture::new(args.input_device, args.capture_width, args.capture_height)
        .context("Failed to initialize webcam capture")?;

    // Initialize classifier
    let classifier = classifier::create_default_classifier(
        &model_path,
        &labels_path,
        Preprocessor::new(args.input_size, args.layout),
        args.softmax,
    )
    .context("Failed to load classifier")?;

    if !classifier.labels().iter().any(|l| l == &args.alert_label) {
        tracing::warn!(
            "Alert label {} is not one of the model labels; the alert can never trigger",
            args.alert_label
        );
    }

    // Initialize report sink
    let sink = match &args.serial_port {
        Some(path) => {
            tracing::info!("Reporting labels to {} at {} baud", path, args.baud_rate);
            Some(
                SerialSink::new(path.as_str(), args.baud_rate)
                    .with_retry_interval(Duration::from_millis(args.reconnect_ms)),
            )
        }
        None => {
            tracing::info!("No serial port given, labels will not be reported");
            None
        }
    };

    // Initialize presentation
    let preview = args
        .preview_device
        .as_ref()
        .map(|device| {
            V4L2Output::new(device, args.preview_width, args.preview_height)
                .context("Failed to initialize preview output")
                .map(|output| {
                    let compositor =
                        Compositor::new(args.preview_width, args.preview_height, !args.no_mirror);
                    (compositor, output)
                })
        })
        .transpose()?;
    let publish_frames = preview.is_some();

    let board = StatusBoard::new();
    let presenter = Presenter::new(preview, args.bell.then(std::io::stderr));
    let presentation = if presenter.is_idle() {
        None
    } else {
        Some(presenter.spawn(board.clone(), args.preview_fps, token.clone()))
    };

    tracing::info!("Press Ctrl+C to stop");

    let poll = PollLoop::new(
        capture,
        classifier,
        sink,
        DebounceEngine::new(args.alert_label, Duration::from_millis(args.threshold_ms)),
        board,
        LoopConfig {
            poll_delay: Duration::from_millis(args.poll_delay_ms),
            publish_frames,
        },
    );
    let summary = poll.run(&token);

    token.cancel();
    if let Some(handle) = presentation {
        handle
            .join()
            .map_err(|_| anyhow!("Presentation thread panicked"))?;
    }

    tracing::info!(
        "Done: {} cycles, {} skipped",
        summary.cycles,
        summary.skipped
    );

    Ok(())
}
