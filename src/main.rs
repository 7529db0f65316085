//! Live Document Capture CLI
//!
//! Command-line demonstration of the capture assistant driving the
//! synthetic document camera in single-shot or auto-consensus mode.

use clap::{Parser, ValueEnum};
use doc_capture::{
    analysis::QualityThresholds,
    camera::{CameraEvent, CameraRunner, SmartCamera},
    capture::{FileConfig, MockCamera},
    metrics::{MetricsRegistry, MetricsSnapshot},
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Fire once per steady streak.
    Single,
    /// Collect a batch of distinct frames.
    Consensus,
}

#[derive(Debug, Parser)]
#[command(name = "doc-capture", version, about = "Live document capture assistant demo")]
struct Cli {
    /// Capture mode.
    #[arg(long, value_enum, default_value_t = Mode::Single)]
    mode: Mode,

    /// Frames to collect in consensus mode.
    #[arg(long, default_value_t = 5)]
    target: usize,

    /// Consensus session timeout in milliseconds.
    #[arg(long, default_value_t = 15_000)]
    timeout_ms: u64,

    /// How long to run before stopping, in seconds.
    #[arg(long, default_value_t = 20)]
    seconds: u64,

    /// Seed of the synthetic document camera.
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Deliver portrait frames from the synthetic camera.
    #[arg(long)]
    portrait: bool,

    /// Use relaxed quality thresholds for dim rooms and soft lenses.
    #[arg(long)]
    permissive: bool,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print Prometheus metrics on exit.
    #[arg(long)]
    metrics: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    info!("Document Capture v{}", doc_capture::VERSION);
    info!("This is a demonstration using synthetic camera input");

    let config = match &cli.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };

    let mut source = MockCamera::new(cli.seed);
    if cli.portrait {
        source = source.with_portrait();
    }

    let camera = match SmartCamera::from_config(source, &config) {
        Ok(camera) => camera,
        Err(e) => {
            eprintln!("Failed to configure camera: {}", e);
            std::process::exit(1);
        }
    };
    let camera = if cli.permissive {
        info!("Using permissive quality thresholds");
        camera.with_thresholds(QualityThresholds::permissive())
    } else {
        camera
    };

    let (runner, handle, mut events) = CameraRunner::new(camera);

    let ctrlc_handle = handle.clone();
    if let Err(e) = ctrlc::set_handler(move || ctrlc_handle.stop()) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    if cli.mode == Mode::Consensus {
        let timeout = Duration::from_millis(cli.timeout_ms);
        if let Err(e) = handle.start_auto_consensus(cli.target, timeout) {
            warn!("Could not request consensus session: {}", e);
        }
    }

    let task = tokio::spawn(runner.run());
    let run_for = tokio::time::sleep(Duration::from_secs(cli.seconds));
    tokio::pin!(run_for);

    let mut delivered = 0usize;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(CameraEvent::Captured(frame)) => {
                    delivered += 1;
                    println!(
                        "capture #{} {} bytes hash {}",
                        frame.sequence(),
                        frame.encoded().len(),
                        frame.hash()
                    );
                }
                Some(CameraEvent::BatchReady(batch)) => {
                    delivered += batch.len();
                    println!(
                        "batch {:?}: {}/{} frames",
                        batch.completion,
                        batch.len(),
                        batch.target
                    );
                    for frame in &batch.frames {
                        println!(
                            "  #{} {} bytes hash {}",
                            frame.sequence(),
                            frame.encoded().len(),
                            frame.hash()
                        );
                    }
                    break;
                }
                None => break,
            },
            _ = &mut run_for => {
                info!("Run time elapsed");
                break;
            }
        }
    }

    handle.stop();
    let camera = match task.await {
        Ok(camera) => camera,
        Err(e) => {
            eprintln!("Camera task failed: {}", e);
            std::process::exit(1);
        }
    };

    let stats = camera.stats();
    info!(
        "Processed {} ticks ({} good, {} mid, {} bad, {} skipped): {} captures, {} frames delivered",
        stats.ticks,
        stats.good_ticks,
        stats.mid_ticks,
        stats.bad_ticks,
        stats.skipped_ticks,
        stats.captures,
        delivered
    );

    if cli.metrics {
        match MetricsRegistry::new() {
            Ok(registry) => {
                registry.update(&MetricsSnapshot::from_stats(&stats));
                match registry.encode() {
                    Ok(text) => print!("{}", text),
                    Err(e) => warn!("Failed to encode metrics: {}", e),
                }
            }
            Err(e) => warn!("Failed to create metrics registry: {}", e),
        }
    }

    info!("Done.");
}
