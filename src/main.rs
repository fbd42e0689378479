//! GigE Exposure CLI
//!
//! Runs single-frame exposures against the simulated camera and writes
//! each frame to a directory. Ctrl-C aborts the exposure in progress.

use clap::{ArgAction, Parser};
use gige_exposure::{
    artifact::{ChecksumAlgorithm, DirectorySink, ImageFileFormat},
    capabilities::Binning,
    device::{SimulatedTransport, Transport},
    exposure::{CaptureOutcome, ExposureRequest, LoggingObserver},
    instrument::{Camera, FileConfig},
    metrics::{MetricsObserver, MetricsRegistry},
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "gige-exposure", version, about = "Single-frame camera exposures")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Exposure time in seconds
    #[arg(long)]
    exptime: Option<f64>,

    /// Binning, e.g. 1x1
    #[arg(long)]
    binning: Option<Binning>,

    /// Number of sequential frames
    #[arg(short = 'n', long)]
    frames: Option<u32>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Image format (png or pgm)
    #[arg(long)]
    format: Option<ImageFileFormat>,

    /// Checksum algorithm (blake3 or sha256)
    #[arg(long)]
    checksum: Option<ChecksumAlgorithm>,

    /// Camera to open; defaults to the first discovered
    #[arg(long)]
    camera_id: Option<String>,

    /// Seed for the simulated sensor noise
    #[arg(long)]
    seed: Option<u64>,

    /// Serve Prometheus metrics on this port (requires the `metrics` feature)
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn load_config(args: &Args) -> Result<FileConfig, String> {
    let mut config = match &args.config {
        Some(path) => FileConfig::from_file(path).map_err(|e| e.to_string())?,
        None => FileConfig::default(),
    };

    if let Some(exptime) = args.exptime {
        config.exposure.exposure_time = exptime;
    }
    if let Some(binning) = args.binning {
        config.exposure.binning = binning;
    }
    if let Some(frames) = args.frames {
        config.exposure.frames = frames;
    }
    if let Some(output) = &args.output {
        config.output.directory = output.clone();
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Some(checksum) = args.checksum {
        config.output.checksum = checksum;
    }
    if let Some(camera_id) = &args.camera_id {
        config.camera.camera_id = Some(camera_id.clone());
    }
    if let Some(seed) = args.seed {
        config.simulator.seed = Some(seed);
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(port: u16, registry: MetricsRegistry) {
    use gige_exposure::metrics::{MetricsServer, MetricsServerConfig};

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Failed to start metrics runtime: {}", e);
                return;
            }
        };
        let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
        if let Err(e) = runtime.block_on(server.run()) {
            warn!("Metrics server stopped: {}", e);
        }
    });
}

#[cfg(not(feature = "metrics"))]
fn spawn_metrics_server(port: u16, _registry: MetricsRegistry) {
    warn!(
        "Ignoring --metrics-port {}: built without the `metrics` feature",
        port
    );
}

#[derive(Debug, Default, PartialEq, Eq)]
struct FrameTally {
    stored: u32,
    failed: u32,
}

/// Runs up to `frames` cycles, stopping on an abort or once `stop` is set.
fn run_frames<T: Transport>(
    camera: &Camera<T>,
    request: &ExposureRequest,
    frames: u32,
    stop: &AtomicBool,
) -> FrameTally {
    let mut tally = FrameTally::default();
    for index in 1..=frames {
        if stop.load(Ordering::Acquire) {
            warn!("Interrupted, skipping remaining frames");
            break;
        }
        info!("Frame {}/{}", index, frames);
        let report = match camera.run_cycle(request) {
            Ok(report) => report,
            Err(e) => {
                error!("Cycle could not run: {}", e);
                tally.failed += 1;
                break;
            }
        };

        match report.outcome() {
            CaptureOutcome::Ok => {
                tally.stored += 1;
                if let Some(path) = report.artifact().and_then(|a| a.location()) {
                    println!("{}", path.display());
                }
            }
            CaptureOutcome::Aborted => {
                warn!("Exposure aborted, stopping");
                break;
            }
            CaptureOutcome::Failed(e) => {
                error!("Frame {} failed: {}", index, e);
                tally.failed += 1;
            }
        }
    }
    tally
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    info!("GigE Exposure v{}", gige_exposure::VERSION);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let request = match ExposureRequest::new(config.exposure.exposure_time, config.exposure.binning)
    {
        Ok(request) => request,
        Err(e) => {
            error!("Invalid exposure request: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let registry = match MetricsRegistry::new() {
        Ok(registry) => registry,
        Err(e) => {
            error!("Failed to create metrics registry: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = args.metrics_port {
        spawn_metrics_server(port, registry.clone());
    }

    let transport = SimulatedTransport::new(config.simulator.clone());
    let sink = DirectorySink::from_config(&config.output);
    let mut camera = match Camera::open(transport, &config.camera, sink) {
        Ok(camera) => camera,
        Err(e) => {
            error!("Failed to open camera: {}", e);
            return ExitCode::FAILURE;
        }
    };
    camera.add_observer(LoggingObserver);
    camera.add_observer(MetricsObserver::new(registry));

    let info = camera.info();
    info!(
        "Camera {} ({}, {} sensor, {}x{})",
        info.camera_id,
        info.model,
        info.sensor_type,
        camera.geometry().width,
        camera.geometry().height
    );

    // The token only aborts an exposure in progress; the flag also stops
    // the frame loop when Ctrl-C lands during readout or between frames.
    let token = camera.cancellation_token();
    let stop_requested = Arc::new(AtomicBool::new(false));
    let handler_flag = stop_requested.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Release);
        token.cancel();
    }) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    let frames = config.exposure.frames;
    let tally = run_frames(&camera, &request, frames, &stop_requested);

    camera.close();
    info!(
        "Done: {} stored, {} failed of {} requested",
        tally.stored, tally.failed, frames
    );

    if tally.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gige_exposure::{
        artifact::MemorySink,
        device::SimulatorConfig,
        exposure::{CancellationToken, ExposureObserver},
        instrument::CameraConfig,
    };

    fn camera(sink: MemorySink) -> Camera<SimulatedTransport> {
        let config = CameraConfig {
            discovery_settle_ms: 0,
            ..CameraConfig::default()
        };
        Camera::open(
            SimulatedTransport::new(SimulatorConfig::small()),
            &config,
            sink,
        )
        .unwrap()
    }

    fn request() -> ExposureRequest {
        ExposureRequest::new(0.01, Binning::FULL).unwrap()
    }

    /// Behaves like the Ctrl-C handler firing while a frame reads out.
    struct InterruptDuringReadout {
        stop: Arc<AtomicBool>,
        token: CancellationToken,
    }

    impl ExposureObserver for InterruptDuringReadout {
        fn readout_begin(&self, _request: &ExposureRequest) {
            self.stop.store(true, Ordering::Release);
            self.token.cancel();
        }
    }

    #[test]
    fn test_runs_all_frames() {
        let sink = MemorySink::new();
        let camera = camera(sink.clone());

        let tally = run_frames(&camera, &request(), 3, &AtomicBool::new(false));

        assert_eq!(tally, FrameTally { stored: 3, failed: 0 });
        assert_eq!(sink.len(), 3);
    }

    #[test]
    fn test_stop_before_first_frame() {
        let sink = MemorySink::new();
        let camera = camera(sink.clone());

        let tally = run_frames(&camera, &request(), 3, &AtomicBool::new(true));

        assert_eq!(tally, FrameTally::default());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_interrupt_during_readout_stops_after_frame() {
        let sink = MemorySink::new();
        let mut camera = camera(sink.clone());
        let stop = Arc::new(AtomicBool::new(false));
        let token = camera.cancellation_token();
        camera.add_observer(InterruptDuringReadout {
            stop: stop.clone(),
            token,
        });

        let tally = run_frames(&camera, &request(), 5, &stop);

        // The frame already reading out completes; no further frames start.
        assert_eq!(tally, FrameTally { stored: 1, failed: 0 });
        assert_eq!(sink.len(), 1);
    }
}
