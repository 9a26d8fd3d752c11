use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use seek_thermal_rs::logger;
use seek_thermal_rs::thermal::frame::{FRAME_HEIGHT, FRAME_KIND_PIXEL, FRAME_WIDTH};
use seek_thermal_rs::thermal::{DriverConfig, FrameKind, RangeMode, ThermalEvent, ThermalSession};

use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Stream calibrated frames from a Seek Thermal camera
#[derive(Parser, Debug)]
#[command(name = "seek-thermal", version)]
struct Args {
    /// Stop after this many calibrated frames (0 streams until Ctrl-C)
    #[arg(long, default_value_t = 0)]
    frames: usize,

    /// Stream until the first frame after the next shutter calibration
    #[arg(long, conflicts_with = "single")]
    take_one: bool,

    /// Acquire exactly one frame
    #[arg(long)]
    single: bool,

    /// Capture an extra offset baseline on the next calibration and apply it
    #[arg(long)]
    extra_calibration: bool,

    /// USB transfer timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Fixed display range instead of following each frame
    #[arg(long, num_args = 2, value_names = ["LOW", "HIGH"])]
    manual_range: Option<Vec<u16>>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init();

    info!("Starting seek_thermal...");

    let config = DriverConfig::builder()
        .timeout(Duration::from_millis(args.timeout_ms))
        .build();
    let session = ThermalSession::new(config).context("failed to create USB context")?;

    if let Some(range) = &args.manual_range {
        session.set_range_mode(RangeMode::manual(range[0], range[1]));
    }
    if args.extra_calibration {
        session.request_extra_calibration();
    }

    let rx = session.subscribe_channel();

    if !session.connect() {
        bail!("could not connect to the camera");
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let stop = session.driver().stop_signal();
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        stop.request();
    })
    .context("failed to install Ctrl-C handler")?;

    let started = if args.single {
        session.get_one()
    } else if args.take_one {
        session.take_one()
    } else {
        session.get_stream()
    };
    if !started {
        session.close();
        bail!("could not start acquisition");
    }

    let mut frames = 0usize;
    loop {
        if interrupted.load(Ordering::SeqCst) {
            info!("Interrupted");
            break;
        }

        let event = match rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match event {
            ThermalEvent::FrameReady(ready) => {
                frames += 1;
                info!(
                    frame = frames,
                    min = ready.min,
                    max = ready.max,
                    avg = ready.frame.avg_val(),
                    centre = ?ready.frame.pixel(FRAME_WIDTH / 2, FRAME_HEIGHT / 2),
                    "Frame ready"
                );
                if args.frames > 0 && frames >= args.frames {
                    break;
                }
            }
            ThermalEvent::NewFrame(pixels) => {
                let kind = pixels
                    .get(FRAME_KIND_PIXEL)
                    .map(|&code| FrameKind::from(code as u8));
                debug!(?kind, "Raw frame received");
                if args.single {
                    break;
                }
            }
            ThermalEvent::StreamingStopped => {
                info!("Streaming stopped");
                break;
            }
            ThermalEvent::Disconnected => {
                warn!("Camera disconnected");
                break;
            }
            other => debug!(event = ?other.kind(), "Event"),
        }
    }

    session.close();
    info!(frames, "Done");

    Ok(())
}
