use std::path::PathBuf;
use std::time::Duration;

use log::{info, warn};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use structopt::StructOpt;

use scanner::base::defs::{Error, ErrorKind::*, Result};
use scanner::config::{seconds, ScanConfig};
use scanner::controller::{Collaborators, ScanController};
use scanner::session::Phase;
use scanner::sim::{FrameSize, LoggingScene, LoggingUi, SimCamera, SimMeshing};

#[derive(StructOpt)]
#[structopt(about = "Run one scanning session against a simulated device")]
struct Opts {
    #[structopt(flatten)]
    config: ScanConfig,

    #[structopt(
        help = "JSON scan config (overrides the config flags)",
        long,
        short = "c"
    )]
    config_file: Option<PathBuf>,

    #[structopt(help = "Simulated frames per second", long, default_value = "30")]
    frame_rate: f32,

    #[structopt(
        help = "Simulated camera frame size",
        long,
        default_value = "64x48"
    )]
    frame_size: FrameSize,

    #[structopt(help = "Stop the scan after this many seconds", long)]
    stop_after: Option<f32>,

    #[structopt(help = "Log level", long, short = "l", default_value = "info")]
    log_level: LevelFilter,
}

fn main() {
    let opts = Opts::from_args();

    let _ = TermLogger::init(
        opts.log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );

    if let Err(err) = run(&opts) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn run(opts: &Opts) -> Result<()> {
    let config = match &opts.config_file {
        Some(path) => ScanConfig::from_file(path)?,
        None => opts.config.clone(),
    };
    if !(opts.frame_rate > 0.0) {
        let desc = format!("frame rate {} must be positive", opts.frame_rate);
        return Err(Error::new(MalformedData, desc));
    }
    let frame_time = seconds("frame time", 1.0 / opts.frame_rate)?;
    if frame_time.is_zero() {
        let desc = format!("frame rate {} is too high", opts.frame_rate);
        return Err(Error::new(MalformedData, desc));
    }
    let stop_after = match opts.stop_after {
        Some(stop_after) => Some(seconds("stop after", stop_after)?),
        None => None,
    };

    // Enough frames to cover the whole session with room for teardown.
    let session = config
        .session_duration()?
        .saturating_add(Duration::from_secs(1));
    let max_frames = ((session.as_secs_f64() / frame_time.as_secs_f64()) * 2.0)
        .ceil() as u64;
    let max_frames = max_frames.saturating_add(10);

    let meshing = SimMeshing::new();
    let collaborators = Collaborators {
        meshing: Box::new(meshing.clone()),
        camera: Box::new(SimCamera::new(opts.frame_size)),
        scene: Box::new(LoggingScene),
        ui: Box::new(LoggingUi),
    };
    let mut controller = ScanController::new(config, collaborators)?;
    let notifier = controller.notifier();

    controller.start()?;

    let mut num_frames = 0;
    while controller.phase() != Phase::Idle {
        if num_frames == max_frames {
            let desc = format!(
                "scan still {} after {} frames",
                controller.phase(),
                num_frames
            );
            return Err(Error::new(BadOperation, desc));
        }

        if let Some(changes) = meshing.poll() {
            if notifier.send(changes).is_err() {
                warn!("spatial mapping notification lost");
            }
        }

        controller.update(frame_time);
        num_frames += 1;

        if let Some(stop_after) = stop_after {
            if controller.phase() == Phase::Scanning
                && controller.now() >= stop_after
            {
                info!("stopping on request");
                controller.stop();
            }
        }
    }

    // Let a capture that was still settling at stop time land.
    while controller.is_capture_in_flight() && num_frames < max_frames {
        controller.update(frame_time);
        num_frames += 1;
    }

    let stats = controller.stats();
    let registry = controller.registry();
    info!(
        "done in {:.2}s ({} frames): {} fragments, {} textured",
        controller.now().as_secs_f32(),
        num_frames,
        registry.len(),
        registry.textures().count()
    );
    info!(
        "captures: {} accepted, {} dropped, {} completed, {} failed",
        stats.accepted, stats.dropped, stats.completed, stats.failed
    );

    Ok(())
}
