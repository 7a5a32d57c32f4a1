// Fretsense - Fretboard contact sensor to chord classifier
// Module declarations

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

pub mod chords;
pub mod commands;
pub mod config;
pub mod pipeline;
pub mod playback;
pub mod sensor;
pub mod server;

use chords::ClassificationService;
use config::AppConfig;
use pipeline::{Poller, PollerSettings};
use playback::ChordPlayer;
use sensor::{LineFrameSource, SourceError};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

fn start_poller(config: &AppConfig, service: &Arc<ClassificationService>) -> Result<Option<Poller>, SourceError> {
    let Some(path) = config.source.as_ref() else {
        log::info!("No frame source configured, serving cached results only");
        return Ok(None);
    };

    let settings = PollerSettings {
        interval: Duration::from_millis(config.poll_interval_ms),
        audio_folder: config.playback.then(|| config.audio_folder.clone()),
    };

    // Regular files are captured device output; anything else is a serial device
    let poller = if std::fs::metadata(path)?.is_file() {
        log::info!("Replaying frames from {} every {} ms", path.display(), config.poll_interval_ms);
        let source = LineFrameSource::new(BufReader::new(File::open(path)?));
        Poller::spawn(source, Arc::clone(service), settings)
    } else {
        let source = sensor::open_serial(path, config.baud_rate, Duration::from_millis(config.read_timeout_ms))?;
        log::info!(
            "Polling frames from {} at {} baud every {} ms",
            path.display(),
            config.baud_rate,
            config.poll_interval_ms
        );
        Poller::spawn(source, Arc::clone(service), settings)
    };

    Ok(Some(poller))
}

fn run_keys(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut player = ChordPlayer::new(config.audio_folder.clone());
    log::info!("Playing chords from {}", player.audio_folder().display());
    for (key, chord) in playback::KEY_CHORDS {
        log::info!("  {} -> {}", key.to_ascii_uppercase(), chord);
    }
    log::info!("Type keys and press enter; Esc or end of input quits");

    let triggered = playback::run_keys(std::io::stdin().lock(), &mut player)?;
    player.stop();
    log::info!("Played {} chords", triggered.len());
    Ok(())
}

/// Load configuration, start the frame poller, and serve the API until ctrl-c
///
/// `fretsense keys [config]` runs the keyboard chord harness instead.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let mut args = std::env::args_os().skip(1).peekable();
    let keys_mode = args.peek().is_some_and(|arg| arg.as_os_str() == "keys");
    if keys_mode {
        args.next();
    }

    let config = AppConfig::load(args.next().map(PathBuf::from))?;
    if keys_mode {
        return run_keys(&config);
    }
    let rules = config.rule_table()?;

    let service = Arc::new(ClassificationService::new(rules, config.threshold));
    let policy = service.policy();
    log::info!(
        "Loaded {} chord rules ({} matchable), threshold {:?} {}",
        service.rules().len(),
        service.rules().positional().count(),
        policy.comparison,
        policy.value
    );

    let poller = start_poller(&config, &service)?;

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let state = server::AppState {
        service: Arc::clone(&service),
    };
    let served = runtime.block_on(server::serve(state, &config.bind, &config.allowed_origin));

    // Device reads time out, so the poller notices the stop flag promptly
    if let Some(poller) = poller {
        poller.stop();
    }

    served?;
    log::info!("Fretsense shut down");
    Ok(())
}
