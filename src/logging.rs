//! Subscriber setup: console output plus per-stage log files under `<output_dir>/logs`.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::Config;
use crate::error::Error;

pub const LOGS_DIR: &str = "logs";
pub const PIPELINE_LOG_FILE: &str = "pipeline.log";
pub const TRACKING_LOG_FILE: &str = "tracking.log";
pub const CAMERA_LOG_FILE: &str = "camera_movement.log";

/// Each log file with the module targets written to it.
pub const LOG_FILES: [(&str, &[&str]); 3] = [
    (PIPELINE_LOG_FILE, &["matchvision"]),
    (
        TRACKING_LOG_FILE,
        &["matchvision::video", "matchvision::store", "matchvision::interpolate"],
    ),
    (CAMERA_LOG_FILE, &["matchvision::camera"]),
];

pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// One plain-text layer per entry of [`LOG_FILES`], files are truncated.
pub fn file_layers<P: AsRef<Path>>(output_dir: P, level: Level) -> Result<Vec<BoxedLayer>, Error> {
    let dir = output_dir.as_ref().join(LOGS_DIR);
    fs::create_dir_all(&dir)?;

    LOG_FILES
        .iter()
        .map(|(name, targets)| {
            let file = File::create(dir.join(name))?;
            let filter = targets
                .iter()
                .fold(Targets::new(), |f, target| f.with_target(*target, level));

            let layer: BoxedLayer = fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(filter)
                .boxed();

            Ok(layer)
        })
        .collect()
}

/// Installs the global subscriber. `verbose` raises the crate level from info to debug
/// on the console and in the files.
pub fn init(config: &Config) -> Result<(), Error> {
    let (level, directive) = if config.verbose {
        (Level::DEBUG, "matchvision=debug")
    } else {
        (Level::INFO, "matchvision=info")
    };

    let files = file_layers(&config.output_dir, level)?;
    let console = fmt::layer().with_filter(EnvFilter::new(directive));

    tracing_subscriber::registry()
        .with(files)
        .with(console)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(dir: &Path, name: &str) -> String {
        fs::read_to_string(dir.join(LOGS_DIR).join(name)).unwrap()
    }

    #[test]
    fn test_events_are_routed_by_target() {
        let dir = tempfile::tempdir().unwrap();
        let layers = file_layers(dir.path(), Level::INFO).unwrap();
        let subscriber = tracing_subscriber::registry().with(layers);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "matchvision::camera", "pan of 8 px");
            tracing::info!(target: "matchvision::video", "loaded 20 frames of tracks");
            tracing::info!(target: "matchvision::team", "2 players labelled");
            tracing::debug!(target: "matchvision::camera", "degenerate background");
            tracing::info!(target: "other_crate", "unrelated");
        });

        let camera = read(dir.path(), CAMERA_LOG_FILE);
        assert!(camera.contains("pan of 8 px"));
        assert!(!camera.contains("degenerate background"));
        assert!(!camera.contains("tracks"));

        let tracking = read(dir.path(), TRACKING_LOG_FILE);
        assert!(tracking.contains("loaded 20 frames of tracks"));
        assert!(!tracking.contains("pan"));

        let pipeline = read(dir.path(), PIPELINE_LOG_FILE);
        for msg in ["pan of 8 px", "loaded 20 frames", "2 players labelled"] {
            assert!(pipeline.contains(msg), "{} missing", msg);
        }
        assert!(!pipeline.contains("unrelated"));
    }

    #[test]
    fn test_debug_level_reaches_files() {
        let dir = tempfile::tempdir().unwrap();
        let layers = file_layers(dir.path().join("out"), Level::DEBUG).unwrap();

        tracing::subscriber::with_default(tracing_subscriber::registry().with(layers), || {
            tracing::debug!(target: "matchvision::camera", "12 of 40 feature flows agree");
        });

        let camera = fs::read_to_string(dir.path().join("out/logs").join(CAMERA_LOG_FILE)).unwrap();
        assert!(camera.contains("12 of 40 feature flows agree"));
    }
}
