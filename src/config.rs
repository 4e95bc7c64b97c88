use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::CameraConfig;

const DEFAULT_MODEL_DIR: &str = "model";
const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_POLL_SECS: f64 = 3.0;
const DEFAULT_GAME_OVER_PAUSE_SECS: f64 = 3.0;
const DEFAULT_MIN_CONFIDENCE: f32 = 0.0;
const DEFAULT_DISPLAY_QUEUE_DEPTH: usize = 2;

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    model_dir: Option<PathBuf>,
    camera: Option<CameraConfigFile>,
    game: Option<GameConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct GameConfigFile {
    poll_interval_secs: Option<f64>,
    game_over_pause_secs: Option<f64>,
    min_confidence: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    queue_depth: Option<usize>,
}

/// Resolved application settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model_dir: PathBuf,
    pub camera: CameraConfig,
    pub game: GameSettings,
    pub display_queue_depth: usize,
}

#[derive(Debug, Clone)]
pub struct GameSettings {
    /// How often the game reads the latest prediction.
    pub poll_interval: Duration,
    /// How long a finished round is shown before the next game starts.
    pub game_over_pause: Duration,
    /// Predictions below this score do not count as a move.
    pub min_confidence: f32,
}

impl AppConfig {
    /// Defaults, then the JSON file named by `RPS_CONFIG`, then environment
    /// overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("RPS_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Result<Self> {
        let camera_file = file.camera.unwrap_or_default();
        let game_file = file.game.unwrap_or_default();
        Ok(Self {
            model_dir: file
                .model_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR)),
            camera: CameraConfig {
                device: camera_file
                    .device
                    .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
                target_fps: camera_file.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
                width: camera_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
                height: camera_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            },
            game: GameSettings {
                poll_interval: secs(
                    "game.poll_interval_secs",
                    game_file.poll_interval_secs.unwrap_or(DEFAULT_POLL_SECS),
                )?,
                game_over_pause: secs(
                    "game.game_over_pause_secs",
                    game_file
                        .game_over_pause_secs
                        .unwrap_or(DEFAULT_GAME_OVER_PAUSE_SECS),
                )?,
                min_confidence: game_file.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
            },
            display_queue_depth: file
                .display
                .and_then(|display| display.queue_depth)
                .unwrap_or(DEFAULT_DISPLAY_QUEUE_DEPTH),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("RPS_MODEL_DIR") {
            if !dir.trim().is_empty() {
                self.model_dir = PathBuf::from(dir);
            }
        }
        if let Ok(device) = std::env::var("RPS_CAMERA_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(poll) = std::env::var("RPS_POLL_SECS") {
            let seconds: f64 = poll
                .trim()
                .parse()
                .map_err(|_| anyhow!("RPS_POLL_SECS must be a number of seconds"))?;
            self.game.poll_interval = secs("RPS_POLL_SECS", seconds)?;
        }
        if let Ok(min) = std::env::var("RPS_MIN_CONFIDENCE") {
            self.game.min_confidence = min
                .trim()
                .parse()
                .map_err(|_| anyhow!("RPS_MIN_CONFIDENCE must be a number"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.game.poll_interval.is_zero() {
            return Err(anyhow!("poll interval must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.game.min_confidence) {
            return Err(anyhow!(
                "min_confidence must be within [0, 1], got {}",
                self.game.min_confidence
            ));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera width and height must be greater than zero"));
        }
        if self.display_queue_depth == 0 {
            return Err(anyhow!("display queue depth must be at least 1"));
        }
        Ok(())
    }
}

fn secs(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| anyhow!("{} must be a non-negative number of seconds", field))
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() -> Result<()> {
        let cfg = AppConfig::from_file(AppConfigFile::default())?;
        cfg.validate()?;
        assert_eq!(cfg.model_dir, PathBuf::from("model"));
        assert_eq!(cfg.camera.device, "/dev/video0");
        assert_eq!(cfg.camera.width, 640);
        assert_eq!(cfg.game.poll_interval, Duration::from_secs(3));
        assert_eq!(cfg.game.min_confidence, 0.0);
        assert_eq!(cfg.display_queue_depth, 2);
        Ok(())
    }

    #[test]
    fn negative_durations_are_rejected() {
        let file: AppConfigFile =
            serde_json::from_str(r#"{"game": {"poll_interval_secs": -1}}"#).unwrap();
        assert!(AppConfig::from_file(file).is_err());
    }

    #[test]
    fn out_of_range_confidence_fails_validation() -> Result<()> {
        let file: AppConfigFile = serde_json::from_str(r#"{"game": {"min_confidence": 1.5}}"#)?;
        let cfg = AppConfig::from_file(file)?;
        assert!(cfg.validate().is_err());
        Ok(())
    }
}
