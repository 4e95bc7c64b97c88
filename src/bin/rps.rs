//! rps - Rock, Paper, Scissors against the computer, played with hand gestures
//!
//! This binary:
//! 1. Loads the gesture model and its labels
//! 2. Starts the capture loop on the configured camera
//! 3. Polls the latest prediction on a fixed cadence and referees rounds
//! 4. Stops the camera on Ctrl-C or after the requested number of games

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rps_vision::config::{AppConfig, GameSettings};
use rps_vision::{
    CameraConfig, CameraSource, CaptureLoop, ChannelSink, Frame, InferenceEngine, Outcome,
    Referee,
};

const PREVIEW_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Model directory (labels.txt plus model.onnx or model.pb), or stub://name.
    #[arg(long)]
    model_dir: Option<PathBuf>,
    /// Camera device path, or stub://name for synthetic frames.
    #[arg(long)]
    device: Option<String>,
    /// Camera index, mapped to /dev/videoN.
    #[arg(long, conflicts_with = "device")]
    camera_index: Option<u32>,
    /// Number of games to play before exiting (0 plays until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    games: u32,
}

#[derive(Debug, Default)]
struct Scoreboard {
    user: u32,
    computer: u32,
    ties: u32,
}

impl Scoreboard {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::UserWins => self.user += 1,
            Outcome::ComputerWins => self.computer += 1,
            Outcome::Tie => self.ties += 1,
        }
    }

    fn played(&self) -> u32 {
        self.user + self.computer + self.ties
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = AppConfig::load()?;
    if let Some(dir) = args.model_dir {
        cfg.model_dir = dir;
    }
    if let Some(device) = args.device {
        cfg.camera.device = device;
    } else if let Some(index) = args.camera_index {
        cfg.camera.device = CameraConfig::for_index(index).device;
    }

    let engine = InferenceEngine::load(&cfg.model_dir)
        .with_context(|| format!("failed to load model from {}", cfg.model_dir.display()))?;
    log::info!(
        "classifier '{}' ready with labels {:?}",
        engine.backend_name(),
        engine.labels().iter().collect::<Vec<_>>()
    );
    let engine = Arc::new(Mutex::new(engine));

    let (sink, frames) = ChannelSink::bounded(cfg.display_queue_depth);
    let preview = spawn_preview(frames)?;

    let mut capture =
        CaptureLoop::new(CameraSource::new(cfg.camera.clone()), engine).with_sink(sink);
    capture.start()?;
    log::info!(
        "capturing from {}; reading a gesture every {:.1}s",
        cfg.camera.device,
        cfg.game.poll_interval.as_secs_f64()
    );

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("error setting Ctrl-C handler")?;

    let scoreboard = play(&capture, &cfg.game, args.games, &rx);

    capture.stop();
    let capture_result = capture.join();
    // Dropping the loop drops the sink, which ends the preview thread.
    drop(capture);
    if preview.join().is_err() {
        log::warn!("preview thread panicked");
    }

    capture_result?;
    let scoreboard = scoreboard?;
    log::info!(
        "final score after {} games: you {} - computer {} ({} ties)",
        scoreboard.played(),
        scoreboard.user,
        scoreboard.computer,
        scoreboard.ties
    );
    Ok(())
}

/// Poll the prediction slot and referee rounds until done or interrupted.
fn play(
    capture: &CaptureLoop,
    settings: &GameSettings,
    games: u32,
    shutdown: &Receiver<()>,
) -> Result<Scoreboard> {
    let predictions = capture.predictions();
    let mut referee = Referee::new().with_min_confidence(settings.min_confidence);
    let mut rng = rand::thread_rng();
    let mut scoreboard = Scoreboard::default();

    loop {
        if interrupted(shutdown, settings.poll_interval) {
            log::info!("shutdown signal received");
            break;
        }
        if capture.is_finished() {
            return Err(anyhow!("capture loop exited unexpectedly"));
        }

        let Some(prediction) = predictions.latest() else {
            log::info!("waiting for the camera...");
            continue;
        };
        log::info!("you are showing {}", prediction);

        let computer = referee.computer_choice(&mut rng);
        let Some(result) = referee.determine_winner(&prediction, computer) else {
            continue;
        };
        log::info!("{}", result);
        scoreboard.record(result.outcome);

        if games != 0 && scoreboard.played() >= games {
            break;
        }
        if interrupted(shutdown, settings.game_over_pause) {
            log::info!("shutdown signal received");
            break;
        }
        referee.reset();
        log::info!("make your choice!");
    }

    Ok(scoreboard)
}

/// Wait up to `timeout` for Ctrl-C.
fn interrupted(shutdown: &Receiver<()>, timeout: Duration) -> bool {
    match shutdown.recv_timeout(timeout) {
        Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        Err(RecvTimeoutError::Timeout) => false,
    }
}

/// Drain displayed frames and report the preview rate.
fn spawn_preview(frames: Receiver<Frame>) -> Result<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("preview".to_string())
        .spawn(move || {
            let mut count = 0u64;
            let mut window_start = Instant::now();
            for frame in frames {
                count += 1;
                let elapsed = window_start.elapsed();
                if elapsed >= PREVIEW_LOG_INTERVAL {
                    log::debug!(
                        "preview: {:.1} fps, {}x{}, frame {} is {} ms old",
                        count as f64 / elapsed.as_secs_f64(),
                        frame.width(),
                        frame.height(),
                        frame.sequence,
                        frame.age().as_millis()
                    );
                    count = 0;
                    window_start = Instant::now();
                }
            }
        })
        .context("failed to spawn preview thread")?;
    Ok(handle)
}
