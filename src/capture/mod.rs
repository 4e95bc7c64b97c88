//! Background capture loop.
//!
//! One worker thread per `CaptureLoop` runs, until asked to stop:
//!
//! 1. read a frame from the `FrameSource`
//! 2. hand it to the `DisplaySink`
//! 3. preprocess, classify, reduce
//! 4. overwrite the shared `PredictionSlot`
//!
//! The device is opened and released on the worker; the caller only starts
//! the loop, polls the slot and requests stop. Cancellation is cooperative:
//! the flag is checked at the top of each iteration, so an in-flight
//! iteration always completes. Any read, inference or label failure ends the
//! loop; nothing is retried.

mod sink;
mod slot;

pub use sink::{ChannelSink, DisplaySink, NullSink};
pub use slot::PredictionSlot;

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::classify::{InferenceEngine, Prediction};
use crate::ingest::FrameSource;
use crate::preprocess::Preprocessor;
use crate::PipelineError;

/// Lifecycle of a capture loop. `Stopped` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CaptureState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl CaptureState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => CaptureState::Idle,
            1 => CaptureState::Running,
            2 => CaptureState::Stopping,
            _ => CaptureState::Stopped,
        }
    }
}

/// State shared between the loop handle and its worker.
#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    cancel: AtomicBool,
    frames: AtomicU64,
}

impl Shared {
    fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: CaptureState, to: CaptureState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

/// Marks the loop `Stopped` when the worker exits, including by panic.
struct FinishGuard<'a>(&'a Shared);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0
            .state
            .store(CaptureState::Stopped as u8, Ordering::Release);
    }
}

/// Everything the worker takes ownership of on `start`.
struct Worker {
    source: Box<dyn FrameSource>,
    engine: Arc<Mutex<InferenceEngine>>,
    sink: Box<dyn DisplaySink>,
    preprocessor: Preprocessor,
}

impl Worker {
    fn run(mut self, shared: &Shared, slot: &PredictionSlot) -> Result<()> {
        let _finish = FinishGuard(shared);

        if let Err(err) = self.source.open() {
            log::error!("capture: frame source unavailable: {:#}", err);
            return Err(err);
        }
        log::info!("capture loop running");

        let result = self.iterate(shared, slot);
        self.source.release();

        let frames = shared.frames.load(Ordering::Relaxed);
        match &result {
            Ok(()) => log::info!("capture loop stopped after {} frames", frames),
            Err(err) => log::error!("capture loop terminated after {} frames: {:#}", frames, err),
        }
        result
    }

    fn iterate(&mut self, shared: &Shared, slot: &PredictionSlot) -> Result<()> {
        while !shared.cancelled() {
            let frame = self.source.read_next()?;
            self.sink.present(frame.clone());

            let tensor = self.preprocessor.prepare(&frame);
            let prediction = self.predict(&tensor)?;
            log::trace!("frame {}: {}", frame.sequence, prediction);

            slot.publish(prediction);
            shared.frames.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn predict(&self, tensor: &crate::preprocess::InputTensor) -> Result<Prediction> {
        let mut engine = self
            .engine
            .lock()
            .map_err(|_| PipelineError::inference("inference engine lock poisoned"))?;
        engine.predict(tensor)
    }
}

/// Handle to one capture/inference worker.
///
/// A loop runs at most once. To resume after `stop`, build a new loop with a
/// fresh `FrameSource`; the engine can be shared between successive loops.
pub struct CaptureLoop {
    shared: Arc<Shared>,
    slot: PredictionSlot,
    worker: Option<Worker>,
    join: Option<JoinHandle<Result<()>>>,
}

impl CaptureLoop {
    pub fn new<S>(source: S, engine: Arc<Mutex<InferenceEngine>>) -> Self
    where
        S: FrameSource + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(CaptureState::Idle as u8),
                cancel: AtomicBool::new(false),
                frames: AtomicU64::new(0),
            }),
            slot: PredictionSlot::new(),
            worker: Some(Worker {
                source: Box::new(source),
                engine,
                sink: Box::new(NullSink),
                preprocessor: Preprocessor::new(),
            }),
            join: None,
        }
    }

    /// Route captured frames to `sink` instead of discarding them.
    pub fn with_sink<D: DisplaySink + 'static>(mut self, sink: D) -> Self {
        if let Some(worker) = self.worker.as_mut() {
            worker.sink = Box::new(sink);
        }
        self
    }

    pub fn state(&self) -> CaptureState {
        self.shared.state()
    }

    /// A reader for the latest prediction, usable from any thread.
    pub fn predictions(&self) -> PredictionSlot {
        self.slot.clone()
    }

    /// Latest prediction, if any frame has been processed. Never blocks on
    /// inference.
    pub fn latest(&self) -> Option<Arc<Prediction>> {
        self.slot.latest()
    }

    /// Iterations completed so far.
    pub fn frames_processed(&self) -> u64 {
        self.shared.frames.load(Ordering::Relaxed)
    }

    /// Spawn the worker. Only valid from `Idle`.
    pub fn start(&mut self) -> Result<()> {
        let state = self.state();
        if state != CaptureState::Idle {
            return Err(anyhow!("capture loop cannot start from {:?}", state));
        }
        let worker = self
            .worker
            .take()
            .ok_or_else(|| anyhow!("capture loop already consumed its frame source"))?;
        if !self.shared.transition(CaptureState::Idle, CaptureState::Running) {
            return Err(anyhow!("capture loop cannot start from {:?}", self.state()));
        }

        let shared = self.shared.clone();
        let slot = self.slot.clone();
        let spawned = std::thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || worker.run(&shared, &slot));
        match spawned {
            Ok(join) => {
                self.join = Some(join);
                Ok(())
            }
            Err(err) => {
                self.shared
                    .state
                    .store(CaptureState::Stopped as u8, Ordering::Release);
                Err(anyhow!("failed to spawn capture thread: {}", err))
            }
        }
    }

    /// Request stop. Returns immediately; use `join` to wait for the worker.
    ///
    /// Before `start` this goes straight to `Stopped` without spawning.
    /// Once stopping or stopped it does nothing.
    pub fn stop(&self) {
        self.shared.cancel.store(true, Ordering::Release);
        if self
            .shared
            .transition(CaptureState::Idle, CaptureState::Stopped)
        {
            log::debug!("capture loop stopped before start");
            return;
        }
        if self
            .shared
            .transition(CaptureState::Running, CaptureState::Stopping)
        {
            log::info!("capture loop stopping");
        }
    }

    /// Wait for the worker to exit and return how it ended.
    ///
    /// Returns `Ok(())` when there is no worker to wait for.
    pub fn join(&mut self) -> Result<()> {
        match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| anyhow!("capture thread panicked"))?,
            None => Ok(()),
        }
    }

    /// True once the worker has exited (or was never spawned and the loop is stopped).
    pub fn is_finished(&self) -> bool {
        match &self.join {
            Some(join) => join.is_finished(),
            None => self.state() != CaptureState::Running,
        }
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        // Detached workers still observe the flag and release their device.
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{LabelTable, StubClassifier};
    use crate::ingest::{CameraConfig, CameraSource};

    fn engine() -> Arc<Mutex<InferenceEngine>> {
        let labels = LabelTable::new(["rock", "paper", "scissors"]).unwrap();
        Arc::new(Mutex::new(InferenceEngine::new(
            StubClassifier::constant(vec![0.1, 0.7, 0.2]),
            labels,
        )))
    }

    fn synthetic_camera() -> CameraSource {
        CameraSource::new(CameraConfig {
            device: "stub://capture-test".to_string(),
            target_fps: 0,
            width: 32,
            height: 24,
        })
    }

    #[test]
    fn stop_before_start_never_spawns() {
        let mut capture = CaptureLoop::new(synthetic_camera(), engine());
        assert_eq!(capture.state(), CaptureState::Idle);

        capture.stop();
        assert_eq!(capture.state(), CaptureState::Stopped);
        assert!(capture.start().is_err());
        assert!(capture.join().is_ok());
        assert_eq!(capture.frames_processed(), 0);
        assert!(capture.latest().is_none());
    }

    #[test]
    fn stop_is_idempotent() -> Result<()> {
        let mut capture = CaptureLoop::new(synthetic_camera(), engine());
        capture.start()?;
        capture.stop();
        capture.stop();
        capture.join()?;
        capture.stop();
        assert_eq!(capture.state(), CaptureState::Stopped);
        Ok(())
    }

    #[test]
    fn start_twice_is_rejected() -> Result<()> {
        let mut capture = CaptureLoop::new(synthetic_camera(), engine());
        capture.start()?;
        assert!(capture.start().is_err());
        capture.stop();
        capture.join()
    }

    #[test]
    fn state_codes_round_trip() {
        for state in [
            CaptureState::Idle,
            CaptureState::Running,
            CaptureState::Stopping,
            CaptureState::Stopped,
        ] {
            assert_eq!(CaptureState::from_u8(state as u8), state);
        }
    }
}
