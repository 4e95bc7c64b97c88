use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::classify::Prediction;

/// Single-slot, last-write-wins holder for the latest prediction.
///
/// The capture worker swaps in a fresh `Arc<Prediction>` every iteration;
/// readers clone the `Arc` out. A reader sees either nothing (no frame
/// processed yet) or one complete prediction, never a mix of two. Neither
/// side takes a lock, so polling never waits on a publish.
#[derive(Clone, Debug, Default)]
pub struct PredictionSlot {
    inner: Arc<ArcSwapOption<Prediction>>,
}

impl PredictionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current prediction.
    pub fn publish(&self, prediction: Prediction) {
        self.inner.store(Some(Arc::new(prediction)));
    }

    /// Latest published prediction, if any. May be stale.
    pub fn latest(&self) -> Option<Arc<Prediction>> {
        self.inner.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_until_first_publish() {
        let slot = PredictionSlot::new();
        assert!(slot.latest().is_none());

        slot.publish(Prediction::new("rock", 0.8));
        assert_eq!(slot.latest().as_deref(), Some(&Prediction::new("rock", 0.8)));
    }

    #[test]
    fn last_write_wins_across_clones() {
        let writer = PredictionSlot::new();
        let reader = writer.clone();

        writer.publish(Prediction::new("rock", 0.8));
        let held = reader.latest();
        writer.publish(Prediction::new("paper", 0.6));

        assert_eq!(reader.latest().unwrap().class_name, "paper");
        // Earlier readers keep their own snapshot.
        assert_eq!(held.unwrap().class_name, "rock");
    }

    #[test]
    fn concurrent_readers_see_whole_predictions() {
        let slot = PredictionSlot::new();
        let writer = slot.clone();
        let handle = std::thread::spawn(move || {
            for i in 0..1000 {
                let (name, conf) = if i % 2 == 0 { ("rock", 0.25) } else { ("paper", 0.75) };
                writer.publish(Prediction::new(name, conf));
            }
        });

        for _ in 0..1000 {
            if let Some(p) = slot.latest() {
                match p.class_name.as_str() {
                    "rock" => assert_eq!(p.confidence, 0.25),
                    "paper" => assert_eq!(p.confidence, 0.75),
                    other => panic!("unexpected class {}", other),
                }
            }
        }
        handle.join().unwrap();
    }

    #[test]
    fn reads_do_not_wait_for_a_busy_writer() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::time::{Duration, Instant};

        let slot = PredictionSlot::new();
        slot.publish(Prediction::new("rock", 0.5));
        let writer = slot.clone();
        let done = Arc::new(AtomicBool::new(false));
        let writer_done = done.clone();
        let handle = std::thread::spawn(move || {
            let mut i = 0u32;
            while !writer_done.load(Ordering::Relaxed) {
                writer.publish(Prediction::new("paper", (i % 100) as f32 / 100.0));
                i = i.wrapping_add(1);
            }
        });

        let mut slowest = Duration::ZERO;
        for _ in 0..10_000 {
            let started = Instant::now();
            assert!(slot.latest().is_some());
            slowest = slowest.max(started.elapsed());
        }
        done.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        assert!(slowest < Duration::from_millis(100), "read took {:?}", slowest);
    }
}
