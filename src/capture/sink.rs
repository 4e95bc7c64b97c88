use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use crate::frame::Frame;

/// Receives every captured frame for display.
///
/// `present` runs on the capture worker and must not block; slow consumers
/// have to drop frames rather than stall capture.
pub trait DisplaySink: Send {
    fn present(&mut self, frame: Frame);
}

impl<F> DisplaySink for F
where
    F: FnMut(Frame) + Send,
{
    fn present(&mut self, frame: Frame) {
        self(frame)
    }
}

/// Discards frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn present(&mut self, _frame: Frame) {}
}

/// Hands frames to another thread through a bounded queue.
///
/// When the queue is full the newest frame is dropped; when the receiver is
/// gone every frame is dropped.
#[derive(Debug)]
pub struct ChannelSink {
    tx: SyncSender<Frame>,
    dropped: u64,
    disconnected: bool,
}

impl ChannelSink {
    /// Create a sink and the receiving end. `depth` is clamped to at least 1.
    pub fn bounded(depth: usize) -> (Self, Receiver<Frame>) {
        let (tx, rx) = mpsc::sync_channel(depth.max(1));
        (
            Self {
                tx,
                dropped: 0,
                disconnected: false,
            },
            rx,
        )
    }

    /// Frames not delivered so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl DisplaySink for ChannelSink {
    fn present(&mut self, frame: Frame) {
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                self.dropped += 1;
                log::trace!("display queue full, dropped frame {}", frame.sequence);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
                if !self.disconnected {
                    self.disconnected = true;
                    log::debug!("display receiver gone, discarding frames");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u64) -> Frame {
        Frame::from_rgb(vec![0u8; 3], 1, 1, sequence).unwrap()
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (mut sink, rx) = ChannelSink::bounded(2);
        for seq in 1..=5 {
            sink.present(frame(seq));
        }

        assert_eq!(sink.dropped(), 3);
        let received: Vec<u64> = rx.try_iter().map(|f| f.sequence).collect();
        assert_eq!(received, vec![1, 2]);
    }

    #[test]
    fn disconnected_receiver_is_tolerated() {
        let (mut sink, rx) = ChannelSink::bounded(1);
        drop(rx);
        sink.present(frame(1));
        sink.present(frame(2));
        assert_eq!(sink.dropped(), 2);
    }

    #[test]
    fn closures_are_sinks() {
        let mut seen = Vec::new();
        {
            let mut sink = |f: Frame| seen.push(f.sequence);
            sink.present(frame(4));
            sink.present(frame(5));
        }
        assert_eq!(seen, vec![4, 5]);
    }
}
