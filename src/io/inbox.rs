//! Connector inbox: cross-thread handoff of raw frames
//!
//! Transport workers own a [`FrameSender`] and push complete frames into it
//! from any thread. The registry owns the matching [`FrameInbox`] and drains
//! it from the controlling thread during the periodic handler.

use crate::error::{IgtlError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::trace;

/// Counters shared by a connector's sender and inbox
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboxStats {
    /// Frames pushed by transport workers
    pub enqueued: u64,
    /// Frames taken by the periodic handler
    pub drained: u64,
}

impl InboxStats {
    /// Frames waiting to be drained
    pub fn pending(&self) -> u64 {
        self.enqueued.saturating_sub(self.drained)
    }
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    drained: AtomicU64,
}

/// Sending half handed to a transport worker
#[derive(Debug, Clone)]
pub struct FrameSender {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    counters: Arc<Counters>,
}

impl FrameSender {
    pub fn connector_name(&self) -> &str {
        &self.name
    }

    /// Queue one complete frame (header + body)
    ///
    /// Fails with a broken-pipe I/O error once the connector was removed.
    pub fn send(&self, frame: Vec<u8>) -> Result<()> {
        let size = frame.len();
        self.tx.send(frame).map_err(|_| {
            IgtlError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                format!("Connector '{}' closed", self.name),
            ))
        })?;
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        trace!(connector = %self.name, size, "Frame queued");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half owned by the registry
#[derive(Debug)]
pub struct FrameInbox {
    name: Arc<str>,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    counters: Arc<Counters>,
}

impl FrameInbox {
    /// Create a connected inbox and sender
    pub fn channel(name: &str) -> (FrameSender, FrameInbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let name: Arc<str> = Arc::from(name);
        let counters = Arc::new(Counters::default());
        (
            FrameSender {
                name: name.clone(),
                tx,
                counters: counters.clone(),
            },
            FrameInbox { name, rx, counters },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take up to `max` queued frames (all of them when `None`)
    pub fn drain(&mut self, max: Option<usize>) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        while max.map_or(true, |m| frames.len() < m) {
            match self.rx.try_recv() {
                Ok(frame) => frames.push(frame),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        self.counters
            .drained
            .fetch_add(frames.len() as u64, Ordering::Relaxed);
        frames
    }

    pub fn stats(&self) -> InboxStats {
        InboxStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            drained: self.counters.drained.load(Ordering::Relaxed),
        }
    }
}
