//! Spectral monitor branch.
//!
//! The tap sits right after the oscillator and gets a copy of every raw
//! block. It never waits: when the display falls behind, blocks are dropped
//! and counted, and the transmit path carries on.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use num_complex::Complex32;

use crate::params::ParameterStore;

/// Transmit-side end of the monitor branch
pub struct MonitorTap {
    tx: Sender<Vec<Complex32>>,
    dropped: Arc<AtomicU64>,
}

/// Display-side end of the monitor branch
pub struct MonitorFeed {
    rx: Receiver<Vec<Complex32>>,
    dropped: Arc<AtomicU64>,
    params: Arc<ParameterStore>,
}

/// Create a connected tap/feed pair holding at most `depth` blocks.
pub fn monitor_channel(depth: usize, params: Arc<ParameterStore>) -> (MonitorTap, MonitorFeed) {
    let (tx, rx) = crossbeam_channel::bounded(depth.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        MonitorTap {
            tx,
            dropped: Arc::clone(&dropped),
        },
        MonitorFeed {
            rx,
            dropped,
            params,
        },
    )
}

impl MonitorTap {
    /// Offer a copy of `block` to the display without blocking.
    pub fn offer(&self, block: &[Complex32]) {
        match self.tx.try_send(block.to_vec()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::trace!("Monitor full, dropped block ({} total)", total);
            }
            // Nobody is watching
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    pub fn dropped_blocks(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl MonitorFeed {
    /// Wait for the next block. `None` once the pipeline has stopped.
    pub fn recv(&self) -> Option<Vec<Complex32>> {
        self.rx.recv().ok()
    }

    /// Everything queued right now
    pub fn try_iter(&self) -> impl Iterator<Item = Vec<Complex32>> + '_ {
        self.rx.try_iter()
    }

    /// Current sample rate, for labelling the frequency axis
    pub fn sample_rate(&self) -> f64 {
        self.params.sample_rate()
    }

    /// Blocks the tap discarded because this feed was full
    pub fn dropped_blocks(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
