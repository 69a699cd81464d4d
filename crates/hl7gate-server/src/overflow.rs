//! Backpressure flag shared between the queue monitor and the listeners.
//!
//! The monitor owns the only [`OverflowWriter`]; every connection holds a
//! cloned [`OverflowFlag`]. Readers may see a value up to one monitor
//! interval old.

use tokio::sync::watch;

/// Creates a cleared flag and its single writer.
pub fn overflow_channel() -> (OverflowWriter, OverflowFlag) {
    let (tx, rx) = watch::channel(false);
    (OverflowWriter { tx }, OverflowFlag { rx })
}

/// Write side of the overflow flag. Not `Clone`.
#[derive(Debug)]
pub struct OverflowWriter {
    tx: watch::Sender<bool>,
}

impl OverflowWriter {
    /// Sets or clears the flag. Returns true if the value changed.
    pub fn set(&self, overflowing: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == overflowing {
                false
            } else {
                *current = overflowing;
                true
            }
        })
    }

    /// Current value.
    pub fn get(&self) -> bool {
        *self.tx.borrow()
    }

    /// Returns a new reader.
    pub fn subscribe(&self) -> OverflowFlag {
        OverflowFlag {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side of the overflow flag.
#[derive(Debug, Clone)]
pub struct OverflowFlag {
    rx: watch::Receiver<bool>,
}

impl OverflowFlag {
    /// True while the queue is at or above its stop level.
    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }
}
