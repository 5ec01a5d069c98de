// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Run monitoring: event counters and cooperative cancellation.
//!
//! The monitor is deliberately passive: the engine reports events into
//! it and polls its cancellation flag between attempts; it never calls
//! out. Counters are plain cells because the whole engine is
//! single-threaded.

use std::cell::{Cell, RefCell};

use strum::EnumCount;
use strum_macros::EnumCount as EnumCountMacro;

/// Events reported during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumCountMacro)]
#[repr(u8)]
pub enum RandoEvent {
    /// A fresh attempt began (first attempt included).
    NewAttempt,
    /// An attempt failed recoverably and will be retried.
    Error,
    /// Post-run validation started.
    Validating,
    /// A validated result was produced.
    Finished,
}

/// Per-event counters plus a cancellation flag.
#[derive(Debug)]
pub struct RandoMonitor {
    counts: [Cell<u64>; RandoEvent::COUNT],
    cancelled: Cell<bool>,
    last_message: RefCell<String>,
}

impl RandoMonitor {
    pub fn new() -> Self {
        Self {
            counts: std::array::from_fn(|_| Cell::new(0)),
            cancelled: Cell::new(false),
            last_message: RefCell::new(String::new()),
        }
    }

    pub fn send(&self, event: RandoEvent, message: &str) {
        let cell = &self.counts[event as usize];
        cell.set(cell.get() + 1);
        if !message.is_empty() {
            *self.last_message.borrow_mut() = message.to_string();
        }
        tracing::debug!(?event, message, "rando event");
    }

    pub fn count(&self, event: RandoEvent) -> u64 {
        self.counts[event as usize].get()
    }

    /// Request cooperative cancellation; checked between attempts.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    pub fn last_message(&self) -> String {
        self.last_message.borrow().clone()
    }
}

impl Default for RandoMonitor {
    fn default() -> Self {
        Self::new()
    }
}
