//! Structured rule tracing.
//!
//! A sink only observes; nothing the engine computes depends on whether one is attached.

use std::cell::RefCell;

use serde::Serialize;

use crate::check::Check;
use crate::verdict::Verdict;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    CarrierTried {
        group: usize,
        carrier: String,
        vendor: Option<String>,
        s5_found: bool,
    },
    Deferred {
        group: usize,
        from: String,
        to: String,
    },
    RecordConsidered {
        carrier: String,
        seq_no: u32,
        outcome: RecordOutcome,
    },
    CheckOutcome {
        seq_no: u32,
        check: Check,
        verdict: Verdict,
    },
    SegmentOutcome {
        seq_no: u32,
        segment: usize,
        verdict: Verdict,
    },
    CacheInvalidated {
        group: usize,
        carrier: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    Cancelled,
    NotInEffect,
    PaxType,
    ChecksFailed,
    NotAvailFailed,
    CurrencyUnconvertible,
    /// Charge amount is negative.
    NegativeAmount,
    /// Matched, some fare-dependent checks outstanding.
    SoftMatched,
    /// Matched with every active check resolved.
    Matched,
    /// Matched and signals a defer to another carrier.
    Defer,
}

pub trait DiagSink {
    fn record(&self, event: TraceEvent);
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RefCell<Vec<TraceEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.borrow().clone()
    }

    pub fn take(&self) -> Vec<TraceEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl DiagSink for RecordingSink {
    fn record(&self, event: TraceEvent) {
        self.events.borrow_mut().push(event);
    }
}

/// Forwards every event to `log::trace!` under the `farebag::diag` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagSink for LogSink {
    fn record(&self, event: TraceEvent) {
        log::trace!(target: "farebag::diag", "{event:?}");
    }
}
