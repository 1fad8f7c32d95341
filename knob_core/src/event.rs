//! Events reported by the pipeline and the sinks that receive them.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel as xch;

use crate::band::BandTable;

/// Something the reporting side should hear about.
///
/// Band tables travel by value, so a reporter never reads pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    RotateForward,
    RotateBackward,
    SingleClick,
    DoubleClick,
    LongPress,
    /// Table read from storage at boot.
    BandsLoaded(BandTable),
    CalibrationStarted,
    /// A verified calibration became the live table.
    Calibrated(BandTable),
    /// Result rejected; calibration restarts.
    CalibrationRetry,
    /// Result could not be stored; previous table kept.
    CalibrationAborted,
}

impl Event {
    /// Single-character status code for the five point events.
    pub const fn code(&self) -> Option<char> {
        match self {
            Event::RotateForward => Some('F'),
            Event::RotateBackward => Some('B'),
            Event::SingleClick => Some('C'),
            Event::DoubleClick => Some('D'),
            Event::LongPress => Some('L'),
            _ => None,
        }
    }

    /// Stable snake_case name for structured output.
    pub const fn name(&self) -> &'static str {
        match self {
            Event::RotateForward => "rotate_forward",
            Event::RotateBackward => "rotate_backward",
            Event::SingleClick => "single_click",
            Event::DoubleClick => "double_click",
            Event::LongPress => "long_press",
            Event::BandsLoaded(_) => "bands_loaded",
            Event::CalibrationStarted => "calibration_started",
            Event::Calibrated(_) => "calibrated",
            Event::CalibrationRetry => "calibration_retry",
            Event::CalibrationAborted => "calibration_aborted",
        }
    }

    /// Band table carried by the event, if any.
    pub const fn table(&self) -> Option<&BandTable> {
        match self {
            Event::BandsLoaded(t) | Event::Calibrated(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    /// The text written to the report channel.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(c) = self.code() {
            return write!(f, "{c}");
        }
        match self {
            Event::BandsLoaded(t) | Event::Calibrated(t) => write!(f, "{t}"),
            Event::CalibrationStarted => f.write_str("Calibrating..."),
            Event::CalibrationRetry => f.write_str("Bad set, re-doing calibration..."),
            Event::CalibrationAborted => f.write_str("Calibration aborted, keeping previous bands"),
            _ => Ok(()),
        }
    }
}

/// Receiver of pipeline events. Must not block.
pub trait EventSink {
    fn emit(&mut self, event: Event);
}

impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event) {
        self.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: Event) {
        (**self).emit(event);
    }
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl EventSink for DiscardSink {
    fn emit(&mut self, _event: Event) {}
}

/// Non-blocking sender onto a bounded channel; full-queue events are dropped
/// and counted.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: xch::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSink {
    pub fn new(tx: xch::Sender<Event>) -> Self {
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A sink plus its receiving end, with room for `capacity` events.
    pub fn bounded(capacity: usize) -> (Self, xch::Receiver<Event>) {
        let (tx, rx) = xch::bounded(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Shared drop counter; stays readable after the sink moves to another thread.
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for ChannelSink {
    fn emit(&mut self, event: Event) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(xch::TrySendError::Full(ev)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(event = ev.name(), "event queue full, dropping");
            }
            Err(xch::TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
