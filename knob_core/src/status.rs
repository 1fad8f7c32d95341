//! Outcome of a single pipeline step.

use crate::error::KnobError;
use crate::symbol::Symbol;

/// What one raw conversion did to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Matched no band; ignored.
    Outlier,
    /// Fed to the gesture engine as this symbol.
    Classified(Symbol),
    /// Consumed by calibration (collecting, discarded, or retried).
    Calibrating,
    /// A verified table was committed this step.
    Calibrated,
    /// Storing the result failed; previous table kept, calibration stopped.
    CalibrationAborted(KnobError),
}
