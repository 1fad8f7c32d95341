//! Maps `Box<dyn Error>` from trait boundaries to typed `KnobError`.
//!
//! The traits in `knob_traits` use `Box<dyn Error + Send + Sync>` so any
//! backend can plug in; this module converts those to our typed error enum,
//! with an optional feature-gated path for `knob_hardware::HwError` downcasting.

use crate::error::KnobError;

/// Map a trait-boundary error to a typed `KnobError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> KnobError {
    // Feature-gated: try to downcast to HwError for precise mapping
    #[cfg(feature = "hardware-errors")]
    {
        use knob_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => KnobError::Timeout,
                HwError::Exhausted => KnobError::EndOfStream,
                HwError::AddressOutOfRange { .. } | HwError::WriteFault { .. } => {
                    KnobError::Storage(hw.to_string())
                }
                other => KnobError::HardwareFault(other.to_string()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") {
        KnobError::Timeout
    } else if lower.contains("exhausted") {
        KnobError::EndOfStream
    } else {
        KnobError::Hardware(s)
    }
}
