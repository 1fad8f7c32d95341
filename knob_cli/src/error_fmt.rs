//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use knob_core::error::{BuildError, KnobError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingStore => {
                "What happened: No EEPROM store was provided to the pipeline.\nLikely causes: The image file could not be opened or was not wired into the builder.\nHow to fix: Check store.path (or --store) and pass the store via with_store(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the [gesture] or [calibration] TOML sections.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(ke) = err.downcast_ref::<KnobError>() {
        return match ke {
            KnobError::Timeout => "What happened: The ADC did not deliver a conversion in time.\nLikely causes: Wrong IIO device or channel, or sampler.read_timeout_ms too low.\nHow to fix: Check [hardware] in the config and raise sampler.read_timeout_ms.".to_string(),
            KnobError::Storage(detail) => format!(
                "What happened: The EEPROM image could not be read or written ({detail}).\nLikely causes: Read-only location, full disk, or store.base_addr beyond the image.\nHow to fix: Check permissions on the image file and store.base_addr; the previous bands were kept."
            ),
            KnobError::Config(detail) => format!(
                "What happened: Band table rejected ({detail}).\nLikely causes: A bin missing or listed twice in the CSV.\nHow to fix: List bins 0..4 exactly once with low <= high."
            ),
            KnobError::Hardware(_) | KnobError::HardwareFault(_) => format!(
                "What happened: {ke}.\nLikely causes: ADC wiring, power, or sysfs permissions.\nHow to fix: Verify the IIO device exists and is readable, then rerun."
            ),
            KnobError::EndOfStream => format!(
                "What happened: {ke}.\nLikely causes: The sample source ended early.\nHow to fix: Re-run with --log-level=debug for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("parse config") || lower.contains("read config") {
        let cause = err.source().map(|s| format!(" ({s})")).unwrap_or_default();
        return format!(
            "What happened: The config file could not be loaded{cause}.\nLikely causes: Wrong path or invalid TOML syntax.\nHow to fix: Check --config and the file contents."
        );
    }

    const SECTIONS: [&str; 7] = [
        "gesture.",
        "calibration.",
        "sampler.",
        "store.",
        "sim.",
        "hardware.",
        "logging.",
    ];
    if SECTIONS.iter().any(|s| lower.starts_with(s)) {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file and try again."
        );
    }

    if lower.contains("band csv must have headers") {
        return "Invalid headers in band CSV. Expected 'bin,low,high'.".to_string();
    }

    if lower.contains("did not finish") {
        return format!(
            "What happened: {msg}.\nLikely causes: Too few sweep rounds, or the knob was not turned through every position.\nHow to fix: Increase --rounds or lower calibration.trigger_count."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per error kind; anything unrecognized returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use knob_core::error::{BuildError, KnobError};
    if err.downcast_ref::<BuildError>().is_some() {
        return 3;
    }
    if let Some(ke) = err.downcast_ref::<KnobError>() {
        return match ke {
            KnobError::Config(_) => 3,
            KnobError::Storage(_) => 4,
            KnobError::Timeout | KnobError::Hardware(_) | KnobError::HardwareFault(_) => 5,
            KnobError::EndOfStream => 1,
        };
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    use knob_core::error::{BuildError, KnobError};
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<KnobError>() {
        Some(KnobError::Config(_)) => "Config",
        Some(KnobError::Storage(_)) => "Storage",
        Some(KnobError::Timeout) => "Timeout",
        Some(KnobError::Hardware(_) | KnobError::HardwareFault(_)) => "Hardware",
        Some(KnobError::EndOfStream) => "EndOfStream",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;
    json!({
        "reason": reason_name(err),
        "code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use knob_core::error::{BuildError, KnobError};

    #[test]
    fn typed_errors_get_specific_text_and_codes() {
        let e: eyre::Report = KnobError::Storage("write fault".into()).into();
        assert!(humanize(&e).contains("EEPROM image"));
        assert_eq!(exit_code_for_error(&e), 4);

        let e: eyre::Report = BuildError::InvalidConfig("bucket_gap must be >= 1").into();
        assert!(humanize(&e).contains("bucket_gap"));
        assert_eq!(exit_code_for_error(&e), 3);
    }

    #[test]
    fn config_messages_are_recognized() {
        let e = eyre::eyre!("gesture.confirm_samples must be >= 1");
        assert!(humanize(&e).starts_with("What happened: Configuration is invalid"));
        assert_eq!(exit_code_for_error(&e), 1);
    }

    #[test]
    fn json_error_has_reason_and_message() {
        let e: eyre::Report = KnobError::Timeout.into();
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&e)).unwrap();
        assert_eq!(v["reason"], "Timeout");
        assert_eq!(v["code"], 5);
        assert!(v["message"].as_str().unwrap().contains("ADC"));
    }
}
