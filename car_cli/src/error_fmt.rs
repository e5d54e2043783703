//! Human-readable error descriptions and structured JSON error formatting.

use car_hardware::error::HwError;

/// Coarse classification used for exit codes and the JSON `reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Config,
    Hardware,
    Transport,
    Other,
}

impl Failure {
    pub fn name(self) -> &'static str {
        match self {
            Failure::Config => "Config",
            Failure::Hardware => "Hardware",
            Failure::Transport => "Transport",
            Failure::Other => "Error",
        }
    }
}

pub fn classify(err: &eyre::Report) -> Failure {
    if err.downcast_ref::<toml::de::Error>().is_some() {
        return Failure::Config;
    }
    if err.downcast_ref::<HwError>().is_some() {
        return Failure::Hardware;
    }
    let chain: Vec<String> = err.chain().map(|c| c.to_string().to_ascii_lowercase()).collect();
    if chain
        .iter()
        .any(|m| m.contains("invalid configuration") || m.contains("reading config"))
    {
        Failure::Config
    } else if chain.iter().any(|m| m.contains("reading request") || m.contains("writing reply")) {
        Failure::Transport
    } else {
        Failure::Other
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(te) = err.downcast_ref::<toml::de::Error>() {
        return format!(
            "What happened: The config file is not valid ({}).\nLikely causes: A typo, a missing [vehicle] or [pins] section, or a value of the wrong type.\nHow to fix: Compare the file with etc/car_config.toml and fix the reported key.",
            te.message()
        );
    }

    if let Some(hw) = err.downcast_ref::<HwError>() {
        return match hw {
            HwError::Gpio(msg) => format!(
                "What happened: GPIO could not be initialised ({msg}).\nLikely causes: Wrong pin numbers, another process holding the pins, or missing permission for /dev/gpiomem.\nHow to fix: Check [pins] in the config and run as a user in the gpio group."
            ),
            HwError::Uart(msg) => format!(
                "What happened: The serial port could not be opened ({msg}).\nLikely causes: Wrong device path, the serial console still enabled, or missing permission.\nHow to fix: Check serial.device (or --port) and that the user is in the dialout group."
            ),
            HwError::RelayMismatch { pin, .. } => format!(
                "What happened: Relay output on pin {pin} did not take the commanded level.\nLikely causes: Pin claimed elsewhere or a wiring fault on the relay board.\nHow to fix: Power down, check the relay board wiring, then restart."
            ),
            HwError::ShootThrough => "What happened: Both relay pairs were engaged at once.\nLikely causes: A fault in the relay interlock.\nHow to fix: Power down immediately and inspect the relay board.".to_string(),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    let root = err.root_cause().to_string();

    if lower.contains("reading config") {
        return format!(
            "What happened: The config file could not be read ({root}).\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass --config with the path of a readable TOML file."
        );
    }

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid ({root}).\nLikely causes: Missing or out-of-range values, or two roles sharing a GPIO pin.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("reading request") || lower.contains("writing reply") {
        return format!(
            "What happened: The console link failed ({root}).\nLikely causes: Cable unplugged or the device was reset.\nHow to fix: Reconnect the console and restart the controller."
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

/// Stable exit codes per failure class.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match classify(err) {
        Failure::Config => 2,
        Failure::Hardware => 3,
        Failure::Transport => 4,
        Failure::Other => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let detail = err.root_cause().to_string();
    json!({
        "reason": classify(err).name(),
        "detail": detail,
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_config_failures() {
        let err = eyre::eyre!("pins.magnet duplicates pins.forward_pos (pin 17)")
            .wrap_err("invalid configuration");
        assert_eq!(classify(&err), Failure::Config);
        assert_eq!(exit_code_for_error(&err), 2);
        let text = humanize(&err);
        assert!(text.contains("pins.magnet duplicates"), "{text}");
    }

    #[test]
    fn hardware_errors_are_typed() {
        let err = eyre::Report::new(HwError::ShootThrough).wrap_err("opening relays");
        assert_eq!(classify(&err), Failure::Hardware);
        assert!(humanize(&err).contains("Both relay pairs"));
    }

    #[test]
    fn json_has_reason_and_message() {
        let err = eyre::eyre!("boom");
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Error");
        assert_eq!(v["detail"], "boom");
        assert!(v["message"].as_str().unwrap().contains("boom"));
    }
}
