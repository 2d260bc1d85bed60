use log::{debug, warn};
use serde_json::Value;

use crate::error::DecodeError;

use super::message::{
    GazeUpdateWire, InboundEvent, SessionResetWire, TelemetryUpdate, GAZE_UPDATE, SESSION_RESET,
};

const PREVIEW_CHARS: usize = 120;

/// Decode a raw payload into a typed event.
///
/// Unknown `type` tags are not an error: they decode to
/// [`InboundEvent::Unrecognized`] so newer producers can add message kinds.
pub fn decode(raw: &str) -> Result<InboundEvent, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject);
    }

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(DecodeError::MissingType)?;

    match kind.as_str() {
        GAZE_UPDATE => {
            let wire: GazeUpdateWire = serde_json::from_value(value)
                .map_err(|err| DecodeError::InvalidTelemetry(err.to_string()))?;
            Ok(InboundEvent::TelemetryUpdate(TelemetryUpdate::from(wire)))
        }
        SESSION_RESET => {
            if let Ok(SessionResetWire {
                message: Some(message),
            }) = serde_json::from_value::<SessionResetWire>(value)
            {
                debug!("session_reset from source: {message}");
            }
            Ok(InboundEvent::SessionReset)
        }
        _ => Ok(InboundEvent::Unrecognized(raw.to_string())),
    }
}

/// Classify a payload, never failing. Malformed input is logged and mapped
/// to [`InboundEvent::Unrecognized`] so one bad message cannot stall the stream.
pub fn classify(raw: &str) -> InboundEvent {
    match decode(raw) {
        Ok(InboundEvent::Unrecognized(raw)) => {
            debug!("Ignoring unrecognized message: {}", preview(&raw));
            InboundEvent::Unrecognized(raw)
        }
        Ok(event) => event,
        Err(err) => {
            warn!("Discarding malformed payload ({err}): {}", preview(raw));
            InboundEvent::Unrecognized(raw.to_string())
        }
    }
}

fn preview(raw: &str) -> String {
    let mut out: String = raw.chars().take(PREVIEW_CHARS).collect();
    if raw.chars().nth(PREVIEW_CHARS).is_some() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gaze, SessionStatus};

    #[test]
    fn gaze_update_with_all_fields() {
        let raw = r#"{"type":"gaze_update","frame":"aGk=","status":"CRITICAL_ALERT","alerts":3,
            "focus":42,"session_time":125,"gaze":{"pitch":0.1,"yaw":-0.2},
            "looking_at_screen":false,"system":"ETH-XGaze-Real"}"#;

        let InboundEvent::TelemetryUpdate(update) = classify(raw) else {
            panic!("expected telemetry update");
        };
        assert_eq!(update.status, SessionStatus::CriticalAlert);
        assert_eq!(update.alert_count, 3);
        assert_eq!(update.focus_percentage, 42.0);
        assert_eq!(update.session_time_secs, 125);
        assert_eq!(update.gaze, Some(Gaze { pitch: 0.1, yaw: -0.2 }));
        assert_eq!(update.frame.as_ref().map(|f| f.as_base64()), Some("aGk="));
        assert_eq!(update.looking_at_screen, Some(false));
        assert_eq!(update.source.as_deref(), Some("ETH-XGaze-Real"));
    }

    #[test]
    fn missing_optional_numbers_default_to_zero() {
        let InboundEvent::TelemetryUpdate(update) =
            classify(r#"{"type":"gaze_update","status":"FOCUSED"}"#)
        else {
            panic!("expected telemetry update");
        };
        assert_eq!(update.focus_percentage, 0.0);
        assert_eq!(update.alert_count, 0);
        assert_eq!(update.session_time_secs, 0);
        assert!(update.gaze.is_none());
        assert!(update.frame.is_none());
    }

    #[test]
    fn session_reset_with_and_without_message() {
        assert_eq!(classify(r#"{"type":"session_reset"}"#), InboundEvent::SessionReset);
        assert_eq!(
            classify(r#"{"type":"session_reset","message":"Session reset"}"#),
            InboundEvent::SessionReset
        );
    }

    #[test]
    fn malformed_payloads_become_unrecognized() {
        for raw in [
            "not json",
            "[1,2,3]",
            r#"{"status":"FOCUSED"}"#,
            r#"{"type":42}"#,
            r#"{"type":"gaze_update"}"#,
            r#"{"type":"gaze_update","status":"FOCUSED","gaze":"up"}"#,
        ] {
            assert_eq!(classify(raw), InboundEvent::Unrecognized(raw.to_string()), "{raw}");
        }
    }

    #[test]
    fn decode_reports_specific_errors() {
        assert!(matches!(decode("{"), Err(DecodeError::Json(_))));
        assert!(matches!(decode("7"), Err(DecodeError::NotAnObject)));
        assert!(matches!(decode("{}"), Err(DecodeError::MissingType)));
        assert!(matches!(
            decode(r#"{"type":"gaze_update","status":1}"#),
            Err(DecodeError::InvalidTelemetry(_))
        ));
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let raw = r#"{"type":"heartbeat"}"#;
        assert_eq!(decode(raw).unwrap(), InboundEvent::Unrecognized(raw.to_string()));
    }

    #[test]
    fn preview_truncates_long_payloads() {
        let long = "x".repeat(500);
        assert_eq!(preview(&long).len(), PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }
}
