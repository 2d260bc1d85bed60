use std::{fmt, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Attention state reported by the telemetry source.
///
/// The five core states drive alerting; `ReturnedToScreen` is emitted by the
/// detector for the frame after a distraction ends. Any other label the
/// producer sends (`NO_FACE`, `SIMULATED`, ...) is carried verbatim so the
/// displayed status is always the one last received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SessionStatus {
    Initializing,
    Focused,
    Distracted,
    Warning,
    CriticalAlert,
    ReturnedToScreen,
    Other(String),
}

impl SessionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::Initializing => "INITIALIZING",
            SessionStatus::Focused => "FOCUSED",
            SessionStatus::Distracted => "DISTRACTED",
            SessionStatus::Warning => "WARNING",
            SessionStatus::CriticalAlert => "CRITICAL_ALERT",
            SessionStatus::ReturnedToScreen => "RETURNED_TO_SCREEN",
            SessionStatus::Other(label) => label,
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, SessionStatus::CriticalAlert)
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Initializing
    }
}

impl From<&str> for SessionStatus {
    fn from(value: &str) -> Self {
        match value {
            "INITIALIZING" => SessionStatus::Initializing,
            "FOCUSED" => SessionStatus::Focused,
            "DISTRACTED" => SessionStatus::Distracted,
            "WARNING" => SessionStatus::Warning,
            "CRITICAL_ALERT" => SessionStatus::CriticalAlert,
            "RETURNED_TO_SCREEN" => SessionStatus::ReturnedToScreen,
            other => SessionStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for SessionStatus {
    fn from(value: String) -> Self {
        SessionStatus::from(value.as_str())
    }
}

impl From<SessionStatus> for String {
    fn from(value: SessionStatus) -> Self {
        match value {
            SessionStatus::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gaze direction in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gaze {
    pub pitch: f64,
    pub yaw: f64,
}

/// Opaque base64-encoded camera frame (JPEG from the reference producer).
///
/// Shared behind an `Arc` because the same frame is fanned out to every
/// snapshot subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Frame(Arc<str>);

impl From<String> for Frame {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<Frame> for String {
    fn from(value: Frame) -> Self {
        value.0.to_string()
    }
}

impl Frame {
    pub fn new(encoded: impl Into<Arc<str>>) -> Self {
        Self(encoded.into())
    }

    pub fn as_base64(&self) -> &str {
        &self.0
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.0.as_bytes())
    }

    pub fn data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub focus_percentage: f64,
    pub alert_count: u32,
    pub session_time_secs: u64,
    pub gaze: Option<Gaze>,
    pub frame: Option<Frame>,
    pub looking_at_screen: Option<bool>,
    /// Producer label (`system` on the wire), e.g. which estimator is active.
    pub source: Option<String>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            status: SessionStatus::Initializing,
            focus_percentage: 100.0,
            alert_count: 0,
            session_time_secs: 0,
            gaze: None,
            frame: None,
            looking_at_screen: None,
            source: None,
        }
    }
}

impl SessionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// State after a session reset. The last frame and producer label stay on
    /// screen; every derived metric returns to its baseline.
    pub fn after_reset(&self) -> Self {
        Self {
            status: SessionStatus::Focused,
            focus_percentage: 100.0,
            alert_count: 0,
            session_time_secs: 0,
            gaze: None,
            frame: self.frame.clone(),
            looking_at_screen: None,
            source: self.source.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_known_and_unknown_labels() {
        assert_eq!(SessionStatus::from("CRITICAL_ALERT"), SessionStatus::CriticalAlert);
        assert_eq!(
            SessionStatus::from("NO_FACE"),
            SessionStatus::Other("NO_FACE".into())
        );
        assert_eq!(String::from(SessionStatus::Other("NO_FACE".into())), "NO_FACE");
        assert_eq!(SessionStatus::Warning.to_string(), "WARNING");
    }

    #[test]
    fn status_serializes_as_wire_label() {
        let json = serde_json::to_string(&SessionStatus::ReturnedToScreen).unwrap();
        assert_eq!(json, "\"RETURNED_TO_SCREEN\"");
        let parsed: SessionStatus = serde_json::from_str("\"FOCUSED\"").unwrap();
        assert_eq!(parsed, SessionStatus::Focused);
    }

    #[test]
    fn default_snapshot_is_initializing_baseline() {
        let snapshot = SessionSnapshot::new();
        assert_eq!(snapshot.status, SessionStatus::Initializing);
        assert_eq!(snapshot.focus_percentage, 100.0);
        assert_eq!(snapshot.alert_count, 0);
        assert_eq!(snapshot.session_time_secs, 0);
        assert!(snapshot.gaze.is_none());
    }

    #[test]
    fn frame_exposes_bytes_and_data_url() {
        let frame = Frame::new("aGVsbG8=");
        assert_eq!(frame.decode().unwrap(), b"hello");
        assert_eq!(frame.data_url(), "data:image/jpeg;base64,aGVsbG8=");
        assert!(Frame::new("not base64!").decode().is_err());
    }
}
