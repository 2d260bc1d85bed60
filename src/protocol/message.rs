use serde::{Deserialize, Serialize};

use crate::models::{Frame, Gaze, SessionStatus};

pub const GAZE_UPDATE: &str = "gaze_update";
pub const SESSION_RESET: &str = "session_reset";

/// One decoded inbound message. Produced by the classifier and consumed
/// immediately by the session reconciler.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    TelemetryUpdate(TelemetryUpdate),
    SessionReset,
    Unrecognized(String),
}

/// Fields of a `gaze_update` with wire defaults already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryUpdate {
    pub status: SessionStatus,
    pub focus_percentage: f64,
    pub alert_count: u32,
    pub session_time_secs: u64,
    pub gaze: Option<Gaze>,
    /// `None` means the producer sent no frame; the previous one stays shown.
    pub frame: Option<Frame>,
    pub looking_at_screen: Option<bool>,
    pub source: Option<String>,
}

impl TelemetryUpdate {
    pub fn new(status: SessionStatus) -> Self {
        Self {
            status,
            focus_percentage: 0.0,
            alert_count: 0,
            session_time_secs: 0,
            gaze: None,
            frame: None,
            looking_at_screen: None,
            source: None,
        }
    }
}

/// `gaze_update` as it appears on the wire. Numbers are read as `f64` because
/// the producer emits rounded floats for focus and may emit floats for the
/// integer counters.
#[derive(Debug, Deserialize)]
pub(crate) struct GazeUpdateWire {
    status: String,
    alerts: Option<f64>,
    focus: Option<f64>,
    session_time: Option<f64>,
    gaze: Option<Gaze>,
    frame: Option<String>,
    looking_at_screen: Option<bool>,
    system: Option<String>,
}

impl From<GazeUpdateWire> for TelemetryUpdate {
    fn from(wire: GazeUpdateWire) -> Self {
        Self {
            status: SessionStatus::from(wire.status),
            focus_percentage: wire.focus.unwrap_or(0.0).clamp(0.0, 100.0),
            alert_count: wire.alerts.unwrap_or(0.0).max(0.0) as u32,
            session_time_secs: wire.session_time.unwrap_or(0.0).max(0.0) as u64,
            gaze: wire.gaze,
            frame: wire.frame.map(Frame::from),
            looking_at_screen: wire.looking_at_screen,
            source: wire.system,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionResetWire {
    pub(crate) message: Option<String>,
}

/// Commands sent to the telemetry source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundCommand {
    ResetSession,
}

impl OutboundCommand {
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
