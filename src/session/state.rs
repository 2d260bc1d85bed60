use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    models::{AlertLog, AlertRecord, SessionSnapshot, CRITICAL_ALERT_MESSAGE},
    protocol::{InboundEvent, TelemetryUpdate},
};

/// When a `CRITICAL_ALERT` update with a non-zero alert count raises an alert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AlertPolicy {
    /// Every qualifying update alerts, so a sustained violation keeps notifying.
    LevelTriggered,
    /// Only the update that enters a qualifying `CRITICAL_ALERT` alerts.
    EdgeTriggered,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        AlertPolicy::LevelTriggered
    }
}

/// Result of folding one inbound event into the current snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    Replaced {
        snapshot: SessionSnapshot,
        alert: Option<AlertRecord>,
    },
    Reset(SessionSnapshot),
    Unchanged,
}

/// Pure transition function of the session state machine.
pub fn reconcile(
    current: &SessionSnapshot,
    event: &InboundEvent,
    policy: AlertPolicy,
    now: DateTime<Utc>,
) -> Reconciled {
    match event {
        InboundEvent::TelemetryUpdate(update) => {
            let snapshot = replace_from(current, update);
            let alert = should_alert(current, &snapshot, policy)
                .then(|| AlertRecord::new(&snapshot.status, CRITICAL_ALERT_MESSAGE, now));
            Reconciled::Replaced { snapshot, alert }
        }
        InboundEvent::SessionReset => Reconciled::Reset(current.after_reset()),
        InboundEvent::Unrecognized(_) => Reconciled::Unchanged,
    }
}

fn replace_from(current: &SessionSnapshot, update: &TelemetryUpdate) -> SessionSnapshot {
    SessionSnapshot {
        status: update.status.clone(),
        focus_percentage: update.focus_percentage,
        alert_count: update.alert_count,
        session_time_secs: update.session_time_secs,
        gaze: update.gaze,
        // A frameless update keeps the last image on screen.
        frame: update.frame.clone().or_else(|| current.frame.clone()),
        looking_at_screen: update.looking_at_screen,
        source: update.source.clone(),
    }
}

/// Critical status with a non-zero alert count.
fn qualifies(snapshot: &SessionSnapshot) -> bool {
    snapshot.status.is_critical() && snapshot.alert_count > 0
}

fn should_alert(previous: &SessionSnapshot, next: &SessionSnapshot, policy: AlertPolicy) -> bool {
    if !qualifies(next) {
        return false;
    }
    match policy {
        AlertPolicy::LevelTriggered => true,
        AlertPolicy::EdgeTriggered => !qualifies(previous),
    }
}

/// Authoritative session state: the current snapshot plus the alert history.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub snapshot: SessionSnapshot,
    pub alerts: AlertLog,
}

impl SessionState {
    pub fn new(alert_capacity: usize) -> Self {
        Self {
            snapshot: SessionSnapshot::new(),
            alerts: AlertLog::with_capacity(alert_capacity),
        }
    }

    /// Apply an event in place and return what changed.
    pub fn apply(
        &mut self,
        event: &InboundEvent,
        policy: AlertPolicy,
        now: DateTime<Utc>,
    ) -> Reconciled {
        let outcome = reconcile(&self.snapshot, event, policy, now);
        match &outcome {
            Reconciled::Replaced { snapshot, alert } => {
                self.snapshot = snapshot.clone();
                if let Some(alert) = alert {
                    self.alerts.push(alert.clone());
                }
            }
            Reconciled::Reset(snapshot) => {
                self.snapshot = snapshot.clone();
                self.alerts.clear();
            }
            Reconciled::Unchanged => {}
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frame, Gaze, SessionStatus};
    use crate::protocol::classify;

    fn update(status: SessionStatus, alerts: u32, focus: f64, time: u64) -> InboundEvent {
        InboundEvent::TelemetryUpdate(TelemetryUpdate {
            alert_count: alerts,
            focus_percentage: focus,
            session_time_secs: time,
            ..TelemetryUpdate::new(status)
        })
    }

    #[test]
    fn telemetry_replaces_snapshot_wholesale() {
        let mut state = SessionState::default();
        let events = [
            update(SessionStatus::Focused, 0, 98.0, 10),
            update(SessionStatus::Distracted, 0, 71.5, 11),
            update(SessionStatus::Warning, 1, 64.0, 12),
        ];
        for event in &events {
            state.apply(event, AlertPolicy::LevelTriggered, Utc::now());
        }

        assert_eq!(state.snapshot.status, SessionStatus::Warning);
        assert_eq!(state.snapshot.focus_percentage, 64.0);
        assert_eq!(state.snapshot.alert_count, 1);
        assert_eq!(state.snapshot.session_time_secs, 12);
        assert!(state.alerts.is_empty());
    }

    #[test]
    fn critical_update_from_wire_appends_one_alert() {
        let mut state = SessionState::default();
        let event = classify(
            r#"{"type":"gaze_update","status":"CRITICAL_ALERT","alerts":3,"focus":42,"session_time":125}"#,
        );

        let outcome = state.apply(&event, AlertPolicy::LevelTriggered, Utc::now());

        let Reconciled::Replaced { alert: Some(alert), .. } = outcome else {
            panic!("expected an alert");
        };
        assert_eq!(alert.kind, "CRITICAL_ALERT");
        assert_eq!(alert.message, CRITICAL_ALERT_MESSAGE);
        assert_eq!(state.snapshot.status, SessionStatus::CriticalAlert);
        assert_eq!(state.snapshot.alert_count, 3);
        assert_eq!(state.snapshot.focus_percentage, 42.0);
        assert_eq!(state.snapshot.session_time_secs, 125);
        assert_eq!(state.alerts.len(), 1);
    }

    #[test]
    fn critical_without_alert_count_does_not_alert() {
        let outcome = reconcile(
            &SessionSnapshot::new(),
            &update(SessionStatus::CriticalAlert, 0, 10.0, 5),
            AlertPolicy::LevelTriggered,
            Utc::now(),
        );
        assert!(matches!(outcome, Reconciled::Replaced { alert: None, .. }));
    }

    #[test]
    fn level_policy_alerts_on_every_critical_update() {
        let mut state = SessionState::default();
        for _ in 0..3 {
            state.apply(
                &update(SessionStatus::CriticalAlert, 2, 30.0, 60),
                AlertPolicy::LevelTriggered,
                Utc::now(),
            );
        }
        assert_eq!(state.alerts.len(), 3);
    }

    #[test]
    fn edge_policy_alerts_only_on_entry() {
        let mut state = SessionState::default();
        let critical = update(SessionStatus::CriticalAlert, 2, 30.0, 60);
        let calm = update(SessionStatus::Focused, 2, 80.0, 61);

        for event in [&critical, &critical, &calm, &critical] {
            state.apply(event, AlertPolicy::EdgeTriggered, Utc::now());
        }
        assert_eq!(state.alerts.len(), 2);
    }

    #[test]
    fn edge_policy_fires_when_count_turns_non_zero() {
        let mut state = SessionState::default();
        let silent = update(SessionStatus::CriticalAlert, 0, 30.0, 60);
        let counted = update(SessionStatus::CriticalAlert, 2, 28.0, 61);

        state.apply(&silent, AlertPolicy::EdgeTriggered, Utc::now());
        assert!(state.alerts.is_empty());
        state.apply(&counted, AlertPolicy::EdgeTriggered, Utc::now());
        assert_eq!(state.alerts.len(), 1);
        state.apply(&counted, AlertPolicy::EdgeTriggered, Utc::now());
        assert_eq!(state.alerts.len(), 1);
    }

    #[test]
    fn alert_log_keeps_five_newest_first() {
        let mut state = SessionState::new(5);
        let base = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        for n in 0..7 {
            state.apply(
                &update(SessionStatus::CriticalAlert, 1, 20.0, n),
                AlertPolicy::LevelTriggered,
                base + chrono::Duration::seconds(n as i64),
            );
        }

        let stamps: Vec<_> = state.alerts.iter().map(|a| a.timestamp).collect();
        let expected: Vec<_> = (2..7)
            .rev()
            .map(|n| base + chrono::Duration::seconds(n))
            .collect();
        assert_eq!(stamps, expected);
    }

    #[test]
    fn reset_is_idempotent_from_any_state() {
        let mut state = SessionState::default();
        state.apply(
            &update(SessionStatus::CriticalAlert, 4, 12.0, 300),
            AlertPolicy::LevelTriggered,
            Utc::now(),
        );

        for _ in 0..2 {
            state.apply(&InboundEvent::SessionReset, AlertPolicy::LevelTriggered, Utc::now());
            assert_eq!(state.snapshot.status, SessionStatus::Focused);
            assert_eq!(state.snapshot.focus_percentage, 100.0);
            assert_eq!(state.snapshot.alert_count, 0);
            assert_eq!(state.snapshot.session_time_secs, 0);
            assert!(state.snapshot.gaze.is_none());
            assert!(state.alerts.is_empty());
        }
    }

    #[test]
    fn frameless_update_keeps_previous_frame() {
        let mut state = SessionState::default();
        let with_frame = InboundEvent::TelemetryUpdate(TelemetryUpdate {
            frame: Some(Frame::new("Zmlyc3Q=")),
            gaze: Some(Gaze { pitch: 0.2, yaw: 0.1 }),
            ..TelemetryUpdate::new(SessionStatus::Focused)
        });
        state.apply(&with_frame, AlertPolicy::LevelTriggered, Utc::now());
        state.apply(
            &update(SessionStatus::Distracted, 0, 90.0, 2),
            AlertPolicy::LevelTriggered,
            Utc::now(),
        );

        assert_eq!(state.snapshot.frame, Some(Frame::new("Zmlyc3Q=")));
        assert!(state.snapshot.gaze.is_none());
    }

    #[test]
    fn unrecognized_leaves_state_untouched() {
        let mut state = SessionState::default();
        state.apply(
            &update(SessionStatus::Warning, 1, 55.0, 40),
            AlertPolicy::LevelTriggered,
            Utc::now(),
        );
        let before = state.snapshot.clone();

        for raw in ["garbage", r#"{"type":"calibration"}"#] {
            let outcome = state.apply(&classify(raw), AlertPolicy::LevelTriggered, Utc::now());
            assert_eq!(outcome, Reconciled::Unchanged);
        }
        assert_eq!(state.snapshot, before);
    }
}
