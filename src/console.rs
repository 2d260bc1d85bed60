//! Headless presentation sink: renders client state to the log and accepts
//! line commands on stdin in place of UI buttons.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::{
    client::MonitorClient,
    connection::ConnectionState,
    models::{Gaze, SessionSnapshot},
};

// Set to false to silence the render loop
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub fn format_session_time(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn format_focus(focus: f64) -> String {
    format!("{focus:.1}%")
}

pub fn format_gaze(gaze: &Gaze) -> String {
    format!("pitch {:.3} yaw {:.3}", gaze.pitch, gaze.yaw)
}

pub fn render_snapshot(snapshot: &SessionSnapshot) -> String {
    let mut line = format!(
        "[{}] focus {} | alerts {} | time {}",
        snapshot.status,
        format_focus(snapshot.focus_percentage),
        snapshot.alert_count,
        format_session_time(snapshot.session_time_secs),
    );
    if let Some(gaze) = &snapshot.gaze {
        line.push_str(" | ");
        line.push_str(&format_gaze(gaze));
    }
    if let Some(looking) = snapshot.looking_at_screen {
        line.push_str(if looking { " | on screen" } else { " | off screen" });
    }
    if let Some(source) = &snapshot.source {
        line.push_str(" | system ");
        line.push_str(source);
    }
    line
}

pub fn render_connection(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connected => "connected",
        ConnectionState::Connecting => "connecting...",
        ConnectionState::Disconnected => "disconnected",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Reset,
    Dismiss,
    Status,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "reset" | "r" => Some(ConsoleCommand::Reset),
            "dismiss" | "d" => Some(ConsoleCommand::Dismiss),
            "status" | "s" => Some(ConsoleCommand::Status),
            "quit" | "q" | "exit" => Some(ConsoleCommand::Quit),
            _ => None,
        }
    }
}

/// Run a non-quit command against the client.
pub async fn execute(client: &MonitorClient, command: ConsoleCommand) {
    match command {
        ConsoleCommand::Reset => {
            if client.request_reset() {
                info!("Reset requested");
            } else {
                warn!("Not connected; reset not sent");
            }
        }
        ConsoleCommand::Dismiss => client.dismiss_notification().await,
        ConsoleCommand::Status => {
            let snapshot = client.snapshot().await;
            info!(
                "{} | {}",
                render_connection(client.connection_state()),
                render_snapshot(&snapshot)
            );
            for alert in client.alert_log().await {
                info!(
                    "  {} {} {}",
                    alert.timestamp.format("%H:%M:%S"),
                    alert.kind,
                    alert.message
                );
            }
        }
        ConsoleCommand::Quit => {}
    }
}

/// Log every state change published by the client until cancelled.
/// Snapshots repeat at frame rate, so only status changes are logged at info.
pub async fn render_loop(client: Arc<MonitorClient>, cancel: CancellationToken) {
    let mut snapshots = client.subscribe_snapshots();
    let mut alerts = client.subscribe_alerts();
    let mut notifications = client.subscribe_notifications();
    let mut connection = client.subscribe_connection();
    let mut last_status = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            snapshot = snapshots.recv() => match snapshot {
                Ok(snapshot) => {
                    let line = render_snapshot(&snapshot);
                    if last_status.as_ref() != Some(&snapshot.status) {
                        log_info!("{line}");
                        last_status = Some(snapshot.status);
                    } else {
                        debug!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!("Render loop skipped {skipped} snapshots"),
                Err(RecvError::Closed) => break,
            },
            alert = alerts.recv() => match alert {
                Ok(alert) => log_warn!("ALERT {}: {}", alert.kind, alert.message),
                Err(RecvError::Lagged(skipped)) => log_warn!("Render loop skipped {skipped} alerts"),
                Err(RecvError::Closed) => break,
            },
            changed = notifications.changed() => {
                if changed.is_err() {
                    log_error!("Notification channel closed");
                    break;
                }
                match notifications.borrow_and_update().as_ref() {
                    Some(notification) => {
                        log_warn!("[{}] {}", notification.title, notification.message)
                    }
                    None => log_info!("Notification dismissed"),
                }
            },
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *connection.borrow_and_update();
                log_info!("Telemetry source {}", render_connection(state));
            },
        }
    }
}
