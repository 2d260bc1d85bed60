use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use tokio::sync::{broadcast, watch, Mutex};

use crate::{
    models::{AlertRecord, SessionSnapshot},
    protocol::InboundEvent,
};

use super::{
    notification::{Notification, Notifier},
    AlertPolicy, Reconciled, SessionState,
};

const EVENT_BUFFER: usize = 64;

/// Owns the session state and serializes every mutation behind one lock.
/// Subscribers get each replaced snapshot and each new alert in arrival order.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    policy: AlertPolicy,
    snapshots: broadcast::Sender<SessionSnapshot>,
    alerts: broadcast::Sender<AlertRecord>,
    notifier: Notifier,
}

impl SessionController {
    pub fn new(policy: AlertPolicy, alert_capacity: usize, notifier: Notifier) -> Self {
        let (snapshots, _) = broadcast::channel(EVENT_BUFFER);
        let (alerts, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            state: Arc::new(Mutex::new(SessionState::new(alert_capacity))),
            policy,
            snapshots,
            alerts,
            notifier,
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot.clone()
    }

    pub async fn alert_log(&self) -> Vec<AlertRecord> {
        self.state.lock().await.alerts.to_vec()
    }

    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertRecord> {
        self.alerts.subscribe()
    }

    pub fn subscribe_notifications(&self) -> watch::Receiver<Option<Notification>> {
        self.notifier.subscribe()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub async fn handle_event(&self, event: InboundEvent) {
        // Publish while holding the lock so subscribers observe the same
        // order in which the state was mutated.
        let mut guard = self.state.lock().await;
        match guard.apply(&event, self.policy, Utc::now()) {
            Reconciled::Replaced { snapshot, alert } => {
                let _ = self.snapshots.send(snapshot);
                if let Some(alert) = alert {
                    warn!(
                        "{} alert raised ({} alerts reported by source)",
                        alert.kind, guard.snapshot.alert_count
                    );
                    self.notifier.show(Notification::from(&alert)).await;
                    let _ = self.alerts.send(alert);
                }
            }
            Reconciled::Reset(snapshot) => {
                info!("Session reset; alert log cleared");
                let _ = self.snapshots.send(snapshot);
            }
            Reconciled::Unchanged => {}
        }
    }
}
