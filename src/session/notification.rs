use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};

use crate::models::AlertRecord;

pub const DEFAULT_AUTO_DISMISS: Duration = Duration::from_millis(5000);

const ALERT_TITLE: &str = "Critical Alert";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub shown_at: DateTime<Utc>,
}

impl From<&AlertRecord> for Notification {
    fn from(alert: &AlertRecord) -> Self {
        Self {
            id: alert.id.clone(),
            title: ALERT_TITLE.to_string(),
            message: alert.message.clone(),
            shown_at: alert.timestamp,
        }
    }
}

/// Single-slot notification display. Showing a new notification replaces the
/// current one and restarts the auto-dismiss timer.
#[derive(Clone)]
pub struct Notifier {
    current: Arc<watch::Sender<Option<Notification>>>,
    dismiss_timer: Arc<Mutex<Option<JoinHandle<()>>>>,
    auto_dismiss: Duration,
}

impl Notifier {
    pub fn new(auto_dismiss: Duration) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current: Arc::new(current),
            dismiss_timer: Arc::new(Mutex::new(None)),
            auto_dismiss,
        }
    }

    pub fn current(&self) -> Option<Notification> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Notification>> {
        self.current.subscribe()
    }

    pub async fn show(&self, notification: Notification) {
        let mut timer = self.dismiss_timer.lock().await;
        if let Some(handle) = timer.take() {
            handle.abort();
        }

        let id = notification.id.clone();
        self.current.send_replace(Some(notification));

        let current = self.current.clone();
        let delay = self.auto_dismiss;
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let dismissed = current.send_if_modified(|slot| {
                if slot.as_ref().is_some_and(|shown| shown.id == id) {
                    *slot = None;
                    true
                } else {
                    false
                }
            });
            if dismissed {
                debug!("Notification {id} auto-dismissed");
            }
        }));
    }

    pub async fn dismiss(&self) {
        if let Some(handle) = self.dismiss_timer.lock().await.take() {
            handle.abort();
        }
        self.current.send_if_modified(|slot| slot.take().is_some());
    }
}
