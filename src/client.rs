use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    connection::{
        supervisor::Supervisor, ConnectionState, Outbox, Transport, WebSocketTransport,
    },
    models::{AlertRecord, SessionSnapshot},
    protocol::OutboundCommand,
    session::{Notification, Notifier, SessionController},
    settings::MonitorSettings,
};

struct Running {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Session client for one telemetry source. Everything the presentation layer
/// needs goes through here: current state, change subscriptions and the reset
/// command. Instances are independent of each other.
pub struct MonitorClient {
    settings: MonitorSettings,
    transport: Arc<dyn Transport>,
    session: SessionController,
    outbox: Outbox,
    connection: Arc<watch::Sender<ConnectionState>>,
    running: Mutex<Option<Running>>,
}

impl MonitorClient {
    pub fn new(settings: MonitorSettings) -> Self {
        let transport = Arc::new(WebSocketTransport::new(settings.connect_timeout()));
        Self::with_transport(settings, transport)
    }

    pub fn with_transport(settings: MonitorSettings, transport: Arc<dyn Transport>) -> Self {
        let notifier = Notifier::new(settings.notification_dismiss());
        let session = SessionController::new(
            settings.alert_policy,
            settings.alert_log_capacity,
            notifier,
        );
        let (connection, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            settings,
            transport,
            session,
            outbox: Outbox::new(),
            connection: Arc::new(connection),
            running: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Begin connecting; returns immediately. Connection loss from here on,
    /// including an endpoint that cannot be opened at all, is only visible
    /// through [`ConnectionState`].
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            bail!("monitor client already started");
        }

        let url = self.settings.connect_endpoint();
        info!("Starting telemetry client for {url}");

        let cancel_token = CancellationToken::new();
        let supervisor = Supervisor::new(
            self.transport.clone(),
            url,
            self.settings.reconnect,
            self.outbox.clone(),
            self.connection.clone(),
            self.session.clone(),
            cancel_token.clone(),
        );

        *running = Some(Running {
            handle: tokio::spawn(supervisor.run()),
            cancel_token,
        });
        Ok(())
    }

    /// Close the channel and stop reconnecting.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(Running {
            handle,
            cancel_token,
        }) = self.running.lock().await.take()
        else {
            return Ok(());
        };

        cancel_token.cancel();
        handle.await.context("supervisor task failed to join")?;
        self.session.notifier().dismiss().await;
        Ok(())
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot().await
    }

    pub async fn alert_log(&self) -> Vec<AlertRecord> {
        self.session.alert_log().await
    }

    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.session.subscribe_snapshots()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertRecord> {
        self.session.subscribe_alerts()
    }

    pub fn subscribe_notifications(&self) -> watch::Receiver<Option<Notification>> {
        self.session.subscribe_notifications()
    }

    pub fn current_notification(&self) -> Option<Notification> {
        self.session.notifier().current()
    }

    pub async fn dismiss_notification(&self) {
        self.session.notifier().dismiss().await;
    }

    /// Ask the source to reset the session. Dropped (returns `false`) unless
    /// connected; nothing is queued for later.
    pub fn request_reset(&self) -> bool {
        if self.connection_state() != ConnectionState::Connected {
            debug!("Reset requested while not connected; dropping");
            return false;
        }

        let payload = match OutboundCommand::ResetSession.to_payload() {
            Ok(payload) => payload,
            Err(err) => {
                debug!("Failed to encode reset command: {err}");
                return false;
            }
        };

        let sent = self.outbox.send(payload);
        if !sent {
            debug!("Reset command dropped: channel already closed");
        }
        sent
    }
}
