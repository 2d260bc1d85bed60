use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{protocol::classify, session::SessionController};

use super::transport::{Connection, Outbox, Transport};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

/// Delay before the next reconnect attempt. Attempts never stop; the policy
/// only shapes the spacing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReconnectPolicy {
    #[serde(rename_all = "camelCase")]
    Constant { delay_ms: u64 },
    #[serde(rename_all = "camelCase")]
    Exponential {
        initial_ms: u64,
        max_ms: u64,
        multiplier: f64,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Constant {
            delay_ms: DEFAULT_RECONNECT_DELAY.as_millis() as u64,
        }
    }
}

impl ReconnectPolicy {
    /// `attempt` counts retries since the last successful open, starting at 0.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            ReconnectPolicy::Constant { delay_ms } => Duration::from_millis(delay_ms),
            ReconnectPolicy::Exponential {
                initial_ms,
                max_ms,
                multiplier,
            } => {
                let factor = multiplier.max(1.0).powi(attempt.min(64) as i32);
                let delay = (initial_ms as f64 * factor).min(max_ms as f64);
                Duration::from_millis(delay as u64)
            }
        }
    }
}

#[derive(Debug)]
pub(crate) enum SupervisorEvent {
    Inbound { generation: u64, payload: String },
    Closed { generation: u64 },
    RetryDue,
}

/// At most one pending retry. The handle stays set until the `RetryDue` it
/// produced has been consumed, so a close racing the timer cannot schedule a
/// second one.
#[derive(Default)]
struct RetryTimer {
    handle: Option<JoinHandle<()>>,
}

impl RetryTimer {
    fn is_pending(&self) -> bool {
        self.handle.is_some()
    }

    fn schedule(&mut self, delay: Duration, events: mpsc::UnboundedSender<SupervisorEvent>) -> bool {
        if self.is_pending() {
            return false;
        }
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SupervisorEvent::RetryDue);
        }));
        true
    }

    fn fired(&mut self) {
        self.handle = None;
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Keeps one live channel to the telemetry source, reconnecting forever.
/// Inbound payloads are classified and folded into the session in delivery
/// order, one at a time.
pub(crate) struct Supervisor {
    transport: Arc<dyn Transport>,
    url: String,
    policy: ReconnectPolicy,
    outbox: Outbox,
    state: Arc<watch::Sender<ConnectionState>>,
    session: SessionController,
    cancel: CancellationToken,
    events_tx: mpsc::UnboundedSender<SupervisorEvent>,
    events_rx: mpsc::UnboundedReceiver<SupervisorEvent>,
    retry: RetryTimer,
    attempt: u32,
    generation: u64,
    reader: Option<JoinHandle<()>>,
}

impl Supervisor {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        url: String,
        policy: ReconnectPolicy,
        outbox: Outbox,
        state: Arc<watch::Sender<ConnectionState>>,
        session: SessionController,
        cancel: CancellationToken,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            url,
            policy,
            outbox,
            state,
            session,
            cancel,
            events_tx,
            events_rx,
            retry: RetryTimer::default(),
            attempt: 0,
            generation: 0,
            reader: None,
        }
    }

    pub(crate) async fn run(mut self) {
        self.connect().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                Some(event) = self.events_rx.recv() => self.handle(event).await,
            }
        }

        self.teardown();
        log_info!("Supervisor for {} stopped", self.url);
    }

    async fn handle(&mut self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Inbound {
                generation,
                payload,
            } if generation == self.generation => {
                self.session.handle_event(classify(&payload)).await;
            }
            SupervisorEvent::Closed { generation } if generation == self.generation => {
                log_warn!("Connection to {} lost", self.url);
                self.on_closed();
            }
            SupervisorEvent::RetryDue => {
                self.retry.fired();
                self.connect().await;
            }
            SupervisorEvent::Inbound { generation, .. } | SupervisorEvent::Closed { generation } => {
                log_debug!("Ignoring event from stale connection #{generation}");
            }
        }
    }

    async fn connect(&mut self) {
        self.set_state(ConnectionState::Connecting);

        let opened = tokio::select! {
            _ = self.cancel.cancelled() => return,
            opened = self.transport.open(&self.url) => opened,
        };

        match opened {
            Ok(connection) => {
                self.retry.cancel();
                self.attempt = 0;
                self.attach(connection);
                self.set_state(ConnectionState::Connected);
            }
            Err(err) => {
                log_warn!("Failed to open telemetry channel: {err}");
                self.on_closed();
            }
        }
    }

    fn attach(&mut self, connection: Connection) {
        self.generation += 1;
        let generation = self.generation;
        let Connection {
            outbound,
            mut inbound,
        } = connection;
        self.outbox.attach(outbound);

        if let Some(previous) = self.reader.take() {
            previous.abort();
        }
        let events = self.events_tx.clone();
        self.reader = Some(tokio::spawn(async move {
            while let Some(payload) = inbound.recv().await {
                if events
                    .send(SupervisorEvent::Inbound {
                        generation,
                        payload,
                    })
                    .is_err()
                {
                    return;
                }
            }
            let _ = events.send(SupervisorEvent::Closed { generation });
        }));
    }

    fn on_closed(&mut self) {
        self.outbox.detach();
        self.set_state(ConnectionState::Disconnected);

        let delay = self.policy.delay_for(self.attempt);
        if self.retry.schedule(delay, self.events_tx.clone()) {
            self.attempt = self.attempt.saturating_add(1);
            log_info!("Reconnecting to {} in {}ms", self.url, delay.as_millis());
        } else {
            log_debug!("Retry already pending; ignoring close");
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            log_info!("Connection state {previous:?} -> {next:?}");
        }
    }

    fn teardown(&mut self) {
        self.retry.cancel();
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.outbox.detach();
        self.set_state(ConnectionState::Disconnected);
    }
}
