pub mod endpoint;
pub mod supervisor;
pub mod transport;

pub use endpoint::{endpoint_from_origin, validate_endpoint, TELEMETRY_PATH};
pub use supervisor::{ConnectionState, ReconnectPolicy, DEFAULT_RECONNECT_DELAY};
pub use transport::{Connection, Outbox, RemoteEnd, Transport, WebSocketTransport};
