pub mod classifier;
pub mod message;

pub use classifier::{classify, decode};
pub use message::{InboundEvent, OutboundCommand, TelemetryUpdate};
