pub mod alert;
pub mod session;

pub use alert::{AlertLog, AlertRecord, CRITICAL_ALERT_MESSAGE, DEFAULT_ALERT_LOG_CAPACITY};
pub use session::{Frame, Gaze, SessionSnapshot, SessionStatus};
