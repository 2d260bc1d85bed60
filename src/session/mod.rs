pub mod controller;
pub mod notification;
pub mod state;

pub use controller::SessionController;
pub use notification::{Notification, Notifier};
pub use state::{reconcile, AlertPolicy, Reconciled, SessionState};
