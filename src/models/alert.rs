use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SessionStatus;

pub const DEFAULT_ALERT_LOG_CAPACITY: usize = 5;

pub const CRITICAL_ALERT_MESSAGE: &str = "Sustained loss of attention detected";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub id: String,
    pub kind: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(kind: &SessionStatus, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: kind.as_str().to_string(),
            message: message.into(),
            timestamp,
        }
    }
}

/// Bounded alert history, newest first.
#[derive(Debug, Clone)]
pub struct AlertLog {
    entries: VecDeque<AlertRecord>,
    capacity: usize,
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ALERT_LOG_CAPACITY)
    }
}

impl AlertLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, record: AlertRecord) {
        self.entries.push_front(record);
        self.entries.truncate(self.capacity);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlertRecord> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<AlertRecord> {
        self.entries.iter().cloned().collect()
    }
}
