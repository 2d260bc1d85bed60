use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    connection::{endpoint_from_origin, validate_endpoint, ReconnectPolicy},
    models::DEFAULT_ALERT_LOG_CAPACITY,
    session::{notification::DEFAULT_AUTO_DISMISS, AlertPolicy},
};

pub const CONFIG_PATH_VAR: &str = "GAZEWATCH_CONFIG";
pub const URL_VAR: &str = "GAZEWATCH_URL";
pub const ORIGIN_VAR: &str = "GAZEWATCH_ORIGIN";
pub const RECONNECT_MS_VAR: &str = "GAZEWATCH_RECONNECT_MS";
pub const DEBUG_VAR: &str = "GAZEWATCH_DEBUG";

/// Verbose logging switch, read before the logger is initialised.
pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_VAR)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorSettings {
    pub endpoint: String,
    /// Origin the presentation layer is served from. When set, the endpoint
    /// is derived from it instead of `endpoint`.
    pub page_origin: Option<String>,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout_ms: u64,
    pub notification_dismiss_ms: u64,
    pub alert_policy: AlertPolicy,
    pub alert_log_capacity: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8000/ws".into(),
            page_origin: None,
            reconnect: ReconnectPolicy::default(),
            connect_timeout_ms: 10_000,
            notification_dismiss_ms: DEFAULT_AUTO_DISMISS.as_millis() as u64,
            alert_policy: AlertPolicy::default(),
            alert_log_capacity: DEFAULT_ALERT_LOG_CAPACITY,
        }
    }
}

impl MonitorSettings {
    /// The URL handed to the supervisor. Never fails: a bad page origin falls
    /// back to `endpoint`, and a malformed endpoint is passed through so the
    /// failed open lands on the reconnect path like any other.
    pub fn connect_endpoint(&self) -> String {
        if let Some(origin) = &self.page_origin {
            match endpoint_from_origin(origin) {
                Ok(endpoint) => return endpoint,
                Err(err) => warn!("{err}; falling back to {}", self.endpoint),
            }
        }
        if let Err(err) = validate_endpoint(&self.endpoint) {
            warn!("{err}; will keep retrying");
        }
        self.endpoint.clone()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn notification_dismiss(&self) -> Duration {
        Duration::from_millis(self.notification_dismiss_ms)
    }

    /// Apply `GAZEWATCH_*` overrides from the given variables.
    pub fn apply_env(&mut self, vars: &HashMap<String, String>) {
        if let Some(url) = vars.get(URL_VAR) {
            self.endpoint = url.clone();
            self.page_origin = None;
        }
        if let Some(origin) = vars.get(ORIGIN_VAR) {
            self.page_origin = Some(origin.clone());
        }
        if let Some(value) = vars.get(RECONNECT_MS_VAR) {
            match value.parse() {
                Ok(delay_ms) => self.reconnect = ReconnectPolicy::Constant { delay_ms },
                Err(_) => warn!("Ignoring {RECONNECT_MS_VAR}={value}: not a number of milliseconds"),
            }
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: MonitorSettings,
}

impl SettingsStore {
    /// Read settings from `path`, falling back to defaults when the file is
    /// missing or unparseable.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Invalid settings in {} ({err}); using defaults", path.display());
                MonitorSettings::default()
            })
        } else {
            MonitorSettings::default()
        };

        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> MonitorSettings {
        self.data.clone()
    }

    pub fn save(&self) -> Result<()> {
        let serialized = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

/// Settings for this process: the optional config file named by
/// `GAZEWATCH_CONFIG`, then environment overrides.
pub fn load_from_env() -> Result<MonitorSettings> {
    let vars: HashMap<String, String> = std::env::vars().collect();
    load(&vars)
}

/// A config path that does not exist yet is seeded with the defaults so
/// there is a file to edit.
pub fn load(vars: &HashMap<String, String>) -> Result<MonitorSettings> {
    let mut settings = match vars.get(CONFIG_PATH_VAR) {
        Some(path) => {
            let store = SettingsStore::new(PathBuf::from(path))?;
            if !store.path().exists() {
                match store.save() {
                    Ok(()) => info!("Wrote default settings to {}", store.path().display()),
                    Err(err) => warn!("{err:#}"),
                }
            }
            store.settings()
        }
        None => MonitorSettings::default(),
    };
    settings.apply_env(vars);
    Ok(settings)
}
