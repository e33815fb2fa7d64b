//! Application-level configuration loading, including the room lifecycle policy values.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_ROOMS_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Initial auto-delete window granted to a freshly created room.
    pub base_window: Duration,
    /// Fixed duration added to the deadline by each granted extension.
    pub extension_duration: Duration,
    /// Maximum number of extensions a single participant may request.
    pub max_extensions: u32,
    /// Absolute ceiling, measured from creation, for poll-driven deadline
    /// refreshes of waiting rooms.
    pub waiting_room_ceiling: Duration,
    /// Grace period before a completed room is deleted, so clients can
    /// still read final results.
    pub completion_grace: Duration,
    /// Age past completion after which the sweeper removes a room even if
    /// the deferred deletion never ran.
    pub completed_max_age: Duration,
    /// A participant with no activity for this long is considered gone.
    pub inactivity_threshold: Duration,
    /// Interval between two background sweeps.
    pub sweep_interval: Duration,
    /// Maximum number of rooms returned by the discovery listing.
    pub discovery_limit: usize,
    /// Optional path to a JSON question bank overriding the built-in set.
    pub question_bank_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the baked-in policy values.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded room policy from config");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_window: Duration::from_secs(300),
            extension_duration: Duration::from_secs(300),
            max_extensions: 3,
            waiting_room_ceiling: Duration::from_secs(30 * 60),
            completion_grace: Duration::from_secs(5 * 60),
            completed_max_age: Duration::from_secs(60 * 60),
            inactivity_threshold: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(2 * 60),
            discovery_limit: 50,
            question_bank_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
///
/// Every field is optional; absent fields keep their default policy value.
struct RawConfig {
    base_window_secs: Option<u64>,
    extension_secs: Option<u64>,
    max_extensions: Option<u32>,
    waiting_room_ceiling_secs: Option<u64>,
    completion_grace_secs: Option<u64>,
    completed_max_age_secs: Option<u64>,
    inactivity_threshold_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    discovery_limit: Option<usize>,
    question_bank_path: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let secs = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_secs).unwrap_or(fallback)
        };

        Self {
            base_window: secs(raw.base_window_secs, defaults.base_window),
            extension_duration: secs(raw.extension_secs, defaults.extension_duration),
            max_extensions: raw.max_extensions.unwrap_or(defaults.max_extensions),
            waiting_room_ceiling: secs(raw.waiting_room_ceiling_secs, defaults.waiting_room_ceiling),
            completion_grace: secs(raw.completion_grace_secs, defaults.completion_grace),
            completed_max_age: secs(raw.completed_max_age_secs, defaults.completed_max_age),
            inactivity_threshold: secs(
                raw.inactivity_threshold_secs,
                defaults.inactivity_threshold,
            ),
            sweep_interval: secs(raw.sweep_interval_secs, defaults.sweep_interval),
            discovery_limit: raw.discovery_limit.unwrap_or(defaults.discovery_limit),
            question_bank_path: raw.question_bank_path,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
