use std::{fs, io, path::Path, time::Duration};

use serde::Deserialize;
use shared::domain::{PersistedSettings, DEFAULT_SENSITIVITY, DEFAULT_TARGET_FRAME_RATE};
use thiserror::Error;
use tracing::info;

use crate::smoother::{DEFAULT_HISTORY_MAX, DEFAULT_HISTORY_MIN};

pub const SETTINGS_FILE: &str = "gesture.toml";
pub const DEFAULT_WRITE_DEBOUNCE_MS: u64 = 200;
/// Spacing of rendering opportunities, one display refresh at 60 Hz.
pub const DEFAULT_RENDER_INTERVAL_MS: u64 = 16;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sensitivity: f32,
    pub target_frame_rate: u32,
    pub history_max: usize,
    pub history_min: usize,
    pub write_debounce_ms: u64,
    pub render_interval_ms: u64,
    pub database_url: String,
    pub key_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            target_frame_rate: DEFAULT_TARGET_FRAME_RATE,
            history_max: DEFAULT_HISTORY_MAX,
            history_min: DEFAULT_HISTORY_MIN,
            write_debounce_ms: DEFAULT_WRITE_DEBOUNCE_MS,
            render_interval_ms: DEFAULT_RENDER_INTERVAL_MS,
            database_url: "sqlite://./data/gesture.db".into(),
            key_prefix: "gesture-flash:".into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file '{path}': {source}")]
    Read { path: String, source: io::Error },
    #[error("failed to parse settings file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("environment variable {name}={value:?} is not a valid value")]
    InvalidEnv { name: &'static str, value: String },
    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl Settings {
    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_frame_rate.max(1)))
    }

    pub fn write_debounce(&self) -> Duration {
        Duration::from_millis(self.write_debounce_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.sensitivity) {
            return Err(ConfigError::Invalid(format!(
                "sensitivity {} is outside [0, 1]",
                self.sensitivity
            )));
        }
        if self.target_frame_rate == 0 {
            return Err(ConfigError::Invalid(
                "target_frame_rate must be positive".into(),
            ));
        }
        if self.history_min == 0 || self.history_min > self.history_max {
            return Err(ConfigError::Invalid(format!(
                "history bounds must satisfy 1 <= history_min ({}) <= history_max ({})",
                self.history_min, self.history_max
            )));
        }
        if self.render_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "render_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Applies the user's saved sensitivity and frame rate on top of the
    /// deployment settings.
    pub fn apply_persisted(&mut self, persisted: &PersistedSettings) {
        self.sensitivity = persisted.sensitivity;
        self.target_frame_rate = persisted.target_frame_rate;
    }

    pub fn persisted(&self) -> PersistedSettings {
        PersistedSettings {
            sensitivity: self.sensitivity,
            target_frame_rate: self.target_frame_rate,
        }
    }
}

pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(Path::new(SETTINGS_FILE), |name| std::env::var(name).ok())
}

/// Defaults, then the optional TOML file, then environment overrides.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings, ConfigError> {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => toml::from_str::<Settings>(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => Settings::default(),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    };

    if let Some((name, v)) = env_override(&env, &["GESTURE_SENSITIVITY", "APP__SENSITIVITY"]) {
        settings.sensitivity = parse_env(v, name)?;
    }
    if let Some((name, v)) = env_override(&env, &["GESTURE_TARGET_FRAME_RATE", "APP__TARGET_FRAME_RATE"]) {
        settings.target_frame_rate = parse_env(v, name)?;
    }
    if let Some((name, v)) = env_override(&env, &["GESTURE_HISTORY_MAX", "APP__HISTORY_MAX"]) {
        settings.history_max = parse_env(v, name)?;
    }
    if let Some((name, v)) = env_override(&env, &["GESTURE_HISTORY_MIN", "APP__HISTORY_MIN"]) {
        settings.history_min = parse_env(v, name)?;
    }
    if let Some((name, v)) = env_override(&env, &["GESTURE_WRITE_DEBOUNCE_MS", "APP__WRITE_DEBOUNCE_MS"]) {
        settings.write_debounce_ms = parse_env(v, name)?;
    }
    if let Some((name, v)) = env_override(&env, &["GESTURE_RENDER_INTERVAL_MS", "APP__RENDER_INTERVAL_MS"])
    {
        settings.render_interval_ms = parse_env(v, name)?;
    }
    if let Some((_, v)) = env_override(&env, &["DATABASE_URL", "APP__DATABASE_URL"]) {
        settings.database_url = v;
    }
    if let Some((_, v)) = env_override(&env, &["GESTURE_KEY_PREFIX", "APP__KEY_PREFIX"]) {
        settings.key_prefix = v;
    }

    settings.validate()?;
    info!(
        sensitivity = settings.sensitivity,
        target_frame_rate = settings.target_frame_rate,
        history_max = settings.history_max,
        history_min = settings.history_min,
        write_debounce_ms = settings.write_debounce_ms,
        "settings loaded"
    );
    Ok(settings)
}

/// Later names win, matching the `APP__*` precedence over plain names.
/// Returns the winning name alongside its value.
fn env_override(
    env: &impl Fn(&str) -> Option<String>,
    names: &[&'static str],
) -> Option<(&'static str, String)> {
    names
        .iter()
        .filter_map(|name| env(name).map(|value| (*name, value)))
        .last()
}

fn parse_env<T: std::str::FromStr>(value: String, name: &'static str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
