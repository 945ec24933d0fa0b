//! Service configuration.
//!
//! Merge order: environment override > JSON config file > hard default.
//! Validation is fail-fast; a bad value aborts startup with a descriptive
//! error instead of limping along.

use std::env;
use std::fmt::Display;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

const CONFIG_ENV: &str = "GLIMMER_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "glimmer.json";

/// Target address value selecting interface-derived broadcast endpoints.
pub const AUTO_TARGET: &str = "auto";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub led_count: usize,
    pub target_address: String,
    pub target_port: u16,
    pub update_interval_ms: u64,
    pub frame_timeout_secs: u8,
    pub discovery_interval_secs: u64,
    pub pre_countdown_min_secs: u64,
    pub pre_countdown_max_secs: u64,
    pub countdown_secs: u64,
    pub countdown_deviation_secs: u64,
    pub autostart: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            led_count: 30,
            target_address: "255.255.255.255".to_string(),
            target_port: 21324,
            update_interval_ms: 16,
            frame_timeout_secs: 1,
            discovery_interval_secs: 60,
            pre_countdown_min_secs: 3,
            pre_countdown_max_secs: 5,
            countdown_secs: 600,
            countdown_deviation_secs: 120,
            autostart: false,
        }
    }
}

impl Settings {
    /// Load settings from the optional config file and environment overrides.
    pub fn load() -> Result<Self, String> {
        let mut settings = match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            Err(_) => Self::default(),
        };
        settings.apply_env(&|key| env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        info!("loading settings from {}", path.display());
        let raw = fs::read_to_string(path)
            .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
        serde_json::from_str(&raw)
            .map_err(|err| format!("failed to parse {}: {err}", path.display()))
    }

    fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<(), String> {
        if let Some(value) = lookup("GLIMMER_LED_COUNT") {
            self.led_count = parse_env("GLIMMER_LED_COUNT", &value)?;
        }
        if let Some(value) = lookup("GLIMMER_TARGET_ADDRESS") {
            self.target_address = value;
        }
        if let Some(value) = lookup("GLIMMER_TARGET_PORT") {
            self.target_port = parse_env("GLIMMER_TARGET_PORT", &value)?;
        }
        if let Some(value) = lookup("GLIMMER_UPDATE_INTERVAL_MS") {
            self.update_interval_ms = parse_env("GLIMMER_UPDATE_INTERVAL_MS", &value)?;
        }
        if let Some(value) = lookup("GLIMMER_FRAME_TIMEOUT_SECS") {
            self.frame_timeout_secs = parse_env("GLIMMER_FRAME_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("GLIMMER_DISCOVERY_INTERVAL_SECS") {
            self.discovery_interval_secs = parse_env("GLIMMER_DISCOVERY_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = lookup("GLIMMER_PRE_COUNTDOWN_MIN_SECS") {
            self.pre_countdown_min_secs = parse_env("GLIMMER_PRE_COUNTDOWN_MIN_SECS", &value)?;
        }
        if let Some(value) = lookup("GLIMMER_PRE_COUNTDOWN_MAX_SECS") {
            self.pre_countdown_max_secs = parse_env("GLIMMER_PRE_COUNTDOWN_MAX_SECS", &value)?;
        }
        if let Some(value) = lookup("GLIMMER_COUNTDOWN_SECS") {
            self.countdown_secs = parse_env("GLIMMER_COUNTDOWN_SECS", &value)?;
        }
        if let Some(value) = lookup("GLIMMER_COUNTDOWN_DEVIATION_SECS") {
            self.countdown_deviation_secs = parse_env("GLIMMER_COUNTDOWN_DEVIATION_SECS", &value)?;
        }
        if let Some(value) = lookup("GLIMMER_AUTOSTART") {
            self.autostart = parse_env("GLIMMER_AUTOSTART", &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();
        if self.led_count == 0 {
            errors.push("led_count must be positive".to_string());
        }
        if self.target_port == 0 {
            errors.push("target_port must be between 1 and 65535".to_string());
        }
        if self.update_interval_ms == 0 {
            errors.push("update_interval_ms must be positive".to_string());
        }
        if self.frame_timeout_secs == 0 {
            errors.push("frame_timeout_secs must be positive".to_string());
        }
        if self.discovery_interval_secs == 0 {
            errors.push("discovery_interval_secs must be positive".to_string());
        }
        if self.pre_countdown_min_secs == 0
            || self.pre_countdown_min_secs > self.pre_countdown_max_secs
        {
            errors.push("pre-countdown band must be a non-empty range of whole seconds".to_string());
        }
        if !(60..=600).contains(&self.countdown_secs) {
            errors.push("countdown_secs must be between 60 and 600".to_string());
        }
        if self.countdown_deviation_secs > 120 {
            errors.push("countdown_deviation_secs must be at most 120".to_string());
        }
        if self.target_address != AUTO_TARGET && self.target_address.parse::<IpAddr>().is_err() {
            errors.push(format!(
                "target_address must be an IP address or '{AUTO_TARGET}', got '{}'",
                self.target_address
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }

    /// The configured fixed endpoint, or None when targets come from
    /// interface discovery.
    pub fn target_endpoint(&self) -> Result<Option<SocketAddr>, String> {
        if self.target_address == AUTO_TARGET {
            return Ok(None);
        }
        let ip: IpAddr = self
            .target_address
            .parse()
            .map_err(|err| format!("invalid target_address: {err}"))?;
        Ok(Some(SocketAddr::new(ip, self.target_port)))
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }

    pub fn countdown_duration(&self) -> Duration {
        Duration::from_secs(self.countdown_secs)
    }

    pub fn countdown_deviation(&self) -> Duration {
        Duration::from_secs(self.countdown_deviation_secs)
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|err| format!("invalid value '{value}' for {key}: {err}"))
}
