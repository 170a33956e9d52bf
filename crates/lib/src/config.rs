//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.phishstop/config.json`) and environment.
//! Only the reference surfaces read it; the core pipeline takes explicit arguments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::channels::LOCAL_SMS_RECEIVED_ACTION;
use crate::permissions::{Permission, REQUIRED_PERMISSIONS};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Simulated permission grants for the desktop and CLI surfaces.
    #[serde(default)]
    pub permissions: PermissionsConfig,

    /// How received messages are shown.
    #[serde(default)]
    pub display: DisplayConfig,

    /// In-process channel settings.
    #[serde(default)]
    pub channel: ChannelConfig,
}

/// Permissions the simulated platform reports as granted at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsConfig {
    /// Granted permissions, by constant name (`RECEIVE_SMS`) or platform name. Default: all required.
    #[serde(default = "default_granted")]
    pub granted: Vec<Permission>,
}

fn default_granted() -> Vec<Permission> {
    REQUIRED_PERMISSIONS.to_vec()
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            granted: default_granted(),
        }
    }
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConfig {
    /// chrono format string for the "Received at" label (default "%H:%M:%S").
    #[serde(default = "default_time_format")]
    pub time_format: String,
}

fn default_time_format() -> String {
    "%H:%M:%S".to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time_format: default_time_format(),
        }
    }
}

/// Local channel settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    /// Action for assembled-message events. Overridden by PHISHSTOP_LOCAL_ACTION env.
    pub action: Option<String>,
}

/// Resolve the local channel action: env PHISHSTOP_LOCAL_ACTION overrides config, then the default.
pub fn resolve_local_action(config: &Config) -> String {
    std::env::var("PHISHSTOP_LOCAL_ACTION")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            config
                .channel
                .action
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| LOCAL_SMS_RECEIVED_ACTION.to_string())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("PHISHSTOP_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".phishstop").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, or the default path (PHISHSTOP_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_grant_everything_and_use_clock_format() {
        let c = Config::default();
        assert_eq!(c.permissions.granted, REQUIRED_PERMISSIONS.to_vec());
        assert_eq!(c.display.time_format, "%H:%M:%S");
        assert!(c.channel.action.is_none());
    }

    #[test]
    fn empty_object_parses_to_defaults() {
        let c: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(c.permissions.granted.len(), 6);
        let c: Config = serde_json::from_str(r#"{"permissions":{}}"#).unwrap();
        assert_eq!(c.permissions.granted.len(), 6);
    }

    #[test]
    fn parses_camel_case_sections() {
        let c: Config = serde_json::from_str(
            r#"{
                "permissions": { "granted": ["RECEIVE_SMS", "android.permission.READ_SMS"] },
                "display": { "timeFormat": "%H:%M" },
                "channel": { "action": "org.example.SMS" }
            }"#,
        )
        .unwrap();
        assert_eq!(
            c.permissions.granted,
            vec![Permission::ReceiveSms, Permission::ReadSms]
        );
        assert_eq!(c.display.time_format, "%H:%M");
        assert_eq!(c.channel.action.as_deref(), Some("org.example.SMS"));
    }

    #[test]
    fn unknown_permission_is_a_parse_error() {
        let r: Result<Config, _> =
            serde_json::from_str(r#"{"permissions":{"granted":["CAMERA"]}}"#);
        assert!(r.is_err());
    }

    #[test]
    fn local_action_falls_back_to_default() {
        // Assumes PHISHSTOP_LOCAL_ACTION is not set in the test environment.
        let mut c = Config::default();
        assert_eq!(resolve_local_action(&c), LOCAL_SMS_RECEIVED_ACTION);
        c.channel.action = Some("  ".into());
        assert_eq!(resolve_local_action(&c), LOCAL_SMS_RECEIVED_ACTION);
        c.channel.action = Some("org.example.SMS".into());
        assert_eq!(resolve_local_action(&c), "org.example.SMS");
    }

    #[test]
    fn load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let (c, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(c.display.time_format, "%H:%M:%S");
    }

    #[test]
    fn load_config_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_config(Some(path)).unwrap_err();
        assert!(err.to_string().contains("parsing config"));
    }
}
