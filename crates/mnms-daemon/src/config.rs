//! Configuration loading and validation

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Environment variable that overrides `auth.secret`
pub const SECRET_ENV: &str = "MNMS_JWT_SECRET";

/// Environment variable adding one operator key
pub const OPERATOR_KEY_ENV: &str = "MNMS_OPERATOR_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default, rename = "enrollment_key")]
    pub enrollment_keys: Vec<EnrollmentKeyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for web server
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Base URL devices use to reach this service; baked into the scripts
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// TLS configuration (optional - enables HTTPS when present)
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_url: default_public_url(),
            tls: None,
        }
    }
}

/// TLS/HTTPS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM format)
    pub cert: String,
    /// Path to private key file (PEM format)
    pub key: String,
}

fn default_bind() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_public_url() -> String {
    "http://localhost:3001".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for device tokens
    #[serde(default, skip_serializing)]
    pub secret: String,
    /// Lifetime of a one-shot device token in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
    /// Lifetime of the token embedded in the device scheduler; every task
    /// fetch rewrites the scheduler with a fresh one
    #[serde(default = "default_task_token_ttl")]
    pub task_token_ttl_secs: u64,
    /// Static keys for the device read-back routes (empty disables them)
    #[serde(default, skip_serializing)]
    pub operator_keys: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            token_ttl_secs: default_token_ttl(),
            task_token_ttl_secs: default_task_token_ttl(),
            operator_keys: Vec::new(),
        }
    }
}

fn default_token_ttl() -> u64 {
    5 // Reissued on every device interaction
}

fn default_task_token_ttl() -> u64 {
    3600 // Longest outage a device survives without re-enrolling
}

/// RouterOS scheduler installed on onboarded devices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Scheduler entry name on the device
    #[serde(default = "default_scheduler_name")]
    pub name: String,
    /// RouterOS duration between task fetches
    #[serde(default = "default_scheduler_interval")]
    pub interval: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: default_scheduler_name(),
            interval: default_scheduler_interval(),
        }
    }
}

fn default_scheduler_name() -> String {
    "mnms".to_string()
}

fn default_scheduler_interval() -> String {
    "00:00:05".to_string()
}

/// Enrollment key a device presents on first contact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentKeyConfig {
    pub id: String,
    /// Remaining devices this key may enroll (unlimited when absent)
    #[serde(default)]
    pub max_devices: Option<u32>,
    /// Key stops working after this instant
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Config {
    /// Apply environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var(SECRET_ENV) {
            self.auth.secret = secret;
        }
        if let Ok(key) = std::env::var(OPERATOR_KEY_ENV) {
            if !key.is_empty() && !self.auth.operator_keys.contains(&key) {
                self.auth.operator_keys.push(key);
            }
        }
    }

    /// Reject configurations the daemon cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.auth.secret.is_empty() {
            anyhow::bail!("auth.secret is empty; set it in the config file or via {}", SECRET_ENV);
        }
        if self.auth.token_ttl_secs == 0 || self.auth.task_token_ttl_secs == 0 {
            anyhow::bail!("auth token lifetimes must be greater than zero");
        }
        if self.auth.operator_keys.iter().any(String::is_empty) {
            anyhow::bail!("auth.operator_keys must not contain empty keys");
        }
        if self.auth.operator_keys.is_empty() {
            info!("No operator keys configured, device read-back routes are disabled");
        }
        if self.daemon.public_url.ends_with('/') {
            warn!(url = %self.daemon.public_url, "public_url has a trailing slash");
        }
        Ok(())
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        config
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Config::default()
    };
    config.apply_env();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.daemon.bind, "0.0.0.0:3001");
        assert_eq!(config.auth.token_ttl_secs, 5);
        assert_eq!(config.scheduler.interval, "00:00:05");
        assert!(config.enrollment_keys.is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[daemon]
bind = "127.0.0.1:9000"
public_url = "https://mnms.example.net"

[auth]
secret = "s3cret"
token_ttl_secs = 10
operator_keys = ["ops-1"]

[[enrollment_key]]
id = "site-a"
max_devices = 3

[[enrollment_key]]
id = "lab"
expires_at = "2030-01-01T00:00:00Z"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.daemon.bind, "127.0.0.1:9000");
        assert_eq!(config.daemon.public_url, "https://mnms.example.net");
        assert_eq!(config.auth.token_ttl_secs, 10);
        assert_eq!(config.auth.task_token_ttl_secs, 3600);
        assert!(config.auth.operator_keys.contains(&"ops-1".to_string()));
        assert_eq!(config.scheduler.name, "mnms");
        assert_eq!(config.enrollment_keys.len(), 2);
        assert_eq!(config.enrollment_keys[0].max_devices, Some(3));
        assert!(config.enrollment_keys[1].expires_at.is_some());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.daemon.public_url, "http://localhost:3001");
    }

    #[test]
    fn test_validate_requires_secret() {
        let mut config = Config::default();
        config.auth.secret.clear();
        assert!(config.validate().is_err());
        config.auth.secret = "x".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_operator_key() {
        let mut config = Config::default();
        config.auth.secret = "x".to_string();
        config.auth.operator_keys = vec![String::new()];
        assert!(config.validate().is_err());
    }
}
