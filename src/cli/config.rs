//! Configuration management module
//!
//! Transport settings are layered: defaults, then `AIRGAP_*` environment variables, then
//! command-line flags. The resulting [`TransportConfig`] is passed by value into every
//! registry client; nothing reads the environment after startup.

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ARCHITECTURE: &str = "amd64";
pub const DEFAULT_WORK_DIR: &str = "./tmp/sync_tmp";

/// Authentication configuration
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl AuthConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Basic auth is only ever sent when both halves are present
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Network and working-storage settings shared by all transfers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub work_dir: PathBuf,
    /// Seconds allowed for metadata calls (auth, manifests, HEAD, upload sessions)
    pub metadata_timeout: u64,
    /// Seconds allowed for classification probes
    pub probe_timeout: u64,
    /// Seconds a streamed blob transfer may stall between chunks
    pub read_timeout: u64,
    pub architecture: String,
    pub skip_tls: bool,
    pub debug: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            metadata_timeout: 10,
            probe_timeout: 5,
            read_timeout: 60,
            architecture: DEFAULT_ARCHITECTURE.to_string(),
            skip_tls: false,
            debug: false,
        }
    }
}

impl TransportConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    pub fn validate(&self) -> Result<()> {
        if self.metadata_timeout == 0 || self.probe_timeout == 0 || self.read_timeout == 0 {
            return Err(RegistryError::Validation(
                "timeouts must be greater than 0".to_string(),
            ));
        }
        if self.architecture.trim().is_empty() {
            return Err(RegistryError::Validation(
                "architecture cannot be empty".to_string(),
            ));
        }
        if self.work_dir.as_os_str().is_empty() {
            return Err(RegistryError::Validation(
                "work directory cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Create config from environment variables and defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same layering as [`Self::from_env`] over an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("AIRGAP_WORK_DIR") {
            config.work_dir = PathBuf::from(val);
        }
        if let Some(timeout) = lookup("AIRGAP_TIMEOUT").and_then(|v| v.parse().ok()) {
            config.metadata_timeout = timeout;
        }
        if let Some(val) = lookup("AIRGAP_ARCH") {
            config.architecture = val;
        }
        if let Some(val) = lookup("AIRGAP_SKIP_TLS") {
            config.skip_tls = parse_flag(&val);
        }
        if let Some(val) = lookup("AIRGAP_DEBUG") {
            config.debug = parse_flag(&val);
        }

        config
    }
}

fn parse_flag(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}
