//! Connection configuration for a XenServer / XCP-ng endpoint.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{XenError, XenResult};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Settings for reaching one XenServer host.
///
/// Loadable from a JSON file carrying a top-level `"xenserver"` object:
///
/// ```json
/// {
///   "xenserver": {
///     "uri": "https://xenserver.example:443",
///     "user": "root",
///     "password": "opensesame"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XenConnectionConfig {
    /// Endpoint URI, e.g. `https://xenserver.example:443`.
    #[serde(default)]
    pub uri: String,
    /// Login username, usually `root`.
    #[serde(default)]
    pub user: String,
    /// Login password.
    #[serde(default, skip_serializing)]
    pub password: String,
    /// Verify the server certificate. XenServer ships self-signed, so off by
    /// default.
    #[serde(default)]
    pub verify_tls: bool,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl XenConnectionConfig {
    /// Config with the default TLS posture and timeout.
    pub fn new(uri: &str, user: &str, password: &str) -> Self {
        Self {
            uri: uri.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            verify_tls: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Check that every field needed for a login-capable connection is set.
    pub fn validate(&self) -> XenResult<()> {
        if self.uri.trim().is_empty() || self.user.trim().is_empty() || self.password.is_empty() {
            return Err(XenError::Config("missing uri, user, or password".into()));
        }
        Ok(())
    }

    /// Load and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> XenResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| XenError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let doc: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| XenError::Config(format!("malformed config: {}", e)))?;
        let section = doc
            .get("xenserver")
            .ok_or_else(|| XenError::Config("malformed config: no \"xenserver\" section".into()))?;
        let config: Self = serde_json::from_value(section.clone())
            .map_err(|e| XenError::Config(format!("malformed config: {}", e)))?;
        config.validate()?;
        debug!(
            "Loaded XenServer config for {}@{} from {}",
            config.user,
            config.uri,
            path.display()
        );
        Ok(config)
    }
}
