//! Configuration types for dpres-access-client
//!
//! The configuration file is TOML with a `[dpres]` table holding the service
//! location and credentials, and an optional `[transport]` table for request
//! timeouts and retry behaviour.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a configuration file that overrides all others
pub const CONFIG_PATH_ENV: &str = "DPRES_ACCESS_CONFIG";

/// Directory name used under `/etc` and the user configuration directory
pub const CONFIG_DIR_NAME: &str = "dpres_access_rest_client";

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Commented template written by `write-config` and on first use
pub const DEFAULT_CONFIG: &str = r#"[dpres]
# Contract ID corresponding to your organization.
# REPLACE THIS with your own.
#
# Example:
# contract_id = "urn:uuid:12345678-f00d-d00f-a4b7-010a184befdd"
contract_id = ""

# Username and password corresponding to your organization.
# REPLACE THESE with your credentials.
username = ""
password = ""

# Host of the DPRES service.
# This usually doesn't need to be changed except for testing purposes.
api_host = "https://pas.csc.fi/"

# Whether to verify the SSL certificate of the host.
# Do *not* change this except for testing purposes.
verify_ssl = true
"#;

/// Main configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Service location and credentials
    pub dpres: DpresConfig,

    /// HTTP transport tuning
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Service location and credentials
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DpresConfig {
    /// Contract identifier of the organization
    #[serde(default)]
    pub contract_id: String,

    /// Username for basic authentication
    #[serde(default)]
    pub username: String,

    /// Password for basic authentication
    #[serde(default)]
    pub password: String,

    /// Service host (default: "https://pas.csc.fi/")
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Verify the TLS certificate of the host (default: true)
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
}

/// HTTP transport configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Connect timeout, total timeout of short requests and idle timeout of
    /// streamed downloads (default: 10 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Retry policy for transient server errors
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Candidate locations consulted by [`Config::load`]
#[derive(Clone, Debug, Default)]
pub struct ConfigSources {
    /// Explicit override, normally from [`CONFIG_PATH_ENV`]
    pub override_path: Option<PathBuf>,
    /// System-wide file under `/etc`
    pub system_path: Option<PathBuf>,
    /// Per-user file; the default template is written here when nothing exists
    pub user_path: Option<PathBuf>,
}

impl ConfigSources {
    /// Standard locations for the current process
    pub fn from_env() -> Self {
        Self {
            override_path: std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from),
            system_path: Some(
                Path::new("/etc")
                    .join(CONFIG_DIR_NAME)
                    .join(CONFIG_FILE_NAME),
            ),
            user_path: user_config_path(),
        }
    }
}

/// Path of the per-user configuration file, if a config directory is known
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

impl Config {
    /// Resolve configuration from the standard locations
    pub fn load() -> Result<Self> {
        Self::load_with(&ConfigSources::from_env())
    }

    /// Resolve configuration from explicit locations
    ///
    /// An override path must exist. Otherwise the system file is tried, then
    /// the user file; if neither exists the default template is written to the
    /// user path and parsed.
    pub fn load_with(sources: &ConfigSources) -> Result<Self> {
        if let Some(path) = &sources.override_path {
            tracing::debug!(path = %path.display(), "loading configuration from override");
            return Self::from_file(path);
        }

        for path in [&sources.system_path, &sources.user_path]
            .into_iter()
            .flatten()
        {
            if path.is_file() {
                tracing::debug!(path = %path.display(), "loading configuration");
                return Self::from_file(path);
            }
        }

        if let Some(path) = &sources.user_path {
            write_default_config(path)?;
            tracing::info!(path = %path.display(), "wrote default configuration");
        }
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse configuration text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config {
            message: e.to_string(),
            key: None,
        })
    }

    /// Host with trailing slashes removed
    pub fn host(&self) -> &str {
        self.dpres.api_host.trim_end_matches('/')
    }

    /// Check the settings needed to talk to the service
    pub fn validate(&self) -> Result<()> {
        if self.host().is_empty() {
            return Err(Error::Config {
                message: "api_host must not be empty".into(),
                key: Some("api_host".into()),
            });
        }
        if url::Url::parse(self.host()).is_err() {
            return Err(Error::Config {
                message: format!("api_host '{}' is not a valid URL", self.dpres.api_host),
                key: Some("api_host".into()),
            });
        }
        if self.dpres.contract_id.trim().is_empty() {
            return Err(Error::Config {
                message: "contract_id must be set".into(),
                key: Some("contract_id".into()),
            });
        }
        Ok(())
    }
}

/// Write the default configuration template unless a file already exists
///
/// Returns `true` if the file was written.
pub fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG)?;
    Ok(true)
}

fn default_api_host() -> String {
    "https://pas.csc.fi/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEST_CONFIG: &str = r#"
[dpres]
contract_id = "urn:uuid:fake_contract_id"
username = "fakeuser"
password = "fakepassword"
verify_ssl = true
api_host = "http://fakeapi/"
"#;

    #[test]
    fn parses_minimal_config_with_transport_defaults() {
        let config = Config::from_toml_str(TEST_CONFIG).unwrap();

        assert_eq!(config.dpres.contract_id, "urn:uuid:fake_contract_id");
        assert_eq!(config.host(), "http://fakeapi");
        assert_eq!(config.transport.timeout, Duration::from_secs(10));
        assert_eq!(config.transport.retry.max_attempts, 5);
        assert!(!config.transport.retry.jitter);
        config.validate().unwrap();
    }

    #[test]
    fn transport_section_overrides_defaults() {
        let text = format!(
            "{TEST_CONFIG}\n[transport]\ntimeout = 30\n\n[transport.retry]\nmax_attempts = 2\n"
        );
        let config = Config::from_toml_str(&text).unwrap();

        assert_eq!(config.transport.timeout, Duration::from_secs(30));
        assert_eq!(config.transport.retry.max_attempts, 2);
        assert_eq!(config.transport.retry.initial_delay, Duration::from_secs(1));
    }

    #[test]
    fn default_template_parses_but_fails_validation() {
        let config = Config::from_toml_str(DEFAULT_CONFIG).unwrap();

        assert_eq!(config.host(), "https://pas.csc.fi");
        assert!(config.dpres.verify_ssl);
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("contract_id")),
            other => panic!("expected contract_id config error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = Config::from_toml_str("[dpres\ncontract_id=").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn override_path_wins_over_other_sources() {
        let dir = TempDir::new().unwrap();
        let override_path = dir.path().join("override.toml");
        let user_path = dir.path().join("user.toml");
        std::fs::write(&override_path, TEST_CONFIG).unwrap();
        std::fs::write(&user_path, DEFAULT_CONFIG).unwrap();

        let config = Config::load_with(&ConfigSources {
            override_path: Some(override_path),
            system_path: None,
            user_path: Some(user_path),
        })
        .unwrap();

        assert_eq!(config.dpres.username, "fakeuser");
    }

    #[test]
    fn missing_override_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load_with(&ConfigSources {
            override_path: Some(dir.path().join("missing.toml")),
            ..Default::default()
        })
        .unwrap_err();

        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn system_file_is_preferred_over_user_file() {
        let dir = TempDir::new().unwrap();
        let system_path = dir.path().join("etc.toml");
        let user_path = dir.path().join("user.toml");
        std::fs::write(&system_path, TEST_CONFIG).unwrap();
        std::fs::write(&user_path, DEFAULT_CONFIG).unwrap();

        let config = Config::load_with(&ConfigSources {
            override_path: None,
            system_path: Some(system_path),
            user_path: Some(user_path),
        })
        .unwrap();

        assert_eq!(config.dpres.contract_id, "urn:uuid:fake_contract_id");
    }

    #[test]
    fn default_template_is_written_when_nothing_exists() {
        let dir = TempDir::new().unwrap();
        let user_path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let config = Config::load_with(&ConfigSources {
            override_path: None,
            system_path: Some(dir.path().join("absent.toml")),
            user_path: Some(user_path.clone()),
        })
        .unwrap();

        assert!(user_path.is_file());
        assert!(std::fs::read_to_string(&user_path).unwrap().contains("[dpres]"));
        assert_eq!(config.host(), "https://pas.csc.fi");
    }

    #[test]
    fn write_default_config_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        assert!(write_default_config(&path).unwrap());
        std::fs::write(&path, "overwritten config").unwrap();
        assert!(!write_default_config(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "overwritten config");
    }
}
