//! Configuration files pointing at a mock service

use dpres_access_client::{Config, ConfigSources};
use std::path::PathBuf;
use tempfile::TempDir;

/// Contract identifier written into every test configuration
pub const CONTRACT_ID: &str = "urn:uuid:fake_contract_id";

/// A configuration file on disk together with its temporary directory
pub struct TestConfig {
    pub dir: TempDir,
    pub path: PathBuf,
    pub config: Config,
}

/// Write a configuration file for `host` and load it the way the CLI does
///
/// Retries are kept short so server-error tests finish quickly.
pub fn write_test_config(host: &str) -> TestConfig {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("config.toml");
    let text = format!(
        r#"[dpres]
contract_id = "{CONTRACT_ID}"
username = "fakeuser"
password = "fakepassword"
api_host = "{host}/"
verify_ssl = true

[transport]
timeout = 5

[transport.retry]
max_attempts = 2
initial_delay = 0
max_delay = 0
backoff_multiplier = 2.0
jitter = false
"#
    );
    std::fs::write(&path, text).expect("write config");

    let sources = ConfigSources {
        override_path: Some(path.clone()),
        system_path: None,
        user_path: None,
    };
    let config = Config::load_with(&sources).expect("load config");

    TestConfig { dir, path, config }
}
