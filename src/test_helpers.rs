//! Shared fixtures for unit tests

use crate::config::{Config, DpresConfig, RetryConfig, TransportConfig};
use std::time::Duration;

/// Contract identifier used by every test configuration
pub const CONTRACT_ID: &str = "urn:uuid:fake_contract_id";

/// Configuration pointing at a mock server, with fast retries
pub fn test_config(host: &str) -> Config {
    Config {
        dpres: DpresConfig {
            contract_id: CONTRACT_ID.into(),
            username: "fakeuser".into(),
            password: "fakepassword".into(),
            api_host: format!("{host}/"),
            verify_ssl: true,
        },
        transport: TransportConfig {
            timeout: Duration::from_secs(5),
            retry: RetryConfig {
                max_attempts: 2,
                initial_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(20),
                backoff_multiplier: 2.0,
                jitter: false,
            },
        },
    }
}

/// Schedule of millisecond sleeps for driving poll loops quickly
pub fn fast_schedule() -> impl Iterator<Item = Duration> {
    std::iter::repeat(Duration::from_millis(2))
}
