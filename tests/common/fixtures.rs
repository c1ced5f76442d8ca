//! Mock service responses

use super::config::CONTRACT_ID;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Payload served as the DIP download
pub const DIP_PAYLOAD: &[u8] = b"This is a complete DIP in a ZIP sent in a blip";

/// Path of a contract-scoped endpoint of the given API version
pub fn api_path(version: &str, rest: &str) -> String {
    format!("/api/{version}/{CONTRACT_ID}{rest}")
}

/// Wrap `data` in the service's success envelope
pub fn success(data: Value) -> Value {
    json!({"status": "success", "data": data})
}

/// Mount a JSON response for `method` + `path`
///
/// `times` limits how often the mock answers; `priority` orders overlapping
/// mocks (lower wins).
pub async fn mount_json(
    server: &MockServer,
    http_method: &str,
    endpoint: &str,
    body: Value,
    times: Option<u64>,
    priority: u8,
) {
    let mock = Mock::given(method(http_method))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .with_priority(priority);
    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(server).await;
}

/// Transfer record as returned by the 3.0 API
pub fn transfer(transfer_id: &str, status: &str, sip_id: Option<&str>) -> Value {
    json!({
        "transfer_id": transfer_id,
        "filename": "sip.tar",
        "status": status,
        "sip_id": sip_id,
        "timestamp": "2024-05-01T10:00:00Z"
    })
}
