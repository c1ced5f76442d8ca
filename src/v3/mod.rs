//! REST API 3.0 client: package uploads and transfer tracking

mod upload;
pub mod url_store;

pub use upload::{DEFAULT_CHUNK_SIZE, TUS_VERSION, UploadOptions, Uploader};

use crate::config::Config;
use crate::error::Result;
use crate::poll::{PollSchedule, poll_until};
use crate::session::Session;
use crate::types::{DeletedData, ReportFileType, Transfer, TransferList, TransferListData, TransferStatus};
use crate::utils::{encode_path_segment, page_from_link};
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;

/// API version served under `/api/3.0`
pub const API_VERSION: &str = "3.0";

/// Client for the 3.0 transfer API
#[derive(Clone, Debug)]
pub struct TransferClient {
    session: Session,
    contract_id: String,
    base_url: String,
    upload_url: String,
}

impl TransferClient {
    /// Create a client from the resolved configuration
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let host = config.host();

        Ok(Self {
            session: Session::new(config)?,
            contract_id: config.dpres.contract_id.clone(),
            base_url: format!("{}/api/{}/{}", host, API_VERSION, config.dpres.contract_id),
            upload_url: format!("{}/api/{}/transfers", host, API_VERSION),
        })
    }

    /// Base URL of contract-scoped endpoints
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint where upload sessions are created
    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    pub(crate) fn contract_id(&self) -> &str {
        &self.contract_id
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    fn transfer_url(&self, transfer_id: &str) -> String {
        format!("{}/transfers/{}", self.base_url, encode_path_segment(transfer_id))
    }

    /// Prepare an upload of `path`
    ///
    /// The file is validated before anything is sent. With
    /// `options.resumable`, a session cached for the same file is probed and
    /// resumed from the offset the service reports.
    pub async fn uploader(&self, path: &Path, options: UploadOptions) -> Result<Uploader<'_>> {
        Uploader::new(self, path, options).await
    }

    /// Fetch a transfer
    ///
    /// Unknown transfers fail with [`Error::NotFound`](crate::Error::NotFound).
    pub async fn get_transfer(&self, transfer_id: &str) -> Result<Transfer> {
        let url = self.transfer_url(transfer_id);
        self.session.execute_data(self.session.get(&url)).await
    }

    /// Wait until a transfer has been accepted or rejected
    ///
    /// Polls on a fresh [`PollSchedule`]. `deadline` bounds the total wait;
    /// `None` waits as long as it takes.
    pub async fn poll_until_processed(
        &self,
        transfer_id: &str,
        deadline: Option<Duration>,
    ) -> Result<Transfer> {
        self.poll_until_processed_with(transfer_id, PollSchedule::new(), deadline)
            .await
    }

    /// [`poll_until_processed`](Self::poll_until_processed) with a custom schedule
    pub async fn poll_until_processed_with<S>(
        &self,
        transfer_id: &str,
        schedule: S,
        deadline: Option<Duration>,
    ) -> Result<Transfer>
    where
        S: IntoIterator<Item = Duration>,
    {
        let transfer = poll_until(
            schedule,
            deadline,
            || self.get_transfer(transfer_id),
            |transfer: &Transfer| {
                tracing::debug!(transfer_id, status = %transfer.status, "transfer status");
                transfer.status.is_terminal()
            },
        )
        .await?;

        tracing::info!(transfer_id, status = %transfer.status, "transfer processed");
        Ok(transfer)
    }

    /// Fetch the validation report of a processed transfer
    pub async fn validation_report(
        &self,
        transfer_id: &str,
        file_type: ReportFileType,
    ) -> Result<Bytes> {
        let url = format!("{}/report", self.transfer_url(transfer_id));
        let request = self
            .session
            .get(&url)
            .query(&[("type", file_type.as_str())]);
        let response = self.session.execute(request).await?;
        Ok(response.bytes().await?)
    }

    /// Delete a transfer
    ///
    /// A transfer the service does not know is reported as `false`.
    pub async fn delete_transfer(&self, transfer_id: &str) -> Result<bool> {
        let url = self.transfer_url(transfer_id);
        match self
            .session
            .execute_data::<DeletedData>(self.session.delete(&url))
            .await
        {
            Ok(data) => {
                tracing::info!(transfer_id, deleted = data.deleted, "transfer deletion requested");
                Ok(data.deleted)
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(transfer_id, "transfer to delete not found");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// List transfers, optionally filtered by status
    pub async fn list_transfers(
        &self,
        status: Option<TransferStatus>,
        page: u32,
        limit: u32,
    ) -> Result<TransferList> {
        let mut request = self
            .session
            .get(&format!("{}/transfers", self.base_url))
            .query(&[("page", page), ("limit", limit)]);
        if let Some(status) = status {
            request = request.query(&[("status", status.as_str())]);
        }

        let data: TransferListData = self.session.execute_data(request).await?;
        Ok(TransferList {
            transfers: data.results,
            prev_page: data.links.prev.as_deref().and_then(page_from_link),
            next_page: data.links.next.as_deref().and_then(page_from_link),
        })
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_helpers::{CONTRACT_ID, fast_schedule, test_config};
    use serde_json::json;
    use std::cell::Cell;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TRANSFER_ID: &str = "sip.tar-00000000-0000-0000-0000-000000000001";

    fn transfer_path() -> String {
        format!("/api/3.0/{CONTRACT_ID}/transfers/{TRANSFER_ID}")
    }

    fn transfer_body(status: &str) -> serde_json::Value {
        let mut data = json!({
            "transfer_id": TRANSFER_ID,
            "filename": "sip.tar",
            "status": status,
            "timestamp": "2024-05-01T10:00:00Z"
        });
        if status == "accepted" {
            data["sip_id"] = json!("urn:uuid:fake_sip");
        }
        json!({"status": "success", "data": data})
    }

    async fn mount_status(server: &MockServer, status: &str, times: Option<u64>, priority: u8) {
        let mock = Mock::given(method("GET"))
            .and(path(transfer_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(transfer_body(status)))
            .with_priority(priority);
        let mock = match times {
            Some(n) => mock.up_to_n_times(n),
            None => mock,
        };
        mock.mount(server).await;
    }

    fn counted(sleeps: &Cell<u32>) -> impl Iterator<Item = Duration> + '_ {
        fast_schedule().inspect(move |_| sleeps.set(sleeps.get() + 1))
    }

    #[tokio::test]
    async fn get_transfer_decodes_record() {
        let server = MockServer::start().await;
        mount_status(&server, "accepted", None, 1).await;

        let client = TransferClient::new(&test_config(&server.uri())).unwrap();
        let transfer = client.get_transfer(TRANSFER_ID).await.unwrap();

        assert_eq!(transfer.transfer_id, TRANSFER_ID);
        assert_eq!(transfer.status, TransferStatus::Accepted);
        assert_eq!(transfer.sip_id.as_deref(), Some("urn:uuid:fake_sip"));
    }

    #[tokio::test]
    async fn unknown_transfer_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = TransferClient::new(&test_config(&server.uri())).unwrap();
        let err = client.get_transfer("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn already_processed_transfer_needs_one_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(transfer_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(transfer_body("accepted")))
            .expect(1)
            .mount(&server)
            .await;

        let client = TransferClient::new(&test_config(&server.uri())).unwrap();
        let sleeps = Cell::new(0);
        let transfer = client
            .poll_until_processed_with(TRANSFER_ID, counted(&sleeps), None)
            .await
            .unwrap();

        assert_eq!(transfer.status, TransferStatus::Accepted);
        assert_eq!(sleeps.get(), 0);
    }

    #[tokio::test]
    async fn polls_until_terminal_status() {
        let server = MockServer::start().await;
        mount_status(&server, "uploading", Some(1), 1).await;
        mount_status(&server, "in_progress", Some(2), 2).await;
        mount_status(&server, "rejected", None, 3).await;

        let client = TransferClient::new(&test_config(&server.uri())).unwrap();
        let sleeps = Cell::new(0);
        let transfer = client
            .poll_until_processed_with(TRANSFER_ID, counted(&sleeps), None)
            .await
            .unwrap();

        assert_eq!(transfer.status, TransferStatus::Rejected);
        assert_eq!(transfer.sip_id, None);
        assert_eq!(sleeps.get(), 3);
    }

    #[tokio::test]
    async fn transfer_vanishing_mid_poll_is_not_found() {
        let server = MockServer::start().await;
        mount_status(&server, "in_progress", Some(2), 1).await;
        Mock::given(method("GET"))
            .and(path(transfer_path()))
            .respond_with(ResponseTemplate::new(404))
            .with_priority(2)
            .mount(&server)
            .await;

        let client = TransferClient::new(&test_config(&server.uri())).unwrap();
        let err = client
            .poll_until_processed_with(TRANSFER_ID, fast_schedule(), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn poll_deadline_is_honoured() {
        let server = MockServer::start().await;
        mount_status(&server, "in_progress", None, 1).await;

        let client = TransferClient::new(&test_config(&server.uri())).unwrap();
        let result = client
            .poll_until_processed_with(
                TRANSFER_ID,
                fast_schedule(),
                Some(Duration::from_millis(20)),
            )
            .await;
        assert!(matches!(result, Err(Error::PollTimeout { .. })));
    }

    #[tokio::test]
    async fn validation_report_by_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/report", transfer_path())))
            .and(query_param("type", "html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>report</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = TransferClient::new(&test_config(&server.uri())).unwrap();
        let report = client
            .validation_report(TRANSFER_ID, ReportFileType::Html)
            .await
            .unwrap();
        assert_eq!(&report[..], b"<html>report</html>");
    }

    #[tokio::test]
    async fn deleting_unknown_transfer_returns_false() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(transfer_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"deleted": "true"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .with_priority(10)
            .mount(&server)
            .await;

        let client = TransferClient::new(&test_config(&server.uri())).unwrap();
        assert!(client.delete_transfer(TRANSFER_ID).await.unwrap());
        assert!(!client.delete_transfer("missing").await.unwrap());
    }

    #[tokio::test]
    async fn list_transfers_with_paging() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/3.0/{CONTRACT_ID}/transfers")))
            .and(query_param("page", "2"))
            .and(query_param("limit", "1"))
            .and(query_param("status", "accepted"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {
                    "results": [transfer_body("accepted")["data"].clone()],
                    "links": {
                        "previous": format!("/api/3.0/{CONTRACT_ID}/transfers?page=1&limit=1"),
                        "next": format!("/api/3.0/{CONTRACT_ID}/transfers?page=3&limit=1")
                    }
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = TransferClient::new(&test_config(&server.uri())).unwrap();
        let list = client
            .list_transfers(Some(TransferStatus::Accepted), 2, 1)
            .await
            .unwrap();

        assert_eq!(list.transfers.len(), 1);
        assert_eq!(list.prev_page, Some(1));
        assert_eq!(list.next_page, Some(3));
    }
}
