//! Dissemination request state machine
//!
//! ```text
//! Uninitiated --disseminate--> Pending --check_status sees completion--> Ready --delete--> Deleted
//! ```
//!
//! Downloads are only possible in `Ready`. The download response is opened at
//! most once per request and then read lazily in ~1 MiB chunks.

use super::AccessClient;
use crate::error::{Error, Result};
use crate::poll::{PollSchedule, poll_until};
use crate::session::{Session, decode_data};
use crate::types::{ArchiveFormat, DeletedData, DisseminateData, DisseminationStatusData};
use crate::utils::{encode_path_segment, last_path_segment};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Approximate size of the chunks yielded by [`StreamedDownload::next_chunk`]
pub const DOWNLOAD_CHUNK_SIZE: usize = 1024 * 1024;

/// Lifecycle state of a [`DipRequest`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DipState {
    /// Created locally, not yet sent to the service
    Uninitiated,
    /// Dissemination started, DIP not ready yet (or not checked yet)
    Pending,
    /// DIP is ready for download
    Ready,
    /// DIP was deleted from the service
    Deleted,
}

impl std::fmt::Display for DipState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            DipState::Uninitiated => "dissemination has not been started",
            DipState::Pending => "DIP is not ready yet",
            DipState::Ready => "DIP is ready",
            DipState::Deleted => "DIP has been deleted",
        };
        f.write_str(text)
    }
}

/// A request to disseminate an AIP as a downloadable DIP
#[derive(Debug)]
pub struct DipRequest<'a> {
    client: &'a AccessClient,
    aip_id: String,
    catalog: Option<String>,
    format: ArchiveFormat,
    dip_id: Option<String>,
    ready: Option<bool>,
    deleted: bool,
    download: Option<StreamedDownload>,
}

impl<'a> DipRequest<'a> {
    pub(super) fn new(
        client: &'a AccessClient,
        aip_id: &str,
        format: ArchiveFormat,
        catalog: Option<&str>,
    ) -> Self {
        Self {
            client,
            aip_id: aip_id.to_string(),
            catalog: catalog.map(str::to_string),
            format,
            dip_id: None,
            ready: None,
            deleted: false,
            download: None,
        }
    }

    /// Identifier of the source AIP
    pub fn aip_id(&self) -> &str {
        &self.aip_id
    }

    /// Archive format requested for the DIP
    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Identifier assigned by the service, once disseminated
    pub fn dip_id(&self) -> Option<&str> {
        self.dip_id.as_deref()
    }

    /// Readiness flag: `None` until the first status check
    pub fn ready(&self) -> Option<bool> {
        self.ready
    }

    /// Current lifecycle state
    pub fn state(&self) -> DipState {
        if self.deleted {
            DipState::Deleted
        } else if self.dip_id.is_none() {
            DipState::Uninitiated
        } else if self.ready == Some(true) {
            DipState::Ready
        } else {
            DipState::Pending
        }
    }

    fn session(&self) -> &'a Session {
        self.client.session()
    }

    fn status_url(&self, operation: &'static str) -> Result<String> {
        match &self.dip_id {
            Some(dip_id) if !self.deleted => {
                Ok(format!("{}/disseminated/{}", self.client.base_url(), dip_id))
            }
            _ => Err(self.illegal(operation)),
        }
    }

    fn illegal(&self, operation: &'static str) -> Error {
        Error::IllegalState {
            operation,
            state: self.state().to_string(),
        }
    }

    fn require_ready(&self, operation: &'static str) -> Result<()> {
        if self.state() == DipState::Ready {
            Ok(())
        } else {
            Err(self.illegal(operation))
        }
    }

    /// Ask the service to start creating the DIP
    ///
    /// Returns the identifier the service assigned to the job.
    pub async fn disseminate(&mut self) -> Result<&str> {
        if self.state() != DipState::Uninitiated {
            return Err(self.illegal("disseminate"));
        }

        let url = format!(
            "{}/preserved/{}/disseminate",
            self.client.base_url(),
            encode_path_segment(&self.aip_id)
        );
        let mut request = self
            .session()
            .post(&url)
            .query(&[("format", self.format.as_str())]);
        if let Some(catalog) = &self.catalog {
            request = request.query(&[("catalog", catalog.as_str())]);
        }

        let data: DisseminateData = self.session().execute_data(request).await?;
        let dip_id = last_path_segment(&data.disseminated)
            .ok_or_else(|| {
                Error::Protocol(format!(
                    "cannot find DIP identifier in '{}'",
                    data.disseminated
                ))
            })?
            .to_string();

        tracing::info!(aip_id = %self.aip_id, dip_id = %dip_id, format = %self.format, "dissemination started");
        let dip_id = self.dip_id.insert(dip_id);
        Ok(dip_id.as_str())
    }

    /// Check whether the DIP is ready for download
    ///
    /// With `poll = false` exactly one status request is made. With
    /// `poll = true` the status is re-checked on a fresh [`PollSchedule`] until
    /// the DIP is ready, without any time limit. Once ready, further calls
    /// return `true` without contacting the service.
    pub async fn check_status(&mut self, poll: bool) -> Result<bool> {
        if poll {
            self.wait_until_ready(PollSchedule::new(), None).await?;
            return Ok(true);
        }

        let url = self.status_url("check status")?;
        if self.ready == Some(true) {
            return Ok(true);
        }
        let complete = fetch_complete(self.session(), &url).await?;
        self.ready = Some(complete);
        Ok(complete)
    }

    /// Poll until the DIP is ready, sleeping between checks per `schedule`
    ///
    /// `deadline` bounds the total wait; `None` waits indefinitely.
    pub async fn wait_until_ready<S>(&mut self, schedule: S, deadline: Option<Duration>) -> Result<()>
    where
        S: IntoIterator<Item = Duration>,
    {
        let url = self.status_url("check status")?;
        if self.ready == Some(true) {
            return Ok(());
        }
        let session = self.session();

        let result = poll_until(
            schedule,
            deadline,
            || fetch_complete(session, &url),
            |complete: &bool| *complete,
        )
        .await;

        match result {
            Ok(_) => {
                self.ready = Some(true);
                Ok(())
            }
            Err(e) => {
                if self.ready.is_none() && matches!(e, Error::PollTimeout { .. }) {
                    self.ready = Some(false);
                }
                Err(e)
            }
        }
    }

    /// Open the download, or return the already opened one
    ///
    /// Only the first call sends a request; the response is kept for the
    /// lifetime of this request object.
    pub async fn streamed_download(&mut self) -> Result<&mut StreamedDownload> {
        self.require_ready("download")?;

        let download = match self.download.take() {
            Some(download) => download,
            None => self.open_download().await?,
        };
        Ok(self.download.insert(download))
    }

    async fn open_download(&self) -> Result<StreamedDownload> {
        let url = format!("{}/download", self.status_url("download")?);
        let session = self.session();
        let response = session.execute_streaming(session.get(&url)).await?;
        let size = response.content_length().ok_or_else(|| {
            Error::Protocol(format!("download from {url} has no Content-Length"))
        })?;

        tracing::debug!(dip_id = ?self.dip_id, size, "download opened");
        Ok(StreamedDownload {
            size,
            received: 0,
            finished: false,
            idle_timeout: session.timeout(),
            stream: response.bytes_stream().boxed(),
        })
    }

    /// Size of the DIP in bytes, as announced by the download response
    pub async fn download_size(&mut self) -> Result<u64> {
        Ok(self.streamed_download().await?.size())
    }

    /// Write the DIP to `path`, returning the number of bytes written
    pub async fn download_to(&mut self, path: &Path) -> Result<u64> {
        let download = self.streamed_download().await?;

        let file = tokio::fs::File::create(path).await?;
        let mut writer = BufWriter::with_capacity(DOWNLOAD_CHUNK_SIZE, file);
        let mut written = 0u64;
        while let Some(chunk) = download.next_chunk().await? {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;

        tracing::info!(path = %path.display(), bytes = written, "DIP downloaded");
        Ok(written)
    }

    /// Delete the DIP from the service
    ///
    /// Only a ready DIP can be deleted. Returns the service's confirmation;
    /// after a confirmed deletion the request can no longer be used.
    pub async fn delete(&mut self) -> Result<bool> {
        self.require_ready("delete")?;
        let url = self.status_url("delete")?;

        let response = self.session().execute(self.session().delete(&url)).await?;
        let data: DeletedData = decode_data(response).await?;
        if data.deleted {
            self.deleted = true;
            self.download = None;
        }
        tracing::info!(dip_id = ?self.dip_id, deleted = data.deleted, "DIP deletion requested");
        Ok(data.deleted)
    }
}

async fn fetch_complete(session: &Session, url: &str) -> Result<bool> {
    let data: DisseminationStatusData = session.execute_data(session.get(url)).await?;
    tracing::debug!(url, complete = data.complete, "dissemination status");
    Ok(data.complete)
}

/// Lazily read body of a DIP download
///
/// Chunks are pulled from the network as they are requested and cannot be
/// read a second time. The transfer as a whole is unbounded, but a read that
/// sees no data for the session timeout fails.
pub struct StreamedDownload {
    size: u64,
    received: u64,
    finished: bool,
    idle_timeout: Duration,
    stream: BoxStream<'static, reqwest::Result<Bytes>>,
}

impl StreamedDownload {
    /// Total size from the `Content-Length` header
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes handed out so far
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Next chunk of roughly [`DOWNLOAD_CHUNK_SIZE`] bytes, `None` at the end
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.finished {
            return Ok(None);
        }

        let mut chunk = BytesMut::new();
        while chunk.len() < DOWNLOAD_CHUNK_SIZE {
            let next = tokio::time::timeout(self.idle_timeout, self.stream.next())
                .await
                .map_err(|_| {
                    std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("download stalled for {:?}", self.idle_timeout),
                    )
                })?;
            match next {
                Some(Ok(bytes)) => chunk.extend_from_slice(&bytes),
                Some(Err(e)) => return Err(e.into()),
                None => {
                    self.finished = true;
                    break;
                }
            }
        }

        if chunk.is_empty() {
            return Ok(None);
        }
        self.received += chunk.len() as u64;
        Ok(Some(chunk.freeze()))
    }
}

impl std::fmt::Debug for StreamedDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamedDownload")
            .field("size", &self.size)
            .field("received", &self.received)
            .field("finished", &self.finished)
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}
