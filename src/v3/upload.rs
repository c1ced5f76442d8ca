//! Chunked, resumable upload of a package file
//!
//! Speaks the client side of tus 1.0.0: a `POST` creates the upload session,
//! each `PATCH` appends one chunk at the current offset, and a `HEAD` reports
//! how much of a previously started session the service already holds.

use super::TransferClient;
use super::url_store::{DEFAULT_CACHE_FILE, StoredUpload, UrlStore, fingerprint};
use crate::error::{Error, Result, ValidationError};
use crate::utils::{last_path_segment, validate_upload_file};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Default number of bytes sent per chunk
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Protocol version sent in `Tus-Resumable`
pub const TUS_VERSION: &str = "1.0.0";

const TUS_RESUMABLE: &str = "Tus-Resumable";
const UPLOAD_OFFSET: &str = "Upload-Offset";
const UPLOAD_LENGTH: &str = "Upload-Length";
const UPLOAD_METADATA: &str = "Upload-Metadata";
const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

/// Settings for [`TransferClient::uploader`]
#[derive(Clone, Debug)]
pub struct UploadOptions {
    /// Bytes sent per [`Uploader::upload_chunk`] call
    pub chunk_size: u64,
    /// Remember unfinished sessions and resume them
    pub resumable: bool,
    /// Location of the session cache used when `resumable` is set
    pub cache_path: PathBuf,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            resumable: false,
            cache_path: PathBuf::from(DEFAULT_CACHE_FILE),
        }
    }
}

/// Upload state of a single local file
///
/// The offset only moves forward. The upload is complete once it equals the
/// file size; progress is read through [`offset`](Self::offset) and
/// [`size`](Self::size) between chunks.
#[derive(Debug)]
pub struct Uploader<'a> {
    client: &'a TransferClient,
    path: PathBuf,
    filename: String,
    size: u64,
    offset: u64,
    chunk_size: u64,
    url: Option<String>,
    cache: Option<ResumeCache>,
}

#[derive(Debug)]
struct ResumeCache {
    store: UrlStore,
    fingerprint: String,
}

impl<'a> Uploader<'a> {
    pub(super) async fn new(
        client: &'a TransferClient,
        path: &Path,
        options: UploadOptions,
    ) -> Result<Self> {
        let size = validate_upload_file(path).await?;
        if options.chunk_size == 0 {
            return Err(ValidationError::InvalidChunkSize.into());
        }

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut uploader = Self {
            client,
            path: path.to_path_buf(),
            filename,
            size,
            offset: 0,
            chunk_size: options.chunk_size,
            url: None,
            cache: None,
        };

        if options.resumable {
            let store = UrlStore::open(&options.cache_path).await?;
            let fingerprint = fingerprint(path, size).await?;
            uploader.cache = Some(ResumeCache { store, fingerprint });
            uploader.resume().await?;
        }

        Ok(uploader)
    }

    /// Local file being uploaded
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total file size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes acknowledged by the service so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether every byte has been acknowledged
    pub fn is_complete(&self) -> bool {
        self.offset == self.size
    }

    /// Session URL, once the session exists
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Transfer identifier, the final segment of the session URL
    pub fn transfer_id(&self) -> Option<&str> {
        self.url.as_deref().and_then(last_path_segment)
    }

    /// Pick up a cached session if the service still knows it
    async fn resume(&mut self) -> Result<()> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };
        let Some(stored) = cache.store.get(&cache.fingerprint).cloned() else {
            return Ok(());
        };

        match self.probe(&stored.url).await {
            Ok((offset, length)) if length == self.size && offset <= self.size => {
                tracing::info!(
                    url = %stored.url,
                    cached_offset = stored.offset,
                    offset,
                    "resuming upload"
                );
                self.url = Some(stored.url);
                self.offset = offset;
                Ok(())
            }
            Ok((offset, length)) => {
                tracing::warn!(url = %stored.url, offset, length, size = self.size, "cached upload does not match file, starting over");
                self.forget().await
            }
            Err(e) if is_gone(&e) => {
                tracing::warn!(url = %stored.url, error = %e, "cached upload is gone, starting over");
                self.forget().await
            }
            Err(e) => Err(e),
        }
    }

    async fn forget(&mut self) -> Result<()> {
        if let Some(cache) = &mut self.cache {
            cache.store.remove(&cache.fingerprint).await?;
        }
        Ok(())
    }

    async fn remember(&mut self) -> Result<()> {
        let (Some(cache), Some(url)) = (&mut self.cache, &self.url) else {
            return Ok(());
        };
        if self.offset == self.size {
            cache.store.remove(&cache.fingerprint).await
        } else {
            let entry = StoredUpload {
                url: url.clone(),
                offset: self.offset,
            };
            cache.store.set(&cache.fingerprint, entry).await
        }
    }

    fn tus_request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .session()
            .request(method, url)
            .header(TUS_RESUMABLE, TUS_VERSION)
    }

    /// Ask the service for the offset and length of an existing session
    async fn probe(&self, url: &str) -> Result<(u64, u64)> {
        let response = self
            .client
            .session()
            .execute(self.tus_request(Method::HEAD, url))
            .await?;
        let offset = header_u64(&response, UPLOAD_OFFSET)?;
        let length = header_u64(&response, UPLOAD_LENGTH)?;
        Ok((offset, length))
    }

    async fn create_session(&mut self) -> Result<&str> {
        let endpoint = self.client.upload_url();
        let metadata = format!(
            "contract_id {},filename {}",
            STANDARD.encode(self.client.contract_id()),
            STANDARD.encode(&self.filename)
        );
        let request = self
            .tus_request(Method::POST, endpoint)
            .header(UPLOAD_LENGTH, self.size)
            .header(UPLOAD_METADATA, metadata);

        let response = self.client.session().execute(request).await?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                Error::Protocol(format!("upload session created at {endpoint} has no Location"))
            })?;
        let url = url::Url::parse(endpoint)
            .and_then(|base| base.join(location))
            .map_err(|e| Error::Protocol(format!("invalid upload location '{location}': {e}")))?
            .to_string();

        tracing::info!(url = %url, size = self.size, file = %self.filename, "upload session created");
        self.offset = 0;
        let url = self.url.insert(url);
        Ok(url.as_str())
    }

    async fn read_chunk(&self) -> Result<Vec<u8>> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(self.offset)).await?;

        let want = self.chunk_size.min(self.size - self.offset);
        let mut chunk = Vec::with_capacity(want as usize);
        file.take(want).read_to_end(&mut chunk).await?;
        if chunk.is_empty() {
            return Err(Error::Protocol(format!(
                "{} ended at byte {} but is {} bytes long",
                self.path.display(),
                self.offset,
                self.size
            )));
        }
        Ok(chunk)
    }

    /// Send the next chunk and return the new offset
    ///
    /// Creates the session on first use. The service may accept fewer bytes
    /// than were sent; the offset then advances only by what it reports.
    /// Calling this on a complete upload sends nothing.
    pub async fn upload_chunk(&mut self) -> Result<u64> {
        if self.is_complete() {
            return Ok(self.offset);
        }

        let url = match &self.url {
            Some(url) => url.clone(),
            None => {
                let url = self.create_session().await?.to_string();
                self.remember().await?;
                url
            }
        };

        let chunk = self.read_chunk().await?;
        let sent = chunk.len();
        let request = self
            .tus_request(Method::PATCH, &url)
            .header(UPLOAD_OFFSET, self.offset)
            .header(CONTENT_TYPE, OFFSET_OCTET_STREAM)
            .body(chunk);
        let response = self.client.session().execute_streaming(request).await?;

        let new_offset = header_u64(&response, UPLOAD_OFFSET)?;
        if new_offset < self.offset || new_offset > self.size {
            return Err(Error::Protocol(format!(
                "service reported offset {new_offset} after offset {} of {}",
                self.offset, self.size
            )));
        }

        tracing::debug!(url = %url, sent, offset = new_offset, size = self.size, "chunk uploaded");
        self.offset = new_offset;
        self.remember().await?;
        Ok(new_offset)
    }

    /// Upload the remaining chunks and return the transfer identifier
    pub async fn upload(&mut self) -> Result<String> {
        while !self.is_complete() {
            let before = self.offset;
            if self.upload_chunk().await? == before {
                return Err(Error::Protocol(format!(
                    "service accepted no data at offset {before}"
                )));
            }
        }

        self.transfer_id()
            .map(str::to_string)
            .ok_or_else(|| Error::Protocol("upload finished without a session URL".into()))
    }
}

/// Whether a failed probe proves the cached session no longer exists
fn is_gone(error: &Error) -> bool {
    match error {
        Error::NotFound { .. } => true,
        Error::Api { status, .. } => *status == StatusCode::GONE,
        _ => false,
    }
}

fn header_u64(response: &Response, name: &str) -> Result<u64> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| {
            Error::Protocol(format!(
                "response from {} has no valid {name} header",
                response.url()
            ))
        })
}
