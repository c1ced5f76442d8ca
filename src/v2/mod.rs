//! REST API 2.0 client: catalog search, dissemination and ingest reports

mod dip;

pub use dip::{DOWNLOAD_CHUNK_SIZE, DipRequest, DipState, StreamedDownload};

use crate::config::Config;
use crate::error::Result;
use crate::session::Session;
use crate::types::{
    ArchiveFormat, DeletedData, IngestReportEntry, IngestReportListData, ReportFileType,
    SearchData, SearchResult,
};
use crate::utils::{absolute_url, encode_path_segment};
use bytes::Bytes;

/// API version served under `/api/2.0`
pub const API_VERSION: &str = "2.0";

/// Client for the 2.0 access API
#[derive(Clone, Debug)]
pub struct AccessClient {
    session: Session,
    host: String,
    base_url: String,
}

impl AccessClient {
    /// Create a client from the resolved configuration
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let host = config.host().to_string();
        let base_url = format!("{}/api/{}/{}", host, API_VERSION, config.dpres.contract_id);

        Ok(Self {
            session: Session::new(config)?,
            host,
            base_url,
        })
    }

    /// Service host without trailing slash
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Base URL of contract-scoped endpoints
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    /// Search the catalog
    ///
    /// `query` uses Solr's dialect of the Lucene query syntax.
    pub async fn search(&self, page: u32, limit: u32, query: Option<&str>) -> Result<SearchResult> {
        let mut request = self
            .session
            .get(&format!("{}/search", self.base_url))
            .query(&[("page", page), ("limit", limit)]);
        if let Some(query) = query {
            request = request.query(&[("q", query)]);
        }

        let data: SearchData = self.session.execute_data(request).await?;
        Ok(SearchResult {
            results: data.results,
            prev_url: data.links.prev.map(|link| absolute_url(&self.host, &link)),
            next_url: data.links.next.map(|link| absolute_url(&self.host, &link)),
        })
    }

    /// Create a dissemination request without contacting the service
    ///
    /// Call [`DipRequest::disseminate`] to start it.
    pub fn dip_request(
        &self,
        aip_id: &str,
        format: ArchiveFormat,
        catalog: Option<&str>,
    ) -> DipRequest<'_> {
        DipRequest::new(self, aip_id, format, catalog)
    }

    /// Create a dissemination request and start it
    pub async fn create_dip_request(
        &self,
        aip_id: &str,
        format: ArchiveFormat,
        catalog: Option<&str>,
    ) -> Result<DipRequest<'_>> {
        let mut request = self.dip_request(aip_id, format, catalog);
        request.disseminate().await?;
        Ok(request)
    }

    /// Delete a completed DIP by identifier
    ///
    /// Returns the service's own confirmation.
    pub async fn delete_dissemination(&self, dip_id: &str) -> Result<bool> {
        let url = format!(
            "{}/disseminated/{}",
            self.base_url,
            encode_path_segment(dip_id)
        );
        let data: DeletedData = self.session.execute_data(self.session.delete(&url)).await?;
        tracing::info!(dip_id, deleted = data.deleted, "DIP deletion requested");
        Ok(data.deleted)
    }

    /// List the ingest reports created for a package, newest first
    ///
    /// Returns an empty list when the service has no reports for the package
    /// or does not know the package at all.
    pub async fn ingest_report_entries(&self, sip_id: &str) -> Result<Vec<IngestReportEntry>> {
        let url = format!(
            "{}/ingest/report/{}",
            self.base_url,
            encode_path_segment(sip_id)
        );

        let data: IngestReportListData = match self.session.execute_data(self.session.get(&url)).await
        {
            Ok(data) => data,
            Err(e) if e.is_not_found() => {
                tracing::debug!(sip_id, "no ingest reports");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut entries: Vec<IngestReportEntry> =
            data.results.into_iter().map(IngestReportEntry::from).collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(entries)
    }

    /// Fetch one ingest report
    ///
    /// Returns `None` if the service has no report for the identifiers.
    pub async fn ingest_report(
        &self,
        sip_id: &str,
        transfer_id: &str,
        file_type: ReportFileType,
    ) -> Result<Option<Bytes>> {
        let url = format!(
            "{}/ingest/report/{}/{}",
            self.base_url,
            encode_path_segment(sip_id),
            encode_path_segment(transfer_id)
        );
        let request = self
            .session
            .get(&url)
            .query(&[("type", file_type.as_str())]);

        match self.session.execute(request).await {
            Ok(response) => Ok(Some(response.bytes().await?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch the newest ingest report of a package
    pub async fn latest_ingest_report(
        &self,
        sip_id: &str,
        file_type: ReportFileType,
    ) -> Result<Option<Bytes>> {
        let entries = self.ingest_report_entries(sip_id).await?;
        let Some(latest) = entries.iter().max_by_key(|entry| entry.date) else {
            return Ok(None);
        };
        self.ingest_report(sip_id, &latest.transfer_id, file_type)
            .await
    }
}
