//! Core types for dpres-access-client
//!
//! Wire payloads are decoded into these types at the boundary. Boolean-like
//! fields arrive as the strings `"true"`/`"false"` and are converted to `bool`
//! here so the rest of the crate never sees them as strings.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Response envelope used by every JSON endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    /// Discriminator, "success" for successful responses
    pub status: String,
    /// The actual payload
    pub data: T,
}

/// Archive format of a disseminated package
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    /// ZIP archive (default)
    #[default]
    Zip,
    /// Uncompressed tar archive
    Tar,
}

impl ArchiveFormat {
    /// Value sent to the service and used as file extension
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
        }
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArchiveFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar" => Ok(ArchiveFormat::Tar),
            other => Err(ValidationError::InvalidArchiveFormat(other.to_string())),
        }
    }
}

/// File type of an ingest or validation report
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFileType {
    /// Machine-readable XML report (default)
    #[default]
    Xml,
    /// Human-readable HTML report
    Html,
}

impl ReportFileType {
    /// Value of the `type` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFileType::Xml => "xml",
            ReportFileType::Html => "html",
        }
    }
}

impl std::fmt::Display for ReportFileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportFileType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xml" => Ok(ReportFileType::Xml),
            "html" => Ok(ReportFileType::Html),
            other => Err(ValidationError::InvalidReportType(other.to_string())),
        }
    }
}

/// Relative links to neighbouring pages of a list endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    /// Previous page, relative to the host
    #[serde(default, alias = "previous")]
    pub prev: Option<String>,
    /// Next page, relative to the host
    #[serde(default)]
    pub next: Option<String>,
}

/// One package in a catalog search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEntry {
    /// Package identifier
    pub id: String,
    /// Package type, e.g. "AIP"
    pub pkg_type: String,
    /// Creation date as reported by the service
    pub createdate: String,
    /// Last modification date, if the package was ever modified
    #[serde(default)]
    pub lastmoddate: Option<String>,
    /// Relative location of the package
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchData {
    pub results: Vec<SearchEntry>,
    #[serde(default)]
    pub links: Links,
}

/// One page of catalog search results
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Matching packages
    pub results: Vec<SearchEntry>,
    /// Absolute URL of the previous page
    pub prev_url: Option<String>,
    /// Absolute URL of the next page
    pub next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DisseminateData {
    /// Relative URL of the created dissemination job
    pub disseminated: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DisseminationStatusData {
    #[serde(deserialize_with = "str_bool")]
    pub complete: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeletedData {
    #[serde(deserialize_with = "str_bool")]
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IngestReportListData {
    pub results: Vec<IngestReportWireEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IngestReportWireEntry {
    pub id: String,
    pub date: DateTime<Utc>,
    pub status: String,
}

/// An ingest report available for a submitted package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReportEntry {
    /// Transfer that produced the report
    pub transfer_id: String,
    /// When the report was created
    pub date: DateTime<Utc>,
    /// Ingest outcome, e.g. "accepted" or "rejected"
    pub status: String,
}

impl From<IngestReportWireEntry> for IngestReportEntry {
    fn from(entry: IngestReportWireEntry) -> Self {
        Self {
            transfer_id: entry.id,
            date: entry.date,
            status: entry.status,
        }
    }
}

/// Processing state of an uploaded transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Upload still in progress
    Uploading,
    /// Uploaded and being validated
    InProgress,
    /// Validated and accepted for preservation
    Accepted,
    /// Rejected by validation
    Rejected,
}

impl TransferStatus {
    /// Accepted and rejected transfers no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Accepted | TransferStatus::Rejected)
    }

    /// Status as used in query parameters
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Uploading => "uploading",
            TransferStatus::InProgress => "in_progress",
            TransferStatus::Accepted => "accepted",
            TransferStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(TransferStatus::Uploading),
            "in_progress" => Ok(TransferStatus::InProgress),
            "accepted" => Ok(TransferStatus::Accepted),
            "rejected" => Ok(TransferStatus::Rejected),
            other => Err(format!("unknown transfer status '{other}'")),
        }
    }
}

/// Service-side record of an uploaded package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Transfer identifier
    #[serde(alias = "id")]
    pub transfer_id: String,
    /// Name of the uploaded file
    pub filename: String,
    /// Processing state
    pub status: TransferStatus,
    /// Package identifier, assigned once the package has been identified
    #[serde(default)]
    pub sip_id: Option<String>,
    /// Time of the last status change
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransferListData {
    pub results: Vec<Transfer>,
    #[serde(default)]
    pub links: Links,
}

/// One page of transfers
#[derive(Debug, Clone)]
pub struct TransferList {
    /// Transfers on this page
    pub transfers: Vec<Transfer>,
    /// Page number of the previous page, if any
    pub prev_page: Option<u32>,
    /// Page number of the next page, if any
    pub next_page: Option<u32>,
}

/// Deserialize the service's string-typed booleans
///
/// Accepts `"true"`/`"false"` (any case) and native JSON booleans.
pub(crate) fn str_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(value) => Ok(value),
        Raw::Str(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Raw::Str(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        Raw::Str(other) => Err(serde::de::Error::custom(format!(
            "expected \"true\" or \"false\", got \"{other}\""
        ))),
    }
}
