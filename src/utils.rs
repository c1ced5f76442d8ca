//! Utility functions for URLs and local files

use crate::error::{Result, ValidationError};
use std::path::Path;

/// Archive suffixes accepted for upload
pub const ACCEPTED_SUFFIXES: &[&str] = &[".zip", ".tar", ".tar.gz", ".tar.bz2"];

/// Percent-encode a value for use as a single URL path segment
///
/// Every reserved character is encoded, including `/` and `:`.
///
/// ```
/// use dpres_access_client::utils::encode_path_segment;
///
/// assert_eq!(encode_path_segment("doi:fake_id"), "doi%3Afake_id");
/// ```
pub fn encode_path_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Make a host-relative link absolute
pub fn absolute_url(host: &str, link: &str) -> String {
    format!("{}{}", host.trim_end_matches('/'), link)
}

/// Last non-empty path segment of a URL or path
///
/// ```
/// use dpres_access_client::utils::last_path_segment;
///
/// assert_eq!(
///     last_path_segment("/api/2.0/urn:uuid:c/disseminated/spam_dip"),
///     Some("spam_dip")
/// );
/// ```
pub fn last_path_segment(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

/// Extract the `page` query parameter from a relative or absolute link
pub fn page_from_link(link: &str) -> Option<u32> {
    let base = url::Url::parse("http://localhost/").ok()?;
    let parsed = base.join(link).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
}

/// Returns true if the file name ends with one of [`ACCEPTED_SUFFIXES`]
#[must_use]
pub fn has_accepted_suffix(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

    ACCEPTED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Check that a file can be uploaded and return its size
///
/// The file must exist, be non-empty and carry an accepted archive suffix.
pub async fn validate_upload_file(path: &Path) -> Result<u64> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Err(ValidationError::FileNotFound(path.to_path_buf()).into()),
    };

    if !has_accepted_suffix(path) {
        return Err(ValidationError::UnsupportedSuffix {
            path: path.to_path_buf(),
            expected: ACCEPTED_SUFFIXES.join(", "),
        }
        .into());
    }

    if metadata.len() == 0 {
        return Err(ValidationError::EmptyFile(path.to_path_buf()).into());
    }

    Ok(metadata.len())
}
