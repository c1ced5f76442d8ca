//! Terminal output helpers: tables, progress bars and report files

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use dpres_access_client::{IngestReportEntry, SearchEntry, Transfer};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct SearchRow<'a> {
    #[tabled(rename = "ID")]
    id: &'a str,
    #[tabled(rename = "Type")]
    pkg_type: &'a str,
    #[tabled(rename = "Creation date")]
    createdate: &'a str,
    #[tabled(rename = "Modification date")]
    lastmoddate: &'a str,
}

#[derive(Tabled)]
struct IngestReportRow<'a> {
    #[tabled(rename = "Transfer ID")]
    transfer_id: &'a str,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Status")]
    status: &'a str,
}

#[derive(Tabled)]
struct TransferRow<'a> {
    #[tabled(rename = "Transfer ID")]
    transfer_id: &'a str,
    #[tabled(rename = "Filename")]
    filename: &'a str,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "SIP ID")]
    sip_id: &'a str,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
}

fn render<T: Tabled>(rows: impl IntoIterator<Item = T>) -> String {
    Table::new(rows).with(Style::blank()).to_string()
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn search_table(entries: &[SearchEntry]) -> String {
    render(entries.iter().map(|entry| SearchRow {
        id: &entry.id,
        pkg_type: &entry.pkg_type,
        createdate: &entry.createdate,
        lastmoddate: entry.lastmoddate.as_deref().unwrap_or("N/A"),
    }))
}

pub fn ingest_report_table(entries: &[IngestReportEntry]) -> String {
    render(entries.iter().map(|entry| IngestReportRow {
        transfer_id: &entry.transfer_id,
        date: format_date(&entry.date),
        status: &entry.status,
    }))
}

pub fn transfer_table(transfers: &[Transfer]) -> String {
    render(transfers.iter().map(|transfer| TransferRow {
        transfer_id: &transfer.transfer_id,
        filename: &transfer.filename,
        status: transfer.status.to_string(),
        sip_id: transfer.sip_id.as_deref().unwrap_or("N/A"),
        timestamp: format_date(&transfer.timestamp),
    }))
}

/// Byte progress bar for transfers of a known size
pub fn progress_bar(total: u64, message: &str) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template(
            "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );
    bar.set_message(message.to_string());
    bar
}

/// Spinner shown while waiting on the service
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Save a report to `path`, or print it when no path is given
pub fn write_report(path: Option<&Path>, report: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, report)
                .with_context(|| format!("cannot write report to {}", path.display()))?;
            eprintln!("Report saved to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(report)?;
            if !report.ends_with(b"\n") {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use dpres_access_client::TransferStatus;

    #[test]
    fn search_table_marks_missing_modification_date() {
        let entries = vec![SearchEntry {
            id: "urn:uuid:spam".into(),
            pkg_type: "AIP".into(),
            createdate: "2021-08-01T08:59:05Z".into(),
            lastmoddate: None,
            location: None,
        }];

        let table = search_table(&entries);
        assert!(table.contains("Modification date"));
        assert!(table.contains("urn:uuid:spam"));
        assert!(table.contains("N/A"));
    }

    #[test]
    fn transfer_table_shows_status_and_sip() {
        let transfers = vec![Transfer {
            transfer_id: "sip.tar-0001".into(),
            filename: "sip.tar".into(),
            status: TransferStatus::InProgress,
            sip_id: None,
            timestamp: "2024-05-01T10:00:00Z".parse().unwrap(),
        }];

        let table = transfer_table(&transfers);
        assert!(table.contains("in_progress"));
        assert!(table.contains("2024-05-01 10:00:00"));
    }

    #[test]
    fn report_is_written_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.xml");
        write_report(Some(&path), b"<report/>").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"<report/>");
    }
}
