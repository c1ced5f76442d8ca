//! Ingest report commands

use super::Context;
use super::output::{ingest_report_table, write_report};
use anyhow::{Result, bail};
use dpres_access_client::ReportFileType;
use std::path::PathBuf;

pub async fn list(ctx: &Context, sip_id: &str) -> Result<()> {
    let client = ctx.access_client()?;
    let entries = client.ingest_report_entries(sip_id).await?;
    if entries.is_empty() {
        println!("No ingest reports found for {sip_id}");
        return Ok(());
    }

    println!("{}", ingest_report_table(&entries));
    Ok(())
}

/// Fetch the report of one transfer, or the newest one when `transfer_id` is unset
pub async fn get(
    ctx: &Context,
    sip_id: &str,
    transfer_id: Option<&str>,
    file_type: ReportFileType,
    path: Option<PathBuf>,
) -> Result<()> {
    let client = ctx.access_client()?;
    let report = match transfer_id {
        Some(transfer_id) => client.ingest_report(sip_id, transfer_id, file_type).await?,
        None => client.latest_ingest_report(sip_id, file_type).await?,
    };

    let Some(report) = report else {
        bail!("No ingest report found for {sip_id}");
    };
    write_report(path.as_deref(), &report)
}
