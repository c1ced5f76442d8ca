//! Upload and transfer commands

use super::Context;
use super::output::{progress_bar, spinner, transfer_table, write_report};
use anyhow::{Result, bail};
use dpres_access_client::{ReportFileType, TransferStatus, UploadOptions};
use std::path::{Path, PathBuf};

pub async fn upload(ctx: &Context, path: &Path, options: UploadOptions, wait: bool) -> Result<()> {
    let client = ctx.transfer_client()?;
    let mut uploader = client.uploader(path, options).await?;

    let bar = progress_bar(uploader.size(), "Uploading");
    bar.set_position(uploader.offset());
    while !uploader.is_complete() {
        let before = uploader.offset();
        let offset = uploader.upload_chunk().await?;
        if offset == before {
            bar.abandon();
            bail!("service accepted no data at offset {before}");
        }
        bar.set_position(offset);
    }
    bar.finish();

    let Some(transfer_id) = uploader.transfer_id().map(str::to_string) else {
        bail!("upload finished without a transfer identifier");
    };
    println!("Upload finished, transfer ID: {transfer_id}");

    if !wait {
        return Ok(());
    }

    let waiting = spinner("Waiting for the package to be processed...");
    let processed = client.poll_until_processed(&transfer_id, None).await;
    waiting.finish_and_clear();
    let transfer = processed?;

    match transfer.status {
        TransferStatus::Accepted => println!(
            "Package accepted for preservation, SIP ID: {}",
            transfer.sip_id.as_deref().unwrap_or("N/A")
        ),
        _ => println!(
            "Package {}; see `access-client transfer get-report {}`",
            transfer.status, transfer_id
        ),
    }
    Ok(())
}

pub async fn info(ctx: &Context, transfer_id: &str) -> Result<()> {
    let client = ctx.transfer_client()?;
    let transfer = client.get_transfer(transfer_id).await?;
    println!("{}", transfer_table(std::slice::from_ref(&transfer)));
    Ok(())
}

pub async fn get_report(
    ctx: &Context,
    transfer_id: &str,
    file_type: ReportFileType,
    path: Option<PathBuf>,
) -> Result<()> {
    let client = ctx.transfer_client()?;
    let report = client.validation_report(transfer_id, file_type).await?;
    write_report(path.as_deref(), &report)
}

pub async fn delete(ctx: &Context, transfer_id: &str) -> Result<()> {
    let client = ctx.transfer_client()?;
    if !client.delete_transfer(transfer_id).await? {
        bail!("Transfer {transfer_id} not found");
    }
    println!("Transfer {transfer_id} deleted");
    Ok(())
}

pub async fn list(
    ctx: &Context,
    status: Option<TransferStatus>,
    page: u32,
    limit: u32,
) -> Result<()> {
    let client = ctx.transfer_client()?;
    let list = client.list_transfers(status, page, limit).await?;

    println!(
        "Displaying page {} with {} transfers.",
        page,
        list.transfers.len()
    );
    if let Some(prev) = list.prev_page {
        println!("Previous page: {prev}");
    }
    if let Some(next) = list.next_page {
        println!("Next page: {next}");
    }
    println!();
    println!("{}", transfer_table(&list.transfers));
    Ok(())
}
