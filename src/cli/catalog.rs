//! Catalog search and DIP commands

use super::Context;
use super::output::{progress_bar, search_table, spinner};
use anyhow::{Context as _, Result, bail};
use dpres_access_client::{ArchiveFormat, PollSchedule};
use indicatif::HumanBytes;
use std::path::PathBuf;
use tokio::io::{AsyncWriteExt, BufWriter};

pub async fn search(ctx: &Context, page: u32, limit: u32, query: &str) -> Result<()> {
    let client = ctx.access_client()?;
    let result = client.search(page, limit, Some(query)).await?;

    let more = if result.next_url.is_some() {
        " More page(s) are available."
    } else {
        ""
    };
    println!(
        "Displaying page {} with {} results.{}\n",
        page,
        result.results.len(),
        more
    );
    println!("{}", search_table(&result.results));
    Ok(())
}

pub async fn download(
    ctx: &Context,
    aip_id: &str,
    path: Option<PathBuf>,
    format: ArchiveFormat,
    catalog: Option<&str>,
) -> Result<()> {
    let client = ctx.access_client()?;
    let path = path.unwrap_or_else(|| PathBuf::from(format!("{aip_id}.{format}")));

    let mut dip = client.create_dip_request(aip_id, format, catalog).await?;

    let waiting = spinner("DIP has been scheduled for creation, polling until it is ready...");
    let ready = dip.wait_until_ready(PollSchedule::new(), None).await;
    waiting.finish_and_clear();
    ready?;

    println!("DIP is available, downloading to {}...", path.display());
    let download = dip.streamed_download().await?;
    let bar = progress_bar(
        download.size(),
        &format!("Downloading ({})", HumanBytes(download.size())),
    );

    let file = tokio::fs::File::create(&path)
        .await
        .with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = BufWriter::with_capacity(dpres_access_client::v2::DOWNLOAD_CHUNK_SIZE, file);
    while let Some(chunk) = download.next_chunk().await? {
        writer.write_all(&chunk).await?;
        bar.inc(chunk.len() as u64);
    }
    writer.flush().await?;
    bar.finish();

    println!("Done!");
    Ok(())
}

pub async fn delete(ctx: &Context, dip_id: &str) -> Result<()> {
    let client = ctx.access_client()?;
    if !client.delete_dissemination(dip_id).await? {
        bail!("DIP {dip_id} was not deleted");
    }
    println!("DIP {dip_id} deleted");
    Ok(())
}
