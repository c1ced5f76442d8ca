//! Command definitions and dispatch

mod catalog;
mod ingest;
mod output;
mod transfer;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use dpres_access_client::config::{user_config_path, write_default_config};
use dpres_access_client::v3::DEFAULT_CHUNK_SIZE;
use dpres_access_client::v3::url_store::DEFAULT_CACHE_FILE;
use dpres_access_client::{
    AccessClient, ArchiveFormat, Config, ConfigSources, ReportFileType, TransferClient,
    TransferStatus,
};
use std::path::PathBuf;

/// Search, download and upload packages in the digital preservation service.
#[derive(Parser)]
#[command(name = "access-client", version, about)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file to use instead of the standard locations
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List and search for preserved packages.
    Search {
        /// Page to retrieve; `--limit` sets the entries per page.
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Maximum amount of results per page.
        #[arg(long, default_value_t = 1000)]
        limit: u32,

        /// Search query in the Solr dialect of the Lucene syntax.
        #[arg(long, default_value = "pkg_type:AIP")]
        query: String,
    },

    /// Download or delete disseminated packages.
    Dip {
        #[command(subcommand)]
        command: DipCommand,
    },

    /// Ingest reports of submitted packages.
    IngestReport {
        #[command(subcommand)]
        command: IngestReportCommand,
    },

    /// Upload a package for preservation.
    Upload {
        /// Package file (.zip, .tar, .tar.gz or .tar.bz2).
        path: PathBuf,

        /// Bytes sent per request.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: u64,

        /// Resume an interrupted upload of the same file.
        #[arg(long)]
        enable_resumable: bool,

        /// Where unfinished uploads are remembered.
        #[arg(long, default_value = DEFAULT_CACHE_FILE)]
        resumable_cache: PathBuf,

        /// Wait until the uploaded package has been processed.
        #[arg(long)]
        wait: bool,
    },

    /// Inspect and manage uploaded transfers.
    Transfer {
        #[command(subcommand)]
        command: TransferCommand,
    },

    /// Write the default configuration file.
    WriteConfig {
        /// Target file; defaults to the per-user configuration path.
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum DipCommand {
    /// Disseminate a preserved package and download it.
    Download {
        /// Identifier of the preserved package.
        aip_id: String,

        /// Output file; defaults to `<aip_id>.<format>` in the working directory.
        #[arg(long)]
        path: Option<PathBuf>,

        /// Archive format of the download.
        #[arg(long, default_value = "zip")]
        archive_format: ArchiveFormat,

        /// Schema catalog for the generated archive; defaults to the newest.
        #[arg(long)]
        catalog: Option<String>,
    },

    /// Delete a disseminated package from the service.
    Delete {
        /// Identifier of the disseminated package.
        dip_id: String,
    },
}

#[derive(Subcommand)]
pub enum IngestReportCommand {
    /// List the ingest reports of a package.
    List {
        /// Identifier of the submitted package.
        sip_id: String,
    },

    /// Print or save one ingest report.
    Get {
        /// Identifier of the submitted package.
        sip_id: String,

        /// Transfer whose report to fetch.
        #[arg(long, conflicts_with = "latest", required_unless_present = "latest")]
        transfer_id: Option<String>,

        /// Fetch the newest report.
        #[arg(long)]
        latest: bool,

        /// Report format.
        #[arg(long, default_value = "html")]
        file_type: ReportFileType,

        /// Save to this file instead of printing.
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum TransferCommand {
    /// Show the status of a transfer.
    Info {
        /// Transfer identifier.
        transfer_id: String,
    },

    /// Print or save the validation report of a transfer.
    GetReport {
        /// Transfer identifier.
        transfer_id: String,

        /// Report format.
        #[arg(long, default_value = "html")]
        file_type: ReportFileType,

        /// Save to this file instead of printing.
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Delete a transfer.
    Delete {
        /// Transfer identifier.
        transfer_id: String,
    },

    /// List transfers.
    List {
        /// Only show transfers in this state.
        #[arg(long)]
        status: Option<TransferStatus>,

        /// Page to retrieve.
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Maximum amount of transfers per page.
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },
}

/// State shared by one command invocation
pub struct Context {
    config: Config,
}

impl Context {
    /// Resolve configuration, preferring an explicit file
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut sources = ConfigSources::from_env();
        if let Some(path) = config_path {
            sources.override_path = Some(path);
        }
        Ok(Self {
            config: Config::load_with(&sources)?,
        })
    }

    pub fn access_client(&self) -> Result<AccessClient> {
        Ok(AccessClient::new(&self.config)?)
    }

    pub fn transfer_client(&self) -> Result<TransferClient> {
        Ok(TransferClient::new(&self.config)?)
    }
}

/// Run one command, giving up early on Ctrl+C
pub async fn run(cli: Cli) -> Result<()> {
    if let Commands::WriteConfig { path } = &cli.command {
        return write_config(path.clone());
    }

    let ctx = Context::load(cli.config)?;
    tokio::select! {
        result = dispatch(&ctx, cli.command) => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Received Ctrl+C signal");
            Err(anyhow!("interrupted"))
        }
    }
}

async fn dispatch(ctx: &Context, command: Commands) -> Result<()> {
    match command {
        Commands::Search { page, limit, query } => catalog::search(ctx, page, limit, &query).await,
        Commands::Dip { command } => match command {
            DipCommand::Download {
                aip_id,
                path,
                archive_format,
                catalog,
            } => {
                catalog::download(ctx, &aip_id, path, archive_format, catalog.as_deref()).await
            }
            DipCommand::Delete { dip_id } => catalog::delete(ctx, &dip_id).await,
        },
        Commands::IngestReport { command } => match command {
            IngestReportCommand::List { sip_id } => ingest::list(ctx, &sip_id).await,
            IngestReportCommand::Get {
                sip_id,
                transfer_id,
                latest: _,
                file_type,
                path,
            } => ingest::get(ctx, &sip_id, transfer_id.as_deref(), file_type, path).await,
        },
        Commands::Upload {
            path,
            chunk_size,
            enable_resumable,
            resumable_cache,
            wait,
        } => {
            let options = dpres_access_client::UploadOptions {
                chunk_size,
                resumable: enable_resumable,
                cache_path: resumable_cache,
            };
            transfer::upload(ctx, &path, options, wait).await
        }
        Commands::Transfer { command } => match command {
            TransferCommand::Info { transfer_id } => transfer::info(ctx, &transfer_id).await,
            TransferCommand::GetReport {
                transfer_id,
                file_type,
                path,
            } => transfer::get_report(ctx, &transfer_id, file_type, path).await,
            TransferCommand::Delete { transfer_id } => transfer::delete(ctx, &transfer_id).await,
            TransferCommand::List {
                status,
                page,
                limit,
            } => transfer::list(ctx, status, page, limit).await,
        },
        Commands::WriteConfig { path } => write_config(path),
    }
}

fn write_config(path: Option<PathBuf>) -> Result<()> {
    let path = path
        .or_else(user_config_path)
        .ok_or_else(|| anyhow!("no configuration directory found, pass --path"))?;

    if write_default_config(&path)? {
        println!("Configuration file written to {}", path.display());
    } else {
        println!("Configuration file already exists at {}", path.display());
    }
    Ok(())
}

/// Render an error for the terminal
///
/// Service errors show the message from the response body when it has one.
pub fn error_message(error: &anyhow::Error) -> String {
    match error.downcast_ref::<dpres_access_client::Error>() {
        Some(e) => e.api_message(),
        None => format!("{error:#}"),
    }
}
