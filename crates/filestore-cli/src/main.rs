//! filestore: operator CLI for resources held in the object store.
//!
//! Configuration comes from FILESTORE_* environment variables (a .env file is read
//! when present). FILESTORE_DATABASE_URL and FILESTORE_S3_BUCKET are required.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use filestore_cli::{init_tracing, parse_params};
use filestore_core::{FileStoreConfig, NewResource, ResourcePatch, ScanStatus};
use filestore_db::{connect, run_migrations, PgMetadataStore};
use filestore_services::FileService;
use filestore_storage::{bytes_stream, create_client, create_named_client, ByteStream};
use futures::StreamExt;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

#[derive(Parser)]
#[command(name = "filestore", about = "Filestore operator CLI")]
struct Cli {
    /// Use a named object store client instead of the default one
    #[arg(long, global = true)]
    client: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Upload a local file as a new resource
    Upload {
        /// Path to the file to upload
        file: PathBuf,
        /// Resource id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        source_id: Option<String>,
        /// Stored name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Download a resource to a local file
    Download {
        id: String,
        /// Output path (defaults to the resource name)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Download several resources as one zip bundle
    Bulk {
        #[arg(required = true)]
        ids: Vec<String>,
        /// Bundle name; only .zip is supported
        #[arg(long, default_value = "bundle.zip")]
        name: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Issue a presigned download URL
    Presign {
        id: String,
        /// Expiry in seconds (configured default when omitted)
        #[arg(long)]
        expiry_secs: Option<u64>,
        /// Response override, e.g. response-content-type=text/plain
        #[arg(long = "param")]
        params: Vec<String>,
        /// Skip the antivirus check
        #[arg(long)]
        bypass_scan: bool,
    },
    /// Show object size, etag, and scan status
    Stat { id: String },
    /// Show metadata records
    Metadata {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Rename a resource
    Rename { id: String, name: String },
    /// Delete a resource and its blob
    Delete { id: String },
    /// Set the scan status recorded for a resource
    ScanStatus { id: String, status: String },
    /// Record a final antivirus verdict (CLEAN or INFECTED) on the object and the record
    Verdict { id: String, status: String },
    /// Repair resources left PENDING
    Reconcile {
        /// Single resource; sweeps stale PENDING rows when omitted
        id: Option<String>,
        #[arg(long, default_value = "3600")]
        older_than_secs: u64,
        #[arg(long, default_value = "100")]
        limit: i64,
    },
    /// List object names in a folder, or the whole bucket
    List { folder: Option<String> },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

async fn write_stream(path: &Path, mut stream: ByteStream) -> anyhow::Result<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

async fn build_service(config: &FileStoreConfig, client_name: Option<&str>) -> anyhow::Result<FileService> {
    let database_url = config
        .database_url
        .as_deref()
        .context("FILESTORE_DATABASE_URL must be set")?;
    let pool = connect(database_url, config.db_max_connections).await?;
    let metadata = Arc::new(PgMetadataStore::new(pool));

    let client = match client_name {
        Some(name) => create_named_client(config, name).await?,
        None => create_client(&config.store).await?,
    };
    Ok(FileService::new(metadata, client))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = FileStoreConfig::from_env().context("Failed to load configuration")?;
    config.validate()?;

    if let Commands::Migrate = cli.command {
        let database_url = config
            .database_url
            .as_deref()
            .context("FILESTORE_DATABASE_URL must be set")?;
        let pool = connect(database_url, config.db_max_connections).await?;
        run_migrations(&pool).await?;
        return print_json(&serde_json::json!({ "success": true }));
    }

    let service = build_service(&config, cli.client.as_deref()).await?;

    match cli.command {
        Commands::Migrate => {}
        Commands::Upload {
            file,
            id,
            source_id,
            name,
        } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .context("File name is not valid UTF-8; pass --name")?
                    .to_string(),
            };

            let mut request = NewResource::new(name).with_declared_size(data.len() as i64);
            request.resource_id = id;
            request.source_id = source_id;

            let resource_id = service
                .upload(request, bytes_stream(Bytes::from(data)))
                .await?;
            let record = service.get_metadata(&resource_id).await?;
            print_json(&record)?;
        }
        Commands::Download { id, out } => {
            let (metadata, stream) = service.download(&id).await?.into_parts();
            let path = out.unwrap_or_else(|| PathBuf::from(&metadata.name));
            let written = write_stream(&path, stream).await?;
            print_json(&serde_json::json!({
                "resourceId": metadata.resource_id,
                "path": path.display().to_string(),
                "sizeInBytes": written,
            }))?;
        }
        Commands::Bulk { ids, name, out } => {
            let (metadata, stream) = service.download_bulk(&ids, &name).await?.into_parts();
            let path = out.unwrap_or_else(|| PathBuf::from(&metadata.name));
            write_stream(&path, stream).await?;
            print_json(&metadata)?;
        }
        Commands::Presign {
            id,
            expiry_secs,
            params,
            bypass_scan,
        } => {
            let params = parse_params(&params)?;
            let url = service
                .presign(
                    &id,
                    expiry_secs.map(Duration::from_secs),
                    &params,
                    bypass_scan,
                )
                .await?;
            print_json(&serde_json::json!({ "url": url }))?;
        }
        Commands::Stat { id } => {
            print_json(&service.stat(&id).await?)?;
        }
        Commands::Metadata { ids } => {
            print_json(&service.get_metadata_many(&ids).await?)?;
        }
        Commands::Rename { id, name } => {
            print_json(&service.patch(&id, ResourcePatch::rename(name)).await?)?;
        }
        Commands::Delete { id } => {
            service.delete(&id).await?;
            print_json(
                &serde_json::json!({ "success": true, "message": format!("Resource {} deleted", id) }),
            )?;
        }
        Commands::ScanStatus { id, status } => {
            let status: ScanStatus = status.parse()?;
            service.update_scan_status(&id, status).await?;
            print_json(&service.get_metadata(&id).await?)?;
        }
        Commands::Verdict { id, status } => {
            let status: ScanStatus = status.parse()?;
            service.record_verdict(&id, status).await?;
            print_json(&service.get_metadata(&id).await?)?;
        }
        Commands::Reconcile {
            id,
            older_than_secs,
            limit,
        } => match id {
            Some(id) => print_json(&service.reconcile(&id).await?)?,
            None => {
                let report = service
                    .reconcile_pending(Duration::from_secs(older_than_secs), limit)
                    .await?;
                print_json(&serde_json::json!({
                    "completed": report.completed,
                    "missing": report.missing,
                    "failed": report.failed,
                }))?;
            }
        },
        Commands::List { folder } => {
            let names = match folder {
                Some(folder) => service.list_folder(&folder).await?,
                None => service.list_bucket().await?,
            };
            print_json(&names)?;
        }
    }

    Ok(())
}
