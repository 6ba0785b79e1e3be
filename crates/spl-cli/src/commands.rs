use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use spl_store::{ChunkStore, DirectoryChunkStore};
use spl_transfer::{Transfer, TransferError};
use spl_types::{format_bytes_count, Manifest, TransferConfig};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::*;
use crate::progress;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let format = cli.format;
    match cli.command {
        Command::Upload(args) => cmd_upload(args, config, format).await,
        Command::Download(args) => cmd_download(args, config, format).await,
        Command::Inspect(args) => cmd_inspect(args, format).await,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TransferConfig> {
    match path {
        Some(path) => TransferConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(TransferConfig::default()),
    }
}

/// A manifest file path, or else a share string.
fn read_manifest(source: &str) -> anyhow::Result<Manifest> {
    let path = Path::new(source);
    if path.is_file() {
        return Manifest::load(path).with_context(|| format!("reading manifest {}", path.display()));
    }
    Manifest::from_share_string(source).context("argument is neither a manifest file nor a share string")
}

fn classified(err: TransferError) -> anyhow::Error {
    let class = err.class();
    anyhow::Error::new(err).context(format!("{class} error"))
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling transfer");
            token.cancel();
        }
    });
}

fn open_store(root: &Path) -> anyhow::Result<Arc<DirectoryChunkStore>> {
    let store = DirectoryChunkStore::open(root)
        .with_context(|| format!("opening chunk store {}", root.display()))?;
    Ok(Arc::new(store))
}

async fn cmd_upload(args: UploadArgs, mut config: TransferConfig, format: OutputFormat) -> anyhow::Result<()> {
    if let Some(max) = args.max_chunk_size {
        config.max_chunk_size = max;
    }
    if let Some(size) = args.buffer_size {
        config.buffer_size = size;
    }
    let transfer = Transfer::new(open_store(&args.store)?, config)
        .map_err(classified)?
        .with_progress(progress::reporter());
    cancel_on_ctrl_c(transfer.cancellation_token());

    let manifest = transfer.upload(&args.path).await.map_err(classified)?;
    if let Some(path) = &args.manifest {
        manifest
            .save(path)
            .with_context(|| format!("writing manifest {}", path.display()))?;
    }

    match format {
        OutputFormat::Text => {
            eprintln!(
                "{} Stored {} in {} chunk(s)",
                "✓".green().bold(),
                manifest.name.bold(),
                manifest.chunk_count()
            );
            println!("{}", manifest.to_share_string());
        }
        OutputFormat::Json => println!("{}", manifest.to_json()?),
    }
    Ok(())
}

async fn cmd_download(args: DownloadArgs, mut config: TransferConfig, format: OutputFormat) -> anyhow::Result<()> {
    let manifest = read_manifest(&args.source)?;
    config.overwrite |= args.overwrite;
    if let Some(size) = args.buffer_size {
        config.buffer_size = size;
    }
    fs::create_dir_all(&args.path)
        .with_context(|| format!("creating destination {}", args.path.display()))?;

    let transfer = Transfer::new(open_store(&args.store)?, config)
        .map_err(classified)?
        .with_progress(progress::reporter());
    cancel_on_ctrl_c(transfer.cancellation_token());

    let summary = transfer.download(&manifest, &args.path).await.map_err(classified)?;
    match format {
        OutputFormat::Text => println!(
            "{} Restored {} ({} files, {} directories, {})",
            "✓".green().bold(),
            summary.path.display().to_string().bold(),
            summary.files,
            summary.directories,
            format_bytes_count(summary.bytes as f64)
        ),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "path": summary.path,
                "files": summary.files,
                "directories": summary.directories,
                "bytes": summary.bytes,
                "stream_bytes": summary.stream_bytes,
            })
        ),
    }
    Ok(())
}

async fn cmd_inspect(args: InspectArgs, format: OutputFormat) -> anyhow::Result<()> {
    let manifest = read_manifest(&args.source)?;
    let mut missing = Vec::new();
    if let Some(root) = &args.store {
        let store = open_store(root)?;
        for record in &manifest.chunks {
            if !store.exists(&record.handle).await? {
                missing.push(record.handle.clone());
            }
        }
    }

    match format {
        OutputFormat::Text => {
            println!("{}", manifest.name.bold());
            println!(
                "  {} chunk(s), {} total, created {}",
                manifest.chunk_count(),
                format_bytes_count(manifest.total_size as f64),
                manifest.created_at.to_rfc3339()
            );
            for (index, record) in manifest.chunks.iter().enumerate() {
                let digest = short_digest(record.digest.as_deref());
                let status = match &args.store {
                    None => String::new(),
                    Some(_) if missing.contains(&record.handle) => format!("  {}", "missing".red()),
                    Some(_) => format!("  {}", "ok".green()),
                };
                println!(
                    "  {:>4}  {}  {:>8}  {}{}",
                    index,
                    record.handle.to_string().yellow(),
                    format_bytes_count(record.size as f64),
                    digest.dimmed(),
                    status
                );
            }
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "manifest": manifest, "missing": missing })
        ),
    }

    if !missing.is_empty() {
        anyhow::bail!("{} of {} chunks missing from the store", missing.len(), manifest.chunk_count());
    }
    Ok(())
}

/// First twelve bytes of a digest for display. Manifests are user-editable,
/// so a cut that would split a character falls back to the whole value.
fn short_digest(digest: Option<&str>) -> &str {
    digest.map_or("-", |d| d.get(..12).unwrap_or(d))
}
