//! gphotos-upload entry point.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use gphotos_transfer::SpeedCalculator;
use gphotos_uploader::{
    FileSessionStore, Fingerprint, SessionStore, UploadError, UploadEvent, Uploader,
    UploaderConfig,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "gphotos-upload")]
#[command(about = "Upload media to Google Photos, resuming interrupted uploads")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, global = true, env = "GPHOTOS_UPLOAD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files and print one upload token per file
    Upload(UploadArgs),
    /// Show the stored session of each file
    Status {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Discard the stored session of each file
    Abandon {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List every stored session
    Sessions,
}

#[derive(Args)]
struct UploadArgs {
    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// OAuth2 access token with the photoslibrary.appendonly scope
    #[arg(long, env = "GPHOTOS_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    /// Bytes per chunk (overrides config)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Send each file in a single request without a session
    #[arg(long)]
    no_resume: bool,

    /// Content type for every file (guessed from the extension otherwise)
    #[arg(long)]
    content_type: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries tokens and status lines.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Upload(args) => upload(&config, args).await,
        Commands::Status { files } => status(&config, &files).await,
        Commands::Abandon { files } => abandon(&config, &files).await,
        Commands::Sessions => list_sessions(&config).await,
    }
}

fn authorized_client(access_token: &str) -> anyhow::Result<reqwest::Client> {
    let mut value = HeaderValue::from_str(&format!("Bearer {access_token}"))
        .context("access token is not a valid header value")?;
    value.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);

    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(30))
        .build()?)
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<FileSessionStore>> {
    let dir = config.session_dir();
    let store = FileSessionStore::open(&dir)
        .await
        .with_context(|| format!("opening session directory {}", dir.display()))?;
    Ok(Arc::new(store))
}

/// Uploader used only for session bookkeeping; it never sends requests.
async fn session_uploader(config: &AppConfig) -> anyhow::Result<Uploader> {
    let store: Arc<dyn SessionStore> = open_store(config).await?;
    let uploader_config = UploaderConfig {
        endpoint: config.endpoint.clone(),
        chunk_size: config.chunk_size,
        ..UploaderConfig::resumable(store)
    };
    Ok(Uploader::new(uploader_config, reqwest::Client::new())?)
}

fn content_type_for(path: &Path, explicit: Option<&str>) -> String {
    match explicit {
        Some(ct) => ct.to_string(),
        None => mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

async fn upload(config: &AppConfig, args: UploadArgs) -> anyhow::Result<()> {
    let store: Arc<dyn SessionStore> = open_store(config).await?;
    let uploader_config = UploaderConfig {
        resumable: config.resumable && !args.no_resume,
        store: Some(store),
        endpoint: config.endpoint.clone(),
        chunk_size: args.chunk_size.unwrap_or(config.chunk_size),
    };

    let (tx, rx) = mpsc::channel(64);
    let uploader = Uploader::new(uploader_config, authorized_client(&args.access_token)?)?
        .with_events(tx);
    let reporter = spawn_progress_reporter(rx);

    let cancel = uploader.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, progress so far is kept");
            cancel.cancel();
        }
    });

    let mut failed = 0usize;
    for path in &args.files {
        let content_type = content_type_for(path, args.content_type.as_deref());
        match uploader.upload_file(path, &content_type).await {
            Ok(token) => println!("{}\t{token}", path.display()),
            Err(UploadError::Purge { token, source }) => {
                warn!(path = %path.display(), error = %source, "uploaded, but the session file was left behind");
                println!("{}\t{token}", path.display());
            }
            Err(e) => {
                failed += 1;
                if e.is_resumable() {
                    warn!(path = %path.display(), error = %e, "upload interrupted, run again to resume");
                } else {
                    error!(path = %path.display(), error = %e, "upload failed");
                }
                if matches!(e, UploadError::Cancelled) {
                    break;
                }
            }
        }
    }

    // Closing the event channel ends the reporter.
    drop(uploader);
    if let Err(e) = reporter.await {
        warn!(error = %e, "progress reporter stopped");
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} uploads did not complete", args.files.len());
    }
    Ok(())
}

fn spawn_progress_reporter(mut rx: mpsc::Receiver<UploadEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let speed = SpeedCalculator::default();
        let mut last_offset = 0u64;

        while let Some(event) = rx.recv().await {
            match event {
                UploadEvent::Negotiated { .. } => {
                    speed.reset();
                    last_offset = 0;
                }
                UploadEvent::Resumed { offset, .. } => {
                    speed.reset();
                    last_offset = offset;
                }
                UploadEvent::Progress {
                    fingerprint,
                    confirmed_offset,
                    total_size,
                } => {
                    speed.add_sample(confirmed_offset.saturating_sub(last_offset));
                    last_offset = confirmed_offset;

                    let percent = confirmed_offset as f64 * 100.0 / total_size.max(1) as f64;
                    let eta = speed.eta(total_size.saturating_sub(confirmed_offset));
                    info!(
                        %fingerprint,
                        percent = %format!("{percent:.1}"),
                        kib_per_sec = %format!("{:.0}", speed.bytes_per_second() / 1024.0),
                        eta_secs = eta.map(|d| d.as_secs()),
                        "progress"
                    );
                }
                UploadEvent::Completed { .. } | UploadEvent::Failed { .. } => {}
            }
        }
    })
}

async fn status(config: &AppConfig, files: &[PathBuf]) -> anyhow::Result<()> {
    let uploader = session_uploader(config).await?;
    for path in files {
        let (fingerprint, size) = Fingerprint::for_file(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        match uploader.status(&fingerprint).await? {
            Some(session) => {
                let state = if session.can_resume(size) {
                    "resumable"
                } else {
                    "stale"
                };
                println!(
                    "{}\t{}/{} bytes\t{state}\tupdated {}",
                    path.display(),
                    session.confirmed_offset(),
                    session.total_size(),
                    session.updated_at().to_rfc3339()
                );
            }
            None => println!("{}\tno stored session", path.display()),
        }
    }
    Ok(())
}

async fn abandon(config: &AppConfig, files: &[PathBuf]) -> anyhow::Result<()> {
    let uploader = session_uploader(config).await?;
    for path in files {
        let (fingerprint, _) = Fingerprint::for_file(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        uploader.abandon(&fingerprint).await?;
        println!("{}\tabandoned", path.display());
    }
    Ok(())
}

async fn list_sessions(config: &AppConfig) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    for session in store.sessions().await? {
        println!(
            "{}\t{}/{} bytes\t{}\tcreated {}",
            session.fingerprint(),
            session.confirmed_offset(),
            session.total_size(),
            session.content_type(),
            session.created_at().to_rfc3339()
        );
    }
    Ok(())
}
