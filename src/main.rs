//! CLI entry point for the Assemblyline client.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use assemblyline_client::config::{self, load_default_file_config, load_file_config};
use assemblyline_client::{
    AssemblylineApi, AssemblylineClient, AuthMethod, ClientConfig, DownloadParams, Encoding,
    FileConfig, HashSearchOptions, IngestOptions, IngestRequest, SubmissionSource, SubmitOptions,
    SubmitRequest,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info};

mod cli;

use cli::{Args, Command, SourceArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(command = ?args.command, "CLI arguments parsed");

    let config = resolve_config(&args)?;
    let mut client =
        AssemblylineClient::from_config(&config).context("failed to create Assemblyline client")?;
    if let Some(token) = &args.bearer_token {
        client = client.with_bearer_token(token.clone());
    }
    info!(url = %client.base_url(), user = client.username(), "Assemblyline client ready");

    run(&client, args.command, args.quiet).await
}

fn resolve_config(args: &Args) -> Result<ClientConfig> {
    let file_config = match &args.config {
        Some(path) => load_file_config(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?,
        None => load_default_file_config()
            .context("failed to load default config file")?
            .unwrap_or_default(),
    };

    let auth_method = if args.apikey.is_some() {
        Some(AuthMethod::Apikey)
    } else if args.password.is_some() {
        Some(AuthMethod::Password)
    } else {
        None
    };
    let flags = FileConfig {
        url: args.url.clone(),
        username: args.user.clone(),
        auth_method,
        apikey: args.apikey.clone(),
        password: args.password.clone(),
        ..FileConfig::default()
    };

    let merged = file_config.overlay(FileConfig::from_env()).overlay(flags);
    ClientConfig::resolve(merged).with_context(|| {
        let path = config::resolve_default_config_path()
            .map_or_else(|| "<unset>".to_string(), |path| path.display().to_string());
        format!("incomplete client configuration (default config file: {path})")
    })
}

async fn run(client: &AssemblylineClient, command: Command, quiet: bool) -> Result<()> {
    match command {
        Command::Login => print_json(&client.login().await?),
        Command::Submission { sid, full, tree } => {
            if full {
                print_json(&client.submission_full(&sid).await?)
            } else if tree {
                print_json(&client.submission_tree(&sid).await?)
            } else {
                print_json(&client.submission(&sid).await?)
            }
        }
        Command::FileInfo { sha256 } => print_json(&client.file_info(&sha256).await?),
        Command::HashSearch {
            hash,
            db,
            max_timeout,
        } => {
            let options = HashSearchOptions {
                data_sources: db,
                max_timeout,
            };
            print_json(&client.hash_search(&hash, &options).await?)
        }
        Command::Download {
            sha256,
            raw,
            name,
            sid,
            output,
        } => {
            let params = DownloadParams {
                encoding: if raw { Encoding::Raw } else { Encoding::Cart },
                name,
                sid,
            };
            let output = output.unwrap_or_else(|| default_output_path(&sha256, params.encoding));
            download(client, &sha256, &params, output, quiet).await
        }
        Command::Ingest {
            source,
            notification_queue,
        } => {
            let request = IngestRequest {
                source: read_source(source).await?,
                options: IngestOptions {
                    notification_queue,
                    ..IngestOptions::default()
                },
            };
            print_json(&client.ingest(&request).await?)
        }
        Command::Submit { source } => {
            let request = SubmitRequest {
                source: read_source(source).await?,
                options: SubmitOptions::default(),
            };
            print_json(&client.submit(&request).await?)
        }
        Command::Messages { queue } => print_json(&client.ingest_message_list(&queue).await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render response")?;
    println!("{rendered}");
    Ok(())
}

fn default_output_path(sha256: &str, encoding: Encoding) -> PathBuf {
    match encoding {
        Encoding::Cart => PathBuf::from(format!("{sha256}.cart")),
        Encoding::Raw => PathBuf::from(sha256),
    }
}

async fn read_source(source: SourceArgs) -> Result<SubmissionSource> {
    match (source.sha256, source.url_source, source.file) {
        (Some(sha256), _, _) => Ok(SubmissionSource::Sha256(sha256)),
        (_, Some(url), _) => Ok(SubmissionSource::Url(url)),
        (_, _, Some(path)) => {
            let content = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string());
            Ok(SubmissionSource::Binary {
                content: content.into(),
                filename,
            })
        }
        (None, None, None) => bail!("one of --sha256, --url-source or --file is required"),
    }
}

async fn download(
    client: &AssemblylineClient,
    sha256: &str,
    params: &DownloadParams,
    output: PathBuf,
    quiet: bool,
) -> Result<()> {
    let stream = client
        .download_file(sha256, params)
        .context("failed to start download")?;

    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg} {bytes} ({binary_bytes_per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    };
    spinner.set_message(format!("Downloading {sha256}"));

    // The stream blocks on every read, so the copy runs off the runtime threads.
    let bar = spinner.clone();
    let path = output.clone();
    let written = tokio::task::spawn_blocking(move || copy_to_file(bar.wrap_read(stream), &path))
        .await
        .context("download task panicked")??;

    spinner.finish_and_clear();
    info!(bytes = written, path = %output.display(), "Download complete");
    Ok(())
}

fn copy_to_file(mut reader: impl io::Read, path: &Path) -> Result<u64> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let result = io::copy(&mut reader, &mut writer).and_then(|written| {
        writer.flush()?;
        Ok(written)
    });
    if result.is_err() {
        let _ = std::fs::remove_file(path);
    }
    result.with_context(|| format!("download to {} failed", path.display()))
}
