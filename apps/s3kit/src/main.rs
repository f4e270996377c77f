//! s3kit - command-line front-end for S3-compatible object storage.
//!
//! # Usage
//!
//! ```text
//! S3_ENDPOINT_URL=http://localhost:9000 s3kit ls my-bucket photos/ --filter "Contents[?Size > \`1024\`][]"
//! s3kit sync my-site ./public --delete
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `S3_ENDPOINT_URL` | `http://localhost:9000` | Service endpoint |
//! | `AWS_REGION` | `us-east-1` | Signing region |
//! | `AWS_ACCESS_KEY_ID` | *(empty)* | Access key |
//! | `AWS_SECRET_ACCESS_KEY` | *(empty)* | Secret key |
//! | `S3_ADDRESSING_STYLE` | `path` | `path` or `virtual` |
//! | `S3_MAX_CONCURRENCY` | `1` | Parallel deletes |
//! | `LOG_LEVEL` | `info` | Log level filter (`--log-level` wins) |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod cli;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::TryStreamExt;
use s3kit_core::{ListOptions, ObjectParams, S3Client, S3ClientConfig, SyncOptions, UploadOutcome};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, GetArgs, LsArgs, PutArgs, SyncArgs};

/// Initialize the tracing subscriber on stderr.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the configured log level.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Environment configuration with the command-line overrides applied.
fn build_config(cli: &Cli) -> S3ClientConfig {
    let mut config = S3ClientConfig::from_env();
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint_url.clone_from(endpoint);
    }
    if let Some(log_level) = &cli.log_level {
        config.log_level.clone_from(log_level);
    }
    config
}

/// Copy a body to `writer` and flush it, returning the number of bytes written.
async fn write_body<R, W>(reader: &mut R, writer: &mut W) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let n = tokio::io::copy(reader, writer).await?;
    writer.flush().await?;
    Ok(n)
}

async fn get(client: &S3Client, args: GetArgs) -> Result<()> {
    let stream = client
        .get_object_stream(&args.bucket, &args.key)
        .await?
        .with_context(|| format!("s3://{}/{} does not exist", args.bucket, args.key))?;
    let mut reader = StreamReader::new(stream);

    let written = match &args.output {
        Some(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("cannot create {}", path.display()))?;
            write_body(&mut reader, &mut file).await?
        }
        None => write_body(&mut reader, &mut tokio::io::stdout()).await?,
    };
    info!(bucket = %args.bucket, key = %args.key, bytes = written, "object downloaded");
    Ok(())
}

async fn put(client: &S3Client, args: PutArgs) -> Result<()> {
    let params = ObjectParams {
        acl: args.acl,
        content_type: args.content_type,
        ..ObjectParams::default()
    };
    let outcome = client
        .upload_file(&args.bucket, &args.file, &args.key, params)
        .await
        .with_context(|| format!("cannot upload {}", args.file.display()))?;

    match outcome {
        UploadOutcome::SinglePut(_) => println!("uploaded s3://{}/{}", args.bucket, args.key),
        UploadOutcome::Multipart { parts, .. } => println!(
            "uploaded s3://{}/{} in {} parts",
            args.bucket,
            args.key,
            parts.len()
        ),
    }
    Ok(())
}

async fn sync(client: &S3Client, args: SyncArgs) -> Result<()> {
    let options = SyncOptions {
        delete: args.delete,
        params: ObjectParams {
            acl: args.acl,
            ..ObjectParams::default()
        },
        on_upload: Some(Box::new(|path: &Path, key: &str| {
            println!("upload: {} -> {key}", path.display());
        })),
        on_delete: Some(Box::new(|key: &str| println!("delete: {key}"))),
        on_skip: None,
    };
    let result = client
        .sync_directory(&args.bucket, &args.dir, &args.prefix, options)
        .await
        .with_context(|| format!("cannot sync {}", args.dir.display()))?;

    println!(
        "{} uploaded, {} deleted, {} unchanged",
        result.uploaded.len(),
        result.deleted.len(),
        result.skipped.len()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(&config.log_level)?;
    let client = S3Client::from_config(config).context("invalid client configuration")?;

    match cli.command {
        Command::Ls(args) => list(&client, args).await,
        Command::Get(args) => get(&client, args).await,
        Command::Put(args) => put(&client, args).await,
        Command::Rm(args) => {
            let deleted = client.delete_objects(&args.bucket, args.keys).await?;
            println!("{} deleted", deleted.len());
            Ok(())
        }
        Command::Sync(args) => sync(&client, args).await,
        Command::Empty(args) => {
            let deleted = client.empty_bucket(&args.bucket).await?;
            println!("{deleted} deleted");
            Ok(())
        }
        Command::Presign(args) => {
            let url = client.presigned_url(
                http::Method::GET,
                &args.bucket,
                &args.key,
                args.expires.map(Duration::from_secs),
            )?;
            println!("{url}");
            Ok(())
        }
    }
}
