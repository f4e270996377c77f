//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use s3kit_model::ObjectCannedAcl;

/// Work with S3-compatible object storage.
///
/// Connection settings come from the environment (`S3_ENDPOINT_URL`,
/// `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_REGION`, ...).
#[derive(Debug, Parser)]
#[command(name = "s3kit", version, about)]
pub struct Cli {
    /// Override the endpoint URL.
    #[arg(long, global = true, env = "S3_ENDPOINT_URL")]
    pub endpoint: Option<String>,

    /// Log level filter; defaults to `LOG_LEVEL` or `info`, and `RUST_LOG` wins over both.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List objects.
    Ls(LsArgs),

    /// Download an object to a file, or stdout.
    Get(GetArgs),

    /// Upload a local file.
    Put(PutArgs),

    /// Delete objects.
    Rm(RmArgs),

    /// Mirror a local directory under a prefix.
    Sync(SyncArgs),

    /// Delete every object in a bucket.
    Empty(EmptyArgs),

    /// Print a presigned GET URL.
    Presign(PresignArgs),
}

#[derive(Debug, Args)]
pub struct LsArgs {
    /// Bucket name.
    pub bucket: String,

    /// Key prefix.
    #[arg(default_value = "")]
    pub prefix: String,

    /// Filter expression, e.g. "Contents[?Size > `1024`][]".
    #[arg(long)]
    pub filter: Option<String>,

    /// Stop after this many matching objects.
    #[arg(long)]
    pub max_items: Option<usize>,

    /// Print one JSON object per line.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Bucket name.
    pub bucket: String,

    /// Object key.
    pub key: String,

    /// Output file (default: stdout).
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PutArgs {
    /// Bucket name.
    pub bucket: String,

    /// Object key.
    pub key: String,

    /// Local file to upload.
    pub file: PathBuf,

    /// Canned ACL, e.g. `public-read`.
    #[arg(long)]
    pub acl: Option<ObjectCannedAcl>,

    /// Content type of the object.
    #[arg(long)]
    pub content_type: Option<String>,
}

#[derive(Debug, Args)]
pub struct RmArgs {
    /// Bucket name.
    pub bucket: String,

    /// Keys to delete.
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Bucket name.
    pub bucket: String,

    /// Local directory.
    pub dir: PathBuf,

    /// Key prefix.
    #[arg(default_value = "")]
    pub prefix: String,

    /// Delete remote objects that have no local file.
    #[arg(long)]
    pub delete: bool,

    /// Canned ACL for uploaded files.
    #[arg(long)]
    pub acl: Option<ObjectCannedAcl>,
}

#[derive(Debug, Args)]
pub struct EmptyArgs {
    /// Bucket name.
    pub bucket: String,
}

#[derive(Debug, Args)]
pub struct PresignArgs {
    /// Bucket name.
    pub bucket: String,

    /// Object key.
    pub key: String,

    /// URL lifetime in seconds (default: `S3_PRESIGN_EXPIRES` or 3600).
    #[arg(long)]
    pub expires: Option<u64>,
}
