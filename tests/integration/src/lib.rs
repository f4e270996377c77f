//! Integration tests for s3kit against a live S3-compatible service
//! (MinIO, Garage, LocalStack, ...).
//!
//! These tests require a reachable endpoint at `S3_ENDPOINT_URL`
//! (default `http://localhost:9000`) and credentials in `AWS_ACCESS_KEY_ID` /
//! `AWS_SECRET_ACCESS_KEY`. They are marked `#[ignore]` so they don't run
//! during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p s3kit-integration -- --ignored
//! ```

use std::sync::Once;

use s3kit_core::{S3Client, S3ClientConfig};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Create a client configured from the environment.
#[must_use]
pub fn s3_client() -> S3Client {
    init_tracing();
    let mut config = S3ClientConfig::from_env();
    if config.access_key_id.is_empty() {
        config.access_key_id = "minioadmin".to_owned();
        config.secret_access_key = "minioadmin".to_owned();
    }
    S3Client::from_config(config).expect("valid client configuration")
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("s3kit-{prefix}-{id}")
}

/// Create a bucket and return its name. Caller is responsible for cleanup.
pub async fn create_test_bucket(client: &S3Client, prefix: &str) -> String {
    let name = test_bucket_name(prefix);
    client
        .create_bucket(&name)
        .await
        .unwrap_or_else(|e| panic!("failed to create bucket {name}: {e}"));
    name
}

/// Delete all objects in a bucket, then delete the bucket.
pub async fn cleanup_bucket(client: &S3Client, bucket: &str) {
    if client.empty_bucket(bucket).await.is_err() {
        return; // Bucket may not exist.
    }
    let _ = client.delete_bucket(bucket).await;
}

mod test_bucket;
mod test_list;
mod test_multipart;
mod test_object;
mod test_sync;
