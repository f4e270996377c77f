//! One-way synchronization of a local directory into a bucket prefix.
//!
//! Local files are compared with the remote listing by size and modification
//! time: a file is uploaded when its key is missing remotely, when the sizes
//! differ, or when the local mtime is strictly newer than the remote
//! `LastModified`. The engine keeps no state between runs.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use s3kit_model::{ObjectParams, S3Object};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::S3Client;
use crate::error::S3ClientError;

/// Callback receiving a local file and its remote key.
pub type FileCallback = Box<dyn FnMut(&Path, &str) + Send>;

/// Callback receiving a deleted remote key.
pub type KeyCallback = Box<dyn FnMut(&str) + Send>;

/// Options of [`S3Client::sync_directory`].
#[derive(Default)]
pub struct SyncOptions {
    /// Delete remote keys under the prefix that have no local file.
    pub delete: bool,
    /// Object parameters for uploaded files.
    pub params: ObjectParams,
    /// Called after each upload.
    pub on_upload: Option<FileCallback>,
    /// Called after the stale keys are deleted, once per key.
    pub on_delete: Option<KeyCallback>,
    /// Called for each unchanged file.
    pub on_skip: Option<FileCallback>,
}

impl fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("delete", &self.delete)
            .field("params", &self.params)
            .field("on_upload", &self.on_upload.is_some())
            .field("on_delete", &self.on_delete.is_some())
            .field("on_skip", &self.on_skip.is_some())
            .finish()
    }
}

/// Remote keys touched by one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// Keys uploaded because they were new or changed.
    pub uploaded: Vec<String>,
    /// Stale keys deleted (only with `delete`).
    pub deleted: Vec<String>,
    /// Keys left as they were.
    pub skipped: Vec<String>,
}

#[derive(Debug)]
struct LocalFile {
    path: PathBuf,
    relative: String,
    size: u64,
    modified: Option<DateTime<Utc>>,
}

impl LocalFile {
    /// Providers report `LastModified` with one-second resolution, so the
    /// mtime comparison is done in whole seconds.
    fn differs_from(&self, remote: &S3Object) -> bool {
        self.size != remote.size
            || self
                .modified
                .is_some_and(|m| m.timestamp() > remote.last_modified.timestamp())
    }
}

impl S3Client {
    /// Mirror `local_root` into `remote_prefix`.
    ///
    /// Keys are `remote_prefix/relative/path` with `/` separators, or just the
    /// relative path when the prefix is empty. A trailing `/` on the prefix is
    /// ignored. Only keys under `remote_prefix/` are considered remote
    /// counterparts, so prefix `data` never matches `database/...`.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Io`] if the directory cannot be walked, the
    /// listing error, the first upload error, or
    /// [`S3ClientError::PartialDelete`] if some stale keys could not be deleted.
    pub async fn sync_directory(
        &self,
        bucket: &str,
        local_root: impl AsRef<Path>,
        remote_prefix: &str,
        mut options: SyncOptions,
    ) -> Result<SyncResult, S3ClientError> {
        let local_root = local_root.as_ref();
        let prefix = remote_prefix.trim_end_matches('/');
        let list_prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };

        let files = walk(local_root).await?;
        let mut remote: HashMap<String, S3Object> = self
            .list_all(bucket, &list_prefix)
            .await?
            .into_iter()
            .map(|object| (object.key.clone(), object))
            .collect();
        debug!(
            bucket = %bucket,
            prefix = %prefix,
            local = files.len(),
            remote = remote.len(),
            "sync state collected"
        );

        let mut result = SyncResult::default();
        for file in files {
            let key = format!("{list_prefix}{}", file.relative);
            let changed = remote
                .remove(&key)
                .is_none_or(|object| file.differs_from(&object));

            if changed {
                self.upload_file(bucket, &file.path, &key, options.params.clone())
                    .await?;
                if let Some(callback) = options.on_upload.as_mut() {
                    callback(&file.path, &key);
                }
                result.uploaded.push(key);
            } else {
                if let Some(callback) = options.on_skip.as_mut() {
                    callback(&file.path, &key);
                }
                result.skipped.push(key);
            }
        }

        if options.delete && !remote.is_empty() {
            let mut stale: Vec<String> = remote.into_keys().collect();
            stale.sort();
            self.delete_objects(bucket, stale.iter().map(String::as_str))
                .await?;
            if let Some(callback) = options.on_delete.as_mut() {
                for key in &stale {
                    callback(key);
                }
            }
            result.deleted = stale;
        }

        info!(
            bucket = %bucket,
            prefix = %prefix,
            uploaded = result.uploaded.len(),
            deleted = result.deleted.len(),
            skipped = result.skipped.len(),
            "directory sync finished"
        );
        Ok(result)
    }
}

/// All regular files under `root`, sorted by relative path.
async fn walk(root: &Path) -> Result<Vec<LocalFile>, S3ClientError> {
    let mut files = Vec::new();
    let mut pending = vec![(root.to_path_buf(), String::new())];

    while let Some((dir, relative_dir)) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().into_string().map_err(|name| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("file name {name:?} in {} is not valid UTF-8", dir.display()),
                )
            })?;
            let relative = if relative_dir.is_empty() {
                name
            } else {
                format!("{relative_dir}/{name}")
            };

            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push((path, relative));
                continue;
            }

            let metadata = tokio::fs::metadata(&path).await?;
            if !metadata.is_file() {
                continue;
            }
            files.push(LocalFile {
                path,
                relative,
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}
