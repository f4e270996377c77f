//! Directory sync integration tests.

#[cfg(test)]
mod tests {
    use s3kit_core::SyncOptions;

    use crate::{cleanup_bucket, create_test_bucket, s3_client};

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_mirror_directory() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "sync").await;

        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("css")).expect("mkdir");
        std::fs::write(dir.path().join("index.html"), b"<h1>hi</h1>").expect("write");
        std::fs::write(dir.path().join("css/site.css"), b"body{}").expect("write");

        let first = client
            .sync_directory(&bucket, dir.path(), "www", SyncOptions::default())
            .await
            .expect("first sync");
        assert_eq!(first.uploaded, vec!["www/css/site.css", "www/index.html"]);

        let second = client
            .sync_directory(&bucket, dir.path(), "www/", SyncOptions::default())
            .await
            .expect("second sync");
        assert!(second.uploaded.is_empty());
        assert_eq!(second.skipped.len(), 2);

        std::fs::remove_file(dir.path().join("css/site.css")).expect("remove");
        let third = client
            .sync_directory(
                &bucket,
                dir.path(),
                "www",
                SyncOptions {
                    delete: true,
                    ..SyncOptions::default()
                },
            )
            .await
            .expect("third sync");
        assert_eq!(third.deleted, vec!["www/css/site.css"]);

        let keys: Vec<String> = client
            .list_all(&bucket, "")
            .await
            .expect("list_all")
            .into_iter()
            .map(|object| object.key)
            .collect();
        assert_eq!(keys, vec!["www/index.html"]);

        cleanup_bucket(&client, &bucket).await;
    }
}
