//! Object CRUD integration tests.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use futures::TryStreamExt;
    use s3kit_model::{ObjectCannedAcl, ObjectParams};

    use crate::{cleanup_bucket, create_test_bucket, s3_client};

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_put_and_get_object() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "putget").await;

        let params = ObjectParams {
            content_type: Some("text/plain".to_owned()),
            ..ObjectParams::default()
        };
        let put = client
            .put_object(&bucket, "greeting.txt", "hello, s3kit!", &params)
            .await
            .expect("put_object");
        assert!(put.etag.is_some());

        let data = client
            .get_object(&bucket, "greeting.txt")
            .await
            .expect("get_object")
            .expect("object exists");
        assert_eq!(data, Bytes::from_static(b"hello, s3kit!"));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_return_none_for_missing_object() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "missing").await;

        assert!(
            client
                .get_object(&bucket, "nope.txt")
                .await
                .expect("get_object")
                .is_none()
        );
        assert!(
            client
                .get_object_stream(&bucket, "nope.txt")
                .await
                .expect("get_object_stream")
                .is_none()
        );

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_stream_object_body() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "stream").await;

        let body = vec![7u8; 256 * 1024];
        client
            .put_object(&bucket, "blob.bin", body.clone(), &ObjectParams::default())
            .await
            .expect("put_object");

        let stream = client
            .get_object_stream(&bucket, "blob.bin")
            .await
            .expect("get_object_stream")
            .expect("object exists");
        let fragments: Vec<Bytes> = stream.try_collect().await.expect("collect");
        let total: usize = fragments.iter().map(Bytes::len).sum();
        assert_eq!(total, body.len());

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_delete_object_idempotently() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "delete").await;

        client
            .put_object(&bucket, "gone.txt", "bye", &ObjectParams::default())
            .await
            .expect("put_object");
        client
            .delete_object(&bucket, "gone.txt")
            .await
            .expect("delete_object");
        client
            .delete_object(&bucket, "gone.txt")
            .await
            .expect("second delete_object");
        assert!(
            client
                .get_object(&bucket, "gone.txt")
                .await
                .expect("get_object")
                .is_none()
        );

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_delete_many_objects() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "delmany").await;

        for key in ["a.txt", "b.txt", "c.txt"] {
            client
                .put_object(&bucket, key, "x", &ObjectParams::default())
                .await
                .expect("put_object");
        }
        let deleted = client
            .delete_objects(&bucket, ["a.txt", "b.txt", "never-existed.txt"])
            .await
            .expect("delete_objects");
        assert_eq!(deleted.len(), 3);

        let remaining = client.list_all(&bucket, "").await.expect("list_all");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].key, "c.txt");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_fetch_object_through_presigned_url() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "presign").await;

        client
            .put_object(&bucket, "dir/report 2024.txt", "quarterly", &ObjectParams::default())
            .await
            .expect("put_object");
        let url = client
            .presigned_url(
                http::Method::GET,
                &bucket,
                "dir/report 2024.txt",
                Some(Duration::from_secs(60)),
            )
            .expect("presigned_url");

        let response = reqwest::get(&url).await.expect("fetch");
        assert!(response.status().is_success());
        assert_eq!(response.text().await.expect("body"), "quarterly");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_put_object_with_canned_acl() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "acl").await;

        client
            .put_object(
                &bucket,
                "public.txt",
                "visible",
                &ObjectParams::with_acl(ObjectCannedAcl::PublicRead),
            )
            .await
            .expect("put_object with acl");
        assert!(
            client
                .get_object(&bucket, "public.txt")
                .await
                .expect("get_object")
                .is_some()
        );

        cleanup_bucket(&client, &bucket).await;
    }
}
