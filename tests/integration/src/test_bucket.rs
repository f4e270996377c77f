//! Bucket maintenance integration tests.

#[cfg(test)]
mod tests {
    use s3kit_model::ObjectParams;

    use crate::{cleanup_bucket, create_test_bucket, s3_client, test_bucket_name};

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_create_and_delete_bucket() {
        let client = s3_client();
        let bucket = test_bucket_name("crud");

        client.create_bucket(&bucket).await.expect("create_bucket");
        assert!(client.list_all(&bucket, "").await.expect("list").is_empty());
        client.delete_bucket(&bucket).await.expect("delete_bucket");

        let err = client
            .list_all(&bucket, "")
            .await
            .expect_err("bucket deleted");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_empty_bucket() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "empty").await;

        for i in 0..5 {
            client
                .put_object(&bucket, &format!("k{i}"), "x", &ObjectParams::default())
                .await
                .expect("put_object");
        }
        assert_eq!(client.empty_bucket(&bucket).await.expect("empty"), 5);
        assert!(client.list_all(&bucket, "").await.expect("list").is_empty());

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_round_trip_bucket_policy() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "policy").await;

        assert!(
            client
                .get_bucket_policy(&bucket)
                .await
                .expect("get_bucket_policy")
                .is_none()
        );

        let policy = serde_json::json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Principal": {"AWS": ["*"]},
                "Action": ["s3:GetObject"],
                "Resource": [format!("arn:aws:s3:::{bucket}/*")],
            }],
        });
        client
            .put_bucket_policy(&bucket, &policy)
            .await
            .expect("put_bucket_policy");
        let stored = client
            .get_bucket_policy(&bucket)
            .await
            .expect("get_bucket_policy")
            .expect("policy set");
        assert_eq!(stored["Version"], "2012-10-17");

        client
            .delete_bucket_policy(&bucket)
            .await
            .expect("delete_bucket_policy");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_configure_website() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "website").await;

        client
            .put_bucket_website(&bucket, "index.html", Some("404.html"))
            .await
            .expect("put_bucket_website");
        client
            .delete_bucket_website(&bucket)
            .await
            .expect("delete_bucket_website");

        cleanup_bucket(&client, &bucket).await;
    }
}
