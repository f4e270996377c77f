//! Listing integration tests.

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use s3kit_core::ListOptions;
    use s3kit_model::ObjectParams;

    use crate::{cleanup_bucket, create_test_bucket, s3_client};

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_list_across_pages() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "pages").await;

        for i in 0..7 {
            client
                .put_object(&bucket, &format!("logs/{i:02}.log"), "x", &ObjectParams::default())
                .await
                .expect("put_object");
        }
        client
            .put_object(&bucket, "other.txt", "x", &ObjectParams::default())
            .await
            .expect("put_object");

        let keys: Vec<String> = client
            .list_objects(&bucket, "logs/", ListOptions::default().with_page_size(3))
            .map_ok(|object| object.key)
            .try_collect()
            .await
            .expect("list_objects");
        let expected: Vec<String> = (0..7).map(|i| format!("logs/{i:02}.log")).collect();
        assert_eq!(keys, expected);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_decode_special_characters_in_keys() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "decode").await;

        let keys = ["a b.txt", "c+d.txt", "é/ü.txt", "x&y.txt"];
        for key in keys {
            client
                .put_object(&bucket, key, "x", &ObjectParams::default())
                .await
                .expect("put_object");
        }

        let mut listed: Vec<String> = client
            .list_all(&bucket, "")
            .await
            .expect("list_all")
            .into_iter()
            .map(|object| object.key)
            .collect();
        listed.sort();
        let mut expected: Vec<String> = keys.iter().map(|k| (*k).to_owned()).collect();
        expected.sort();
        assert_eq!(listed, expected);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_filter_by_size() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "filter").await;

        client
            .put_object(&bucket, "small.txt", vec![0u8; 10], &ObjectParams::default())
            .await
            .expect("put_object");
        client
            .put_object(&bucket, "large.txt", vec![0u8; 100], &ObjectParams::default())
            .await
            .expect("put_object");

        let options = ListOptions::default()
            .with_search_query("Contents[?Size > `50`][]")
            .expect("valid filter");
        let matched: Vec<_> = client
            .list_objects(&bucket, "", options)
            .try_collect()
            .await
            .expect("list_objects");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].key, "large.txt");
        assert_eq!(matched[0].size, 100);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_fail_listing_missing_bucket() {
        let client = s3_client();
        let bucket = crate::test_bucket_name("absent");

        let err = client
            .list_all(&bucket, "")
            .await
            .expect_err("bucket does not exist");
        assert!(err.is_not_found());
    }
}
