//! Multipart upload integration tests.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use s3kit_core::S3ClientError;
    use s3kit_core::upload::{UploadOptions, UploadOutcome};
    use s3kit_model::ObjectParams;

    use crate::{cleanup_bucket, create_test_bucket, s3_client};

    const MIB: usize = 1024 * 1024;

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_complete_scoped_multipart_upload() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "mpu").await;

        let parts = client
            .with_multipart_upload(&bucket, "multipart.bin", ObjectParams::default(), async |upload| {
                upload.upload_part(Bytes::from(vec![0xAAu8; 5 * MIB])).await?;
                upload.upload_part(Bytes::from(vec![0xBBu8; 1024])).await?;
                Ok(upload.parts().len())
            })
            .await
            .expect("multipart upload");
        assert_eq!(parts, 2);

        let data = client
            .get_object(&bucket, "multipart.bin")
            .await
            .expect("get_object")
            .expect("object exists");
        assert_eq!(data.len(), 5 * MIB + 1024);
        assert_eq!(data[0], 0xAA);
        assert_eq!(data[data.len() - 1], 0xBB);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_abort_scoped_upload_on_error() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "mpuabort").await;

        let err = client
            .with_multipart_upload(&bucket, "aborted.bin", ObjectParams::default(), async |upload| {
                upload.upload_part(Bytes::from(vec![1u8; 1024])).await?;
                Err::<(), _>(S3ClientError::Protocol("source failed".to_owned()))
            })
            .await
            .expect_err("scope error");
        assert!(matches!(err, S3ClientError::Protocol(_)));
        assert!(
            client
                .get_object(&bucket, "aborted.bin")
                .await
                .expect("get_object")
                .is_none()
        );

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_upload_unknown_length_stream_in_parts() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "stream").await;

        let fragments: Vec<std::io::Result<Bytes>> = (0u8..12)
            .map(|i| Ok(Bytes::from(vec![i; MIB])))
            .collect();
        let outcome = client
            .upload_stream(
                &bucket,
                "stream.bin",
                futures::stream::iter(fragments),
                UploadOptions::default(),
            )
            .await
            .expect("upload_stream");
        let UploadOutcome::Multipart { parts, .. } = outcome else {
            panic!("expected a multipart upload");
        };
        assert_eq!(parts.len(), 3);

        let data = client
            .get_object(&bucket, "stream.bin")
            .await
            .expect("get_object")
            .expect("object exists");
        assert_eq!(data.len(), 12 * MIB);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running S3 endpoint"]
    async fn test_should_fall_back_to_single_put_for_small_stream() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "fallback").await;

        let fragments: Vec<std::io::Result<Bytes>> =
            vec![Ok(Bytes::from_static(b"tiny ")), Ok(Bytes::from_static(b"stream"))];
        let outcome = client
            .upload_stream(
                &bucket,
                "tiny.txt",
                futures::stream::iter(fragments),
                UploadOptions::default(),
            )
            .await
            .expect("upload_stream");
        assert!(matches!(outcome, UploadOutcome::SinglePut(_)));
        assert_eq!(
            client
                .get_object(&bucket, "tiny.txt")
                .await
                .expect("get_object")
                .as_deref(),
            Some(&b"tiny stream"[..])
        );

        cleanup_bucket(&client, &bucket).await;
    }
}
