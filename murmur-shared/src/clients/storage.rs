use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::Client as S3Client;
use uuid::Uuid;

use crate::errors::{AppError, AppResult, ErrorCode};

/// Largest image accepted for upload.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Profile,
    Cover,
}

impl ImageKind {
    fn prefix(self) -> &'static str {
        match self {
            ImageKind::Profile => "profile-images",
            ImageKind::Cover => "cover-images",
        }
    }
}

/// Checks size and type, returning the file extension to store under.
pub fn validate_image(content_type: &str, size: usize) -> AppResult<&'static str> {
    if size == 0 {
        return Err(AppError::new(ErrorCode::ImageRejected, "image is empty"));
    }
    if size > MAX_IMAGE_BYTES {
        return Err(AppError::new(ErrorCode::ImageRejected, "images must be 5MB or smaller"));
    }
    match content_type {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/webp" => Ok("webp"),
        _ => Err(AppError::new(
            ErrorCode::ImageRejected,
            "only JPEG, PNG and WebP images can be uploaded",
        )),
    }
}

/// S3-compatible bucket holding profile and cover images.
#[derive(Clone)]
pub struct ObjectStorage {
    client: S3Client,
    bucket: String,
    public_url: String,
}

impl ObjectStorage {
    pub async fn new(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_url: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "murmur");

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(endpoint)
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = S3Client::from_conf(config);

        // Already-exists is the normal case after the first boot.
        if let Err(e) = client.create_bucket().bucket(bucket).send().await {
            tracing::debug!(error = %e, bucket = %bucket, "create_bucket skipped");
        }

        tracing::info!(endpoint = %endpoint, bucket = %bucket, "object storage initialized");

        Self {
            client,
            bucket: bucket.to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Validates and uploads an image, returning its public URL.
    pub async fn upload_image(
        &self,
        kind: ImageKind,
        owner_id: Uuid,
        body: Vec<u8>,
        content_type: &str,
    ) -> AppResult<String> {
        let ext = validate_image(content_type, body.len())?;
        let key = format!("{}/{}/{}.{}", kind.prefix(), owner_id, Uuid::now_v7(), ext);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body.into())
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key = %key, "image upload failed");
                AppError::new(ErrorCode::ImageUploadFailed, "image upload failed, please try again")
            })?;

        Ok(self.public_url_for(&key))
    }

    /// Removes an image previously returned by `upload_image`.
    /// URLs that do not belong to this bucket are ignored.
    pub async fn delete_by_url(&self, url: &str) -> AppResult<()> {
        let Some(key) = self.key_for(url) else {
            return Ok(());
        };

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::internal(format!("delete failed: {e}")))?;

        Ok(())
    }

    fn public_url_for(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_url, self.bucket, key)
    }

    fn key_for<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.public_url.as_str())?
            .strip_prefix('/')?
            .strip_prefix(self.bucket.as_str())?
            .strip_prefix('/')
    }
}
