use crate::error::{Result, ViewError};
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use aws_sdk_s3::error::DisplayErrorContext;

/// Read side of an object store: whole-object fetch by bucket and key.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}

pub struct S3Objects {
    client: s3::Client,
}

impl S3Objects {
    pub fn new(client: s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectSource for S3Objects {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let output = self.client.get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ViewError::Upstream(format!("get_object {}/{}: {}", bucket, key, DisplayErrorContext(&e))))?;
        let bytes = output.body
            .collect()
            .await
            .map_err(|e| ViewError::Upstream(format!("reading {}/{}: {}", bucket, key, e)))?;
        Ok(bytes.into_bytes().to_vec())
    }
}
