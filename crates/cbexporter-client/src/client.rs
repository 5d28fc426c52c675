use async_trait::async_trait;
use cbexporter_common::error::{ExporterError, Result};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::{
    config::ClientConfig,
    objects::{BucketInfo, PerNodeBucketStats, Pool, Servers},
};

const POOL_PATH: &str = "/pools/default";
const BUCKETS_PATH: &str = "/pools/default/buckets";

const BUCKET_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Read-only view of the cluster management API used by the collectors.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn nodes(&self) -> Result<Pool>;
    async fn servers(&self, bucket: &str) -> Result<Servers>;
    async fn buckets(&self) -> Result<Vec<BucketInfo>>;
    async fn cluster_name(&self) -> Result<String>;
    /// `uri` is the per-node stats link advertised by [`ClusterApi::servers`].
    async fn per_node_bucket_stats(&self, uri: &str) -> Result<PerNodeBucketStats>;
}

#[derive(Clone)]
pub struct RestClient {
    base_url: Url,
    username: String,
    password: String,
    client: reqwest::Client,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = config.base_url()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                ExporterError::InternalError(format!("failed to build http client: {err}"))
            })?;

        Ok(Self {
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            client,
        })
    }

    /// Authenticated GET of `path` (relative to the base url, or absolute)
    /// decoded as JSON.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.resolve(path)?;
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|err| ExporterError::Request {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ExporterError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.json::<T>().await.map_err(|err| ExporterError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        let path = path.trim();
        if path.is_empty() {
            return Err(ExporterError::InvalidArgument(
                "request path must not be empty".to_string(),
            ));
        }

        self.base_url.join(path).map_err(|err| {
            ExporterError::InvalidArgument(format!("invalid request path {path}: {err}"))
        })
    }
}

#[async_trait]
impl ClusterApi for RestClient {
    async fn nodes(&self) -> Result<Pool> {
        self.get(POOL_PATH).await
    }

    async fn servers(&self, bucket: &str) -> Result<Servers> {
        let path = format!(
            "{BUCKETS_PATH}/{}/nodes",
            utf8_percent_encode(bucket, BUCKET_SEGMENT)
        );
        self.get(&path).await
    }

    async fn buckets(&self) -> Result<Vec<BucketInfo>> {
        self.get(BUCKETS_PATH).await
    }

    async fn cluster_name(&self) -> Result<String> {
        let pool: Pool = self.get(POOL_PATH).await?;
        Ok(pool.cluster_name)
    }

    async fn per_node_bucket_stats(&self, uri: &str) -> Result<PerNodeBucketStats> {
        self.get(uri).await
    }
}
