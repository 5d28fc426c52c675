//! Per-node bucket statistics collection.
//!
//! Startup resolves which node the exporter runs on, reads the cluster name
//! and waits for any rebalance to settle. After that a single background task
//! polls the stats of every bucket on this node and republishes the newest
//! sample of each tracked field, forever, until it is stopped.

use std::{sync::Arc, time::Duration};

use cbexporter_client::ClusterApi;
use cbexporter_common::{
    error::Result,
    retry::{RetryPolicy, retry},
    status::CollectorStatus,
};
use tokio::{sync::watch, task::JoinHandle, time::sleep};
use tracing::{debug, error, info, warn};

use crate::{
    cluster::{is_cluster_balanced, resolve_current_node, stats_uri_for},
    stats::PerNodeBucketMetrics,
};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
pub const NODE_RETRY: RetryPolicy =
    RetryPolicy::new(Duration::from_secs(60), Duration::from_secs(20), 8);
pub const REBALANCE_RETRY: RetryPolicy =
    RetryPolicy::new(Duration::from_secs(600), Duration::from_secs(20), 10);

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub refresh_interval: Duration,
    pub node_retry: RetryPolicy,
    pub rebalance_retry: RetryPolicy,
}

impl CollectorSettings {
    pub fn with_refresh_secs(seconds: u64) -> Self {
        Self {
            refresh_interval: Duration::from_secs(seconds),
            ..Self::default()
        }
    }
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            node_retry: NODE_RETRY,
            rebalance_retry: REBALANCE_RETRY,
        }
    }
}

pub struct PerNodeBucketCollector {
    client: Arc<dyn ClusterApi>,
    metrics: Arc<PerNodeBucketMetrics>,
    status: Arc<CollectorStatus>,
    settings: CollectorSettings,
}

impl PerNodeBucketCollector {
    pub fn new(
        client: Arc<dyn ClusterApi>,
        metrics: Arc<PerNodeBucketMetrics>,
        status: Arc<CollectorStatus>,
        settings: CollectorSettings,
    ) -> Self {
        Self {
            client,
            metrics,
            status,
            settings,
        }
    }

    /// Resolves the node identity, waits for the cluster to be balanced and
    /// starts the collection loop. Failures are logged here; the caller only
    /// decides whether they matter to the process.
    pub async fn run(&self) -> Result<CollectorHandle> {
        let client = self.client.as_ref();

        let node = retry(&self.settings.node_retry, move || async move {
            match resolve_current_node(client).await {
                Ok(node) => Ok(Some(node)),
                Err(err) => {
                    error!(error = %err, "could not get current node, will retry");
                    Err(err)
                }
            }
        })
        .await
        .inspect_err(|err| {
            error!(error = %err, "per-node bucket stats collection failed to resolve node");
        })?;

        let cluster = client.cluster_name().await.inspect_err(|err| {
            error!(error = %err, "unable to retrieve cluster name");
        })?;

        retry(&self.settings.rebalance_retry, move || async move {
            match is_cluster_balanced(client).await {
                Ok(true) => Ok(Some(())),
                Ok(false) => {
                    info!("waiting for rebalance, retrying");
                    Ok(None)
                }
                Err(err) => {
                    error!(error = %err, "unable to get rebalance status");
                    Err(err)
                }
            }
        })
        .await
        .inspect_err(|err| {
            error!(error = %err, "per-node bucket stats collection gave up waiting for rebalance");
        })?;

        let collection = CollectionLoop::new(
            Arc::clone(&self.client),
            Arc::clone(&self.metrics),
            Arc::clone(&self.status),
            node,
            cluster,
        );
        info!(
            node = %collection.node(),
            cluster = %collection.cluster(),
            "per-node bucket stats collection started"
        );

        Ok(collection.spawn(self.settings.refresh_interval))
    }
}

/// Outcome of one pass over all buckets.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Buckets whose stats were fetched.
    pub buckets: usize,
    /// Gauges written across all buckets.
    pub published: usize,
    /// Failed bucket listings plus failed stats fetches.
    pub failures: usize,
}

pub struct CollectionLoop {
    client: Arc<dyn ClusterApi>,
    metrics: Arc<PerNodeBucketMetrics>,
    status: Arc<CollectorStatus>,
    node: String,
    cluster: String,
}

impl CollectionLoop {
    pub fn new(
        client: Arc<dyn ClusterApi>,
        metrics: Arc<PerNodeBucketMetrics>,
        status: Arc<CollectorStatus>,
        node: String,
        cluster: String,
    ) -> Self {
        Self {
            client,
            metrics,
            status,
            node,
            cluster,
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let buckets = match self.client.buckets().await {
            Ok(buckets) => buckets,
            Err(err) => {
                error!(error = %err, "unable to get buckets");
                report.failures += 1;
                self.status.record_failed_cycle();
                return report;
            }
        };

        for bucket in &buckets {
            debug!(node = %self.node, bucket = %bucket.name, "collecting per-node bucket stats");

            let uri = self.stats_uri(&bucket.name).await;
            let stats = match self.client.per_node_bucket_stats(&uri).await {
                Ok(stats) => stats,
                Err(err) => {
                    error!(
                        bucket = %bucket.name,
                        error = %err,
                        "unable to GET per-node bucket stats"
                    );
                    report.failures += 1;
                    continue;
                }
            };

            report.buckets += 1;
            report.published += self.metrics.publish(
                &stats.op.samples,
                &[bucket.name.as_str(), self.node.as_str(), self.cluster.as_str()],
            );
        }

        self.status.record_cycle();
        report
    }

    /// Runs cycles every `refresh_interval` on a background task until the
    /// returned handle is stopped.
    pub fn spawn(self, refresh_interval: Duration) -> CollectorHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        self.status.mark_running(&self.node, &self.cluster);

        let task = tokio::spawn(async move {
            loop {
                let report = self.run_cycle().await;
                debug!(
                    buckets = report.buckets,
                    published = report.published,
                    failures = report.failures,
                    "per-node bucket stats cycle finished"
                );

                tokio::select! {
                    biased;
                    _ = stop_requested(&mut shutdown_rx) => break,
                    _ = sleep(refresh_interval) => {}
                }
            }

            self.status.mark_stopped();
            info!("per-node bucket stats collection stopped");
        });

        CollectorHandle { shutdown, task }
    }

    async fn stats_uri(&self, bucket: &str) -> String {
        match self.client.servers(bucket).await {
            Ok(servers) => stats_uri_for(&servers, &self.node),
            Err(err) => {
                error!(bucket = %bucket, error = %err, "unable to retrieve servers");
                String::new()
            }
        }
    }
}

/// Resolves once a stop is requested. A dropped handle never requests a stop,
/// so the loop then runs for the rest of the process.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

pub struct CollectorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CollectorHandle {
    /// Stops the loop after the cycle in progress and waits for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "collection task ended abnormally");
        }
    }
}
