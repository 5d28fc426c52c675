use cbexporter_client::{ClusterApi, Node, Pool, Servers};
use cbexporter_common::error::{ExporterError, Result};
use tracing::warn;

/// Hostname of the node this process runs on.
///
/// A cluster where no node carries the `thisNode` flag resolves to an empty
/// hostname rather than an error; collection then proceeds with an empty
/// `node` label.
pub async fn resolve_current_node(client: &dyn ClusterApi) -> Result<String> {
    let pool = client
        .nodes()
        .await
        .map_err(|err| ExporterError::Resolution(format!("unable to retrieve nodes: {err}")))?;

    Ok(current_node_hostname(&pool.nodes))
}

pub fn current_node_hostname(nodes: &[Node]) -> String {
    match nodes.iter().find(|node| node.this_node) {
        Some(node) => node.hostname.clone(),
        None => {
            warn!(nodes = nodes.len(), "no cluster node is flagged as this node");
            String::new()
        }
    }
}

/// A cluster counts as balanced once any rebalance has succeeded, or when it
/// reports itself balanced with no rebalance running.
pub fn is_balanced(pool: &Pool) -> bool {
    pool.counters.rebalance_success > 0 || (pool.balanced && pool.rebalance_status == "none")
}

pub async fn is_cluster_balanced(client: &dyn ClusterApi) -> Result<bool> {
    let pool = client.nodes().await?;
    Ok(is_balanced(&pool))
}

/// Stats link of the server whose hostname is `node`; `""` when the bucket
/// has no such server. The last matching entry wins.
pub fn stats_uri_for(servers: &Servers, node: &str) -> String {
    servers
        .servers
        .iter()
        .rev()
        .find(|server| server.hostname == node)
        .and_then(|server| server.stats.get("uri"))
        .cloned()
        .unwrap_or_default()
}
