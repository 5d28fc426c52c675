//! Response shapes of the cluster REST API. Only the fields the exporter
//! reads are modelled; everything else in the payloads is ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `GET /pools/default`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub balanced: bool,
    #[serde(default)]
    pub rebalance_status: String,
    #[serde(default)]
    pub counters: Counters,
    #[serde(default)]
    pub cluster_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub hostname: String,
    #[serde(default)]
    pub this_node: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub cluster_membership: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    #[serde(default)]
    pub rebalance_success: u64,
    #[serde(default)]
    pub rebalance_start: u64,
    #[serde(default)]
    pub rebalance_fail: u64,
}

/// `GET /pools/default/buckets/{bucket}/nodes`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Servers {
    #[serde(default)]
    pub servers: Vec<Server>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Server {
    pub hostname: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub stats: HashMap<String, String>,
}

/// One entry of `GET /pools/default/buckets`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketInfo {
    pub name: String,
    #[serde(default)]
    pub bucket_type: String,
}

/// `GET /pools/default/buckets/{bucket}/nodes/{node}/stats`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerNodeBucketStats {
    #[serde(default)]
    pub op: OpStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpStats {
    /// Field name to sample series. Series usually arrive as arrays of
    /// numbers, older servers send space separated strings.
    #[serde(default)]
    pub samples: HashMap<String, serde_json::Value>,
    #[serde(default, rename = "samplesCount")]
    pub samples_count: u64,
    #[serde(default, rename = "isPersistent")]
    pub is_persistent: bool,
    #[serde(default, rename = "lastTStamp")]
    pub last_timestamp: Option<f64>,
    #[serde(default)]
    pub interval: Option<u64>,
}
