pub mod client;
pub mod config;
pub mod objects;

pub use client::{ClusterApi, RestClient};
pub use config::ClientConfig;
pub use objects::{BucketInfo, Counters, Node, OpStats, PerNodeBucketStats, Pool, Server, Servers};
