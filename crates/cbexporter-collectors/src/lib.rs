pub mod cluster;
pub mod pernode;
pub mod samples;
pub mod stats;

pub use pernode::{
    CollectionLoop, CollectorHandle, CollectorSettings, CycleReport, PerNodeBucketCollector,
};
pub use stats::{PER_NODE_BUCKET_STATS, PerNodeBucketMetrics, StatDescriptor};
