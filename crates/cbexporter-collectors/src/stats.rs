//! Per-node bucket statistics tracked by the exporter.

use std::{collections::HashMap, sync::Arc};

use cbexporter_common::error::Result;
use cbexporter_metrics::{GaugeMetric, MetricsRegistry};
use serde_json::Value;

use crate::samples::{extract_series, publish_latest, series_text};

pub const NAMESPACE: &str = "cbpernodebucket";
pub const LABEL_NAMES: [&str; 3] = ["bucket", "node", "cluster"];

/// Maps a field of the per-node stats payload to an exported gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatDescriptor {
    /// Key in `op.samples`.
    pub field: &'static str,
    /// Gauge name without the namespace.
    pub name: &'static str,
    pub help: &'static str,
}

impl StatDescriptor {
    pub fn metric_name(&self) -> String {
        format!("{NAMESPACE}_{}", self.name)
    }
}

const fn stat(field: &'static str, name: &'static str, help: &'static str) -> StatDescriptor {
    StatDescriptor { field, name, help }
}

pub const PER_NODE_BUCKET_STATS: &[StatDescriptor] = &[
    stat(
        "avg_disk_update_time",
        "avg_disk_update_time",
        "Average disk update time in microseconds as from disk_update histogram of timings",
    ),
    stat(
        "avg_disk_commit_time",
        "avg_disk_commit_time",
        "Average disk commit time in seconds as from disk_update histogram of timings",
    ),
    stat("avg_bg_wait_seconds", "avg_bg_wait_seconds", ""),
    stat(
        "avg_active_timestamp_drift",
        "avg_active_timestamp_drift",
        "Average drift (in seconds) between mutation timestamps and the local time for active vBuckets. (measured from ep_active_hlc_drift and ep_active_hlc_drift_count)",
    ),
    stat(
        "avg_replica_timestamp_drift",
        "avg_replica_timestamp_drift",
        "Average drift (in seconds) between mutation timestamps and the local time for replica vBuckets. (measured from ep_replica_hlc_drift and ep_replica_hlc_drift_count)",
    ),
    stat(
        "couch_total_disk_size",
        "couch_total_disk_size",
        "The total size on disk of all data and view files for this bucket",
    ),
    stat(
        "couch_docs_fragmentation",
        "couch_docs_fragmentation",
        "How much fragmented data there is to be compacted compared to real data for the data files in this bucket",
    ),
    stat(
        "couch_views_fragmentation",
        "couch_views_fragmentation",
        "How much fragmented data there is to be compacted compared to real data for the view index files in this bucket",
    ),
    stat(
        "couch_docs_actual_disk_size",
        "couch_docs_actual_disk_size",
        "The size of all data files for this bucket, including the data itself, meta data and temporary files",
    ),
    stat("couch_docs_data_size", "couch_docs_data_size", "The size of active data in this bucket"),
    stat(
        "couch_docs_disk_size",
        "couch_docs_disk_size",
        "The size of all data files for this bucket, including the data itself, meta data and temporary files",
    ),
    stat("couch_docs_spatial_data_size", "couch_spatial_data_size", ""),
    stat("couch_docs_spatial_disk_size", "couch_spatial_disk_size", ""),
    stat("couch_spatial_ops", "couch_spatial_ops", ""),
    stat(
        "couch_views_actual_disk_size",
        "couch_views_actual_disk_size",
        "The size of all active items in all the indexes for this bucket on disk",
    ),
    stat(
        "couch_views_data_size",
        "couch_views_data_size",
        "The size of active data on for all the indexes in this bucket",
    ),
    stat("couch_views_disk_size", "couch_views_disk_size", ""),
    stat(
        "couch_views_ops",
        "couch_views_ops",
        "All the view reads for all design documents including scatter gather",
    ),
    stat(
        "ep_cache_miss_rate",
        "ep_cache_miss_rate",
        "Percentage of reads per second to this bucket from disk as opposed to RAM",
    ),
    stat(
        "ep_resident_items_rate",
        "ep_resident_items_rate",
        "Percentage of all items cached in RAM in this bucket",
    ),
    stat(
        "ep_active_ahead_exceptions",
        "ep_active_ahead_exceptions",
        "Total number of ahead exceptions (when timestamp drift between mutations and local time has exceeded 5000000 μs) per second for all active vBuckets.",
    ),
    stat("ep_active_hlc_drift", "ep_active_hlc_drift", ""),
    stat("ep_active_hlc_drift_count", "ep_active_hlc_drift_count", ""),
    stat("ep_bg_fetched", "ep_bg_fetched", "Number of reads per second from disk for this bucket"),
    stat("ep_clock_cas_drift_threshold_exceeded", "ep_clock_cas_drift_threshold_exceeded", ""),
    stat(
        "ep_data_read_failed",
        "ep_data_read_failed",
        "Number of disk read failures. (measured from ep_data_read_failed)",
    ),
    stat(
        "ep_data_write_failed",
        "ep_data_write_failed",
        "Number of disk write failures. (measured from ep_data_write_failed)",
    ),
    stat(
        "ep_dcp_2i_backoff",
        "ep_dcp_2i_backoff",
        "Number of backoffs for indexes DCP connections",
    ),
    stat("ep_dcp_2i_count", "ep_dcp_2i_count", "Number of indexes DCP connections"),
    stat(
        "ep_dcp_2i_items_remaining",
        "ep_dcp_2i_items_remaining",
        "Number of indexes items remaining to be sent",
    ),
    stat("ep_dcp_2i_items_sent", "ep_dcp_2i_items_sent", "Number of indexes items sent"),
    stat("ep_dcp_2i_producers", "ep_dcp_2i_producers", "Number of indexes producers"),
    stat("ep_dcp_2i_total_backlog_size", "ep_dcp_2i_total_backlog_size", ""),
    stat(
        "ep_dcp_2i_total_bytes",
        "ep_dcp_2i_total_bytes",
        "Number of bytes per second being sent for indexes DCP connections",
    ),
    stat(
        "ep_dcp_cbas_backoff",
        "ep_dcp_cbas_backoff",
        "Number of backoffs per second for analytics DCP connections (measured from ep_dcp_cbas_backoff)",
    ),
    stat(
        "ep_dcp_cbas_count",
        "ep_dcp_cbas_count",
        "Number of internal analytics DCP connections in this bucket (measured from ep_dcp_cbas_count)",
    ),
    stat(
        "ep_dcp_cbas_items_remaining",
        "ep_dcp_cbas_items_remaining",
        "Number of items remaining to be sent to consumer in this bucket",
    ),
    stat(
        "ep_dcp_cbas_items_sent",
        "ep_dcp_cbas_items_sent",
        "Number of items per second being sent for a producer for this bucket",
    ),
    stat(
        "ep_dcp_cbas_items_producer_count",
        "ep_dcp_cbas_producer_count",
        "Number of analytics senders for this bucket (measured from ep_dcp_cbas_producer_count)",
    ),
    stat("ep_dcp_cbas_items_total_backlog_size", "ep_dcp_cbas_total_backlog_size", ""),
    stat("ep_dcp_cbas_items_total_bytes", "ep_dcp_total_bytes", ""),
    stat("ep_dcp_fts_backoff", "ep_dcp_fts_backoff", ""),
    stat("ep_dcp_fts_count", "ep_dcp_fts_count", ""),
    stat("ep_dcp_fts_items_remaining", "ep_dcp_fts_items_remaining", ""),
    stat("ep_dcp_fts_items_sent", "ep_dcp_fts_items_sent", ""),
    stat("ep_dcp_fts_producer_count", "ep_dcp_fts_producer_count", ""),
    stat("ep_dcp_fts_backlog_size", "ep_dcp_fts_backlog_size", ""),
    stat("ep_dcp_fts_total_bytes", "ep_dcp_fts_total_bytes", ""),
    stat(
        "ep_dcp_other_backoff",
        "ep_dcp_other_backoff",
        "Number of backoffs for other DCP connections",
    ),
    stat(
        "ep_dcp_other_count",
        "ep_dcp_other_count",
        "Number of other DCP connections in this bucket",
    ),
    stat(
        "ep_dcp_other_items_remaining",
        "ep_dcp_other_items_remaining",
        "Number of items remaining to be sent to consumer in this bucket (measured from ep_dcp_other_items_remaining)",
    ),
    stat(
        "ep_dcp_other_items_sent",
        "ep_dcp_other_items_sent",
        "Number of items per second being sent for a producer for this bucket (measured from ep_dcp_other_items_sent)",
    ),
    stat(
        "ep_dcp_other_producer_count",
        "ep_dcp_other_producer_count",
        "Number of other senders for this bucket",
    ),
    stat("ep_dcp_other_total_backlog_size", "ep_dcp_other_total_backlog_size", ""),
    stat(
        "ep_dcp_other_total_bytes",
        "ep_dcp_other_total_bytes",
        "Number of bytes per second being sent for other DCP connections for this bucket",
    ),
    stat(
        "ep_dcp_replica_backoff",
        "ep_dcp_replica_backoff",
        "Number of backoffs for replication DCP connections",
    ),
    stat(
        "ep_dcp_replica_count",
        "ep_dcp_replica_count",
        "Number of internal replication DCP connections in this bucket",
    ),
    stat(
        "ep_dcp_replica_items_remaining",
        "ep_dcp_replica_items_remaining",
        "Number of items remaining to be sent to consumer in this bucket",
    ),
    stat(
        "ep_dcp_replica_items_sent",
        "ep_dcp_replica_items_sent",
        "Number of items per second being sent for a producer for this bucket",
    ),
    stat(
        "ep_dcp_replica_producer_count",
        "ep_dcp_replica_producer_count",
        "Number of replication senders for this bucket",
    ),
    stat("ep_dcp_replica_total_backlog_size", "ep_dcp_replica_total_backlog_size", ""),
    stat(
        "ep_dcp_replica_total_bytes",
        "ep_dcp_replica_total_bytes",
        "Number of bytes per second being sent for replication DCP connections for this bucket",
    ),
    stat(
        "ep_dcp_views_backoff",
        "ep_dcp_views_backoff",
        "Number of backoffs for views DCP connections",
    ),
    stat("ep_dcp_views_count", "ep_dcp_views_count", "Number of views DCP connections"),
    stat(
        "ep_dcp_views_items_remaining",
        "ep_dcp_views_items_remaining",
        "Number of views items remaining to be sent",
    ),
    stat("ep_dcp_views_items_sent", "ep_dcp_views_items_sent", "Number of views items sent"),
    stat("ep_dcp_views_producer_count", "ep_dcp_views_producer_count", "Number of views producers"),
    stat("ep_dcp_views_total_backlog_size", "ep_dcp_views_total_backlog_size", ""),
    stat(
        "ep_dcp_views_total_bytes",
        "ep_dcp_views_total_bytes",
        "Number bytes per second being sent for views DCP connections",
    ),
    stat("ep_dcp_views_indexes_backoff", "ep_dcp_views_indexes_backoff", ""),
    stat("ep_dcp_views_indexes_count", "ep_dcp_views_indexes_count", ""),
    stat("ep_dcp_views_indexes_items_remaining", "ep_dcp_views_indexes_items_remaining", ""),
    stat("ep_dcp_views_indexes_items_sent", "ep_dcp_views_indexes_items_sent", ""),
    stat("ep_dcp_views_indexes_producer_count", "ep_dcp_views_indexes_producer_count", ""),
    stat("ep_dcp_views_indexes_total_backlog_size", "ep_dcp_views_indexes_total_backlog_size", ""),
    stat("ep_dcp_views_indexes_total_bytes", "ep_dcp_views_indexes_total_bytes", ""),
    stat(
        "ep_dcp_xdcr_backoff",
        "ep_dcp_xdcr_backoff",
        "Number of backoffs for XDCR DCP connections",
    ),
    stat(
        "ep_dcp_xdcr_count",
        "ep_dcp_xdcr_count",
        "Number of internal XDCR DCP connections in this bucket",
    ),
    stat(
        "ep_dcp_xdcr_items_remaining",
        "ep_dcp_xdcr_items_remaining",
        "Number of items remaining to be sent to consumer in this bucket",
    ),
    stat(
        "ep_dcp_xdcr_items_sent",
        "ep_dcp_xdcr_items_sent",
        "Number of items per second being sent for a producer for this bucket",
    ),
    stat(
        "ep_dcp_xdcr_producer_count",
        "ep_dcp_xdcr_producer_count",
        "Number of XDCR senders for this bucket",
    ),
    stat("ep_dcp_xdcr_total_backlog_size", "ep_dcp_xdcr_total_backlog_size", ""),
    stat(
        "ep_dcp_xdcr_total_bytes",
        "ep_dcp_xdcr_total_bytes",
        "Number of bytes per second being sent for XDCR DCP connections for this bucket",
    ),
    stat(
        "ep_diskqueue_drain",
        "ep_diskqueue_drain",
        "Total number of items per second being written to disk in this bucket",
    ),
    stat(
        "ep_diskqueue_fill",
        "ep_diskqueue_fill",
        "Total number of items per second being put on the disk queue in this bucket",
    ),
    stat(
        "ep_diskqueue_items",
        "ep_diskqueue_items",
        "Total number of items waiting to be written to disk in this bucket",
    ),
    stat("ep_flusher_todo", "ep_flusher_todo", "Number of items currently being written"),
    stat(
        "ep_item_commit_failed",
        "ep_item_commit_failed",
        "Number of times a transaction failed to commit due to storage errors",
    ),
    stat("ep_kv_size", "ep_kv_size", "Total amount of user data cached in RAM in this bucket"),
    stat("ep_max_size", "ep_max_size", "The maximum amount of memory this bucket can use"),
    stat("ep_mem_high_wat", "ep_mem_high_wat", "High water mark for auto-evictions"),
    stat("ep_mem_low_wat", "ep_mem_low_wat", "Low water mark for auto-evictions"),
    stat(
        "ep_meta_data_memory",
        "ep_meta_data_memory",
        "Total amount of item metadata consuming RAM in this bucket",
    ),
    stat("ep_num_non_resident", "ep_num_non_resident", "Number of non-resident items"),
    stat(
        "ep_num_ops_del_meta",
        "ep_num_ops_del_meta",
        "Number of delete operations per second for this bucket as the target for XDCR",
    ),
    stat(
        "ep_num_ops_del_ret_meta",
        "ep_num_ops_del_ret_meta",
        "Number of delRetMeta operations per second for this bucket as the target for XDCR",
    ),
    stat(
        "ep_num_ops_get_meta",
        "ep_num_ops_get_meta",
        "Number of metadata read operations per second for this bucket as the target for XDCR",
    ),
    stat(
        "ep_num_ops_set_meta",
        "ep_num_ops_set_meta",
        "Number of set operations per second for this bucket as the target for XDCR",
    ),
    stat(
        "ep_num_ops_set_ret_meta",
        "ep_num_ops_set_ret_meta",
        "Number of setRetMeta operations per second for this bucket as the target for XDCR",
    ),
    stat(
        "ep_num_value_ejects",
        "ep_num_value_ejects",
        "Total number of items per second being ejected to disk in this bucket",
    ),
    stat(
        "ep_oom_errors",
        "ep_oom_errors",
        "Number of times unrecoverable OOMs happened while processing operations",
    ),
    stat(
        "ep_ops_create",
        "ep_ops_create",
        "Total number of new items being inserted into this bucket",
    ),
    stat(
        "ep_ops_update",
        "ep_ops_update",
        "Number of items updated on disk per second for this bucket",
    ),
    stat(
        "ep_overhead",
        "ep_overhead",
        "Extra memory used by transient data like persistence queues or checkpoints",
    ),
    stat("ep_queue_size", "ep_queue_size", "Number of items queued for storage"),
    stat(
        "ep_replica_ahead_exceptions",
        "ep_replica_ahead_exceptions",
        "Percentage of all items cached in RAM in this bucket",
    ),
    stat(
        "ep_replica_hlc_drift",
        "ep_replica_hlc_drift",
        "The sum of the total Absolute Drift, which is the accumulated drift observed by the vBucket. Drift is always accumulated as an absolute value.",
    ),
    stat("ep_replica_hlc_drift_count", "ep_replica_hlc_drift_count", ""),
    stat(
        "ep_tmp_oom_errors",
        "ep_tmp_oom_errors",
        "Number of back-offs sent per second to client SDKs due to OOM situations from this bucket",
    ),
    stat("ep_vb_total", "ep_vb_total", "Total number of vBuckets for this bucket"),
    stat(
        "vb_avg_active_queue_age",
        "vb_avg_active_queue_age",
        "Sum of disk queue item age in milliseconds",
    ),
    stat(
        "vb_avg_replica_queue_age",
        "vb_avg_replica_queue_age",
        "Average age in seconds of replica items in the replica item queue for this bucket",
    ),
    stat(
        "vb_avg_pending_queue_age",
        "vb_avg_pending_queue_age",
        "Average age in seconds of pending items in the pending item queue for this bucket and should be transient during rebalancing",
    ),
    stat(
        "vb_avg_total_queue_age",
        "vb_avg_total_queue_age",
        "Average age in seconds of all items in the disk write queue for this bucket",
    ),
    stat(
        "vb_active_resident_items_ratio",
        "vb_active_resident_items_ratio",
        "Percentage of active items cached in RAM in this bucket",
    ),
    stat(
        "vb_replica_resident_items_ratio",
        "vb_replica_resident_items_ratio",
        "Percentage of active items cached in RAM in this bucket",
    ),
    stat(
        "vb_pending_resident_items_ratio",
        "vb_pending_resident_items_ratio",
        "Percentage of items in pending state vbuckets cached in RAM in this bucket",
    ),
    stat(
        "vb_active_eject",
        "vb_active_eject",
        "Number of items per second being ejected to disk from active vBuckets in this bucket",
    ),
    stat(
        "vb_active_itm_memory",
        "vb_active_itm_memory",
        "Amount of active user data cached in RAM in this bucket",
    ),
    stat(
        "vb_active_meta_data_memory",
        "vb_active_meta_data_memory",
        "Amount of active item metadata consuming RAM in this bucket",
    ),
    stat(
        "vb_active_num",
        "vb_active_num",
        "Number of vBuckets in the active state for this bucket",
    ),
    stat(
        "vb_active_num_non_resident",
        "vb_active_num_non_resident",
        "Number of non resident vBuckets in the active state for this bucket",
    ),
    stat(
        "vb_active_ops_create",
        "vb_active_ops_create",
        "New items per second being inserted into active vBuckets in this bucket",
    ),
    stat(
        "vb_active_ops_update",
        "vb_active_ops_update",
        "Number of items updated on active vBucket per second for this bucket",
    ),
    stat(
        "vb_active_queue_age",
        "vb_active_queue_age",
        "Sum of disk queue item age in milliseconds",
    ),
    stat(
        "vb_active_queue_drain",
        "vb_active_queue_drain",
        "Number of active items per second being written to disk in this bucket",
    ),
    stat(
        "vb_active_queue_fill",
        "vb_active_queue_fill",
        "Number of active items per second being put on the active item disk queue in this bucket",
    ),
    stat(
        "vb_active_queue_size",
        "vb_active_queue_size",
        "Number of active items waiting to be written to disk in this bucket",
    ),
    stat("vb_active_queue_items", "vb_active_queue_items", ""),
    stat(
        "vb_pending_curr_items",
        "vb_pending_curr_items",
        "Number of items in pending vBuckets in this bucket and should be transient during rebalancing",
    ),
    stat(
        "vb_pending_eject",
        "vb_pending_eject",
        "Number of items per second being ejected to disk from pending vBuckets in this bucket and should be transient during rebalancing",
    ),
    stat(
        "vb_pending_itm_memory",
        "vb_pending_itm_memory",
        "Amount of pending user data cached in RAM in this bucket and should be transient during rebalancing",
    ),
    stat(
        "vb_pending_meta_data_memory",
        "vb_pending_meta_data_memory",
        "Amount of pending item metadata consuming RAM in this bucket and should be transient during rebalancing",
    ),
    stat(
        "vb_pending_num",
        "vb_pending_num",
        "Number of vBuckets in the pending state for this bucket and should be transient during rebalancing",
    ),
    stat(
        "vb_pending_num_non_resident",
        "vb_pending_num_non_resident",
        "Number of non resident vBuckets in the pending state for this bucket",
    ),
    stat(
        "vb_pending_ops_create",
        "vb_pending_ops_create",
        "New items per second being instead into pending vBuckets in this bucket and should be transient during rebalancing",
    ),
    stat(
        "vb_pending_ops_update",
        "vb_pending_ops_update",
        "Number of items updated on pending vBucket per second for this bucket",
    ),
    stat(
        "vb_pending_queue_age",
        "vb_pending_queue_age",
        "Sum of disk pending queue item age in milliseconds",
    ),
    stat(
        "vb_pending_queue_drain",
        "vb_pending_queue_drain",
        "Number of pending items per second being written to disk in this bucket and should be transient during rebalancing",
    ),
    stat(
        "vb_pending_queue_fill",
        "vb_pending_queue_fill",
        "Number of pending items per second being put on the pending item disk queue in this bucket and should be transient during rebalancing",
    ),
    stat(
        "vb_pending_queue_size",
        "vb_pending_queue_size",
        "Number of pending items waiting to be written to disk in this bucket and should be transient during rebalancing",
    ),
    stat(
        "vb_replica_curr_items",
        "vb_replica_curr_items",
        "Number of items in replica vBuckets in this bucket",
    ),
    stat(
        "vb_replica_eject",
        "vb_replica_eject",
        "Number of items per second being ejected to disk from replica vBuckets in this bucket",
    ),
    stat(
        "vb_replica_itm_memory",
        "vb_replica_itm_memory",
        "Amount of replica user data cached in RAM in this bucket",
    ),
    stat(
        "vb_replica_meta_data_memory",
        "vb_replica_meta_data_memory",
        "Amount of replica item metadata consuming in RAM in this bucket",
    ),
    stat(
        "vb_replica_num",
        "vb_replica_num",
        "Number of vBuckets in the replica state for this bucket",
    ),
    stat("vb_replica_num_non_resident", "vb_replica_num_non_resident", ""),
    stat(
        "vb_replica_ops_create",
        "vb_replica_ops_create",
        "New items per second being inserted into replica vBuckets in this bucket",
    ),
    stat(
        "vb_replica_ops_update",
        "vb_replica_ops_update",
        "Number of items updated on replica vBucket per second for this bucket",
    ),
    stat(
        "vb_replica_queue_age",
        "vb_replica_queue_age",
        "Sum of disk replica queue item age in milliseconds",
    ),
    stat(
        "vb_replica_queue_drain",
        "vb_replica_queue_drain",
        "Number of replica items per second being written to disk in this bucket",
    ),
    stat(
        "vb_replica_queue_fill",
        "vb_replica_queue_fill",
        "Number of replica items per second being put on the replica item disk queue in this bucket",
    ),
    stat(
        "vb_replica_queue_size",
        "vb_replica_queue_size",
        "Number of replica items waiting to be written to disk in this bucket",
    ),
    stat("vb_total_queue_age", "vb_total_queue_age", ""),
    stat(
        "hibernated_requests",
        "hibernated_requests",
        "Number of streaming requests on port 8091 now idle",
    ),
    stat("hibernated_waked", "hibernated_waked", "Rate of streaming request wakeups on port 8091"),
    stat("xdc_ops", "xdc_ops", "Total XDCR operations per second for this bucket"),
    stat("cpu_idle_ms", "cpu_idle_ms", "CPU idle milliseconds"),
    stat("cpu_local_ms", "cpu_local_ms", ""),
    stat(
        "cpu_utilization_rate",
        "cpu_utilization_rate",
        "Percentage of CPU in use across all available cores on this server",
    ),
    stat("bg_wait_count", "bg_wait_count", ""),
    stat("bg_wait_total", "bg_wait_total", ""),
    stat("bytes_read", "bytes_read", "Bytes Read"),
    stat("bytes_written", "bytes_written", "Bytes written"),
    stat("cas_bad_val", "cas_bad_val", "Compare and Swap bad values"),
    stat("cas_hits", "cas_hits", "Number of operations with a CAS id per second for this bucket"),
    stat("cas_misses", "cas_misses", "Compare and Swap misses"),
    stat("cmd_get", "cmd_get", "Number of reads (get operations) per second from this bucket"),
    stat("cmd_set", "cmd_set", "Number of writes (set operations) per second to this bucket"),
    stat("hit_ratio", "hit_ratio", "Hit ratio"),
    stat(
        "curr_connections",
        "curr_connections",
        "Number of connections to this server including connections from external client SDKs, proxies, DCP requests and internal statistic gathering",
    ),
    stat("curr_items", "curr_items", "Number of items in active vBuckets in this bucket"),
    stat("curr_items_tot", "curr_items_tot", "Total number of items in this bucket"),
    stat("decr_hits", "decr_hits", "Decrement hits"),
    stat("decr_misses", "decr_misses", "Decrement misses"),
    stat("delete_hits", "delete_hits", "Number of delete operations per second for this bucket"),
    stat(
        "delete_misses",
        "delete_misses",
        "Number of delete operations per second for data that this bucket does not contain. (measured from delete_misses)",
    ),
    stat("disk_commit_count", "disk_commit_count", ""),
    stat("disk_commit_total", "disk_commit_total", ""),
    stat("disk_update_count", "disk_update_count", ""),
    stat("disk_update_total", "disk_update_total", ""),
    stat(
        "disk_write_queue",
        "disk_write_queue",
        "Number of items waiting to be written to disk in this bucket. (measured from ep_queue_size+ep_flusher_todo)",
    ),
    stat("evictions", "evictions", "Number of evictions"),
    stat("get_hits", "get_hits", "Number of get hits"),
    stat("get_misses", "get_misses", "Number of get misses"),
    stat("incr_hits", "incr_hits", "Number of increment hits"),
    stat("incr_misses", "incr_misses", "Number of increment misses"),
    stat("misses", "misses", "Number of misses"),
    stat("ops", "ops", "Total amount of operations per second to this bucket"),
    stat("mem_actual_free", "mem_actual_free", "Amount of RAM available on this server"),
    stat("mem_actual_used", "mem_actual_used", ""),
    stat("mem_free", "mem_free", "Amount of Memory free"),
    stat("mem_used", "mem_used", "Amount of memory used"),
    stat("mem_total", "mem_total", ""),
    stat("mem_used_sys", "mem_used_sys", ""),
    stat("rest_requests", "rest_requests", "Rate of http requests on port 8091"),
    stat("swap_total", "swap_total", "Total amount of swap available"),
    stat("swap_used", "swap_used", "Amount of swap space in use on this server"),
];

/// Gauge handles for every tracked stat, registered once per process.
pub struct PerNodeBucketMetrics {
    gauges: Vec<(StatDescriptor, Arc<GaugeMetric>)>,
}

impl PerNodeBucketMetrics {
    pub fn register(registry: &MetricsRegistry) -> Result<Self> {
        Self::register_stats(registry, PER_NODE_BUCKET_STATS)
    }

    pub fn register_stats(registry: &MetricsRegistry, stats: &[StatDescriptor]) -> Result<Self> {
        let gauges = stats
            .iter()
            .map(|stat| {
                let gauge = registry.register_gauge(&stat.metric_name(), stat.help, &LABEL_NAMES)?;
                Ok((*stat, gauge))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { gauges })
    }

    pub fn len(&self) -> usize {
        self.gauges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty()
    }

    /// Gauge fed by the payload field `field`.
    pub fn gauge(&self, field: &str) -> Option<&GaugeMetric> {
        self.gauges
            .iter()
            .find(|(stat, _)| stat.field == field)
            .map(|(_, gauge)| gauge.as_ref())
    }

    /// Publishes the newest sample of every tracked field present in
    /// `samples` under `labels` (bucket, node, cluster). Returns the number of
    /// gauges written.
    pub fn publish(&self, samples: &HashMap<String, Value>, labels: &[&str; 3]) -> usize {
        let mut published = 0;
        for (stat, gauge) in &self.gauges {
            let Some(value) = samples.get(stat.field) else {
                continue;
            };

            let series = extract_series(&series_text(value));
            if publish_latest(gauge, &series, labels) {
                published += 1;
            }
        }
        published
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use cbexporter_metrics::MetricsRegistry;
    use serde_json::json;

    use super::{NAMESPACE, PER_NODE_BUCKET_STATS, PerNodeBucketMetrics};

    #[test]
    fn table_fields_and_names_are_unique() {
        let fields: HashSet<_> = PER_NODE_BUCKET_STATS.iter().map(|stat| stat.field).collect();
        let names: HashSet<_> = PER_NODE_BUCKET_STATS.iter().map(|stat| stat.name).collect();

        assert_eq!(fields.len(), PER_NODE_BUCKET_STATS.len());
        assert_eq!(names.len(), PER_NODE_BUCKET_STATS.len());
    }

    #[test]
    fn hibernation_stats_have_separate_gauges() {
        let requests = PER_NODE_BUCKET_STATS
            .iter()
            .find(|stat| stat.field == "hibernated_requests")
            .unwrap();
        let waked = PER_NODE_BUCKET_STATS
            .iter()
            .find(|stat| stat.field == "hibernated_waked")
            .unwrap();

        assert_eq!(requests.name, "hibernated_requests");
        assert_eq!(waked.name, "hibernated_waked");
    }

    #[test]
    fn registers_every_stat_under_namespace() {
        let registry = MetricsRegistry::new();
        let metrics = PerNodeBucketMetrics::register(&registry).unwrap();

        assert_eq!(metrics.len(), PER_NODE_BUCKET_STATS.len());
        assert_eq!(registry.len(), PER_NODE_BUCKET_STATS.len());
        assert!(
            registry
                .collect_all()
                .iter()
                .all(|metric| metric.descriptor.name.starts_with(&format!("{NAMESPACE}_")))
        );
    }

    #[test]
    fn registering_twice_in_one_registry_fails() {
        let registry = MetricsRegistry::new();
        PerNodeBucketMetrics::register(&registry).unwrap();

        assert!(PerNodeBucketMetrics::register(&registry).is_err());
    }

    #[test]
    fn publishes_present_fields_only() {
        let registry = MetricsRegistry::new();
        let metrics = PerNodeBucketMetrics::register(&registry).unwrap();
        let labels = ["default", "node1", "prod"];

        let samples = HashMap::from([
            ("curr_items".to_string(), json!("10 20 30")),
            ("cmd_get".to_string(), json!([1, 2, 4.5])),
            ("mem_used".to_string(), json!("bad")),
            ("not_tracked".to_string(), json!("1")),
        ]);

        assert_eq!(metrics.publish(&samples, &labels), 2);
        assert_eq!(metrics.gauge("curr_items").unwrap().get(&labels), Some(30.0));
        assert_eq!(metrics.gauge("cmd_get").unwrap().get(&labels), Some(4.5));
        assert_eq!(metrics.gauge("mem_used").unwrap().get(&labels), None);
        assert!(metrics.gauge("not_tracked").is_none());
    }

    #[test]
    fn renamed_fields_publish_under_their_metric_name() {
        let registry = MetricsRegistry::new();
        let metrics = PerNodeBucketMetrics::register(&registry).unwrap();
        let labels = ["default", "node1", "prod"];

        let samples = HashMap::from([("couch_docs_spatial_data_size".to_string(), json!("7"))]);
        metrics.publish(&samples, &labels);

        let text = registry.render_prometheus();
        assert!(text.contains(
            "cbpernodebucket_couch_spatial_data_size{bucket=\"default\",node=\"node1\",cluster=\"prod\"} 7\n"
        ));
    }
}
