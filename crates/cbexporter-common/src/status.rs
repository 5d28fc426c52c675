use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub node: Option<String>,
    pub cluster: Option<String>,
    pub cycles_completed: u64,
    /// Cycles abandoned because the bucket list could not be fetched. They do
    /// not advance `cycles_completed` or `last_cycle_at`.
    pub cycles_failed: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// Progress of the per-node collection loop, shared with the HTTP surface.
#[derive(Debug, Default)]
pub struct CollectorStatus {
    inner: RwLock<StatusSnapshot>,
}

impl CollectorStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_running(&self, node: &str, cluster: &str) {
        if let Ok(mut guard) = self.inner.write() {
            guard.running = true;
            guard.node = Some(node.to_string());
            guard.cluster = Some(cluster.to_string());
        }
    }

    pub fn mark_stopped(&self) {
        if let Ok(mut guard) = self.inner.write() {
            guard.running = false;
        }
    }

    pub fn record_cycle(&self) {
        if let Ok(mut guard) = self.inner.write() {
            guard.cycles_completed = guard.cycles_completed.saturating_add(1);
            guard.last_cycle_at = Some(Utc::now());
        }
    }

    pub fn record_failed_cycle(&self) {
        if let Ok(mut guard) = self.inner.write() {
            guard.cycles_failed = guard.cycles_failed.saturating_add(1);
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(_) => StatusSnapshot::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CollectorStatus;

    #[test]
    fn failed_cycles_do_not_look_fresh() {
        let status = CollectorStatus::new();

        status.record_failed_cycle();
        let snapshot = status.snapshot();
        assert_eq!(snapshot.cycles_failed, 1);
        assert_eq!(snapshot.cycles_completed, 0);
        assert!(snapshot.last_cycle_at.is_none());

        status.record_cycle();
        let snapshot = status.snapshot();
        assert_eq!(snapshot.cycles_completed, 1);
        assert!(snapshot.last_cycle_at.is_some());
    }

    #[test]
    fn running_flag_follows_loop_lifecycle() {
        let status = CollectorStatus::new();
        assert!(!status.snapshot().running);

        status.mark_running("node1", "prod");
        let snapshot = status.snapshot();
        assert!(snapshot.running);
        assert_eq!(snapshot.node.as_deref(), Some("node1"));

        status.mark_stopped();
        assert!(!status.snapshot().running);
        assert_eq!(status.snapshot().cluster.as_deref(), Some("prod"));
    }
}
