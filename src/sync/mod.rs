use crate::delivery::Collector;
use crate::protocol::{DeliveryOutcome, Record, SyncReport};
use crate::queue::PendingQueue;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Orchestrates live delivery attempts and queue reconciliation.
///
/// The coordinator owns no scheduling policy: it exposes an idempotent
/// [`drain`](SyncCoordinator::drain) and leaves when-to-call decisions to the
/// connectivity observer. A failed live attempt always degrades to queued,
/// never dropped.
///
/// Explicitly constructed and dependency-injected; there is no ambient
/// singleton instance.
pub struct SyncCoordinator<C: Collector> {
    queue: PendingQueue,
    collector: C,
    // Held for the duration of a drain; a second drain request coalesces
    // into a no-op instead of racing on removal.
    drain_guard: Mutex<()>,
}

impl<C: Collector> SyncCoordinator<C> {
    pub fn new(queue: PendingQueue, collector: C) -> Self {
        Self {
            queue,
            collector,
            drain_guard: Mutex::new(()),
        }
    }

    /// The pending queue backing this coordinator
    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    /// Reachability hint from the delivery client
    pub async fn collector_reachable(&self) -> bool {
        self.collector.check_health().await
    }

    /// Attempt immediate delivery of one record; queue it on failure.
    pub async fn deliver_now(&self, record: Record) -> SyncReport {
        match self.collector.submit_one(&record).await {
            DeliveryOutcome::Delivered { .. } => {
                debug!("Record {} delivered live", record.id);
                SyncReport::ok("delivered", 1, self.queue.len().await)
            }
            DeliveryOutcome::Failed { error } => {
                info!("Live delivery of {} failed ({}), queuing", record.id, error);
                if let Err(e) = self.queue.append(record).await {
                    warn!("Queued record could not be persisted: {}", e);
                }
                SyncReport::failed("saved offline, will sync later", self.queue.len().await)
            }
        }
    }

    /// Attempt immediate delivery of a batch; queue every record on failure.
    pub async fn deliver_batch_now(&self, records: Vec<Record>) -> SyncReport {
        let count = records.len();
        if count == 0 {
            return SyncReport::ok("nothing to deliver", 0, self.queue.len().await);
        }

        match self.collector.submit_batch(&records).await {
            DeliveryOutcome::Delivered { .. } => {
                debug!("Batch of {} delivered live", count);
                SyncReport::ok("delivered", count, self.queue.len().await)
            }
            DeliveryOutcome::Failed { error } => {
                info!("Live batch delivery failed ({}), queuing {} record(s)", error, count);
                if let Err(e) = self.queue.append_all(records).await {
                    warn!("Queued batch could not be persisted: {}", e);
                }
                SyncReport::failed("saved offline, will sync later", self.queue.len().await)
            }
        }
    }

    /// Flush the pending backlog to the collector as one atomic batch.
    ///
    /// Operates on a snapshot taken at drain start: records appended while
    /// the batch is in flight stay queued for a future drain. A drain already
    /// in progress coalesces this call into a successful no-op.
    ///
    /// Failures leave the queue untouched and re-queue indefinitely; the
    /// collector protocol cannot distinguish a transient outage from a
    /// permanently rejected record, so a malformed record will retry on
    /// every drain.
    pub async fn drain(&self) -> SyncReport {
        let _guard = match self.drain_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Drain already in progress, coalescing");
                return SyncReport::ok("sync already in progress", 0, self.queue.len().await);
            }
        };

        let snapshot = self.queue.snapshot().await;
        if snapshot.is_empty() {
            return SyncReport::ok("nothing to sync", 0, 0);
        }

        info!("Draining {} pending record(s)", snapshot.len());
        match self.collector.submit_batch(&snapshot).await {
            DeliveryOutcome::Delivered { .. } => {
                // Remove exactly the snapshot; concurrent arrivals survive.
                if let Err(e) = self.queue.remove_all(&snapshot).await {
                    warn!("Delivered records removed in memory but not persisted: {}", e);
                }
                let pending = self.queue.len().await;
                info!("Drain delivered {} record(s), {} pending", snapshot.len(), pending);
                SyncReport::ok("synced", snapshot.len(), pending)
            }
            DeliveryOutcome::Failed { error } => {
                info!("Drain failed: {}", error);
                SyncReport::failed(
                    "sync failed, still pending, will retry on next trigger",
                    self.queue.len().await,
                )
            }
        }
    }
}
