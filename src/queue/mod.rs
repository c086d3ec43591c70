use crate::protocol::Record;
use crate::{RelayError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Durable FIFO queue of records awaiting delivery.
///
/// The queue owns the only durable copy of unacknowledged records. Its
/// persisted form is a single JSON array written to the slot path; a missing
/// or malformed slot loads as an empty queue rather than failing startup.
///
/// Mutations (`append`, `remove_all`, `clear`) update memory first and then
/// rewrite the whole slot via a temp-file rename, so a crash mid-write leaves
/// the previous complete state on disk. A failed slot write is surfaced to
/// the caller, but the in-memory queue keeps the intended state for the rest
/// of the session.
#[derive(Clone)]
pub struct PendingQueue {
    slot: Arc<PathBuf>,
    records: Arc<Mutex<Vec<Record>>>,
}

impl PendingQueue {
    /// Open the queue, loading prior persisted state from the slot.
    ///
    /// Never fails on slot content: absent or unreadable or malformed state
    /// resets to an empty queue with a logged warning.
    pub async fn open(slot: PathBuf) -> Result<Self> {
        if let Some(parent) = slot.parent() {
            if !parent.as_os_str().is_empty() {
                // A slot directory that cannot be created degrades to an
                // empty in-memory queue; the first persist surfaces the
                // write failure to its caller.
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    warn!(
                        "Cannot create slot directory {} ({}), durability degraded",
                        parent.display(),
                        e
                    );
                }
            }
        }

        let records = match tokio::fs::read(&slot).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<Record>>(&bytes) {
                Ok(records) => {
                    info!(
                        "Loaded {} pending record(s) from {}",
                        records.len(),
                        slot.display()
                    );
                    records
                }
                Err(e) => {
                    warn!(
                        "Pending slot at {} is malformed ({}), resetting to empty",
                        slot.display(),
                        e
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(
                    "Pending slot at {} is unreadable ({}), resetting to empty",
                    slot.display(),
                    e
                );
                Vec::new()
            }
        };

        Ok(Self {
            slot: Arc::new(slot),
            records: Arc::new(Mutex::new(records)),
        })
    }

    /// Append a record to the tail and persist the new state.
    ///
    /// On a persist failure the record is still pending in memory; the error
    /// tells the caller durability is degraded until the next successful
    /// write.
    pub async fn append(&self, record: Record) -> Result<()> {
        let mut records = self.records.lock().await;
        debug!("Queuing record {} ({} pending)", record.id, records.len() + 1);
        records.push(record);
        self.persist(&records).await
    }

    /// Append a batch of records in order with a single persist.
    pub async fn append_all(&self, batch: Vec<Record>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut records = self.records.lock().await;
        records.extend(batch);
        debug!("Queue now holds {} pending record(s)", records.len());
        self.persist(&records).await
    }

    /// Ordered copy of the pending records, without mutating the queue.
    ///
    /// Drains operate on a snapshot so that records arriving during the
    /// drain's network round trip are neither submitted nor removed by it.
    pub async fn snapshot(&self) -> Vec<Record> {
        self.records.lock().await.clone()
    }

    /// Remove exactly the given records (matched by id) and persist.
    ///
    /// Records not present are ignored; survivors keep their order. Used to
    /// clear exactly the set a confirmed batch contained.
    pub async fn remove_all(&self, delivered: &[Record]) -> Result<()> {
        let ids: HashSet<&str> = delivered.iter().map(|r| r.id.as_str()).collect();
        let mut records = self.records.lock().await;
        records.retain(|r| !ids.contains(r.id.as_str()));
        debug!(
            "Removed {} delivered record(s), {} still pending",
            ids.len(),
            records.len()
        );
        self.persist(&records).await
    }

    /// Count of pending records
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Drop everything, pending acknowledgment or not.
    ///
    /// Administrative escape hatch; the caller owns the decision that the
    /// collector no longer needs these records.
    pub async fn clear(&self) -> Result<()> {
        let mut records = self.records.lock().await;
        records.clear();
        info!("Cleared pending queue");
        self.persist(&records).await
    }

    /// Path of the durable slot backing this queue
    pub fn slot(&self) -> &Path {
        &self.slot
    }

    /// Rewrite the slot with the full current state, via temp file + rename
    /// so the slot never holds a partial write.
    async fn persist(&self, records: &[Record]) -> Result<()> {
        let bytes = serde_json::to_vec(records)?;
        let tmp = self.slot.with_extension("tmp");

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|source| RelayError::Persistence {
                path: tmp.clone(),
                source,
            })?;

        tokio::fs::rename(&tmp, self.slot.as_ref())
            .await
            .map_err(|source| RelayError::Persistence {
                path: self.slot.as_ref().clone(),
                source,
            })
    }
}
