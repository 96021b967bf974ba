//! Consumes the log into the local projection, one task per partition.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::log::{LogRecord, LogTransport};
use crate::store::Store;

const DEFAULT_BATCH_SIZE: usize = 256;

/// Applies log records to the store in offset order and reports outcomes of
/// locally published messages to the coordinator.
pub struct Applier {
    store: Arc<dyn Store>,
    log: Arc<dyn LogTransport>,
    coordinator: Option<Arc<Coordinator>>,
    batch_size: usize,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
    stop: Arc<Notify>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub applied: usize,
    /// Messages the handlers refused, e.g. a duplicate create.
    pub rejected: usize,
    /// Records that could not be decoded.
    pub skipped: usize,
    pub duration: Duration,
}

impl ApplyStats {
    #[must_use]
    pub fn records(&self) -> usize {
        self.applied + self.rejected + self.skipped
    }

    fn absorb(&mut self, other: &ApplyStats) {
        self.applied += other.applied;
        self.rejected += other.rejected;
        self.skipped += other.skipped;
        self.duration += other.duration;
    }
}

impl Applier {
    pub fn new(store: Arc<dyn Store>, log: Arc<dyn LogTransport>) -> Self {
        Self {
            store,
            log,
            coordinator: None,
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: Duration::from_millis(100),
            shutdown: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(Notify::new()),
        }
    }

    /// Report outcomes of records this node published.
    pub fn with_coordinator(mut self, coordinator: Arc<Coordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Fallback wake-up when an append notification is missed.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Applies one batch from `partition`, starting at the store's recorded
    /// next offset.
    pub fn run_once(&self, partition: u32) -> Result<ApplyStats> {
        let start = Instant::now();
        let from = self.store.next_offset(partition)?;
        let records = self.log.read(partition, from, self.batch_size)?;

        let mut stats = ApplyStats::default();
        for (offset, record) in records {
            if let Err(e) = self.apply_record(partition, offset, &record, &mut stats) {
                // The rest of the batch waits for this record. Surfaced only
                // when nothing in the batch was applied.
                if stats.records() == 0 {
                    return Err(e);
                }
                break;
            }
        }
        stats.duration = start.elapsed();
        Ok(stats)
    }

    fn apply_record(
        &self,
        partition: u32,
        offset: u64,
        record: &LogRecord,
        stats: &mut ApplyStats,
    ) -> Result<()> {
        let outcome = match record.decode() {
            Ok((_, message)) => {
                let outcome = self.store.apply(partition, offset, &message);
                if let Err(e) = &outcome {
                    if self.store.next_offset(partition)? <= offset {
                        // Not consumed: the waiter stays pending for the retry.
                        warn!(
                            partition,
                            offset,
                            message = %message.message_type(),
                            error = %e,
                            "record not applied, will retry"
                        );
                        return outcome.map(|_| ());
                    }
                }
                match &outcome {
                    Ok(_) => stats.applied += 1,
                    Err(e) => {
                        stats.rejected += 1;
                        debug!(
                            partition,
                            offset,
                            message = %message.message_type(),
                            error = %e,
                            "record rejected"
                        );
                    }
                }
                outcome
            }
            Err(e) => {
                error!(
                    partition,
                    offset,
                    routing_key = %record.routing_key,
                    error = %e,
                    "undecodable record"
                );
                self.store.skip(partition, offset)?;
                stats.skipped += 1;
                Err(Error::ApplyFailure {
                    key: record.routing_key.clone(),
                    reason: e.to_string(),
                })
            }
        };

        if let Some(coordinator) = &self.coordinator {
            if record.origin == coordinator.node_id() {
                coordinator.complete(record.correlation_id, outcome);
            }
        }
        Ok(())
    }

    /// Drains every partition up to its current end. Used at startup and for
    /// offline replay.
    pub fn catch_up(&self) -> Result<ApplyStats> {
        let mut total = ApplyStats::default();
        for partition in 0..self.log.partition_count() {
            loop {
                let stats = self.run_once(partition)?;
                if stats.records() == 0 {
                    break;
                }
                total.absorb(&stats);
            }
        }
        Ok(total)
    }

    /// Records appended but not yet applied, across all partitions.
    pub fn lag(&self) -> Result<u64> {
        let mut lag = 0;
        for partition in 0..self.log.partition_count() {
            let end = self.log.end_offset(partition)?;
            lag += end.saturating_sub(self.store.next_offset(partition)?);
        }
        Ok(lag)
    }

    /// Applies `partition` until shutdown. Waits on the log's append
    /// notification when caught up, with the poll interval as a fallback.
    pub async fn run_partition(&self, partition: u32) {
        let appended = match self.log.notifier(partition) {
            Ok(appended) => appended,
            Err(e) => {
                error!(partition, error = %e, "cannot watch partition");
                return;
            }
        };
        while !self.shutdown.load(Ordering::SeqCst) {
            let notified = appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.run_once(partition) {
                Ok(stats) if stats.records() == 0 => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = self.stop.notified() => {}
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Ok(stats) => {
                    debug!(
                        partition,
                        applied = stats.applied,
                        rejected = stats.rejected,
                        skipped = stats.skipped,
                        "applied batch in {:?}",
                        stats.duration
                    );
                }
                Err(e) => {
                    error!(partition, error = %e, "applier error");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
        debug!(partition, "applier stopped");
    }

    /// Starts one task per partition.
    pub fn spawn(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        info!(partitions = self.log.partition_count(), "starting appliers");
        (0..self.log.partition_count())
            .map(|partition| {
                let applier = Arc::clone(self);
                tokio::spawn(async move { applier.run_partition(partition).await })
            })
            .collect()
    }

    /// Signal graceful shutdown
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.stop.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::values::GroupRef;
    use crate::log::{InMemoryLog, Message};
    use crate::store::{Applied, SqliteStore};
    use crate::types::Group;
    use chrono::DateTime;
    use uuid::Uuid;

    fn store() -> Arc<SqliteStore> {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        Arc::new(store)
    }

    fn group(group_id: &str) -> Message {
        let at = DateTime::from_timestamp(1_000, 0).unwrap();
        Message::CreateGroup(Group {
            group_id: group_id.to_string(),
            description: None,
            artifacts_type: None,
            created_by: "alice".to_string(),
            created_on: at,
            modified_by: "alice".to_string(),
            modified_on: at,
            properties: Default::default(),
        })
    }

    fn publish(log: &InMemoryLog, message: &Message) -> (u32, u64) {
        log.append(LogRecord::new(Uuid::new_v4(), "elsewhere", message).unwrap())
            .unwrap()
    }

    #[test]
    fn test_catch_up_applies_every_partition() {
        let log = Arc::new(InMemoryLog::new(4));
        let store = store();
        for id in ["a", "b", "c", "d", "e"] {
            publish(&log, &group(id));
        }
        publish(&log, &group("a"));

        let applier = Applier::new(store.clone(), log.clone()).with_batch_size(2);
        let stats = applier.catch_up().unwrap();
        assert_eq!(stats.applied, 5);
        assert_eq!(stats.rejected, 1);
        assert_eq!(applier.lag().unwrap(), 0);
        assert_eq!(store.list_groups(Default::default()).unwrap().count, 5);

        assert_eq!(applier.catch_up().unwrap().records(), 0);
    }

    #[test]
    fn test_undecodable_record_is_skipped() {
        let log = Arc::new(InMemoryLog::new(1));
        let store = store();

        let mut corrupt = LogRecord::new(Uuid::new_v4(), "elsewhere", &group("a")).unwrap();
        corrupt.value = b"not json".to_vec();
        log.append(corrupt).unwrap();
        publish(&log, &group("b"));

        let applier = Applier::new(store.clone(), log.clone());
        let stats = applier.catch_up().unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.applied, 1);
        assert_eq!(store.next_offset(0).unwrap(), 2);
        assert!(store.get_group("a").unwrap().is_none());
        assert!(store.get_group("b").unwrap().is_some());
    }

    #[test]
    fn test_unapplied_record_holds_back_partition() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("apiary.db");
        let store = SqliteStore::new(&path).unwrap();
        store.initialize().unwrap();
        let store = Arc::new(store);
        let log = Arc::new(InMemoryLog::new(1));
        publish(&log, &group("a"));
        publish(&log, &group("b"));

        let blocker = rusqlite::Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE").unwrap();

        let applier = Applier::new(store.clone(), log.clone());
        let err = applier.run_once(0).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.next_offset(0).unwrap(), 0);
        assert_eq!(applier.lag().unwrap(), 2);

        blocker.execute_batch("ROLLBACK").unwrap();
        let stats = applier.run_once(0).unwrap();
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.rejected, 0);
        assert!(store.get_group("a").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_running_applier_completes_submissions() {
        let log = Arc::new(InMemoryLog::new(2));
        let store = store();
        let coordinator = Arc::new(Coordinator::new(
            "node-a",
            log.clone(),
            Duration::from_secs(5),
        ));
        let applier = Arc::new(
            Applier::new(store.clone(), log.clone())
                .with_coordinator(coordinator.clone())
                .with_poll_interval(Duration::from_millis(10)),
        );
        let handles = applier.spawn();

        let applied = coordinator.submit(group("G")).await.unwrap();
        assert!(matches!(applied, Applied::Group(g) if g.group_id == "G"));

        let err = coordinator
            .submit(Message::DeleteGroup(GroupRef {
                group_id: "missing".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NotFound");

        applier.shutdown();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
