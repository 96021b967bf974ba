//! Correlates published messages with their local apply outcome.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::log::{LogRecord, LogTransport, Message};
use crate::store::Applied;

type Waiters = HashMap<Uuid, oneshot::Sender<Result<Applied>>>;

/// Publishes messages and parks each caller until this node's applier has
/// applied the message it published, or until the apply timeout elapses.
pub struct Coordinator {
    node_id: String,
    log: Arc<dyn LogTransport>,
    timeout: Duration,
    waiters: Mutex<Waiters>,
}

/// Drops the caller's slot however `submit` exits, including cancellation.
struct Slot<'a> {
    coordinator: &'a Coordinator,
    correlation_id: Uuid,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.coordinator.waiters().remove(&self.correlation_id);
    }
}

impl Coordinator {
    pub fn new(node_id: impl Into<String>, log: Arc<dyn LogTransport>, timeout: Duration) -> Self {
        Self {
            node_id: node_id.into(),
            log,
            timeout,
            waiters: Mutex::new(HashMap::new()),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    fn waiters(&self) -> MutexGuard<'_, Waiters> {
        self.waiters.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of callers still waiting on an outcome.
    pub fn pending(&self) -> usize {
        self.waiters().len()
    }

    /// Appends `message` to the log and waits for the local outcome.
    ///
    /// A `ReplicationTimeout` does not mean the message was lost: it is in
    /// the log and every node will still apply it.
    pub async fn submit(&self, message: Message) -> Result<Applied> {
        let correlation_id = Uuid::new_v4();
        let record = LogRecord::new(correlation_id, &self.node_id, &message)?;

        let (tx, rx) = oneshot::channel();
        self.waiters().insert(correlation_id, tx);
        let _slot = Slot {
            coordinator: self,
            correlation_id,
        };

        let log = Arc::clone(&self.log);
        let (partition, offset) = tokio::task::spawn_blocking(move || log.append(record))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;
        debug!(
            %correlation_id,
            message = %message.message_type(),
            partition,
            offset,
            "published"
        );

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(Error::ApplyFailure {
                key: message.scope().partition_key(),
                reason: "applier stopped before reporting an outcome".to_string(),
            }),
            Err(_) => {
                let waited_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(%correlation_id, partition, offset, waited_ms, "apply timed out");
                Err(Error::ReplicationTimeout {
                    correlation_id,
                    waited_ms,
                })
            }
        }
    }

    /// Hands an apply outcome to the caller waiting on `correlation_id`.
    /// Returns false when nobody is waiting, e.g. after a timeout.
    pub fn complete(&self, correlation_id: Uuid, outcome: Result<Applied>) -> bool {
        match self.waiters().remove(&correlation_id) {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::InMemoryLog;
    use crate::log::values::GroupRef;

    fn delete_group(group_id: &str) -> Message {
        Message::DeleteGroup(GroupRef {
            group_id: group_id.to_string(),
        })
    }

    #[tokio::test]
    async fn test_submit_times_out_without_applier() {
        let log = Arc::new(InMemoryLog::new(2));
        let coordinator = Coordinator::new("node-a", log.clone(), Duration::from_millis(20));

        let err = coordinator.submit(delete_group("G")).await.unwrap_err();
        assert!(matches!(err, Error::ReplicationTimeout { waited_ms: 20, .. }));
        assert_eq!(coordinator.pending(), 0);

        let partition = log.partition_for("G");
        assert_eq!(log.end_offset(partition).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_complete_wakes_the_submitter() {
        let log = Arc::new(InMemoryLog::new(1));
        let coordinator = Arc::new(Coordinator::new(
            "node-a",
            log.clone(),
            Duration::from_secs(5),
        ));

        let submitter = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.submit(delete_group("G")).await })
        };

        let record = loop {
            if let Some((_, record)) = log.read(0, 0, 1).unwrap().pop() {
                break record;
            }
            tokio::task::yield_now().await;
        };
        assert_eq!(record.origin, "node-a");
        assert!(coordinator.complete(record.correlation_id, Ok(Applied::Affected(3))));

        assert_eq!(submitter.await.unwrap().unwrap(), Applied::Affected(3));
        assert!(!coordinator.complete(record.correlation_id, Ok(Applied::None)));
    }

    #[tokio::test]
    async fn test_domain_errors_reach_the_submitter() {
        let log = Arc::new(InMemoryLog::new(1));
        let coordinator = Arc::new(Coordinator::new("node-a", log.clone(), Duration::from_secs(5)));

        let submitter = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.submit(delete_group("G")).await })
        };
        let record = loop {
            if let Some((_, record)) = log.read(0, 0, 1).unwrap().pop() {
                break record;
            }
            tokio::task::yield_now().await;
        };
        coordinator.complete(record.correlation_id, Err(Error::not_found("group", "G")));

        let err = submitter.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), "NotFound");
    }
}
