use std::sync::{Arc, RwLock};

use tokio::sync::Notify;

use super::{LogRecord, LogTransport};
use crate::error::{Error, Result};

struct Partition {
    records: RwLock<Vec<LogRecord>>,
    notify: Arc<Notify>,
}

/// Log kept in process memory. Several nodes built on one `Arc<InMemoryLog>`
/// behave like a cluster sharing one log.
pub struct InMemoryLog {
    partitions: Vec<Partition>,
}

impl InMemoryLog {
    #[must_use]
    pub fn new(partitions: u32) -> Self {
        let partitions = (0..partitions.max(1))
            .map(|_| Partition {
                records: RwLock::new(Vec::new()),
                notify: Arc::new(Notify::new()),
            })
            .collect();
        Self { partitions }
    }

    fn partition(&self, partition: u32) -> Result<&Partition> {
        self.partitions
            .get(partition as usize)
            .ok_or_else(|| Error::BadRequest(format!("no such partition: {partition}")))
    }
}

impl LogTransport for InMemoryLog {
    fn partition_count(&self) -> u32 {
        self.partitions.len() as u32
    }

    fn append(&self, record: LogRecord) -> Result<(u32, u64)> {
        let index = self.partition_for(&record.routing_key);
        let partition = self.partition(index)?;
        let offset = {
            let mut records = partition.records.write().unwrap_or_else(|e| e.into_inner());
            records.push(record);
            records.len() as u64 - 1
        };
        partition.notify.notify_waiters();
        Ok((index, offset))
    }

    fn read(&self, partition: u32, from: u64, max: usize) -> Result<Vec<(u64, LogRecord)>> {
        let records = self
            .partition(partition)?
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner());
        Ok(records
            .iter()
            .enumerate()
            .skip(from as usize)
            .take(max)
            .map(|(offset, record)| (offset as u64, record.clone()))
            .collect())
    }

    fn end_offset(&self, partition: u32) -> Result<u64> {
        let records = self
            .partition(partition)?
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner());
        Ok(records.len() as u64)
    }

    fn notifier(&self, partition: u32) -> Result<Arc<Notify>> {
        Ok(Arc::clone(&self.partition(partition)?.notify))
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn record(routing_key: &str, n: u8) -> LogRecord {
        LogRecord {
            correlation_id: Uuid::new_v4(),
            origin: "node-a".to_string(),
            routing_key: routing_key.to_string(),
            key: vec![n],
            value: vec![n],
        }
    }

    #[test]
    fn test_same_routing_key_reads_back_in_order() {
        let log = InMemoryLog::new(4);
        let mut partition = None;
        for n in 0..5 {
            let (p, offset) = log.append(record("G", n)).unwrap();
            assert_eq!(offset, u64::from(n));
            partition = Some(p);
        }

        let partition = partition.unwrap();
        let records = log.read(partition, 0, 10).unwrap();
        let keys: Vec<u8> = records.iter().map(|(_, r)| r.key[0]).collect();
        assert_eq!(keys, vec![0, 1, 2, 3, 4]);
        assert_eq!(log.end_offset(partition).unwrap(), 5);
    }

    #[test]
    fn test_read_window() {
        let log = InMemoryLog::new(1);
        for n in 0..5 {
            log.append(record("G", n)).unwrap();
        }
        let window = log.read(0, 2, 2).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].0, 2);
        assert_eq!(window[1].0, 3);
        assert!(log.read(0, 9, 2).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_partition_is_an_error() {
        let log = InMemoryLog::new(2);
        assert!(log.read(7, 0, 1).is_err());
        assert!(matches!(log.notifier(2), Err(Error::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_append_wakes_registered_waiter() {
        let log = Arc::new(InMemoryLog::new(1));
        let notify = log.notifier(0).unwrap();
        let notified = notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        log.append(record("G", 1)).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), notified)
            .await
            .unwrap();
    }
}
