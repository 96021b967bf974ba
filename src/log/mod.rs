//! Message protocol and the partitioned log it travels on.

mod codec;
mod file;
mod memory;
mod message;
pub mod values;

pub use file::FileLog;
pub use memory::InMemoryLog;
pub use message::{
    ACL_LANE, CONFIG_LANE, CONTENT_LANE, DOWNLOADS_LANE, GLOBAL_RULES_LANE, KeyScope, Message,
    MessageKey, MessageType, SEQUENCES_LANE,
};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::error::Result;

/// One entry in a partition, as appended by a node's coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub correlation_id: Uuid,
    /// Node id of the publisher; only that node waits on the outcome.
    pub origin: String,
    pub routing_key: String,
    #[serde(with = "codec::base64_bytes")]
    pub key: Vec<u8>,
    #[serde(with = "codec::base64_bytes")]
    pub value: Vec<u8>,
}

impl LogRecord {
    pub fn new(correlation_id: Uuid, origin: &str, message: &Message) -> Result<Self> {
        let key = message.key();
        Ok(Self {
            correlation_id,
            origin: origin.to_string(),
            routing_key: key.scope.routing_key().to_string(),
            key: key.encode()?,
            value: message.encode_value()?,
        })
    }

    /// Decodes the key, then the value according to the key's type.
    pub fn decode(&self) -> Result<(MessageKey, Message)> {
        let key = MessageKey::decode(&self.key)?;
        let message = Message::decode_value(key.message_type, &self.value)?;
        Ok((key, message))
    }
}

/// Partition a routing key is pinned to: the first four bytes of its
/// SHA-256, big-endian, modulo the partition count.
#[must_use]
pub fn partition_for(routing_key: &str, partitions: u32) -> u32 {
    let digest = Sha256::digest(routing_key.as_bytes());
    let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    prefix % partitions.max(1)
}

/// A partitioned, ordered, at-least-once append log.
///
/// `append` returns only once the record is durable; that acknowledgment says
/// nothing about whether any node has applied it yet. Records with the same
/// routing key land in the same partition and are read back in append order.
pub trait LogTransport: Send + Sync {
    fn partition_count(&self) -> u32;

    fn partition_for(&self, routing_key: &str) -> u32 {
        partition_for(routing_key, self.partition_count())
    }

    /// Appends a record and returns its `(partition, offset)`.
    fn append(&self, record: LogRecord) -> Result<(u32, u64)>;

    /// Reads up to `max` records starting at `from`.
    fn read(&self, partition: u32, from: u64, max: usize) -> Result<Vec<(u64, LogRecord)>>;

    /// Offset the next appended record will get.
    fn end_offset(&self, partition: u32) -> Result<u64>;

    /// Signalled after every append to `partition`.
    fn notifier(&self, partition: u32) -> Result<Arc<Notify>>;
}

#[cfg(test)]
mod tests {
    use super::values::GroupRef;
    use super::*;

    #[test]
    fn test_partition_is_stable_and_in_range() {
        for key in ["G", "__content", "__sequences", "com.example"] {
            let p = partition_for(key, 4);
            assert!(p < 4);
            assert_eq!(p, partition_for(key, 4));
        }
        assert_eq!(partition_for("anything", 1), 0);
    }

    #[test]
    fn test_record_carries_routing_key_and_decodes() {
        let message = Message::DeleteGroup(GroupRef {
            group_id: "G".to_string(),
        });
        let record = LogRecord::new(Uuid::new_v4(), "node-a", &message).unwrap();
        assert_eq!(record.routing_key, "G");

        let (key, decoded) = record.decode().unwrap();
        assert_eq!(key.message_type, MessageType::DeleteGroup);
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_corrupt_value_fails_decode() {
        let message = Message::DeleteGroup(GroupRef {
            group_id: "G".to_string(),
        });
        let mut record = LogRecord::new(Uuid::new_v4(), "node-a", &message).unwrap();
        record.value = b"{\"nope\":".to_vec();
        assert!(record.decode().is_err());
    }
}
