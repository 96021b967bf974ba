use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{info, warn};

use super::{LogRecord, LogTransport};
use crate::error::{Error, Result};

const META_FILE: &str = "log.json";

#[derive(Debug, Serialize, Deserialize)]
struct LogMeta {
    partitions: u32,
}

struct Partition {
    file: Mutex<File>,
    records: RwLock<Vec<LogRecord>>,
    notify: Arc<Notify>,
}

/// Single-host log: one JSON-lines file per partition under a directory.
///
/// Appends are fsynced before they are acknowledged. The partition count is
/// fixed when the directory is first created, since changing it would move
/// routing keys between partitions.
pub struct FileLog {
    dir: PathBuf,
    partitions: Vec<Partition>,
}

impl FileLog {
    pub fn open<P: AsRef<Path>>(dir: P, partitions: u32) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let meta_path = dir.join(META_FILE);
        let partitions = if meta_path.exists() {
            let meta: LogMeta = serde_json::from_str(&fs::read_to_string(&meta_path)?)?;
            if meta.partitions != partitions {
                return Err(Error::Config(format!(
                    "log at {} has {} partitions, configured {partitions}",
                    dir.display(),
                    meta.partitions
                )));
            }
            meta.partitions
        } else {
            let meta = LogMeta {
                partitions: partitions.max(1),
            };
            fs::write(&meta_path, serde_json::to_vec(&meta)?)?;
            meta.partitions
        };

        let partitions = (0..partitions)
            .map(|index| open_partition(&dir, index))
            .collect::<Result<Vec<_>>>()?;

        info!(dir = %dir.display(), partitions = partitions.len(), "opened file log");
        Ok(Self { dir, partitions })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn partition(&self, partition: u32) -> Result<&Partition> {
        self.partitions
            .get(partition as usize)
            .ok_or_else(|| Error::BadRequest(format!("no such partition: {partition}")))
    }
}

fn partition_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("partition-{index}.jsonl"))
}

fn open_partition(dir: &Path, index: u32) -> Result<Partition> {
    let path = partition_path(dir, index);
    let mut records = Vec::new();
    let mut valid_len: u64 = 0;

    if path.exists() {
        let bytes = fs::read(&path)?;
        for line in bytes.split_inclusive(|b| *b == b'\n') {
            let Some(body) = line.strip_suffix(b"\n") else {
                // A torn final write; it was never acknowledged.
                warn!(
                    path = %path.display(),
                    offset = records.len(),
                    bytes = line.len(),
                    "truncating incomplete record at end of partition"
                );
                break;
            };
            let record = serde_json::from_slice::<LogRecord>(body).map_err(|e| {
                Error::InvalidState(format!(
                    "{}: unreadable record at offset {}: {e}",
                    path.display(),
                    records.len()
                ))
            })?;
            records.push(record);
            valid_len += line.len() as u64;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(&path)?;
    if file.metadata()?.len() != valid_len {
        file.set_len(valid_len)?;
    }

    Ok(Partition {
        file: Mutex::new(file),
        records: RwLock::new(records),
        notify: Arc::new(Notify::new()),
    })
}

impl LogTransport for FileLog {
    fn partition_count(&self) -> u32 {
        self.partitions.len() as u32
    }

    fn append(&self, record: LogRecord) -> Result<(u32, u64)> {
        let index = self.partition_for(&record.routing_key);
        let partition = self.partition(index)?;

        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let offset = {
            let mut file = partition.file.lock().unwrap_or_else(|e| e.into_inner());
            file.write_all(&line)?;
            file.sync_data()?;

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
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;

    fn record(n: u8) -> LogRecord {
        LogRecord {
            correlation_id: Uuid::new_v4(),
            origin: "node-a".to_string(),
            routing_key: "G".to_string(),
            key: vec![n],
            value: vec![n, n],
        }
    }

    #[test]
    fn test_records_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let partition = {
            let log = FileLog::open(temp.path(), 2).unwrap();
            let (p, _) = log.append(record(1)).unwrap();
            log.append(record(2)).unwrap();
            p
        };

        let log = FileLog::open(temp.path(), 2).unwrap();
        let records = log.read(partition, 0, 10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].1.value, vec![2, 2]);
        assert_eq!(log.end_offset(partition).unwrap(), 2);
    }

    #[test]
    fn test_partition_count_is_fixed() {
        let temp = TempDir::new().unwrap();
        FileLog::open(temp.path(), 2).unwrap();
        let result = FileLog::open(temp.path(), 3);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_torn_tail_is_truncated() {
        let temp = TempDir::new().unwrap();
        let partition = {
            let log = FileLog::open(temp.path(), 1).unwrap();
            log.append(record(1)).unwrap();
            0
        };

        let path = partition_path(temp.path(), partition);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"correlationId\":").unwrap();
        drop(file);

        let log = FileLog::open(temp.path(), 1).unwrap();
        assert_eq!(log.end_offset(partition).unwrap(), 1);
        let (_, offset) = log.append(record(2)).unwrap();
        assert_eq!(offset, 1);

        let reopened = FileLog::open(temp.path(), 1).unwrap();
        assert_eq!(reopened.end_offset(partition).unwrap(), 2);
    }

    #[test]
    fn test_corrupt_record_is_not_truncated() {
        let temp = TempDir::new().unwrap();
        {
            let log = FileLog::open(temp.path(), 1).unwrap();
            for n in 1..=3 {
                log.append(record(n)).unwrap();
            }
        }

        let path = partition_path(temp.path(), 0);
        let text = fs::read_to_string(&path).unwrap();
        let mut lines: Vec<&str> = text.lines().collect();
        lines[1] = "{\"correlationId\": garbage}";
        let corrupted = format!("{}\n", lines.join("\n"));
        fs::write(&path, &corrupted).unwrap();

        let result = FileLog::open(temp.path(), 1);
        assert!(matches!(result, Err(Error::InvalidState(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), corrupted);
    }
}
