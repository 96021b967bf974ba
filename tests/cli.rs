//! CLI integration tests for the apiary operator commands.
//!
//! Each test uses an isolated temp directory for the projection and the
//! file log, ensuring tests can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use std::path::Path;

use apiary::config::CanonicalDedup;
use apiary::content::content_hash;
use apiary::log::values::{ContentValue, CreateArtifactValue, VersionValue};
use apiary::log::{FileLog, LogRecord, LogTransport, Message};
use apiary::store::{SqliteStore, Store, latest_version};
use apiary::types::{Artifact, ArtifactType, Group, VersionState};
use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use chrono::{TimeZone, Utc};
use predicates::prelude::*;
use serde_json::Value;
use uuid::Uuid;

const SCHEMA: &str = r#"{"type":"record","name":"Order","fields":[{"name":"id","type":"long"}]}"#;

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    fn data_dir_str(&self) -> String {
        self.data_dir().to_string_lossy().to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("apiary").expect("failed to find binary");
        cmd.env("NO_COLOR", "1").env_remove("APIARY_DATA_DIR");
        cmd
    }

    fn run(&self, command: &str) -> assert_cmd::assert::Assert {
        self.cmd()
            .args([command, "--data-dir", &self.data_dir_str()])
            .assert()
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.run("init")
    }

    fn info_json(&self) -> Value {
        let output = self
            .cmd()
            .args(["info", "--data-dir", &self.data_dir_str(), "--json"])
            .output()
            .expect("failed to run command");

        serde_json::from_slice(&output.stdout).expect("failed to parse JSON")
    }

    /// Appends messages to the node's file log as another node would.
    fn publish(&self, messages: &[Message]) {
        let log = FileLog::open(self.data_dir().join("log"), 4).expect("open log");
        for message in messages {
            let record = LogRecord::new(Uuid::new_v4(), "node-remote", message).expect("encode");
            log.append(record).expect("append");
        }
    }

    fn open_store(&self) -> SqliteStore {
        SqliteStore::new(self.data_dir().join("apiary.db")).expect("open store")
    }
}

fn group(group_id: &str) -> Message {
    let at = Utc.with_ymd_and_hms(2026, 1, 5, 9, 30, 0).unwrap();
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

fn content(bytes: &str) -> Message {
    Message::CreateContent(ContentValue {
        content_hash: content_hash(bytes.as_bytes()),
        canonical_hash: None,
        content: bytes.as_bytes().to_vec(),
        references: Vec::new(),
        dedup: CanonicalDedup::Reuse,
        claimed_on: Utc.with_ymd_and_hms(2020, 1, 5, 9, 0, 0).unwrap(),
    })
}

fn artifact_with_version(artifact_id: &str, global_id: i64, content_id: i64) -> Message {
    let at = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();
    Message::CreateArtifact(CreateArtifactValue {
        artifact: Artifact {
            group_id: "G".to_string(),
            artifact_id: artifact_id.to_string(),
            artifact_type: ArtifactType::Avro,
            created_by: "alice".to_string(),
            created_on: at,
        },
        first_version: Some(VersionValue {
            global_id,
            group_id: "G".to_string(),
            artifact_id: artifact_id.to_string(),
            version: None,
            state: VersionState::Enabled,
            name: None,
            description: None,
            labels: Vec::new(),
            properties: Default::default(),
            created_by: "alice".to_string(),
            created_on: at,
            content_id,
            branches: Vec::new(),
        }),
    })
}

// ============================================================================
// Init Command Tests
// ============================================================================

#[test]
fn init_creates_projection_and_log() {
    let ctx = TestContext::new();

    ctx.init()
        .success()
        .stdout(predicate::str::contains("Initialized"))
        .stdout(predicate::str::contains(format!(
            "schema version {}",
            latest_version()
        )));

    ctx.temp_dir.child("apiary.db").assert(predicate::path::exists());
    ctx.temp_dir
        .child("log")
        .assert(predicate::path::is_dir());
}

#[test]
fn init_is_idempotent() {
    let ctx = TestContext::new();

    ctx.init().success();
    ctx.init().success();

    assert_eq!(ctx.open_store().schema_version().unwrap(), latest_version());
}

#[test]
fn init_honors_data_dir_from_environment() {
    let ctx = TestContext::new();

    ctx.cmd()
        .arg("init")
        .env("APIARY_DATA_DIR", ctx.data_dir())
        .assert()
        .success();

    ctx.temp_dir.child("apiary.db").assert(predicate::path::exists());
}

// ============================================================================
// Info Command Tests
// ============================================================================

#[test]
fn info_requires_initialized_data_dir() {
    let ctx = TestContext::new();

    ctx.run("info")
        .failure()
        .stderr(predicate::str::contains("apiary init"));
}

#[test]
fn info_json_reports_empty_projection() {
    let ctx = TestContext::new();
    ctx.init().success();

    let info = ctx.info_json();
    assert_eq!(info["schema_version"], latest_version());
    assert_eq!(info["latest_schema_version"], latest_version());
    assert_eq!(info["groups"], 0);
    assert_eq!(info["artifacts"], 0);
    assert_eq!(info["lag"], 0);
    assert_eq!(info["partitions"].as_array().unwrap().len(), 4);
}

#[test]
fn info_reports_lag_for_unapplied_records() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.publish(&[group("G"), group("H")]);

    assert_eq!(ctx.info_json()["lag"], 2);
    assert_eq!(ctx.info_json()["groups"], 0);
}

#[test]
fn info_text_output_shows_status() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.run("info")
        .success()
        .stdout(predicate::str::contains("Apiary Node Status"))
        .stdout(predicate::str::contains("Artifacts:     0"));
}

#[test]
fn info_reads_partition_count_from_config_file() {
    let ctx = TestContext::new();
    let config = ctx.temp_dir.child("apiary.toml");
    config
        .write_str(&format!(
            "data_dir = {:?}\npartitions = 2\n",
            ctx.data_dir_str()
        ))
        .unwrap();
    let config_path = config.path().to_string_lossy().to_string();

    ctx.cmd()
        .args(["init", "--config", &config_path])
        .assert()
        .success();

    let output = ctx
        .cmd()
        .args(["info", "--config", &config_path, "--json"])
        .output()
        .expect("failed to run command");
    let info: Value = serde_json::from_slice(&output.stdout).expect("failed to parse JSON");
    assert_eq!(info["partitions"].as_array().unwrap().len(), 2);
}

// ============================================================================
// Replay Command Tests
// ============================================================================

#[test]
fn replay_applies_published_records() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.publish(&[group("G"), content(SCHEMA)]);

    ctx.run("replay")
        .success()
        .stdout(predicate::str::contains("Replayed 2 records: 2 applied"));

    let info = ctx.info_json();
    assert_eq!(info["groups"], 1);
    assert_eq!(info["lag"], 0);

    ctx.run("replay")
        .success()
        .stdout(predicate::str::contains("Replayed 0 records"));
}

#[test]
fn replay_counts_rejected_and_undecodable_records() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.publish(&[group("G"), group("G")]);

    let log = FileLog::open(ctx.data_dir().join("log"), 4).unwrap();
    log.append(LogRecord {
        correlation_id: Uuid::new_v4(),
        origin: "node-remote".to_string(),
        routing_key: "G".to_string(),
        key: b"not a key".to_vec(),
        value: Vec::new(),
    })
    .unwrap();
    drop(log);

    ctx.run("replay").success().stdout(predicate::str::contains(
        "Replayed 3 records: 1 applied, 1 rejected, 1 skipped",
    ));
    assert_eq!(ctx.info_json()["lag"], 0);
}

// ============================================================================
// Sweep Command Tests
// ============================================================================

#[test]
fn sweep_removes_unreferenced_content() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.publish(&[content(SCHEMA)]);

    ctx.run("sweep")
        .success()
        .stdout(predicate::str::is_match(r"Orphaned content removed:\s+1").unwrap());

    let store = ctx.open_store();
    let hash = content_hash(SCHEMA.as_bytes());
    assert!(store.get_content_by_hash(&hash).unwrap().is_none());
}

#[test]
fn sweep_backfills_canonical_hashes_of_used_content() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.publish(&[content(SCHEMA)]);
    ctx.run("replay").success();
    ctx.publish(&[artifact_with_version("A1", 1, 1)]);

    ctx.run("sweep")
        .success()
        .stdout(predicate::str::is_match(r"Canonical hashes backfilled:\s+1").unwrap())
        .stdout(predicate::str::is_match(r"Orphaned content removed:\s+0").unwrap());

    let store = ctx.open_store();
    let stored = store
        .get_content_by_hash(&content_hash(SCHEMA.as_bytes()))
        .unwrap()
        .expect("content kept");
    assert!(stored.canonical_hash.is_some());
    assert_eq!(ctx.info_json()["versions"], 1);
}

#[test]
fn sweep_rejects_invalid_config() {
    let ctx = TestContext::new();
    let config = ctx.temp_dir.child("apiary.toml");
    config.write_str("partitions = 0\n").unwrap();

    ctx.cmd()
        .args(["sweep", "--config", &config.path().to_string_lossy()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("partitions must be at least 1"));
}
