//! Multi-node tests: every node applies the same log and must end up with
//! the same projection.
//!
//! Nodes share one in-memory log and keep their projections in separate
//! temp directories, so tests can run in parallel safely.

use std::sync::Arc;
use std::time::{Duration, Instant};

use apiary::applier::Applier;
use apiary::config::{CanonicalDedup, LogBackend, NodeConfig};
use apiary::content::content_hash;
use apiary::log::{InMemoryLog, LogTransport, Message};
use apiary::node::Node;
use apiary::registry::{ContentRequest, CreateArtifactRequest, CreateVersionRequest};
use apiary::store::{SqliteStore, Store};
use apiary::types::{ArtifactType, Page, Rule, RuleType};
use serde_json::{Value, json};
use tempfile::TempDir;

const PARTITIONS: u32 = 4;
const SCHEMA_X: &str = r#"{"type":"record","name":"X","fields":[{"name":"id","type":"long"}]}"#;
const SCHEMA_Y: &str = r#"{"type":"record","name":"Y","fields":[]}"#;

struct Cluster {
    log: Arc<dyn LogTransport>,
    nodes: Vec<Node>,
    _dirs: Vec<TempDir>,
}

impl Cluster {
    fn start(count: usize) -> Self {
        Self::start_with_policy(count, CanonicalDedup::Reuse)
    }

    fn start_with_policy(count: usize, dedup: CanonicalDedup) -> Self {
        Self::start_configured(count, |config| NodeConfig {
            canonical_dedup: dedup,
            ..config
        })
    }

    fn start_configured(count: usize, configure: impl Fn(NodeConfig) -> NodeConfig) -> Self {
        let log: Arc<dyn LogTransport> = Arc::new(InMemoryLog::new(PARTITIONS));
        let mut nodes = Vec::with_capacity(count);
        let mut dirs = Vec::with_capacity(count);
        for i in 0..count {
            let dir = TempDir::new().expect("failed to create temp dir");
            let config = configure(memory_config(&dir, &format!("node-{i}")));
            nodes.push(Node::start_with_log(config, Arc::clone(&log)).expect("failed to start node"));
            dirs.push(dir);
        }
        Self {
            log,
            nodes,
            _dirs: dirs,
        }
    }

    fn node(&self, i: usize) -> &Node {
        &self.nodes[i]
    }

    /// Waits until every node has applied everything in the log.
    async fn settle(&self) {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let lag: u64 = self.nodes.iter().map(|n| n.lag().unwrap()).sum();
            if lag == 0 {
                return;
            }
            assert!(Instant::now() < deadline, "nodes still lag by {lag} records");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn shutdown(self) {
        for node in self.nodes {
            node.shutdown().await;
        }
    }
}

fn memory_config(dir: &TempDir, node_id: &str) -> NodeConfig {
    NodeConfig {
        node_id: node_id.to_string(),
        data_dir: dir.path().to_path_buf(),
        partitions: PARTITIONS,
        apply_timeout_ms: 5_000,
        poll_interval_ms: 20,
        canonical_dedup: CanonicalDedup::Reuse,
        log_backend: LogBackend::Memory,
        orphan_grace_ms: 0,
    }
}

fn avro_artifact(artifact_id: &str, content: Option<&str>) -> CreateArtifactRequest {
    CreateArtifactRequest {
        group_id: "G".to_string(),
        artifact_id: artifact_id.to_string(),
        artifact_type: ArtifactType::Avro,
        first_version: content.map(|c| CreateVersionRequest::new(ContentRequest::new(c))),
    }
}

fn version_of(content: &str) -> CreateVersionRequest {
    CreateVersionRequest::new(ContentRequest::new(content))
}

/// Everything a client could observe through reads, as one comparable value.
fn snapshot(store: &dyn Store) -> Value {
    let all = Page::first(10_000);
    let mut groups = Vec::new();
    for group in store.list_groups(all).unwrap().items {
        let mut artifacts = Vec::new();
        for artifact in store.list_artifacts(&group.group_id, all).unwrap().items {
            let (g, a) = (&artifact.group_id, &artifact.artifact_id);
            let mut versions = Vec::new();
            for version in store.list_versions(g, a, all).unwrap().items {
                let content = store.get_content(version.content_id).unwrap();
                let comments = store.list_comments(version.global_id).unwrap();
                versions.push(json!({
                    "version": version,
                    "content": content,
                    "comments": comments,
                }));
            }
            let mut branches = serde_json::Map::new();
            for branch in store.list_branches(g, a).unwrap() {
                let entries = store.branch_versions(g, a, &branch, false, all).unwrap();
                branches.insert(branch, json!(entries));
            }
            artifacts.push(json!({
                "artifact": artifact,
                "versions": versions,
                "branches": branches,
                "rules": store.artifact_rules(g, a).unwrap(),
            }));
        }
        groups.push(json!({ "group": group, "artifacts": artifacts }));
    }
    json!({
        "groups": groups,
        "globalRules": store.global_rules().unwrap(),
        "roleMappings": store.list_role_mappings(all).unwrap().items,
        "config": store.config_properties().unwrap(),
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_versions_and_branches_across_nodes() {
    let cluster = Cluster::start(2);
    let (a, b) = (cluster.node(0).registry(), cluster.node(1).registry());

    let created = a
        .create_artifact("alice", avro_artifact("A1", Some(SCHEMA_X)))
        .await
        .unwrap();
    let first = created.version.unwrap();
    assert_eq!(first.global_id, 1);
    assert_eq!(first.version_order, 1);
    assert_eq!(first.version, "1");
    cluster.settle().await;

    // Identical bytes submitted on the other node share the stored content.
    let second = b
        .create_version("bob", "G", "A1", version_of(SCHEMA_X))
        .await
        .unwrap();
    assert_eq!(second.version_order, 2);
    assert_eq!(second.global_id, 2);
    assert_eq!(second.content_id, first.content_id);

    let entry = b
        .create_branch("G", "A1", "release", vec!["1".to_string()])
        .await
        .unwrap();
    assert_eq!(entry.version, "1");
    cluster.settle().await;

    let entry = a
        .append_branch_version("G", "A1", "release", "2")
        .await
        .unwrap();
    assert_eq!(entry.branch_order, 2);
    cluster.settle().await;

    for node in &cluster.nodes {
        let registry = node.registry();
        let tip = registry.branch_tip_version("G", "A1", "release").unwrap();
        assert_eq!(tip.version, "2");
        assert_eq!(registry.latest_version("G", "A1").unwrap().version, "2");
        let release: Vec<_> = registry
            .branch_versions("G", "A1", "release", Page::default())
            .unwrap()
            .into_iter()
            .map(|e| e.version)
            .collect();
        assert_eq!(release, ["2", "1"]);
    }

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_versions_get_dense_order() {
    let cluster = Cluster::start(2);
    cluster
        .node(0)
        .registry()
        .create_artifact("alice", avro_artifact("A1", None))
        .await
        .unwrap();
    cluster.settle().await;

    let mut tasks = Vec::new();
    for i in 0..10 {
        let registry = Arc::clone(cluster.node(i % 2).registry());
        tasks.push(tokio::spawn(async move {
            let content = format!(r#"{{"type":"record","name":"R{i}","fields":[]}}"#);
            registry
                .create_version("bob", "G", "A1", version_of(&content))
                .await
        }));
    }

    let mut orders = Vec::new();
    let mut global_ids = Vec::new();
    for task in tasks {
        let version = task.await.unwrap().unwrap();
        orders.push(version.version_order);
        global_ids.push(version.global_id);
    }
    orders.sort_unstable();
    global_ids.sort_unstable();
    global_ids.dedup();
    assert_eq!(orders, (1..=10).collect::<Vec<_>>());
    assert_eq!(global_ids.len(), 10);

    cluster.settle().await;
    let latest = cluster.node(1).registry().latest_version("G", "A1").unwrap();
    assert_eq!(latest.version_order, 10);

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_nodes_converge_and_replay_matches() {
    let cluster = Cluster::start(2);
    let (a, b) = (cluster.node(0).registry(), cluster.node(1).registry());

    let (left, right) = tokio::join!(
        a.create_artifact("alice", avro_artifact("A1", Some(SCHEMA_X))),
        b.create_artifact("bob", avro_artifact("A2", Some(SCHEMA_Y))),
    );
    left.unwrap();
    right.unwrap();
    cluster.settle().await;

    b.create_version("bob", "G", "A1", version_of(SCHEMA_Y))
        .await
        .unwrap();
    a.create_artifact_rule(
        "G",
        "A1",
        Rule {
            rule_type: RuleType::Validity,
            configuration: "FULL".to_string(),
        },
    )
    .await
    .unwrap();
    b.create_global_rule(Rule {
        rule_type: RuleType::Compatibility,
        configuration: "BACKWARD".to_string(),
    })
    .await
    .unwrap();
    a.create_comment("alice", "G", "A2", "1", "looks good")
        .await
        .unwrap();
    b.set_config_property("registry.ui.enabled", "false")
        .await
        .unwrap();
    cluster.settle().await;

    let expected = snapshot(cluster.node(0).store().as_ref());
    assert_eq!(snapshot(cluster.node(1).store().as_ref()), expected);

    // A projection rebuilt from nothing but the log matches the live ones.
    let fresh = Arc::new(SqliteStore::open_in_memory().unwrap());
    fresh.initialize().unwrap();
    let stats = Applier::new(fresh.clone(), Arc::clone(&cluster.log))
        .catch_up()
        .unwrap();
    assert_eq!(stats.rejected, 0);
    assert_eq!(snapshot(fresh.as_ref()), expected);

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_redelivered_create_changes_nothing() {
    let cluster = Cluster::start(2);
    let registry = cluster.node(0).registry();
    let first = registry
        .create_artifact("alice", avro_artifact("A1", Some(SCHEMA_X)))
        .await
        .unwrap()
        .version
        .unwrap();
    cluster.settle().await;
    let before = snapshot(cluster.node(1).store().as_ref());

    // At-least-once delivery: the same record shows up a second time.
    let mut duplicate = None;
    for partition in 0..PARTITIONS {
        for (_, record) in cluster.log.read(partition, 0, 1_000).unwrap() {
            if let Ok((_, Message::CreateArtifact(_))) = record.decode() {
                duplicate = Some(record);
            }
        }
    }
    cluster.log.append(duplicate.expect("no create record in log")).unwrap();
    cluster.settle().await;
    assert_eq!(snapshot(cluster.node(1).store().as_ref()), before);

    let err = registry
        .create_artifact("alice", avro_artifact("A1", Some(SCHEMA_X)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "AlreadyExists");
    cluster.settle().await;
    assert_eq!(snapshot(cluster.node(0).store().as_ref()), before);

    // The rejected create still consumed the globalId it was prepared with.
    let next = registry
        .create_artifact("alice", avro_artifact("A2", Some(SCHEMA_Y)))
        .await
        .unwrap()
        .version
        .unwrap();
    assert_eq!(next.global_id, first.global_id + 2);

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deleted_artifact_content_is_swept_once_unreferenced() {
    let cluster = Cluster::start(2);
    let (a, b) = (cluster.node(0).registry(), cluster.node(1).registry());

    let first = a
        .create_artifact("alice", avro_artifact("A1", Some(SCHEMA_X)))
        .await
        .unwrap()
        .version
        .unwrap();
    cluster.settle().await;
    b.create_artifact("bob", avro_artifact("A2", Some(SCHEMA_X)))
        .await
        .unwrap();
    cluster.settle().await;
    let hash = a.version_content(first.global_id).unwrap().content_hash;

    // The sweep travels on the content lane, apart from the deletes, so
    // each node must have applied the delete before the sweep is issued.
    assert_eq!(a.delete_artifact("G", "A1").await.unwrap(), 1);
    cluster.settle().await;
    assert_eq!(b.delete_orphaned_content().await.unwrap(), 0);
    cluster.settle().await;
    assert_eq!(b.get_content_by_hash(&hash).unwrap().content_id, first.content_id);

    assert_eq!(b.delete_artifact("G", "A2").await.unwrap(), 1);
    cluster.settle().await;
    assert_eq!(a.delete_orphaned_content().await.unwrap(), 1);
    cluster.settle().await;

    for node in &cluster.nodes {
        let registry = node.registry();
        assert_eq!(registry.get_content_by_hash(&hash).unwrap_err().kind(), "NotFound");
        assert_eq!(registry.get_artifact("G", "A1").unwrap_err().kind(), "NotFound");
        assert_eq!(
            registry.get_version_by_global_id(first.global_id).unwrap_err().kind(),
            "NotFound"
        );
    }

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_recently_claimed_content_survives_sweep() {
    let cluster = Cluster::start_configured(2, |config| NodeConfig {
        orphan_grace_ms: 60_000,
        ..config
    });
    let (a, b) = (cluster.node(0).registry(), cluster.node(1).registry());

    let first = a
        .create_artifact("alice", avro_artifact("A1", Some(SCHEMA_X)))
        .await
        .unwrap()
        .version
        .unwrap();
    cluster.settle().await;
    assert_eq!(a.delete_artifact("G", "A1").await.unwrap(), 1);
    cluster.settle().await;

    assert_eq!(b.delete_orphaned_content().await.unwrap(), 0);
    cluster.settle().await;
    let hash = content_hash(SCHEMA_X.as_bytes());

    // A later create reuses the row the sweep spared.
    let again = b
        .create_artifact("bob", avro_artifact("A2", Some(SCHEMA_X)))
        .await
        .unwrap()
        .version
        .unwrap();
    assert_eq!(again.content_id, first.content_id);
    cluster.settle().await;

    for node in &cluster.nodes {
        let registry = node.registry();
        assert_eq!(registry.get_content_by_hash(&hash).unwrap().content_id, first.content_id);
    }

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_canonically_equal_content_follows_policy() {
    const COMPACT: &str = r#"{"type":"string"}"#;
    const SPACED: &str = "{ \"type\" : \"string\" }";

    for (dedup, shared) in [(CanonicalDedup::Reuse, true), (CanonicalDedup::StoreNew, false)] {
        let cluster = Cluster::start_with_policy(1, dedup);
        let registry = cluster.node(0).registry();

        let first = registry
            .create_artifact("alice", avro_artifact("A1", Some(COMPACT)))
            .await
            .unwrap()
            .version
            .unwrap();
        let second = registry
            .create_version("alice", "G", "A1", version_of(SPACED))
            .await
            .unwrap();

        assert_eq!(second.content_id == first.content_id, shared, "{dedup:?}");
        let (x, y) = (
            registry.version_content(first.global_id).unwrap(),
            registry.version_content(second.global_id).unwrap(),
        );
        assert!(x.canonical_hash.is_some());
        assert_eq!(x.canonical_hash, y.canonical_hash);

        cluster.shutdown().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_backed_node_resumes_after_restart() {
    let dir = TempDir::new().unwrap();
    let config = NodeConfig {
        log_backend: LogBackend::File,
        ..memory_config(&dir, "node-0")
    };

    let node = Node::start(config.clone()).unwrap();
    node.registry()
        .create_artifact("alice", avro_artifact("A1", Some(SCHEMA_X)))
        .await
        .unwrap();
    node.shutdown().await;

    let node = Node::start(config).unwrap();
    assert_eq!(node.lag().unwrap(), 0);
    let version = node
        .registry()
        .create_version("alice", "G", "A1", version_of(SCHEMA_Y))
        .await
        .unwrap();
    assert_eq!(version.global_id, 2);
    assert_eq!(version.version_order, 2);
    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_partition_mismatch_is_rejected() {
    let dir = TempDir::new().unwrap();
    let log: Arc<dyn LogTransport> = Arc::new(InMemoryLog::new(PARTITIONS + 1));
    let result = Node::start_with_log(memory_config(&dir, "node-0"), log);
    assert_eq!(result.err().map(|e| e.kind()), Some("Config"));
}
