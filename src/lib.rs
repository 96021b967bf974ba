//! # Apiary
//!
//! A registry for API and schema documents whose every mutation travels
//! through a partitioned, ordered log before any node applies it to its
//! local SQLite projection.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! apiary = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use apiary::config::NodeConfig;
//! use apiary::node::Node;
//! use apiary::registry::{ContentRequest, CreateArtifactRequest, CreateVersionRequest};
//! use apiary::types::ArtifactType;
//!
//! let node = Node::start(NodeConfig::load(None)?)?;
//! let created = node
//!     .registry()
//!     .create_artifact(
//!         "alice",
//!         CreateArtifactRequest {
//!             group_id: "G".into(),
//!             artifact_id: "A1".into(),
//!             artifact_type: ArtifactType::Avro,
//!             first_version: Some(CreateVersionRequest::new(ContentRequest::new(
//!                 r#"{"type":"string"}"#,
//!             ))),
//!         },
//!     )
//!     .await?;
//! node.shutdown().await;
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

pub mod applier;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod content;
pub mod coordinator;
pub mod error;
pub mod log;
pub mod node;
pub mod registry;
pub mod store;
pub mod types;
