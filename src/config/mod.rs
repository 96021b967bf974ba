mod node;

pub use node::{CanonicalDedup, DATA_DIR_ENV, LogBackend, NodeConfig};
