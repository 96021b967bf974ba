mod commands;
mod info;
mod init;
mod maintenance;

pub use commands::{Commands, NodeArgs};
pub use info::run_info;
pub use init::run_init;
pub use maintenance::{run_replay, run_sweep};

use crate::config::NodeConfig;
use crate::store::SqliteStore;

/// Opens the projection of an initialized data directory.
pub fn init_store(config: &NodeConfig) -> anyhow::Result<SqliteStore> {
    let db_path = config.db_path();

    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'apiary init' first.",
            db_path.display()
        );
    }

    SqliteStore::new(&db_path).map_err(Into::into)
}
