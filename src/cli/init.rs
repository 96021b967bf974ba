use crate::config::LogBackend;
use crate::node::{open_log, open_store};
use crate::store::Store;

use super::NodeArgs;

pub fn run_init(args: &NodeArgs) -> anyhow::Result<()> {
    let config = args.load()?;

    let store = open_store(&config)?;
    if config.log_backend == LogBackend::File {
        open_log(&config)?;
    }

    println!(
        "Initialized {} (schema version {})",
        config.data_dir.display(),
        store.schema_version()?
    );
    Ok(())
}
