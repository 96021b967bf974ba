use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::config::NodeConfig;

/// Where a command finds its node configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct NodeArgs {
    /// Node configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Data directory holding the projection and the log; overrides the
    /// configuration file and APIARY_DATA_DIR
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

impl NodeArgs {
    pub fn load(&self) -> anyhow::Result<NodeConfig> {
        let mut config = NodeConfig::load(self.config.as_deref())?;
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory and bring the projection schema up to date
    Init {
        #[command(flatten)]
        node: NodeArgs,
    },

    /// Show projection and log status
    Info {
        #[command(flatten)]
        node: NodeArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply every log record the projection has not seen yet
    Replay {
        #[command(flatten)]
        node: NodeArgs,
    },

    /// Remove orphaned content and expired downloads, and backfill
    /// canonical hashes
    Sweep {
        #[command(flatten)]
        node: NodeArgs,

        /// Content rows to backfill canonical hashes for
        #[arg(long, default_value = "100")]
        canonical_limit: u32,
    },
}
