use crate::node::{self, Node};

use super::NodeArgs;

pub fn run_replay(args: &NodeArgs) -> anyhow::Result<()> {
    let config = args.load()?;
    let stats = node::replay(&config)?;

    println!(
        "Replayed {} records: {} applied, {} rejected, {} skipped",
        stats.records(),
        stats.applied,
        stats.rejected,
        stats.skipped
    );
    Ok(())
}

pub async fn run_sweep(args: &NodeArgs, canonical_limit: u32) -> anyhow::Result<()> {
    let config = args.load()?;
    let node = Node::start(config)?;
    let registry = node.registry().clone();

    let outcome = async {
        let backfilled = registry.backfill_canonical_hashes(canonical_limit).await?;
        let orphans = registry.delete_orphaned_content().await?;
        let downloads = registry.delete_expired_downloads().await?;
        anyhow::Ok((backfilled, orphans, downloads))
    }
    .await;
    node.shutdown().await;

    let (backfilled, orphans, downloads) = outcome?;
    println!("Canonical hashes backfilled: {backfilled}");
    println!("Orphaned content removed:    {orphans}");
    println!("Expired downloads removed:   {downloads}");
    Ok(())
}
