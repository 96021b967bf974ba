use serde::Serialize;

use crate::config::LogBackend;
use crate::log::{FileLog, LogTransport};
use crate::store::{Store, latest_version};
use crate::types::Page;

use super::{NodeArgs, init_store};

#[derive(Serialize)]
struct PartitionInfo {
    partition: u32,
    next_offset: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_offset: Option<u64>,
}

#[derive(Serialize)]
struct NodeInfo {
    schema_version: i32,
    latest_schema_version: i32,
    groups: i64,
    artifacts: i64,
    versions: i64,
    global_rules: usize,
    role_mappings: i64,
    partitions: Vec<PartitionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lag: Option<u64>,
}

pub fn run_info(args: &NodeArgs, json: bool) -> anyhow::Result<()> {
    let config = args.load()?;
    let store = init_store(&config)?;

    let log = match config.log_backend {
        LogBackend::File if config.log_dir().exists() => {
            Some(FileLog::open(config.log_dir(), config.partitions)?)
        }
        _ => None,
    };

    let mut partitions = Vec::with_capacity(config.partitions as usize);
    for partition in 0..config.partitions {
        let end_offset = match &log {
            Some(log) => Some(log.end_offset(partition)?),
            None => None,
        };
        partitions.push(PartitionInfo {
            partition,
            next_offset: store.next_offset(partition)?,
            end_offset,
        });
    }
    let lag = log.as_ref().map(|_| {
        partitions
            .iter()
            .map(|p| p.end_offset.unwrap_or(0).saturating_sub(p.next_offset))
            .sum()
    });

    let info = NodeInfo {
        schema_version: store.schema_version()?,
        latest_schema_version: latest_version(),
        groups: store.list_groups(Page::first(0))?.count,
        artifacts: store.count_artifacts()?,
        versions: store.count_all_versions()?,
        global_rules: store.global_rules()?.len(),
        role_mappings: store.list_role_mappings(Page::first(0))?.count,
        partitions,
        lag,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!();
        println!("Apiary Node Status");
        println!("{}", "─".repeat(18));
        println!(
            "Schema:        v{} (latest v{})",
            info.schema_version, info.latest_schema_version
        );
        println!("Groups:        {}", info.groups);
        println!("Artifacts:     {}", info.artifacts);
        println!("Versions:      {}", info.versions);
        println!("Global rules:  {}", info.global_rules);
        println!("Role mappings: {}", info.role_mappings);
        for p in &info.partitions {
            match p.end_offset {
                Some(end) => println!("Partition {}:   {}/{}", p.partition, p.next_offset, end),
                None => println!("Partition {}:   {}", p.partition, p.next_offset),
            }
        }
        if let Some(lag) = info.lag {
            println!("Lag:           {lag}");
        }
        println!();
    }

    Ok(())
}
