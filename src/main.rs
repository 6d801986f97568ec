mod cli;
mod config;
mod model;
mod providers;
mod sync;
mod util;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use providers::devops::DevOpsProvider;
use providers::jira::JiraProvider;
use providers::{SourceTracker, TargetTracker};
use sync::{SyncEngine, SyncOptions};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Settings are checked before either remote system is contacted.
    let mut config = config::load_config(&cli.config)?;
    config.apply_cli(&cli);
    let config = config.validate().context("Invalid configuration")?;
    let queries = config.query_list();

    let source = Arc::new(JiraProvider::new(&config.jira));
    let target = Arc::new(DevOpsProvider::new(&config.devops));
    info!(
        source = source.name(),
        target = target.name(),
        jira = %config.jira.url,
        devops = %config.devops.url,
        project = %config.devops.project,
        mode = ?config.mode,
        queries = queries.len(),
        "starting sync"
    );

    let engine = SyncEngine::new(source, target, SyncOptions::from_config(&config));
    let stats = engine.run(&queries).await?;

    info!(
        queries = stats.queries,
        pages = stats.pages,
        created = stats.created,
        updated = stats.updated,
        linked = stats.linked,
        missing_parents = stats.missing_parents,
        "sync finished"
    );
    println!("Done");
    Ok(())
}
