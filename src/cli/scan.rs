use anyhow::{Context, Result};

use org_decommission::config::RunConfig;
use org_decommission::Orchestrator;

use super::{login, render, LoginArgs};

/// Log in, scan the organization and print what it holds. Nothing is deleted.
pub async fn run(config: RunConfig, args: &LoginArgs, json: bool) -> Result<()> {
    let mut orchestrator = Orchestrator::new(config)?;
    login(&mut orchestrator, args).await?;

    let inventory = orchestrator.scan_inventory().await.context("scan failed")?;
    if json {
        println!("{}", serde_json::to_string_pretty(inventory)?);
    } else {
        print!("{}", render::inventory_summary(inventory));
    }

    orchestrator.finish().await;
    Ok(())
}
