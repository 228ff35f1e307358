use anyhow::{bail, Context, Result};
use chrono::Utc;

use org_decommission::config::RunConfig;
use org_decommission::decommission::{
    AssetOutcome, DeletionResult, ProgressSink, Selection, StopHandle,
};
use org_decommission::{Asset, AssetCategory, Orchestrator};

use super::{login, prompt, render, LoginArgs};

const REISSUE_MARGIN_MINUTES: i64 = 10;

/// Prints one line per category and per asset outcome.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn category_started(&mut self, category: AssetCategory, total: usize) {
        eprintln!("org-decommission: {} {} planned", total, category.label().to_lowercase());
    }

    fn asset_finished(&mut self, asset: &Asset, outcome: &AssetOutcome) {
        match outcome {
            AssetOutcome::Deleted => eprintln!("  deleted {}", asset.display_name()),
            AssetOutcome::Failed { code, detail } => {
                eprintln!("  FAILED  {} [{}] {}", asset.display_name(), code, detail)
            }
            AssetOutcome::NotAttempted => {}
        }
    }

    fn category_finished(&mut self, result: &DeletionResult) {
        if result.attempted() == 0 && !result.not_attempted.is_empty() {
            eprintln!(
                "org-decommission: {} {} skipped",
                result.not_attempted.len(),
                result.category.label().to_lowercase()
            );
        } else if !result.failed.is_empty() {
            eprintln!(
                "org-decommission: {} of {} {} failed",
                result.failed.len(),
                result.attempted(),
                result.category.label().to_lowercase()
            );
        }
    }
}

/// Scan, show the plan, confirm, delete, report.
pub async fn run(
    config: RunConfig,
    args: &LoginArgs,
    yes: bool,
    categories: Vec<AssetCategory>,
) -> Result<()> {
    let org = config.org_short_name.clone();
    let mut orchestrator = Orchestrator::new(config)?;
    login(&mut orchestrator, args).await?;

    let inventory = orchestrator.scan_inventory().await.context("scan failed")?;
    eprint!("{}", render::inventory_summary(inventory));

    let selection = if categories.is_empty() {
        Selection::all()
    } else {
        Selection::categories(categories)
    };
    let plan = orchestrator.plan(&selection)?;
    if plan.is_empty() {
        eprintln!("org-decommission: nothing selected for deletion.");
        orchestrator.finish().await;
        return Ok(());
    }
    eprint!("\n{}", render::plan_summary(&plan));

    if !yes {
        eprintln!("\nThis cannot be undone.");
        let answer = prompt(&format!("Type the organization short name ({org}) to continue: "))?;
        if answer != org {
            orchestrator.finish().await;
            bail!("confirmation did not match, nothing was deleted");
        }
    }

    // The confirmation prompt may have sat open for a while.
    let remaining = orchestrator
        .session()
        .key()
        .map(|key| key.remaining(Utc::now()))
        .unwrap_or_else(chrono::Duration::zero);
    if remaining < chrono::Duration::minutes(REISSUE_MARGIN_MINUTES) {
        eprintln!("org-decommission: api key close to expiry, issuing a new one");
        orchestrator.reissue_key().await.context("re-issuing api key")?;
    }

    let stop = StopHandle::new();
    let ctrl_c = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\norg-decommission: stopping after the current category...");
            ctrl_c.request_stop();
        }
    });

    let report = orchestrator
        .decommission(&plan, &mut ConsoleProgress, &stop)
        .await
        .context("decommission could not start")?;
    orchestrator.finish().await;

    print!("{}", render::report(&report));
    if !report.is_complete() {
        bail!(
            "{} asset(s) were not deleted",
            report.failed() + report.not_attempted()
        );
    }
    Ok(())
}
