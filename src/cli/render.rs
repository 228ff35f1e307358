//! Plain-text rendering of inventories, plans and reports.

use std::fmt::Write;

use org_decommission::decommission::{DecommissionReport, DeletionPlan};
use org_decommission::inventory::Inventory;
use org_decommission::AssetCategory;

pub fn inventory_summary(inventory: &Inventory) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<22} {:>6}", "CATEGORY", "COUNT");
    for category in AssetCategory::ALL {
        let count = inventory.count(category);
        if count > 0 {
            let _ = writeln!(out, "{:<22} {:>6}", category.label(), count);
        }
    }
    let _ = writeln!(out, "{:<22} {:>6}", "Total", inventory.total());
    if !inventory.embedded().is_empty() {
        let _ = writeln!(
            out,
            "\n{} embedded device(s) are removed with their parent:",
            inventory.embedded().len()
        );
        for asset in inventory.embedded() {
            if let Some(parent) = &asset.parent {
                let _ = writeln!(out, "  {} {} (in {})", asset.category, asset.display_name(), parent);
            }
        }
    }
    if !inventory.issues().is_empty() {
        let _ = writeln!(out, "\nCategories that could not be listed:");
        for issue in inventory.issues() {
            let _ = writeln!(out, "  {} [{}] {}", issue.category.label(), issue.code, issue.detail);
        }
    }
    out
}

pub fn plan_summary(plan: &DeletionPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Deletion order:");
    for (step, batch) in plan.batches.iter().enumerate() {
        let _ = writeln!(out, "  {}. {:<22} {:>6}", step + 1, batch.category.label(), batch.assets.len());
    }
    let _ = writeln!(out, "  {} asset(s) will be permanently deleted.", plan.total());
    if !plan.manual.is_empty() {
        let _ = writeln!(out, "\nRemove by hand (no remote delete):");
        for asset in &plan.manual {
            let _ = writeln!(out, "  {} {}", asset.category, asset.display_name());
        }
    }
    out
}

pub fn report(report: &DecommissionReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<22} {:>9} {:>7} {:>9}",
        "CATEGORY", "DELETED", "FAILED", "SKIPPED"
    );
    for result in &report.results {
        let _ = writeln!(
            out,
            "{:<22} {:>9} {:>7} {:>9}",
            result.category.label(),
            result.succeeded.len(),
            result.failed.len(),
            result.not_attempted.len()
        );
    }
    let _ = writeln!(
        out,
        "{:<22} {:>9} {:>7} {:>9}",
        "Total",
        report.succeeded(),
        report.failed(),
        report.not_attempted()
    );

    let failures: Vec<_> = report.results.iter().flat_map(|r| r.failed.iter().map(move |f| (r.category, f))).collect();
    if !failures.is_empty() {
        let _ = writeln!(out, "\nFailures:");
        for (category, failed) in failures {
            let _ = writeln!(out, "  {} {} [{}] {}", category, failed.name, failed.code, failed.detail);
        }
    }
    if let Some(halt) = &report.halted {
        let _ = writeln!(out, "\nRun halted [{}]: {}", halt.code, halt.detail);
    }
    if report.stopped {
        let _ = writeln!(out, "\nRun stopped on request.");
    }
    if !report.manual.is_empty() {
        let _ = writeln!(out, "\nStill to remove by hand: {}", report.manual.len());
    }
    out
}
