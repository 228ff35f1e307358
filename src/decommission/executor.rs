//! Sequential, category-ordered execution of a [`DeletionPlan`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::asset::{Asset, AssetCategory};
use crate::decommission::plan::DeletionPlan;
use crate::decommission::report::{AssetOutcome, DecommissionReport, DeletionResult, Halt};
use crate::error::Result;

/// Deletes one asset on whichever surface owns it.
#[async_trait]
pub trait AssetDeleter: Send {
    async fn delete(&mut self, asset: &Asset) -> Result<()>;
}

/// Progress callbacks for a presentation layer. All methods default to no-ops.
///
/// Every planned category gets `category_started` and `category_finished`,
/// including categories skipped after a halt or a stop request. Their assets
/// finish as [`AssetOutcome::NotAttempted`].
pub trait ProgressSink {
    fn category_started(&mut self, _category: AssetCategory, _total: usize) {}
    fn asset_finished(&mut self, _asset: &Asset, _outcome: &AssetOutcome) {}
    fn category_finished(&mut self, _result: &DeletionResult) {}
}

/// Sink that ignores every event.
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Caller-held switch that refuses to start the next category.
/// In-flight deletions always run to completion.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Walk `plan` in order, deleting each asset independently.
///
/// A per-asset failure never blocks its siblings or later categories. A
/// fatal failure (expired key or session) halts the run: every asset not yet
/// started is reported as not attempted.
pub async fn execute<D>(
    plan: &DeletionPlan,
    deleter: &mut D,
    progress: &mut dyn ProgressSink,
    stop: &StopHandle,
) -> DecommissionReport
where
    D: AssetDeleter + ?Sized,
{
    let started_at = Utc::now();
    let mut results = Vec::with_capacity(plan.batches.len());
    let mut halted: Option<Halt> = None;
    let mut stopped = false;

    for batch in &plan.batches {
        let mut result = DeletionResult::new(batch.category);

        if halted.is_none() && !stopped && stop.is_stop_requested() {
            info!(category = %batch.category, "stop requested, no further categories started");
            stopped = true;
        }
        progress.category_started(batch.category, batch.assets.len());
        if halted.is_some() || stopped {
            for asset in &batch.assets {
                let outcome = AssetOutcome::NotAttempted;
                progress.asset_finished(asset, &outcome);
                result.record(asset, &outcome);
            }
            progress.category_finished(&result);
            results.push(result);
            continue;
        }

        info!(category = %batch.category, count = batch.assets.len(), "deleting category");

        for asset in &batch.assets {
            let outcome = if halted.is_some() {
                AssetOutcome::NotAttempted
            } else {
                match deleter.delete(asset).await {
                    Ok(()) => AssetOutcome::Deleted,
                    Err(e) => {
                        warn!(
                            category = %asset.category,
                            asset_id = %asset.id,
                            code = %e.code(),
                            error = %e,
                            "delete failed"
                        );
                        if e.is_fatal() {
                            halted = Some(Halt {
                                code: e.code(),
                                detail: e.to_string(),
                            });
                        }
                        AssetOutcome::failed(&e)
                    }
                }
            };
            progress.asset_finished(asset, &outcome);
            result.record(asset, &outcome);
        }

        info!(
            category = %batch.category,
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            "category finished"
        );
        progress.category_finished(&result);
        results.push(result);
    }

    if let Some(halt) = &halted {
        warn!(code = %halt.code, "run halted before completion");
    }

    DecommissionReport {
        started_at,
        finished_at: Utc::now(),
        results,
        manual: plan.manual.iter().map(Asset::asset_ref).collect(),
        halted,
        stopped,
    }
}
