use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::asset::{Asset, AssetCategory};
use crate::config::Catalog;
use crate::error::{ErrorCode, Result};
use crate::inventory::{deduplicate, Inventory};

/// Order in which categories are listed during a scan.
pub const SCAN_ORDER: [AssetCategory; 11] = [
    AssetCategory::Intercom,
    AssetCategory::AccessController,
    AssetCategory::Camera,
    AssetCategory::Sensor,
    AssetCategory::DeskStation,
    AssetCategory::MailroomSite,
    AssetCategory::GuestSite,
    AssetCategory::User,
    AssetCategory::AlarmSite,
    AssetCategory::AlarmDevice,
    AssetCategory::UnassignedDevice,
];

/// A category whose listing failed. The category is kept, empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanIssue {
    pub category: AssetCategory,
    pub code: ErrorCode,
    pub detail: String,
}

/// Anything that can list one category of assets.
#[async_trait]
pub trait InventorySource: Send {
    async fn list(&mut self, category: AssetCategory) -> Result<Vec<Asset>>;
}

/// List every category in `categories`, then fold embedded devices into
/// their parents.
///
/// A failure in one category is recorded as a [`ScanIssue`] and the scan
/// moves on. Fatal errors (expired session or key, missing privileges) abort
/// the scan.
pub async fn scan<S>(source: &mut S, categories: &[AssetCategory], catalog: &Catalog) -> Result<Inventory>
where
    S: InventorySource + ?Sized,
{
    let mut raw = Inventory::new();
    for &category in categories {
        match source.list(category).await {
            Ok(assets) => {
                info!(category = %category, count = assets.len(), "listed");
                raw.merge(category, assets);
            }
            Err(e) if e.is_fatal() => {
                warn!(category = %category, error = %e, "scan aborted");
                return Err(e);
            }
            Err(e) => {
                warn!(category = %category, error = %e, "listing failed, continuing with an empty category");
                raw.merge(category, Vec::new());
                raw.record_issue(ScanIssue {
                    category,
                    code: e.code(),
                    detail: e.to_string(),
                });
            }
        }
    }

    let mut inventory = deduplicate(raw, catalog);
    inventory.mark_scanned(Utc::now());
    info!(
        total = inventory.total(),
        embedded = inventory.embedded().len(),
        issues = inventory.issues().len(),
        "scan complete"
    );
    Ok(inventory)
}
