use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::asset::{Asset, AssetCategory, AssetRef};
use crate::client::Surface;
use crate::inventory::Inventory;

/// Fixed deletion order. Each category is fully processed before the next
/// starts, so nothing is deleted while something it depends on remains.
pub const DELETION_ORDER: [AssetCategory; 10] = [
    AssetCategory::User,
    AssetCategory::Sensor,
    AssetCategory::Intercom,
    AssetCategory::DeskStation,
    AssetCategory::MailroomSite,
    AssetCategory::AccessController,
    AssetCategory::Camera,
    AssetCategory::GuestSite,
    AssetCategory::AlarmDevice,
    AssetCategory::AlarmSite,
];

/// Which assets the caller confirmed for deletion.
///
/// An asset is included when its own `selected` flag is set, its category is
/// allowed, it is in the `only` set (when one is given) and it is not
/// excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    categories: Option<BTreeSet<AssetCategory>>,
    #[serde(default)]
    only: Option<BTreeSet<AssetRef>>,
    #[serde(default)]
    excluded: BTreeSet<AssetRef>,
}

impl Selection {
    /// Everything in the inventory.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn categories(categories: impl IntoIterator<Item = AssetCategory>) -> Self {
        Self {
            categories: Some(categories.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn only(assets: impl IntoIterator<Item = AssetRef>) -> Self {
        Self {
            only: Some(assets.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn exclude(mut self, asset: AssetRef) -> Self {
        self.excluded.insert(asset);
        self
    }

    pub fn includes(&self, asset: &Asset) -> bool {
        if !asset.selected {
            return false;
        }
        if let Some(categories) = &self.categories {
            if !categories.contains(&asset.category) {
                return false;
            }
        }
        let asset_ref = asset.asset_ref();
        if let Some(only) = &self.only {
            if !only.contains(&asset_ref) {
                return false;
            }
        }
        !self.excluded.contains(&asset_ref)
    }
}

/// Assets of one category, deleted together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionBatch {
    pub category: AssetCategory,
    pub assets: Vec<Asset>,
}

impl DeletionBatch {
    pub fn ids(&self) -> Vec<&str> {
        self.assets.iter().map(|a| a.id.as_str()).collect()
    }
}

/// Ordered batches plus the selected assets nothing can delete remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionPlan {
    pub batches: Vec<DeletionBatch>,
    /// Selected assets that must be removed by hand.
    pub manual: Vec<Asset>,
}

impl DeletionPlan {
    /// Build the plan for `selection` over a deduplicated inventory.
    ///
    /// Batches follow [`DELETION_ORDER`]; categories with nothing selected
    /// are left out. Embedded assets are never planned: their parent's
    /// deletion removes them.
    pub fn build(inventory: &Inventory, selection: &Selection) -> Self {
        let batches = DELETION_ORDER
            .iter()
            .filter_map(|&category| {
                let assets: Vec<Asset> = inventory
                    .assets(category)
                    .iter()
                    .filter(|a| !a.is_embedded() && selection.includes(a))
                    .cloned()
                    .collect();
                (!assets.is_empty()).then_some(DeletionBatch { category, assets })
            })
            .collect();

        let manual = inventory
            .categories()
            .filter(|(category, _)| Surface::deletion(*category).is_none())
            .flat_map(|(_, assets)| assets.iter())
            .filter(|a| selection.includes(a))
            .cloned()
            .collect();

        Self { batches, manual }
    }

    /// Categories in execution order.
    pub fn categories(&self) -> Vec<AssetCategory> {
        self.batches.iter().map(|b| b.category).collect()
    }

    pub fn batch(&self, category: AssetCategory) -> Option<&DeletionBatch> {
        self.batches.iter().find(|b| b.category == category)
    }

    /// Number of assets the executor will attempt.
    pub fn total(&self) -> usize {
        self.batches.iter().map(|b| b.assets.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
