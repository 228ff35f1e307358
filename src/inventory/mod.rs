pub mod dedup;
pub mod records;
pub mod scan;

pub use dedup::deduplicate;
pub use scan::{scan, InventorySource, ScanIssue, SCAN_ORDER};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::asset::{Asset, AssetCategory, AssetRef};

/// Assets of one organization, grouped by category.
///
/// Top-level assets live under their category. Embedded assets (those with a
/// parent) are kept apart so no consumer can mistake them for independently
/// deletable records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    categories: BTreeMap<AssetCategory, Vec<Asset>>,
    #[serde(default)]
    embedded: Vec<Asset>,
    #[serde(default)]
    issues: Vec<ScanIssue>,
    #[serde(default)]
    scanned_at: Option<DateTime<Utc>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a category listing into the inventory. Records whose id is
    /// already present in that category are dropped (first listing wins).
    pub fn with_category(mut self, category: AssetCategory, assets: Vec<Asset>) -> Self {
        self.merge(category, assets);
        self
    }

    pub(crate) fn merge(&mut self, category: AssetCategory, assets: Vec<Asset>) {
        let list = self.categories.entry(category).or_default();
        for asset in assets {
            if asset.category != category || list.iter().any(|a| a.id == asset.id) {
                continue;
            }
            list.push(asset);
        }
    }

    pub(crate) fn record_issue(&mut self, issue: ScanIssue) {
        self.issues.push(issue);
    }

    pub(crate) fn mark_scanned(&mut self, at: DateTime<Utc>) {
        self.scanned_at = Some(at);
    }

    pub(crate) fn parts_mut(
        &mut self,
    ) -> (&mut BTreeMap<AssetCategory, Vec<Asset>>, &mut Vec<Asset>) {
        (&mut self.categories, &mut self.embedded)
    }

    /// Top-level assets of one category, in listing order.
    pub fn assets(&self, category: AssetCategory) -> &[Asset] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every listed category with its top-level assets.
    pub fn categories(&self) -> impl Iterator<Item = (AssetCategory, &[Asset])> {
        self.categories.iter().map(|(c, a)| (*c, a.as_slice()))
    }

    /// Assets recorded only under their parent.
    pub fn embedded(&self) -> &[Asset] {
        &self.embedded
    }

    pub fn embedded_in<'a>(&'a self, parent: &'a AssetRef) -> impl Iterator<Item = &'a Asset> {
        self.embedded
            .iter()
            .filter(move |a| a.parent.as_ref() == Some(parent))
    }

    pub fn find(&self, asset: &AssetRef) -> Option<&Asset> {
        self.assets(asset.category)
            .iter()
            .chain(self.embedded.iter())
            .find(|a| a.category == asset.category && a.id == asset.id)
    }

    /// Categories whose listing failed during the scan.
    pub fn issues(&self) -> &[ScanIssue] {
        &self.issues
    }

    pub fn scanned_at(&self) -> Option<DateTime<Utc>> {
        self.scanned_at
    }

    pub fn count(&self, category: AssetCategory) -> usize {
        self.assets(category).len()
    }

    /// Number of top-level assets.
    pub fn total(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
