//! Removal of embedded-device double counts.
//!
//! A device housed inside another (a camera inside an intercom) is listed
//! both on its own and through its parent. Deleting the parent takes the
//! child with it, so the child must leave its own category's list and be
//! recorded only under the parent. The pass is structural, deterministic and
//! idempotent.

use std::collections::BTreeMap;

use tracing::debug;

use crate::asset::{Asset, AssetCategory, AssetRef};
use crate::config::{Catalog, EmbedMatch, EmbedRule};
use crate::inventory::Inventory;

/// Apply every embed rule of `catalog` to `inventory`.
pub fn deduplicate(mut inventory: Inventory, catalog: &Catalog) -> Inventory {
    let (categories, embedded) = inventory.parts_mut();

    // Records that already carry a parent never stay top-level.
    for assets in categories.values_mut() {
        let (children, kept): (Vec<Asset>, Vec<Asset>) =
            assets.drain(..).partition(Asset::is_embedded);
        *assets = kept;
        embedded.extend(children);
    }

    for rule in &catalog.embed_rules {
        if rule.parent == rule.child {
            continue;
        }
        let moved = apply_rule(categories, rule);
        if !moved.is_empty() {
            debug!(
                parent = %rule.parent,
                child = %rule.child,
                count = moved.len(),
                "embedded devices folded into their parents"
            );
        }
        embedded.extend(moved);
    }

    inventory
}

/// Move every child matched by `rule` out of its category. Returns the moved
/// children with their parent set.
fn apply_rule(categories: &mut BTreeMap<AssetCategory, Vec<Asset>>, rule: &EmbedRule) -> Vec<Asset> {
    let Some(mut children) = categories.remove(&rule.child) else {
        return Vec::new();
    };
    let mut moved = Vec::new();

    if let Some(parents) = categories.get_mut(&rule.parent) {
        for parent in parents.iter_mut() {
            let parent_ref = parent.asset_ref();
            let (matched, rest): (Vec<Asset>, Vec<Asset>) =
                children.drain(..).partition(|child| matches(rule.matcher, parent, child));
            children = rest;
            for mut child in matched {
                parent.add_embedded(child.asset_ref());
                child.parent = Some(parent_ref.clone());
                moved.push(child);
            }
        }
    }

    categories.insert(rule.child, children);
    moved
}

fn matches(matcher: EmbedMatch, parent: &Asset, child: &Asset) -> bool {
    match matcher {
        EmbedMatch::Declared => parent
            .embedded
            .contains(&AssetRef::new(child.category, child.id.clone())),
        EmbedMatch::SerialNumber => match (&parent.serial_number, &child.serial_number) {
            (Some(p), Some(c)) => !p.trim().is_empty() && p.trim().eq_ignore_ascii_case(c.trim()),
            _ => false,
        },
    }
}
