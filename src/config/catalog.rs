use serde::{Deserialize, Serialize};

use crate::asset::AssetCategory;
use crate::error::{DecomError, Result};

/// How a parent's embedded children are recognised in the raw listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedMatch {
    /// The parent record names its children's ids explicitly.
    Declared,
    /// A child listed with the same serial number as the parent is the
    /// parent's own hardware seen through another surface.
    SerialNumber,
}

/// One "category A physically embeds category B" relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedRule {
    pub parent: AssetCategory,
    pub child: AssetCategory,
    #[serde(rename = "match")]
    pub matcher: EmbedMatch,
}

impl EmbedRule {
    pub fn new(parent: AssetCategory, child: AssetCategory, matcher: EmbedMatch) -> Self {
        Self {
            parent,
            child,
            matcher,
        }
    }
}

/// Product knowledge that is data rather than code: which categories embed
/// which. Loaded from config so new asset types don't need a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default = "default_embed_rules")]
    pub embed_rules: Vec<EmbedRule>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            embed_rules: default_embed_rules(),
        }
    }
}

fn default_embed_rules() -> Vec<EmbedRule> {
    use AssetCategory::*;
    vec![
        EmbedRule::new(Intercom, Camera, EmbedMatch::Declared),
        EmbedRule::new(Intercom, Camera, EmbedMatch::SerialNumber),
        EmbedRule::new(Intercom, AccessController, EmbedMatch::Declared),
        EmbedRule::new(Intercom, AccessController, EmbedMatch::SerialNumber),
    ]
}

impl Catalog {
    /// A catalog with no embedding knowledge at all.
    pub fn empty() -> Self {
        Self {
            embed_rules: Vec::new(),
        }
    }

    pub fn with_rules(embed_rules: Vec<EmbedRule>) -> Self {
        Self { embed_rules }
    }

    /// Reject rules that would make dedup ill-defined.
    pub fn validate(&self) -> Result<()> {
        for rule in &self.embed_rules {
            if rule.parent == rule.child {
                return Err(DecomError::InvalidConfig {
                    reason: format!("embed rule for {} cannot embed itself", rule.parent),
                });
            }
            // A category that is both a child and a parent would let dedup
            // order change the outcome.
            if self.embed_rules.iter().any(|r| r.parent == rule.child) {
                return Err(DecomError::InvalidConfig {
                    reason: format!(
                        "{} is embedded in {} but also embeds other devices",
                        rule.child, rule.parent
                    ),
                });
            }
        }
        Ok(())
    }

    /// Categories whose records may carry embedded-device references.
    pub fn is_parent(&self, category: AssetCategory) -> bool {
        self.embed_rules.iter().any(|r| r.parent == category)
    }
}
