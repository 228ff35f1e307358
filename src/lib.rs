//! Inventory and decommission every managed asset of a cloud-managed
//! organization.
//!
//! The crate drives two API surfaces from one [`session::SessionContext`]:
//! the cookie/CSRF-authenticated internal surface (login, second factor,
//! privilege escalation, key issuance, internal listings and deletes) and the
//! key-authenticated public surface. [`orchestrator::Orchestrator`] is the
//! entry point for a presentation layer.

pub mod asset;
pub mod client;
pub mod config;
pub mod decommission;
pub mod error;
pub mod inventory;
pub mod orchestrator;
pub mod session;

pub use asset::{Asset, AssetCategory, AssetRef, Visitor};
pub use error::{DecomError, ErrorCode, Result};
pub use orchestrator::Orchestrator;
