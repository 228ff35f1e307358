pub mod catalog;
pub mod settings;

pub use catalog::*;
pub use settings::*;

use std::path::PathBuf;

/// Returns the global config directory path: `~/.config/org-decommission/`
pub fn dirs_global() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".config").join("org-decommission")
}
