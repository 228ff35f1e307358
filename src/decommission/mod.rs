pub mod executor;
pub mod plan;
pub mod report;

pub use executor::{execute, AssetDeleter, NoProgress, ProgressSink, StopHandle};
pub use plan::{DeletionBatch, DeletionPlan, Selection, DELETION_ORDER};
pub use report::{AssetOutcome, DecommissionReport, DeletionResult, FailedAsset, Halt};
