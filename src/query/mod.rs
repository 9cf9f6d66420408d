//! Relevance-scored queries over the archive
//!
//! - [`builder`]: pure construction of a [`ScoredQuery`] (statement, parameters
//!   and the executable scoring plan)
//! - [`engine`]: the [`QueryEngine`] seam and the in-process [`CatalogEngine`]
//! - [`catalog`]: fjall-backed partition metadata
//! - [`sync`]: throttled single-flight partition refresh

pub mod builder;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod sync;

pub use builder::{
    ColumnSpec, ColumnType, PartitionFilter, QueryParam, ScoreWeights, ScoredQuery, ScoringPlan,
    TableRef,
};
pub use catalog::PartitionCatalog;
pub use engine::{CatalogEngine, QueryEngine, ScoredRow};
pub use error::{QueryError, Result};
pub use sync::{PartitionSync, SyncOutcome};
