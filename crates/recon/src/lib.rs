//! `healthops-recon`: expense normalization and registry reconciliation engine.
//!
//! Pure engine crate: receives raw tables already read from disk, returns
//! normalized, joined, flagged and aggregated records. No CLI or IO dependencies.

pub mod aggregate;
pub mod amount;
pub mod classify;
pub mod error;
pub mod model;
pub mod normalize;
pub mod period;
pub mod reconcile;
pub mod registry;
pub mod validate;

pub use aggregate::aggregate;
pub use error::ReconError;
pub use model::{
    AggregateStat, JoinedExpenseRecord, NormalizedExpenseRecord, QualityFlags, Quarter,
    RawTable, RegistryEntry,
};
pub use normalize::{normalize_table, NormalizeOutcome, PositivityPolicy, Rejection, RowStats};
pub use reconcile::{clean_key, reconcile, JoinStats};
pub use registry::Registry;
