//! `tally-rollup`: project line-item identity resolution and dashboard rollups.
//!
//! Pure engine crate: receives raw records already read from a store or an
//! export, returns the canonical per-project totals plus the dashboard
//! summary. Concrete stores live in `tally-store`; the engine only sees the
//! `RecordSource` / `SummaryStore` traits.

pub mod aggregate;
pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod exclude;
pub mod model;
pub mod publish;
pub mod record;
pub mod resolve;
pub mod rollup;
pub mod source;
pub mod value;

pub use config::TallyConfig;
pub use engine::{run, Pipeline};
pub use error::{EngineError, StoreError, StoreErrorKind};
pub use model::{DashboardSummary, LineItem, ProjectAggregate, RawRecord, RunOutput, RunReport};
pub use publish::{Publisher, RetryPolicy, SummaryStore};
pub use source::RecordSource;
