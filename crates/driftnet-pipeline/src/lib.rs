//! The driftnet submission pipeline.
//!
//! Discovery sources hand [`Item`](driftnet_types::Item)s to an
//! [`ItemSink`]; the pipeline deduplicates them, checks ledger ownership,
//! waits for balance, submits, and tracks each submission until the
//! ledger's confirmation stream resolves it — requeueing on failure, with
//! no retry limit but an observable retry count. Everything runs under a
//! [`ShutdownSupervisor`] sharing one cancellation token.
//!
//! ```text
//! sources -> ItemSink (dedup) -> bounded queue -> issuer -> ledger
//!                 ^                                  |
//!                 |                             PendingTable
//!              requeue <--- confirmation listener <--+
//! ```
//!
//! Items are durably recorded in a
//! [`BackupStore`](driftnet_backup::BackupStore) before first submission;
//! [`SubmissionPipeline::replay_backlog`] re-drives surviving entries after
//! a restart.

pub mod config;
pub mod dedup;
pub mod error;
pub mod metrics;
pub mod pending;
pub mod pipeline;
pub mod supervisor;

pub use config::PipelineConfig;
pub use dedup::DedupCache;
pub use error::PipelineError;
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use pending::{PendingTable, SubmissionRecord};
pub use pipeline::{ItemSink, SubmissionPipeline};
pub use supervisor::ShutdownSupervisor;
