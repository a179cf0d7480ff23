//! # Route Suggester
//!
//! The closed loop that feeds the route table from traffic:
//!
//! 1. [`logs`] reads JSONL access records (or the synthetic fallback)
//! 2. [`vector`] embeds and scores each entry
//! 3. [`select`] keeps confident, genuinely new paths
//! 4. [`materialize`] writes handler stubs atomically and appends the
//!    declarations to the generated route table
//!
//! [`rollback`] reverses a run by restoring `.bak` backups; `clean` removes
//! stubs that were created from scratch. The registry picks new routes up on
//! its next reload.

pub mod logs;
pub mod materialize;
pub mod pipeline;
pub mod rollback;
pub mod select;
pub mod template;
pub mod vector;

pub use logs::{fallback_sample, load_logs, LogLoad, LogSource};
pub use materialize::{
    batch_hash, handler_name, materialize, plan_batch, BatchReport, CandidateRoute,
    MaterializationBatch, MaterializerConfig, WrittenHandler,
};
pub use pipeline::{CandidateSummary, PipelineReport, SuggestPipeline};
pub use rollback::{clean, restore_backup, rollback, CleanReport, RollbackReport};
pub use select::{select_candidates, SelectorConfig};
pub use template::{render_handler, HandlerStub};
pub use vector::{cosine_similarity, vectorize, LogEntry, VectorizedLog, EMBEDDING_DIM};
