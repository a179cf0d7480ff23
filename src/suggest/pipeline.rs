use super::logs::{load_logs, LogLoad, LogSource};
use super::materialize::{
    materialize, plan_batch, BatchReport, MaterializationBatch, MaterializerConfig,
};
use super::select::{select_candidates, SelectorConfig};
use super::vector::{vectorize, LogEntry, VectorizedLog};
use crate::config::RouteloopConfig;
use crate::error::panic_message;
use crate::router::RouteIndex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, info};

/// Summary of one accepted candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateSummary {
    pub route_id: String,
    pub method: String,
    pub path: String,
    pub score: f64,
    pub handler: String,
}

/// Everything a suggester run did, for logging or printing.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub log_source: LogSource,
    pub entries: usize,
    pub scored: usize,
    pub candidates: Vec<CandidateSummary>,
    pub batch_hash: String,
    pub dry_run: bool,
    /// Absent for dry runs and empty batches.
    pub materialized: Option<BatchReport>,
}

/// Log Loader → Vector Scorer → Candidate Selector → Materializer.
pub struct SuggestPipeline {
    log_glob: String,
    max_log_entries: usize,
    selector: SelectorConfig,
    materializer: MaterializerConfig,
    rng: StdRng,
}

impl SuggestPipeline {
    pub fn new(
        log_glob: impl Into<String>,
        max_log_entries: usize,
        selector: SelectorConfig,
        materializer: MaterializerConfig,
        seed: Option<u64>,
    ) -> Self {
        Self {
            log_glob: log_glob.into(),
            max_log_entries,
            selector,
            materializer,
            rng: seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
        }
    }

    #[must_use]
    pub fn from_config(config: &RouteloopConfig) -> Self {
        Self::new(
            config.suggester.log_glob.clone(),
            config.suggester.max_log_entries,
            config.selector(),
            config.materializer(),
            config.suggester.seed,
        )
    }

    /// Load the configured logs and run every stage.
    pub fn run(&mut self, existing: &RouteIndex, dry_run: bool) -> PipelineReport {
        let load = load_logs(&self.log_glob, self.max_log_entries);
        self.run_with_logs(load, existing, dry_run)
    }

    /// Run the stages after log loading over `load`.
    pub fn run_with_logs(
        &mut self,
        load: LogLoad,
        existing: &RouteIndex,
        dry_run: bool,
    ) -> PipelineReport {
        let scored = self.score(&load.entries);
        let selected = select_candidates(&scored, existing, &self.selector);
        let batch = plan_batch(&selected, existing, &self.materializer);
        let candidates = summarize(&batch, &selected);

        info!(
            entries = load.entries.len(),
            scored = scored.len(),
            accepted = candidates.len(),
            fallback = load.used_fallback(),
            batch_hash = %batch.hash,
            accepted_paths = ?batch.paths(),
            dry_run,
            "Suggestion batch selected"
        );

        let materialized = if dry_run || batch.candidates.is_empty() {
            None
        } else {
            Some(materialize(&batch, &self.materializer))
        };

        PipelineReport {
            log_source: load.source,
            entries: load.entries.len(),
            scored: scored.len(),
            candidates,
            batch_hash: batch.hash,
            dry_run,
            materialized,
        }
    }

    /// Score each entry; an entry whose scoring panics is dropped and logged.
    fn score(&mut self, entries: &[LogEntry]) -> Vec<VectorizedLog> {
        let mut scored = Vec::with_capacity(entries.len());
        for entry in entries {
            let rng = &mut self.rng;
            match catch_unwind(AssertUnwindSafe(|| vectorize(entry, rng))) {
                Ok(v) => scored.push(v),
                Err(panic) => error!(
                    method = %entry.method,
                    path = %entry.path,
                    error = %panic_message(panic.as_ref()),
                    "Scoring panicked; entry dropped"
                ),
            }
        }
        scored
    }
}

fn summarize(batch: &MaterializationBatch, selected: &[VectorizedLog]) -> Vec<CandidateSummary> {
    batch
        .candidates
        .iter()
        .zip(selected)
        .map(|(c, v)| CandidateSummary {
            route_id: c.declaration.id.clone(),
            method: c.declaration.method.to_string(),
            path: c.declaration.path.clone(),
            score: v.score,
            handler: c.declaration.handler.to_string(),
        })
        .collect()
}
