//! Plan execution.
//!
//! Layers run one after another; the stages of a layer run concurrently on
//! the rayon pool against a snapshot of the ledger taken when the layer
//! starts. After a layer with any failure no further layer is started, so a
//! publish stage never sees the output of a failed producer.

use std::fmt;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::{Plan, StageContext, StageGraph, StageId, StageOutput};
use crate::config::{Config, Credentials};
use crate::core::{ArtifactLedger, is_shutdown};
use crate::error::BuildError;
use crate::{debug, log};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Succeeded,
    Failed,
    /// Not started: an earlier layer failed or the run was interrupted.
    Skipped,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Succeeded => "ok",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        })
    }
}

#[derive(Debug)]
pub struct StageOutcome {
    pub stage: StageId,
    pub status: StageStatus,
    pub duration: Duration,
    pub warnings: Vec<String>,
    pub error: Option<anyhow::Error>,
}

/// Per-stage outcomes in plan order, plus every recorded artifact.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<StageOutcome>,
    pub ledger: ArtifactLedger,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.status == StageStatus::Succeeded)
    }

    /// First failed stage in plan order.
    pub fn first_failure(&self) -> Option<&StageOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.status == StageStatus::Failed)
    }

    pub fn outcome(&self, stage: StageId) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|o| o.stage == stage)
    }
}

/// One execution of a [`Plan`].
pub struct PipelineRun<'a> {
    graph: &'a StageGraph,
    plan: Plan,
    config: &'a Config,
    credentials: &'a Credentials,
    dry_run: bool,
}

impl<'a> PipelineRun<'a> {
    pub fn new(graph: &'a StageGraph, plan: Plan, config: &'a Config, credentials: &'a Credentials) -> Self {
        Self {
            graph,
            plan,
            config,
            credentials,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Check every credential the planned stages need, all at once.
    pub fn preflight(&self) -> Result<(), BuildError> {
        let needs = self
            .plan
            .stages()
            .filter_map(|id| self.graph.get(id).and_then(|stage| stage.needs()));
        self.credentials.check(needs)
    }

    /// Run the plan. Stage failures are reported in the [`RunReport`];
    /// only a failed preflight is an `Err`, and then nothing has run.
    pub fn execute(self) -> Result<RunReport, BuildError> {
        self.preflight()?;

        let mut report = RunReport::default();
        let mut stopped = false;

        for (n, layer) in self.plan.layers.iter().enumerate() {
            if stopped || is_shutdown() {
                report.outcomes.extend(layer.iter().map(|&stage| skipped(stage)));
                continue;
            }
            debug!("run"; "layer {}: {}", n + 1, join(layer));

            let snapshot = report.ledger.clone();
            let ctx = StageContext {
                config: self.config,
                credentials: self.credentials,
                ledger: &snapshot,
                dry_run: self.dry_run,
            };

            let results: Vec<(StageId, Duration, anyhow::Result<StageOutput>)> = layer
                .par_iter()
                .map(|&id| {
                    let started = Instant::now();
                    let result = match self.graph.get(id) {
                        Some(stage) => stage.run(&ctx),
                        None => Err(anyhow::anyhow!("stage `{id}` is not registered")),
                    };
                    (id, started.elapsed(), result)
                })
                .collect();

            for (stage, duration, result) in results {
                match result {
                    Ok(output) => {
                        for warning in &output.warnings {
                            log!("warning"; "{stage}: {warning}");
                        }
                        log!(stage.as_str(); "done in {:.2?} ({} artifact(s))", duration, output.artifacts.len());
                        report.ledger.record(stage, output.artifacts);
                        report.outcomes.push(StageOutcome {
                            stage,
                            status: StageStatus::Succeeded,
                            duration,
                            warnings: output.warnings,
                            error: None,
                        });
                    }
                    Err(error) => {
                        log!("error"; "{stage} failed: {error:#}");
                        stopped = true;
                        report.outcomes.push(StageOutcome {
                            stage,
                            status: StageStatus::Failed,
                            duration,
                            warnings: Vec::new(),
                            error: Some(error),
                        });
                    }
                }
            }
        }

        Ok(report)
    }
}

fn skipped(stage: StageId) -> StageOutcome {
    StageOutcome {
        stage,
        status: StageStatus::Skipped,
        duration: Duration::ZERO,
        warnings: Vec::new(),
        error: None,
    }
}

fn join(layer: &[StageId]) -> String {
    layer.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")
}
