//! Stage DAG and run executor.
//!
//! ```text
//! StageGraphBuilder ──build()──► StageGraph ──plan(targets)──► Plan ──► PipelineRun
//!   (duplicate, unknown,           (stages +        (hard-dep closure,     (rayon per layer,
//!    cycle checks)                  composites)      layered topo order)    stop on failure)
//! ```
//!
//! A stage declares two kinds of edges:
//!
//! - `deps`: hard dependencies. Planning a stage pulls them into the run.
//! - `after`: order-only. Honoured only when both stages are in the run.

mod graph;
mod run;
pub mod stages;

pub use graph::{GraphError, Plan, StageGraph, StageGraphBuilder};
pub use run::{PipelineRun, RunReport};
pub use stages::{StoreChoice, stage_graph};

use std::fmt;

use anyhow::Result;

use crate::config::{Config, Credentials, Need};
use crate::core::{ArtifactLedger, BuildArtifact};

/// Name of a stage, e.g. `css:minify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StageId(&'static str);

impl StageId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Everything a stage may read. Shared immutably by the stages of a layer.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub config: &'a Config,
    pub credentials: &'a Credentials,
    /// Artifacts of the layers completed so far.
    pub ledger: &'a ArtifactLedger,
    /// Plan publishing without mutating remote targets.
    pub dry_run: bool,
}

/// What a successful stage hands back to the executor.
#[derive(Debug, Default)]
pub struct StageOutput {
    pub artifacts: Vec<BuildArtifact>,
    /// Non-fatal problems (e.g. images that could not be optimized).
    pub warnings: Vec<String>,
}

impl StageOutput {
    pub fn artifacts(artifacts: Vec<BuildArtifact>) -> Self {
        Self {
            artifacts,
            warnings: Vec::new(),
        }
    }
}

/// A unit of work in the graph.
pub trait Stage: Send + Sync {
    fn id(&self) -> StageId;

    /// Hard dependencies.
    fn deps(&self) -> &[StageId] {
        &[]
    }

    /// Order-only predecessors.
    fn after(&self) -> &[StageId] {
        &[]
    }

    /// Credentials checked before the run starts.
    fn needs(&self) -> Option<Need> {
        None
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutput>;
}
