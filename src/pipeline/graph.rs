//! Graph definition and planning.

use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use super::{Stage, StageId};

/// Rejected graph definitions and unknown targets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("`{0}` is defined more than once")]
    Duplicate(String),

    #[error("`{from}` refers to unknown stage `{to}`")]
    UnknownReference { from: String, to: String },

    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("unknown stage or composite `{0}` (see `sitepipe stages`)")]
    UnknownTarget(String),
}

/// Collects stages and composites, validated by [`build`](Self::build).
#[derive(Default)]
pub struct StageGraphBuilder {
    stages: Vec<Arc<dyn Stage>>,
    composites: Vec<(&'static str, Vec<&'static str>)>,
}

impl StageGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// A named group of stages and earlier composites.
    pub fn composite(mut self, name: &'static str, members: &[&'static str]) -> Self {
        self.composites.push((name, members.to_vec()));
        self
    }

    pub fn build(self) -> Result<StageGraph, GraphError> {
        let mut index = FxHashMap::default();
        for (i, stage) in self.stages.iter().enumerate() {
            if index.insert(stage.id(), i).is_some() {
                return Err(GraphError::Duplicate(stage.id().to_string()));
            }
        }

        for stage in &self.stages {
            for edge in stage.deps().iter().chain(stage.after()) {
                if !index.contains_key(edge) {
                    return Err(GraphError::UnknownReference {
                        from: stage.id().to_string(),
                        to: edge.to_string(),
                    });
                }
            }
        }

        let mut composite_names: FxHashSet<&str> = FxHashSet::default();
        for (name, members) in &self.composites {
            if index.keys().any(|id| id.as_str() == *name) || !composite_names.insert(*name) {
                return Err(GraphError::Duplicate((*name).to_string()));
            }
            for member in members {
                let known = index.keys().any(|id| id.as_str() == *member)
                    || (composite_names.contains(member) && member != name);
                if !known {
                    return Err(GraphError::UnknownReference {
                        from: (*name).to_string(),
                        to: (*member).to_string(),
                    });
                }
            }
        }

        let graph = StageGraph {
            stages: self.stages,
            index,
            composites: self.composites,
        };
        graph.detect_cycles()?;
        Ok(graph)
    }
}

/// A validated, acyclic set of stages.
pub struct StageGraph {
    stages: Vec<Arc<dyn Stage>>,
    index: FxHashMap<StageId, usize>,
    composites: Vec<(&'static str, Vec<&'static str>)>,
}

impl StageGraph {
    /// Stages in registration order.
    pub fn stages(&self) -> impl Iterator<Item = &Arc<dyn Stage>> {
        self.stages.iter()
    }

    pub fn composites(&self) -> impl Iterator<Item = (&'static str, &[&'static str])> {
        self.composites
            .iter()
            .map(|(name, members)| (*name, members.as_slice()))
    }

    pub fn get(&self, id: StageId) -> Option<&Arc<dyn Stage>> {
        self.index.get(&id).map(|&i| &self.stages[i])
    }

    fn lookup(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.id().as_str() == name)
    }

    /// Edges used for ordering: hard and order-only.
    fn edges(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        let stage = &self.stages[i];
        stage
            .deps()
            .iter()
            .chain(stage.after())
            .filter_map(|id| self.index.get(id).copied())
    }

    fn detect_cycles(&self) -> Result<(), GraphError> {
        // 0 = unvisited, 1 = on the current path, 2 = done
        let mut state = vec![0u8; self.stages.len()];
        let mut path = Vec::new();
        for start in 0..self.stages.len() {
            if state[start] == 0 {
                if let Some(cycle) = self.dfs_cycle(start, &mut state, &mut path) {
                    return Err(GraphError::Cycle(cycle));
                }
            }
        }
        Ok(())
    }

    fn dfs_cycle(&self, node: usize, state: &mut [u8], path: &mut Vec<usize>) -> Option<Vec<String>> {
        state[node] = 1;
        path.push(node);
        for next in self.edges(node) {
            match state[next] {
                0 => {
                    if let Some(cycle) = self.dfs_cycle(next, state, path) {
                        return Some(cycle);
                    }
                }
                1 => {
                    let start = path.iter().position(|&n| n == next).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..]
                        .iter()
                        .map(|&n| self.stages[n].id().to_string())
                        .collect();
                    cycle.push(self.stages[next].id().to_string());
                    return Some(cycle);
                }
                _ => {}
            }
        }
        path.pop();
        state[node] = 2;
        None
    }

    /// Resolve target names (stages or composites) to stage indices.
    fn expand(&self, name: &str, out: &mut Vec<usize>) -> Result<(), GraphError> {
        if let Some(i) = self.lookup(name) {
            out.push(i);
            return Ok(());
        }
        let (_, members) = self
            .composites
            .iter()
            .find(|(composite, _)| *composite == name)
            .ok_or_else(|| GraphError::UnknownTarget(name.to_string()))?;
        for member in members {
            self.expand(member, out)?;
        }
        Ok(())
    }

    /// Plan a run for `targets`: their hard-dependency closure, layered so
    /// that every stage comes after all its in-run predecessors.
    ///
    /// Within a layer stages keep registration order.
    pub fn plan<S: AsRef<str>>(&self, targets: &[S]) -> Result<Plan, GraphError> {
        let mut roots = Vec::new();
        for target in targets {
            self.expand(target.as_ref(), &mut roots)?;
        }

        let mut selected = vec![false; self.stages.len()];
        let mut stack = roots;
        while let Some(i) = stack.pop() {
            if std::mem::replace(&mut selected[i], true) {
                continue;
            }
            stack.extend(
                self.stages[i]
                    .deps()
                    .iter()
                    .filter_map(|id| self.index.get(id).copied()),
            );
        }

        let mut indegree = vec![0usize; self.stages.len()];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); self.stages.len()];
        for i in (0..self.stages.len()).filter(|&i| selected[i]) {
            let mut preds: Vec<usize> = self.edges(i).filter(|&p| selected[p]).collect();
            preds.sort_unstable();
            preds.dedup();
            indegree[i] = preds.len();
            for p in preds {
                successors[p].push(i);
            }
        }

        let mut layers = Vec::new();
        let mut ready: Vec<usize> = (0..self.stages.len())
            .filter(|&i| selected[i] && indegree[i] == 0)
            .collect();
        while !ready.is_empty() {
            let mut next = Vec::new();
            for &i in &ready {
                for &s in &successors[i] {
                    indegree[s] -= 1;
                    if indegree[s] == 0 {
                        next.push(s);
                    }
                }
            }
            next.sort_unstable();
            layers.push(ready.iter().map(|&i| self.stages[i].id()).collect());
            ready = next;
        }

        Ok(Plan { layers })
    }
}

/// Layers of stages; a layer starts only after the previous one finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub layers: Vec<Vec<StageId>>,
}

impl Plan {
    pub fn stages(&self) -> impl Iterator<Item = StageId> + '_ {
        self.layers.iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, layer) in self.layers.iter().enumerate() {
            let names: Vec<_> = layer.iter().map(|id| id.as_str()).collect();
            writeln!(f, "{}: {}", i + 1, names.join(", "))?;
        }
        Ok(())
    }
}
