//! Dependency graph over a registry.
//!
//! An edge `A -> B` exists when `B` has an input slot bound to one of `A`'s
//! outputs. Nodes are registry positions, so the graph is an explicit arena
//! that can be inspected without provisioning anything.

use crate::error::ComposeError;
use crate::registry::ComponentRegistry;
use std::collections::BTreeSet;

#[derive(Clone, Debug)]
pub struct DependencyGraph {
    names: Vec<String>,
    /// `upstream[i]` = components `i` consumes from.
    upstream: Vec<BTreeSet<usize>>,
    /// `dependents[i]` = components consuming from `i`.
    dependents: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    /// Build the graph. References are validated first.
    ///
    /// # Errors
    ///
    /// Returns an error if any slot references an undeclared component,
    /// output, or external.
    pub fn build(registry: &ComponentRegistry) -> Result<Self, ComposeError> {
        registry.validate_references()?;

        let n = registry.len();
        let mut upstream = vec![BTreeSet::new(); n];
        let mut dependents = vec![BTreeSet::new(); n];
        for (to, spec) in registry.specs().iter().enumerate() {
            for up in spec.upstream_components() {
                // validate_references guarantees the lookup succeeds
                if let Some(from) = registry.position(up) {
                    upstream[to].insert(from);
                    dependents[from].insert(to);
                }
            }
        }

        Ok(Self {
            names: registry.specs().iter().map(|s| s.name.clone()).collect(),
            upstream,
            dependents,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All edges as `(from, to)` names, ordered by `to` then `from` position.
    #[must_use]
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.upstream
            .iter()
            .enumerate()
            .flat_map(|(to, ups)| ups.iter().map(move |&from| (from, to)))
            .map(|(from, to)| (self.names[from].as_str(), self.names[to].as_str()))
            .collect()
    }

    #[must_use]
    pub fn upstream_of(&self, position: usize) -> Vec<&str> {
        self.upstream[position].iter().map(|&i| self.names[i].as_str()).collect()
    }

    #[must_use]
    pub fn dependents_of(&self, position: usize) -> Vec<&str> {
        self.dependents[position].iter().map(|&i| self.names[i].as_str()).collect()
    }

    /// Topological order as registry positions.
    ///
    /// Among ready nodes the lowest declaration position goes first, so the
    /// order is a deterministic function of the registry alone.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::CompositionCycle`] naming the components that
    /// sit on a cycle.
    pub fn topo_order(&self) -> Result<Vec<usize>, ComposeError> {
        let n = self.len();
        let mut in_degree: Vec<usize> = self.upstream.iter().map(BTreeSet::len).collect();
        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut ordered = Vec::with_capacity(n);

        while let Some(next) = ready.pop_first() {
            ordered.push(next);
            for &dep in &self.dependents[next] {
                in_degree[dep] -= 1;
                if in_degree[dep] == 0 {
                    ready.insert(dep);
                }
            }
        }

        if ordered.len() == n {
            return Ok(ordered);
        }

        // Whatever is left is on a cycle or downstream of one; peel off the
        // downstream part so only cycle members are reported.
        let mut remaining: BTreeSet<usize> = (0..n).filter(|i| !ordered.contains(i)).collect();
        loop {
            let sinks: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|&i| self.dependents[i].iter().all(|d| !remaining.contains(d)))
                .collect();
            if sinks.is_empty() {
                break;
            }
            for s in sinks {
                remaining.remove(&s);
            }
        }

        Err(ComposeError::CompositionCycle {
            components: remaining.into_iter().map(|i| self.names[i].clone()).collect(),
        })
    }
}
