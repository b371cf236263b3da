//! Composition planning: everything that can be decided before the first
//! provider call.
//!
//! Planning runs these passes, in order, and fails fast on the first error:
//!
//! 1. **References** - every slot points at a declared component, output or external.
//! 2. **Ordering** - topological sort with declaration-order tie-break; cycles are fatal.
//! 3. **Gating** - every inclusion predicate is evaluated up front, independent of order.
//! 4. **Dependency check** - an included component may not require an output of an
//!    excluded one.
//! 5. **Profile check** - every profile field an included component reads must be set.
//!
//! The result is a [`CompositionPlan`] that the composer executes step by step.

use crate::component::SlotSource;
use crate::error::ComposeError;
use crate::graph::DependencyGraph;
use crate::profile::{EnvironmentId, EnvironmentProfile};
use crate::registry::ComponentRegistry;
use std::fmt::{Display, Formatter, Result as FormatResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Include,
    Exclude,
}

/// One component in instantiation order.
#[derive(Clone, Debug)]
pub struct PlanStep {
    /// Position in instantiation order (0-based).
    pub step: usize,
    /// Position in the registry.
    pub registry_index: usize,
    pub component: String,
    pub kind: String,
    pub gate: String,
    pub decision: Decision,
    pub upstream: Vec<String>,
    pub resilient: bool,
}

/// A validated, side-effect free composition plan.
#[derive(Clone, Debug)]
pub struct CompositionPlan {
    pub environment: EnvironmentId,
    pub steps: Vec<PlanStep>,
    pub edges: Vec<(String, String)>,
}

impl CompositionPlan {
    /// Plan `registry` for `profile`.
    ///
    /// # Errors
    ///
    /// Returns a configuration or composition error; see the module docs for
    /// the pass order.
    pub fn build(registry: &ComponentRegistry, profile: &EnvironmentProfile) -> Result<Self, ComposeError> {
        let graph = DependencyGraph::build(registry)?;
        let order = graph.topo_order()?;

        let included: Vec<bool> = registry
            .specs()
            .iter()
            .map(|s| s.inclusion.evaluate(profile))
            .collect();

        for &i in &order {
            if !included[i] {
                continue;
            }
            let spec = &registry.specs()[i];
            for slot in &spec.inputs {
                match &slot.source {
                    SlotSource::Output { component, .. } if slot.required => {
                        let upstream_included = registry.position(component).is_some_and(|u| included[u]);
                        if !upstream_included {
                            return Err(ComposeError::MissingRequiredDependency {
                                component: spec.name.clone(),
                                slot: slot.name.clone(),
                                upstream: component.clone(),
                            });
                        }
                    }
                    SlotSource::Profile { subsystem, field } => {
                        profile.require(&spec.name, *subsystem, field)?;
                    }
                    _ => {}
                }
            }
        }

        let steps = order
            .iter()
            .enumerate()
            .map(|(step, &i)| {
                let spec = &registry.specs()[i];
                PlanStep {
                    step,
                    registry_index: i,
                    component: spec.name.clone(),
                    kind: spec.kind.clone(),
                    gate: spec.inclusion.describe(),
                    decision: if included[i] { Decision::Include } else { Decision::Exclude },
                    upstream: graph.upstream_of(i).into_iter().map(String::from).collect(),
                    resilient: spec.resilient,
                }
            })
            .collect();

        Ok(Self {
            environment: profile.id(),
            steps,
            edges: graph
                .edges()
                .into_iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
        })
    }

    /// Component names in instantiation order.
    #[must_use]
    pub fn order(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.component.as_str()).collect()
    }

    #[must_use]
    pub fn included(&self) -> Vec<&str> {
        self.filter(Decision::Include)
    }

    #[must_use]
    pub fn excluded(&self) -> Vec<&str> {
        self.filter(Decision::Exclude)
    }

    fn filter(&self, decision: Decision) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.decision == decision)
            .map(|s| s.component.as_str())
            .collect()
    }
}

impl Display for CompositionPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        writeln!(
            f,
            "╔═══════════════════════════════════════════════════════════════╗"
        )?;
        writeln!(f, "║  COMPOSITION PLAN: {:<43}║", self.environment.as_str())?;
        writeln!(
            f,
            "╚═══════════════════════════════════════════════════════════════╝"
        )?;
        writeln!(f)?;

        writeln!(
            f,
            "┌─ SUMMARY ────────────────────────────────────────────────────┐"
        )?;
        writeln!(f, "│ Components:        {:>10}", self.steps.len())?;
        writeln!(f, "│ Present:           {:>10}", self.included().len())?;
        writeln!(f, "│ Absent:            {:>10}", self.excluded().len())?;
        writeln!(f, "│ Edges:             {:>10}", self.edges.len())?;
        writeln!(
            f,
            "└──────────────────────────────────────────────────────────────┘"
        )?;
        writeln!(f)?;

        writeln!(
            f,
            "┌─ INSTANTIATION ORDER ────────────────────────────────────────┐"
        )?;
        for step in &self.steps {
            let marker = match step.decision {
                Decision::Include => "",
                Decision::Exclude => " [ABSENT]",
            };
            let resilient = if step.resilient { " [RESILIENT]" } else { "" };
            writeln!(f, "│")?;
            writeln!(f, "│ Step {}: {} ({}){marker}{resilient}", step.step, step.component, step.kind)?;
            writeln!(f, "│   Gate: {}", step.gate)?;
            if !step.upstream.is_empty() {
                writeln!(f, "│   After: {}", step.upstream.join(", "))?;
            }
        }
        writeln!(f, "│")?;
        writeln!(
            f,
            "└──────────────────────────────────────────────────────────────┘"
        )
    }
}
