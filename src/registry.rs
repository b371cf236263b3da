//! The ordered set of component declarations.
//!
//! Declaration order matters: when two components have no data dependency,
//! they are instantiated in the order they were registered. That keeps
//! generated names stable across repeated runs of an unchanged profile.

use crate::component::{ComponentSpec, Inclusion, SlotSource};
use crate::error::ComposeError;
use crate::profile::EnvironmentProfile;
use crate::provider::ExternalResourceRef;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::sync::LazyLock;

static COMPONENT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").expect("valid component name regex"));

#[derive(Clone, Debug, Default)]
pub struct ComponentRegistry {
    specs: Vec<ComponentSpec>,
    index: HashMap<String, usize>,
    externals: Vec<ExternalResourceRef>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a component declaration.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is malformed or already registered, or if
    /// the spec repeats an input slot name or an output name.
    pub fn register(&mut self, spec: ComponentSpec) -> Result<(), ComposeError> {
        if !COMPONENT_NAME.is_match(&spec.name) {
            return Err(ComposeError::InvalidComponentName { name: spec.name });
        }
        if self.index.contains_key(&spec.name) {
            return Err(ComposeError::DuplicateComponent { name: spec.name });
        }
        // inputs and outputs are separate namespaces
        let inputs = spec.inputs.iter().map(|slot| slot.name.as_str());
        if let Some(slot) = first_repeat(inputs).or_else(|| first_repeat(spec.outputs.iter().map(String::as_str))) {
            return Err(ComposeError::DuplicateSlot {
                slot: slot.to_string(),
                component: spec.name,
            });
        }
        self.index.insert(spec.name.clone(), self.specs.len());
        self.specs.push(spec);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn with(mut self, spec: ComponentSpec) -> Result<Self, ComposeError> {
        self.register(spec)?;
        Ok(self)
    }

    /// Declare a resource this stack references but does not own.
    /// A later declaration with the same name replaces the earlier one.
    pub fn declare_external(&mut self, reference: ExternalResourceRef) {
        match self.externals.iter_mut().find(|r| r.name == reference.name) {
            Some(existing) => *existing = reference,
            None => self.externals.push(reference),
        }
    }

    /// Specs in declaration order.
    #[must_use]
    pub fn specs(&self) -> &[ComponentSpec] {
        &self.specs
    }

    #[must_use]
    pub fn externals(&self) -> &[ExternalResourceRef] {
        &self.externals
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ComponentSpec> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Check every slot points at something that is declared.
    ///
    /// # Errors
    ///
    /// Returns the first dangling component, output, or external reference,
    /// in declaration order.
    pub fn validate_references(&self) -> Result<(), ComposeError> {
        for spec in &self.specs {
            for slot in &spec.inputs {
                match &slot.source {
                    SlotSource::Output { component, output } => {
                        let Some(target) = self.get(component) else {
                            return Err(ComposeError::UnknownComponent {
                                component: spec.name.clone(),
                                slot: slot.name.clone(),
                                target: component.clone(),
                            });
                        };
                        if !target.declares_output(output) {
                            return Err(ComposeError::UnknownOutput {
                                component: spec.name.clone(),
                                slot: slot.name.clone(),
                                target: component.clone(),
                                output: output.clone(),
                            });
                        }
                    }
                    SlotSource::External(reference) => {
                        if !self.externals.iter().any(|r| &r.name == reference) {
                            return Err(ComposeError::UnknownExternal {
                                component: spec.name.clone(),
                                slot: slot.name.clone(),
                                reference: reference.clone(),
                            });
                        }
                    }
                    SlotSource::Profile { .. } | SlotSource::Literal(_) => {}
                }
            }
        }
        Ok(())
    }

    /// Evaluate every gate against `profile`: one auditable row per component.
    #[must_use]
    pub fn gate_table(&self, profile: &EnvironmentProfile) -> GateTable {
        GateTable {
            environment: profile.id().to_string(),
            rows: self
                .specs
                .iter()
                .map(|s| GateRow {
                    component: s.name.clone(),
                    gate: s.inclusion.clone(),
                    included: s.inclusion.evaluate(profile),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GateRow {
    pub component: String,
    pub gate: Inclusion,
    pub included: bool,
}

#[derive(Clone, Debug)]
pub struct GateTable {
    pub environment: String,
    pub rows: Vec<GateRow>,
}

impl GateTable {
    #[must_use]
    pub fn included(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| r.included)
            .map(|r| r.component.as_str())
            .collect()
    }
}

impl Display for GateTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        writeln!(f, "gates for `{}`", self.environment)?;
        let width = self.rows.iter().map(|r| r.component.len()).max().unwrap_or(0);
        for row in &self.rows {
            writeln!(
                f,
                "  {:<width$}  {:<8}  {}",
                row.component,
                if row.included { "present" } else { "absent" },
                row.gate.describe(),
            )?;
        }
        Ok(())
    }
}

fn first_repeat<'a>(mut names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    names.find(|name| !seen.insert(*name))
}
