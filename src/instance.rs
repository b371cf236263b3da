//! Realized components for a single deployment run.
//!
//! An instance is built once, fully populated, and never mutated. The record
//! of what actually exists lives with the resource provider; instances are
//! discarded when the run ends.

use crate::component::ComponentSpec;
use crate::value::{OutputMap, SlotValue};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// Gate evaluated false; nothing was provisioned.
    Absent,
    /// Provisioned; outputs populated.
    Present,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComponentInstance {
    name: String,
    kind: String,
    state: InstanceState,
    inputs: BTreeMap<String, SlotValue>,
    outputs: BTreeMap<String, SlotValue>,
    warnings: Vec<String>,
}

impl ComponentInstance {
    /// Absent placeholder: every declared output is explicitly unresolved, so
    /// downstream wiring always finds the slot.
    #[must_use]
    pub fn absent(spec: &ComponentSpec) -> Self {
        Self {
            name: spec.name.clone(),
            kind: spec.kind.clone(),
            state: InstanceState::Absent,
            inputs: BTreeMap::new(),
            outputs: spec
                .outputs
                .iter()
                .map(|o| (o.clone(), SlotValue::absent(spec.name.clone())))
                .collect(),
            warnings: Vec::new(),
        }
    }

    /// Present instance. Only declared outputs are kept; the declared set is
    /// the component's output contract.
    #[must_use]
    pub fn present(
        spec: &ComponentSpec,
        inputs: BTreeMap<String, SlotValue>,
        mut outputs: OutputMap,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            name: spec.name.clone(),
            kind: spec.kind.clone(),
            state: InstanceState::Present,
            inputs,
            outputs: spec
                .outputs
                .iter()
                .filter_map(|o| outputs.remove(o).map(|v| (o.clone(), SlotValue::Resolved(v))))
                .collect(),
            warnings,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub const fn state(&self) -> InstanceState {
        self.state
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.state == InstanceState::Present
    }

    #[must_use]
    pub fn input(&self, slot: &str) -> Option<&SlotValue> {
        self.inputs.get(slot)
    }

    #[must_use]
    pub const fn inputs(&self) -> &BTreeMap<String, SlotValue> {
        &self.inputs
    }

    #[must_use]
    pub fn output(&self, name: &str) -> Option<&SlotValue> {
        self.outputs.get(name)
    }

    #[must_use]
    pub const fn outputs(&self) -> &BTreeMap<String, SlotValue> {
        &self.outputs
    }

    /// Advisory warnings recorded while provisioning this instance.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
