//! Cross-reference wiring.
//!
//! This is the only place a component's inputs are looked up. Component
//! bodies (providers) receive already-wired values, so every cross-component
//! reference is visible as data in the registry.

use crate::component::{ComponentSpec, SlotSource};
use crate::error::ComposeError;
use crate::instance::ComponentInstance;
use crate::profile::EnvironmentProfile;
use crate::value::{SlotValue, UnresolvedReason};
use std::collections::{BTreeMap, HashMap};

/// Resolved values of external references, by reference name.
pub type ExternalTable = BTreeMap<String, SlotValue>;

/// Wired inputs for one component.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WiredInputs {
    pub values: BTreeMap<String, SlotValue>,
}

impl WiredInputs {
    #[must_use]
    pub fn get(&self, slot: &str) -> Option<&SlotValue> {
        self.values.get(slot)
    }

    /// Slots that did not resolve, with the reason.
    pub fn unresolved(&self) -> impl Iterator<Item = (&str, &UnresolvedReason)> {
        self.values
            .iter()
            .filter_map(|(k, v)| v.unresolved_reason().map(|r| (k.as_str(), r)))
    }

    /// Fail if a required slot is fed by an absent component.
    ///
    /// Unresolved externals never fail: dependent wiring is skipped instead.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::MissingRequiredDependency`] for the first
    /// offending slot, in declaration order.
    pub fn check_required(&self, spec: &ComponentSpec) -> Result<(), ComposeError> {
        for slot in spec.inputs.iter().filter(|s| s.required) {
            if let Some(SlotValue::Unresolved(UnresolvedReason::ComponentAbsent { component })) =
                self.values.get(&slot.name)
            {
                return Err(ComposeError::MissingRequiredDependency {
                    component: spec.name.clone(),
                    slot: slot.name.clone(),
                    upstream: component.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Substitute every input slot of `spec` from already-instantiated upstreams,
/// the profile, literals, and resolved externals.
///
/// An absent upstream yields an `Unresolved` slot; whether that is fatal is
/// decided by [`WiredInputs::check_required`].
///
/// # Errors
///
/// Returns an error if an upstream has not been instantiated yet (an ordering
/// bug), if a present upstream lacks the output, or if a profile field is unset.
pub fn wire(
    spec: &ComponentSpec,
    upstream: &HashMap<&str, &ComponentInstance>,
    profile: &EnvironmentProfile,
    externals: &ExternalTable,
) -> Result<WiredInputs, ComposeError> {
    let mut values = BTreeMap::new();
    for slot in &spec.inputs {
        let value = match &slot.source {
            SlotSource::Output { component, output } => {
                let instance = upstream.get(component.as_str()).ok_or_else(|| ComposeError::UnknownComponent {
                    component: spec.name.clone(),
                    slot: slot.name.clone(),
                    target: component.clone(),
                })?;
                if instance.is_present() {
                    instance
                        .output(output)
                        .filter(|v| v.is_resolved())
                        .cloned()
                        .ok_or_else(|| ComposeError::MissingOutput {
                            component: component.clone(),
                            output: output.clone(),
                        })?
                } else {
                    SlotValue::absent(component.clone())
                }
            }
            SlotSource::Profile { subsystem, field } => {
                SlotValue::Resolved(profile.require(&spec.name, *subsystem, field)?.clone())
            }
            SlotSource::Literal(v) => SlotValue::Resolved(v.clone()),
            SlotSource::External(reference) => externals.get(reference).cloned().unwrap_or_else(|| {
                SlotValue::Unresolved(UnresolvedReason::ExternalUnresolved {
                    reference: reference.clone(),
                    detail: "not resolved for this run".to_string(),
                })
            }),
        };
        values.insert(slot.name.clone(), value);
    }
    Ok(WiredInputs { values })
}
