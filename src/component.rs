//! Declarative component descriptions.
//!
//! A [`ComponentSpec`] says what a component consumes (input slots), what it
//! produces (named outputs), and when it exists at all ([`Inclusion`]).
//! Nothing here provisions anything; specs are plain data the planner and
//! composer walk.

use crate::profile::{EnvironmentProfile, Subsystem, Tier};
use serde_json::Value;
use std::fmt::{Debug, Formatter, Result as FormatResult};
use std::sync::Arc;

/// Where an input slot takes its value from.
#[derive(Clone, Debug, PartialEq)]
pub enum SlotSource {
    /// A named output of another component.
    Output { component: String, output: String },
    /// A field of the environment profile.
    Profile { subsystem: Subsystem, field: String },
    /// A fixed value.
    Literal(Value),
    /// A declared external reference, by name.
    External(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct InputSlot {
    pub name: String,
    pub source: SlotSource,
    /// Required slots fed by an absent upstream fail composition.
    pub required: bool,
}

impl InputSlot {
    pub fn output(name: impl Into<String>, component: impl Into<String>, output: impl Into<String>) -> Self {
        Self::from_source(
            name,
            SlotSource::Output {
                component: component.into(),
                output: output.into(),
            },
        )
    }

    pub fn profile(name: impl Into<String>, subsystem: Subsystem, field: impl Into<String>) -> Self {
        Self::from_source(
            name,
            SlotSource::Profile {
                subsystem,
                field: field.into(),
            },
        )
    }

    pub fn literal(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::from_source(name, SlotSource::Literal(value.into()))
    }

    pub fn external(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::from_source(name, SlotSource::External(reference.into()))
    }

    /// Tolerate an absent upstream: the slot stays unresolved instead of
    /// failing composition.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn from_source(name: impl Into<String>, source: SlotSource) -> Self {
        Self {
            name: name.into(),
            source,
            required: true,
        }
    }

    /// The upstream component this slot depends on, if any.
    #[must_use]
    pub fn upstream(&self) -> Option<&str> {
        match &self.source {
            SlotSource::Output { component, .. } => Some(component),
            _ => None,
        }
    }
}

/// Inclusion predicate: decides whether a component exists for a profile.
///
/// Every variant is a total function of the profile.
#[derive(Clone, Default)]
pub enum Inclusion {
    #[default]
    Always,
    ProdOnly,
    NonProdOnly,
    /// Enabled when the named toggle under `features` is `true`.
    Feature(String),
    AllOf(Vec<Inclusion>),
    AnyOf(Vec<Inclusion>),
    Not(Box<Inclusion>),
    /// Escape hatch with a label for audit output.
    Custom {
        label: String,
        predicate: Arc<dyn Fn(&EnvironmentProfile) -> bool + Send + Sync>,
    },
}

impl Inclusion {
    pub fn feature(name: impl Into<String>) -> Self {
        Self::Feature(name.into())
    }

    pub fn custom<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&EnvironmentProfile) -> bool + Send + Sync + 'static,
    {
        Self::Custom {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    #[must_use]
    pub fn evaluate(&self, profile: &EnvironmentProfile) -> bool {
        match self {
            Self::Always => true,
            Self::ProdOnly => profile.tier() == Tier::Prod,
            Self::NonProdOnly => profile.tier() == Tier::NonProd,
            Self::Feature(name) => profile.feature_enabled(name),
            Self::AllOf(all) => all.iter().all(|g| g.evaluate(profile)),
            Self::AnyOf(any) => any.iter().any(|g| g.evaluate(profile)),
            Self::Not(inner) => !inner.evaluate(profile),
            Self::Custom { predicate, .. } => predicate(profile),
        }
    }

    /// Human-readable form for gate tables.
    #[must_use]
    pub fn describe(&self) -> String {
        fn join(gates: &[Inclusion], sep: &str) -> String {
            gates.iter().map(Inclusion::describe).collect::<Vec<_>>().join(sep)
        }
        match self {
            Self::Always => "always".to_string(),
            Self::ProdOnly => "prod-only".to_string(),
            Self::NonProdOnly => "non-prod-only".to_string(),
            Self::Feature(name) => format!("feature:{name}"),
            Self::AllOf(all) => format!("({})", join(all, " & ")),
            Self::AnyOf(any) => format!("({})", join(any, " | ")),
            Self::Not(inner) => format!("!{}", inner.describe()),
            Self::Custom { label, .. } => format!("custom:{label}"),
        }
    }
}

impl Debug for Inclusion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(&self.describe())
    }
}

/// Declaration of one infrastructure component.
#[derive(Clone, Debug)]
pub struct ComponentSpec {
    pub name: String,
    /// Resource kind handed to the provider (`network`, `database`, ...).
    pub kind: String,
    pub inputs: Vec<InputSlot>,
    pub outputs: Vec<String>,
    pub inclusion: Inclusion,
    /// Run provisioning inside the validator/reporter wrapper.
    pub resilient: bool,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            inclusion: Inclusion::Always,
            resilient: false,
        }
    }

    #[must_use]
    pub fn input(mut self, slot: InputSlot) -> Self {
        self.inputs.push(slot);
        self
    }

    #[must_use]
    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    #[must_use]
    pub fn outputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn gate(mut self, inclusion: Inclusion) -> Self {
        self.inclusion = inclusion;
        self
    }

    #[must_use]
    pub fn resilient(mut self) -> Self {
        self.resilient = true;
        self
    }

    #[must_use]
    pub fn declares_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o == name)
    }

    /// Distinct upstream components, in slot order.
    #[must_use]
    pub fn upstream_components(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for up in self.inputs.iter().filter_map(InputSlot::upstream) {
            if !seen.contains(&up) {
                seen.push(up);
            }
        }
        seen
    }
}
