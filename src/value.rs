//! Slot values: what flows along a dependency edge.
//!
//! A slot is either `Resolved` to a concrete JSON value or explicitly
//! `Unresolved` with the reason. There is no implicit default: an absent
//! upstream never shows up as an empty string or `null`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FormatResult};

/// Outputs returned by a provider, addressed by name.
pub type OutputMap = BTreeMap<String, Value>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// The component that would produce this value was excluded by its gate.
    ComponentAbsent { component: String },
    /// An external reference could not be resolved.
    ExternalUnresolved { reference: String, detail: String },
}

impl Display for UnresolvedReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            Self::ComponentAbsent { component } => write!(f, "component `{component}` is absent"),
            Self::ExternalUnresolved { reference, detail } => {
                write!(f, "external `{reference}` unresolved: {detail}")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum SlotValue {
    Resolved(Value),
    Unresolved(UnresolvedReason),
}

impl SlotValue {
    pub fn absent(component: impl Into<String>) -> Self {
        Self::Unresolved(UnresolvedReason::ComponentAbsent {
            component: component.into(),
        })
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    #[must_use]
    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Resolved(v) => Some(v),
            Self::Unresolved(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    #[must_use]
    pub const fn unresolved_reason(&self) -> Option<&UnresolvedReason> {
        match self {
            Self::Resolved(_) => None,
            Self::Unresolved(r) => Some(r),
        }
    }

    /// Flatten to a string property for reconciliation events.
    /// Strings are passed through; other JSON values are rendered compactly.
    #[must_use]
    pub fn to_property(&self) -> Option<String> {
        self.as_value().map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

impl From<Value> for SlotValue {
    fn from(v: Value) -> Self {
        Self::Resolved(v)
    }
}
