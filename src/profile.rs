//! Environment identifiers, tiers, and the per-environment configuration record.
//!
//! An [`EnvironmentProfile`] is the only configuration the engine reads. It is
//! passed explicitly to every predicate and wiring step; nothing looks up
//! ambient state.

use crate::error::ComposeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::str::FromStr;

/// The closed set of deployment environments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentId {
    Dev,
    Qa,
    Staging,
    Uat,
    Prod,
}

impl EnvironmentId {
    pub const ALL: [Self; 5] = [Self::Dev, Self::Qa, Self::Staging, Self::Uat, Self::Prod];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Qa => "qa",
            Self::Staging => "staging",
            Self::Uat => "uat",
            Self::Prod => "prod",
        }
    }

    #[must_use]
    pub const fn tier(self) -> Tier {
        match self {
            Self::Prod => Tier::Prod,
            _ => Tier::NonProd,
        }
    }
}

impl Display for EnvironmentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvironmentId {
    type Err = ComposeError;

    /// Exact, case-sensitive match. There is no fallback environment.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ComposeError::UnknownEnvironment { id: s.to_string() })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Prod,
    NonProd,
}

/// Groups of profile fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    Network,
    Compute,
    Identity,
    Retention,
    Edge,
    Messaging,
    Features,
}

impl Subsystem {
    pub const ALL: [Self; 7] = [
        Self::Network,
        Self::Compute,
        Self::Identity,
        Self::Retention,
        Self::Edge,
        Self::Messaging,
        Self::Features,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Compute => "compute",
            Self::Identity => "identity",
            Self::Retention => "retention",
            Self::Edge => "edge",
            Self::Messaging => "messaging",
            Self::Features => "features",
        }
    }
}

impl Display for Subsystem {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subsystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sub| sub.as_str() == s)
            .ok_or_else(|| format!("unknown subsystem `{s}`"))
    }
}

/// Field name -> value for one subsystem.
pub type FieldMap = BTreeMap<String, Value>;

/// Fully-populated configuration for one environment.
///
/// Fields are looked up by `(subsystem, field)`. A missing field is only an
/// error when an included component asks for it through [`require`](Self::require).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    id: EnvironmentId,
    #[serde(default)]
    subsystems: BTreeMap<Subsystem, FieldMap>,
}

impl EnvironmentProfile {
    #[must_use]
    pub fn new(id: EnvironmentId) -> Self {
        Self {
            id,
            subsystems: BTreeMap::new(),
        }
    }

    pub(crate) fn from_parts(id: EnvironmentId, subsystems: BTreeMap<Subsystem, FieldMap>) -> Self {
        Self { id, subsystems }
    }

    #[must_use]
    pub const fn id(&self) -> EnvironmentId {
        self.id
    }

    #[must_use]
    pub const fn tier(&self) -> Tier {
        self.id.tier()
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with_field(mut self, subsystem: Subsystem, field: &str, value: impl Into<Value>) -> Self {
        self.set(subsystem, field, value);
        self
    }

    /// Shorthand for a boolean entry under [`Subsystem::Features`].
    #[must_use]
    pub fn with_feature(self, name: &str, enabled: bool) -> Self {
        self.with_field(Subsystem::Features, name, enabled)
    }

    pub fn set(&mut self, subsystem: Subsystem, field: &str, value: impl Into<Value>) {
        self.subsystems
            .entry(subsystem)
            .or_default()
            .insert(field.to_string(), value.into());
    }

    #[must_use]
    pub fn get(&self, subsystem: Subsystem, field: &str) -> Option<&Value> {
        self.subsystems.get(&subsystem).and_then(|m| m.get(field))
    }

    #[must_use]
    pub fn fields(&self, subsystem: Subsystem) -> Option<&FieldMap> {
        self.subsystems.get(&subsystem)
    }

    /// Look up a field on behalf of `component`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::MissingProfileField`] if the field is not set.
    pub fn require(
        &self,
        component: &str,
        subsystem: Subsystem,
        field: &str,
    ) -> Result<&Value, ComposeError> {
        self.get(subsystem, field)
            .ok_or_else(|| ComposeError::MissingProfileField {
                component: component.to_string(),
                subsystem,
                field: field.to_string(),
            })
    }

    /// Feature toggle lookup. Unset or non-boolean toggles read as disabled.
    #[must_use]
    pub fn feature_enabled(&self, name: &str) -> bool {
        self.get(Subsystem::Features, name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
