//! Error taxonomy for composition and reconciliation.
//!
//! Composition failures are split by when they are detected:
//!
//! - **Configuration** - unknown environment, missing profile field.
//! - **Composition** - cycles, dangling references, a required input fed by an
//!   absent upstream.
//! - **Provisioning** - failures reported by the [`ResourceProvider`](crate::provider::ResourceProvider),
//!   carried through untouched.
//!
//! Every variant names the component (and slot or field) that caused it.
//! Advisory-step failures never show up here; they are downgraded to warnings
//! on a [`ReconciliationResult`](crate::reconcile::ReconciliationResult).

use crate::profile::Subsystem;
use crate::provider::CloudError;
use thiserror::Error;

/// Errors raised while resolving profiles and composing a deployment.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("unknown environment `{id}` (expected one of dev, qa, staging, uat, prod)")]
    UnknownEnvironment { id: String },

    #[error("component `{component}` requires profile field `{subsystem}.{field}`, which is not set")]
    MissingProfileField {
        component: String,
        subsystem: Subsystem,
        field: String,
    },

    #[error("component `{name}` is declared more than once")]
    DuplicateComponent { name: String },

    #[error("invalid component name `{name}` (expected lowercase letters, digits and hyphens)")]
    InvalidComponentName { name: String },

    #[error("component `{component}` declares slot `{slot}` more than once")]
    DuplicateSlot { component: String, slot: String },

    #[error("component `{component}` slot `{slot}` references undeclared component `{target}`")]
    UnknownComponent {
        component: String,
        slot: String,
        target: String,
    },

    #[error("component `{component}` slot `{slot}` references `{target}.{output}`, which `{target}` does not declare")]
    UnknownOutput {
        component: String,
        slot: String,
        target: String,
        output: String,
    },

    #[error("component `{component}` slot `{slot}` references undeclared external resource `{reference}`")]
    UnknownExternal {
        component: String,
        slot: String,
        reference: String,
    },

    #[error("dependency cycle between components: {}", components.join(" -> "))]
    CompositionCycle { components: Vec<String> },

    #[error("component `{component}` requires `{slot}` from `{upstream}`, but `{upstream}` is absent in this environment")]
    MissingRequiredDependency {
        component: String,
        slot: String,
        upstream: String,
    },

    #[error("provider did not return declared output `{output}` for component `{component}`")]
    MissingOutput { component: String, output: String },

    #[error("provisioning component `{component}` failed")]
    Provisioning {
        component: String,
        #[source]
        source: CloudError,
    },
}

impl ComposeError {
    /// Whether this error was raised before any provider call could be issued.
    #[must_use]
    pub const fn is_preflight(&self) -> bool {
        !matches!(
            self,
            Self::MissingOutput { .. } | Self::Provisioning { .. }
        )
    }
}

/// Hard failures from the external sync handler.
///
/// Anything that is not a plain "not found" from the directory lands here and
/// is returned to the orchestrator, which retries per its own policy.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("request `{request_id}` is missing resource property `{property}`")]
    MissingNaturalKey { request_id: String, property: String },

    #[error("looking up `{key}` failed")]
    Lookup {
        key: String,
        #[source]
        source: CloudError,
    },

    #[error("creating `{key}` failed")]
    Create {
        key: String,
        #[source]
        source: CloudError,
    },
}
