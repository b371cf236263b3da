//! # Tiergraph
//!
//! An **environment-parameterized composition engine** for infrastructure
//! stacks, with **resilient, idempotent reconciliation** for the parts of a
//! stack that live outside any transactional deployment.
//!
//! One registry of components describes every environment. An environment
//! profile decides which components exist, how big they are, and how they are
//! wired together; the engine turns the pair into a correctly ordered
//! sequence of provisioning calls.
//!
//! ## Key Features
//!
//! - **Declarative components** - inputs, outputs, and inclusion gates are data, not code
//! - **Deterministic ordering** - topological sort with a declaration-order tie-break
//! - **Explicit absence** - gated-out components stay in the graph as `Absent` placeholders
//! - **Single wiring step** - every cross-component reference is resolved in one place
//! - **Fail fast** - cycles, bad references, and missing profile fields abort before any side effect
//! - **Advisory steps** - validators and reporters can only ever add warnings
//! - **Idempotent external sync** - lookup-then-create for objects a stack does not own
//!
//! ## Quick Start
//!
//! ```
//! use tiergraph::{Composer, ProfileTable, stack};
//! use tiergraph::testing::FakeResourceProvider;
//!
//! # fn main() -> anyhow::Result<()> {
//! let profiles = ProfileTable::builtin();
//! let composer = Composer::new(stack::reference_stack()?);
//!
//! // Inspect the plan without side effects
//! let plan = composer.plan(&profiles.resolve("dev")?)?;
//! println!("{plan}");
//!
//! // Compose against a provider
//! let provider = FakeResourceProvider::new();
//! let deployment = composer.compose(&profiles.resolve("prod")?, &provider)?;
//! assert!(deployment.present().contains(&"search"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Environment profiles
//!
//! An [`EnvironmentProfile`] is the configuration record for one of the closed
//! set of environments ([`EnvironmentId`]). Fields are grouped by
//! [`Subsystem`]; feature toggles live under `features`. Profiles come from a
//! [`ConfigSource`] and are always passed explicitly; the engine never reads
//! ambient process state.
//!
//! ### Components
//!
//! A [`ComponentSpec`] declares input slots ([`InputSlot`]), output names, and
//! an [`Inclusion`] gate. Slots are fed from upstream outputs, profile fields,
//! literals, or external references. The [`ComponentRegistry`] holds specs in
//! declaration order and renders the per-environment gate table.
//!
//! ### Composition
//!
//! The [`Composer`] first builds a [`CompositionPlan`]: order, inclusion
//! decisions, and validation. Only then does it instantiate each component,
//! yielding a [`Deployment`] of [`ComponentInstance`]s. Absent components
//! expose their outputs as [`SlotValue::Unresolved`]; a required slot bound to
//! one is a [`ComposeError::MissingRequiredDependency`].
//!
//! ### Reconciliation
//!
//! The [`reconcile`] module speaks the orchestrator's wire types:
//! - [`ResilientUnit`] forces `validator -> unit -> reporter` and downgrades
//!   advisory failures to [`Status::SuccessWithWarning`]
//! - [`ExternalSyncHandler`] reconciles one externally managed object with a
//!   lookup-before-create protocol
//! - [`reconcile_batch`] runs many events, concurrently across objects but
//!   never concurrently for the same one
//!
//! ## Error Handling
//!
//! Engine operations return [`ComposeError`], which always names the offending
//! component or field. Reconciliation returns [`SyncError`] only for failures
//! of the external system itself. Configuration loading and report
//! persistence use `anyhow::Result`.
//!
//! ## Testing
//!
//! The [`testing`] module provides in-memory fakes for every collaborator,
//! fixture registries, and assertion helpers.
//!
//! ## Logging
//!
//! Decisions are logged with `tracing`. Call [`logging::init_tracing`] from a
//! binary or test to see them.

pub mod component;
pub mod composer;
pub mod config;
pub mod error;
pub mod graph;
pub mod instance;
pub mod logging;
pub mod planner;
pub mod profile;
pub mod provider;
pub mod reconcile;
pub mod registry;
pub mod report;
pub mod retry;
pub mod stack;
pub mod testing;
pub mod value;
pub mod wire;

pub use component::{ComponentSpec, Inclusion, InputSlot, SlotSource};
pub use composer::{Composer, DeployMode, Deployment};
pub use config::{BuiltinConfigSource, ConfigSource, JsonConfigSource, ProfileTable};
pub use error::{ComposeError, SyncError};
pub use graph::DependencyGraph;
pub use instance::{ComponentInstance, InstanceState};
pub use planner::{CompositionPlan, Decision, PlanStep};
pub use profile::{EnvironmentId, EnvironmentProfile, Subsystem, Tier};
pub use provider::{
    CloudError, CloudResult, ErrorKind, ExternalObject, ExternalResolver, ExternalResourceRef, GroupDirectory,
    ProvisionRequest, ResourceProvider,
};
pub use reconcile::{
    AdvisoryStep, ExternalSyncHandler, NotFoundPolicy, Phase, ReconciliationEvent, ReconciliationResult,
    RequestType, ResilientUnit, Status, reconcile_batch, wrap,
};
pub use registry::{ComponentRegistry, GateTable};
pub use report::DeploymentReport;
pub use retry::RetryConfig;
pub use value::{OutputMap, SlotValue, UnresolvedReason};
pub use wire::{WiredInputs, wire};
