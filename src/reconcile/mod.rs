//! Reconciliation of imperative side effects.
//!
//! Two pieces live here:
//!
//! - [`ResilientUnit`] wraps a provisioning unit with an advisory validator and
//!   reporter. Advisory failures are downgraded to
//!   [`Status::SuccessWithWarning`] so they can never leave the orchestrator
//!   stuck in a rollback.
//! - [`ExternalSyncHandler`] creates-or-skips an externally managed object
//!   with a lookup-then-act protocol, safe under at-least-once delivery.
//!
//! Both speak the orchestrator's wire types, [`ReconciliationEvent`] and
//! [`ReconciliationResult`].

pub mod advisory;
pub mod batch;
pub mod event;
pub mod result;
pub mod sync;
pub mod wrapper;

pub use advisory::{PreflightValidator, SummaryReporter, UNRESOLVED_INPUTS_PROPERTY};
pub use batch::reconcile_batch;
pub use event::{ReconciliationEvent, RequestType};
pub use result::{Data, ReconciliationResult, Status};
pub use sync::{DEFAULT_KEY_PROPERTY, ExternalSyncHandler, NotFoundPolicy};
pub use wrapper::{
    AdvisoryContext, AdvisoryStep, FnStep, NoopStep, Phase, ProvisioningUnit, ResilientUnit, WrappedRun,
    advisory_fn, wrap,
};
