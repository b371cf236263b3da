//! Collaborator interfaces and their in-memory fakes.
//!
//! The engine decides whether, in what order, and with what wiring components
//! are provisioned. Provisioning itself, resolution of externally owned
//! resources, and the directory of externally managed objects are all behind
//! traits:
//!
//! - [`ResourceProvider`] - creates or updates one component's resources
//! - [`ExternalResolver`] - resolves [`ExternalResourceRef`]s the stack only references
//! - [`GroupDirectory`] - lookup/create for non-transactional external objects
//!
//! Every trait has a fake in [`fake`] for tests.

pub mod fake;
pub mod traits;

pub use fake::{FakeExternalResolver, FakeGroupDirectory, FakeResourceProvider, ProvisionCall};
pub use traits::{
    CloudError, CloudResult, ErrorKind, ExternalObject, ExternalResolver, ExternalResourceRef, GroupDirectory,
    ProvisionRequest, ResourceProvider,
};
