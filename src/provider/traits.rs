//! Collaborator traits: the resource provider that actually provisions
//! components, the resolver for resources this engine only references, and
//! the directory of externally managed objects.
//!
//! All interfaces are synchronous. Implementations may wrap an async SDK
//! internally but expose a blocking call, matching the single-threaded
//! composition model.

use crate::profile::EnvironmentId;
use crate::reconcile::RequestType;
use crate::value::{OutputMap, SlotValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

// ============================================================================
// Core Error Type
// ============================================================================

/// Provider-agnostic error returned by every collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudError {
    pub message: String,
    pub kind: ErrorKind,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    Authorization,
    NotFound,
    AlreadyExists,
    InvalidInput,
    Network,
    Timeout,
    ServiceUnavailable,
    RateLimited,
    InternalError,
    Other,
}

impl fmt::Display for CloudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for CloudError {}

impl CloudError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            source: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Errors worth retrying: the remote side may succeed on a later attempt.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Network
                | ErrorKind::Timeout
                | ErrorKind::ServiceUnavailable
                | ErrorKind::RateLimited
        )
    }
}

pub type CloudResult<T> = Result<T, CloudError>;

// ============================================================================
// ResourceProvider - provisioning primitives
// ============================================================================

/// Everything a provider needs to provision one component.
///
/// Inputs arrive already wired; a provider never looks up other components.
#[derive(Debug, Clone)]
pub struct ProvisionRequest<'a> {
    pub component: &'a str,
    pub kind: &'a str,
    pub environment: EnvironmentId,
    pub request_type: RequestType,
    pub inputs: &'a BTreeMap<String, SlotValue>,
    /// Output names the component declares; the provider must return each one.
    pub outputs: &'a [String],
}

impl ProvisionRequest<'_> {
    /// The resolved value of an input, if it resolved.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name).and_then(SlotValue::as_value)
    }
}

/// Issues create-or-update calls for concrete resources (network, storage,
/// compute, identity, search, cache, DNS, WAF, CDN, ...).
pub trait ResourceProvider {
    /// Provision (or update) one component and return its outputs by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying resource cannot be created or updated.
    fn provision(&self, request: &ProvisionRequest<'_>) -> CloudResult<OutputMap>;
}

// ============================================================================
// ExternalResolver - resources referenced but not owned
// ============================================================================

/// A resource the engine references without creating it (a hosted zone, a
/// shared certificate, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalResourceRef {
    /// Name components use to refer to this resource.
    pub name: String,
    /// Provider-side identifier.
    pub identifier: String,
    /// Attribute to resolve (e.g. `endpoint`); `None` resolves the identifier itself.
    pub attribute: Option<String>,
}

impl ExternalResourceRef {
    pub fn new(name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier: identifier.into(),
            attribute: None,
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

pub trait ExternalResolver {
    /// Resolve the reference to a concrete value.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be found or read. Callers treat
    /// any error as "unresolved", never as fatal.
    fn resolve(&self, reference: &ExternalResourceRef) -> CloudResult<Value>;
}

// ============================================================================
// GroupDirectory - externally managed, non-transactional objects
// ============================================================================

/// An object in an external directory, such as an access-control group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalObject {
    pub name: String,
    pub id: String,
}

pub trait GroupDirectory: Send + Sync {
    /// Look up an object by its natural key.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::NotFound`] if no such object exists, or another
    /// kind if the directory itself misbehaves.
    fn lookup(&self, name: &str) -> CloudResult<ExternalObject>;

    /// Create an object with the given natural key.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::AlreadyExists`] if the key is taken, or another kind
    /// if the directory fails.
    fn create(&self, name: &str, properties: &BTreeMap<String, String>)
    -> CloudResult<ExternalObject>;
}
