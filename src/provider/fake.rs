//! Fake implementations for testing.
//!
//! These use in-memory data structures to stand in for real providers and
//! directories, and record every call so tests can assert on side effects.

use crate::provider::traits::{
    CloudError, CloudResult, ErrorKind, ExternalObject, ExternalResolver, ExternalResourceRef, GroupDirectory,
    ProvisionRequest, ResourceProvider,
};
use crate::profile::EnvironmentId;
use crate::reconcile::RequestType;
use crate::value::{OutputMap, SlotValue};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// FakeResourceProvider
// ============================================================================

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionCall {
    pub component: String,
    pub kind: String,
    pub environment: EnvironmentId,
    pub request_type: RequestType,
    pub inputs: BTreeMap<String, SlotValue>,
}

/// Provider that synthesizes deterministic outputs.
///
/// Unless overridden, output `o` of component `c` in environment `e` is the
/// string `"{c}.{o}.{e}.fake"`, so repeated runs produce identical values.
#[derive(Clone, Default)]
pub struct FakeResourceProvider {
    calls: Arc<Mutex<Vec<ProvisionCall>>>,
    overrides: Arc<Mutex<HashMap<String, OutputMap>>>,
    failures: Arc<Mutex<HashMap<String, CloudError>>>,
}

impl FakeResourceProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix some outputs of `component`; the rest are still synthesized.
    ///
    /// # Panics
    ///
    /// Panics if the overrides mutex is poisoned.
    pub fn set_outputs(&self, component: &str, outputs: OutputMap) {
        self.overrides
            .lock()
            .expect("overrides mutex poisoned")
            .insert(component.to_string(), outputs);
    }

    /// Make every call for `component` fail with `error`.
    ///
    /// # Panics
    ///
    /// Panics if the failures mutex is poisoned.
    pub fn fail_on(&self, component: &str, error: CloudError) {
        self.failures
            .lock()
            .expect("failures mutex poisoned")
            .insert(component.to_string(), error);
    }

    /// # Panics
    ///
    /// Panics if the calls mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<ProvisionCall> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    /// Components provisioned, in call order.
    #[must_use]
    pub fn provisioned(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.component).collect()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

impl ResourceProvider for FakeResourceProvider {
    fn provision(&self, request: &ProvisionRequest<'_>) -> CloudResult<OutputMap> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(ProvisionCall {
                component: request.component.to_string(),
                kind: request.kind.to_string(),
                environment: request.environment,
                request_type: request.request_type,
                inputs: request.inputs.clone(),
            });

        if let Some(err) = self
            .failures
            .lock()
            .expect("failures mutex poisoned")
            .get(request.component)
        {
            return Err(err.clone());
        }

        let overrides = self.overrides.lock().expect("overrides mutex poisoned");
        let fixed = overrides.get(request.component);
        Ok(request
            .outputs
            .iter()
            .map(|o| {
                let value = fixed.and_then(|m| m.get(o)).cloned().unwrap_or_else(|| {
                    Value::from(format!("{}.{o}.{}.fake", request.component, request.environment))
                });
                (o.clone(), value)
            })
            .collect())
    }
}

// ============================================================================
// FakeExternalResolver
// ============================================================================

/// Resolver backed by a map keyed by `(identifier, attribute)`.
#[derive(Clone, Default)]
pub struct FakeExternalResolver {
    values: Arc<Mutex<HashMap<(String, Option<String>), Value>>>,
}

impl FakeExternalResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if the values mutex is poisoned.
    pub fn insert(&self, identifier: &str, attribute: Option<&str>, value: impl Into<Value>) {
        self.values
            .lock()
            .expect("values mutex poisoned")
            .insert((identifier.to_string(), attribute.map(String::from)), value.into());
    }
}

impl ExternalResolver for FakeExternalResolver {
    fn resolve(&self, reference: &ExternalResourceRef) -> CloudResult<Value> {
        self.values
            .lock()
            .expect("values mutex poisoned")
            .get(&(reference.identifier.clone(), reference.attribute.clone()))
            .cloned()
            .ok_or_else(|| CloudError::not_found(format!("external resource {} not found", reference.identifier)))
    }
}

// ============================================================================
// FakeGroupDirectory
// ============================================================================

#[derive(Debug, Clone)]
struct StoredGroup {
    object: ExternalObject,
    /// Lookups that still report "not found" (eventual consistency).
    hidden_lookups: usize,
}

/// In-memory directory of named groups.
#[derive(Clone, Default)]
pub struct FakeGroupDirectory {
    groups: Arc<Mutex<BTreeMap<String, StoredGroup>>>,
    lookup_failure: Arc<Mutex<Option<CloudError>>>,
    create_failure: Arc<Mutex<Option<CloudError>>>,
    lookups: Arc<AtomicUsize>,
    creates: Arc<AtomicUsize>,
    next_id: Arc<AtomicUsize>,
}

impl FakeGroupDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a visible group.
    pub fn insert(&self, name: &str) -> ExternalObject {
        self.insert_hidden(name, 0)
    }

    /// Pre-populate a group that the next `hidden_lookups` lookups will not see.
    ///
    /// # Panics
    ///
    /// Panics if the groups mutex is poisoned.
    pub fn insert_hidden(&self, name: &str, hidden_lookups: usize) -> ExternalObject {
        let object = ExternalObject {
            name: name.to_string(),
            id: self.allocate_id(),
        };
        self.groups.lock().expect("groups mutex poisoned").insert(
            name.to_string(),
            StoredGroup {
                object: object.clone(),
                hidden_lookups,
            },
        );
        object
    }

    /// Make every lookup fail with an error of `kind`.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn fail_lookups(&self, kind: ErrorKind) {
        *self.lookup_failure.lock().expect("lookup failure mutex poisoned") =
            Some(CloudError::new(kind, "injected lookup failure"));
    }

    /// Make every create fail with an error of `kind`.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn fail_creates(&self, kind: ErrorKind) {
        *self.create_failure.lock().expect("create failure mutex poisoned") =
            Some(CloudError::new(kind, "injected create failure"));
    }

    #[must_use]
    pub fn lookup_calls(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// # Panics
    ///
    /// Panics if the groups mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.lock().expect("groups mutex poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn allocate_id(&self) -> String {
        format!("grp-{:04}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl GroupDirectory for FakeGroupDirectory {
    fn lookup(&self, name: &str) -> CloudResult<ExternalObject> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.lookup_failure.lock().expect("lookup failure mutex poisoned").clone() {
            return Err(err);
        }
        let mut groups = self.groups.lock().expect("groups mutex poisoned");
        match groups.get_mut(name) {
            Some(stored) if stored.hidden_lookups > 0 => {
                stored.hidden_lookups -= 1;
                Err(CloudError::not_found(format!("group {name} not found")))
            }
            Some(stored) => Ok(stored.object.clone()),
            None => Err(CloudError::not_found(format!("group {name} not found"))),
        }
    }

    fn create(&self, name: &str, _properties: &BTreeMap<String, String>) -> CloudResult<ExternalObject> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.create_failure.lock().expect("create failure mutex poisoned").clone() {
            return Err(err);
        }
        let mut groups = self.groups.lock().expect("groups mutex poisoned");
        if groups.contains_key(name) {
            return Err(CloudError::new(
                ErrorKind::AlreadyExists,
                format!("group {name} already exists"),
            ));
        }
        let object = ExternalObject {
            name: name.to_string(),
            id: self.allocate_id(),
        };
        groups.insert(
            name.to_string(),
            StoredGroup {
                object: object.clone(),
                hidden_lookups: 0,
            },
        );
        Ok(object)
    }
}
