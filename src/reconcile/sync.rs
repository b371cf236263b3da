//! Create-or-skip reconciliation for one externally managed object.
//!
//! Protocol on `Create`/`Update`: look the object up by its natural key; if it
//! exists the declaration is already satisfied; if the directory says "not
//! found", create it. `Delete` is a no-op: the object outlives the stack that
//! declared it.
//!
//! Delivery is at-least-once, so the same logical create may arrive twice.
//! The lookup before create makes the second delivery a no-op.

use super::event::ReconciliationEvent;
use super::result::{Data, ReconciliationResult};
use crate::error::SyncError;
use crate::provider::{CloudError, CloudResult, ErrorKind, ExternalObject, GroupDirectory};
use crate::retry::{RetryConfig, retry_with_backoff, retry_with_backoff_if};
use serde_json::Value;
use tracing::{debug, info};

/// Resource property that carries the natural key by default.
pub const DEFAULT_KEY_PROPERTY: &str = "GroupName";

/// How far to trust a "not found" from the directory.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum NotFoundPolicy {
    /// The first "not found" before creating is authoritative. If the create
    /// then reports that the object already exists, the re-check is retried
    /// with the transient backoff until the object becomes visible.
    #[default]
    Authoritative,
    /// Re-check with backoff before creating, for directories that are
    /// eventually consistent after a recent create or delete.
    Confirm(RetryConfig),
}

pub struct ExternalSyncHandler<D> {
    directory: D,
    key_property: String,
    not_found: NotFoundPolicy,
    transient_retry: RetryConfig,
}

impl<D: GroupDirectory> ExternalSyncHandler<D> {
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            key_property: DEFAULT_KEY_PROPERTY.to_string(),
            not_found: NotFoundPolicy::default(),
            transient_retry: RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn key_property(mut self, property: impl Into<String>) -> Self {
        self.key_property = property.into();
        self
    }

    #[must_use]
    pub fn not_found_policy(mut self, policy: NotFoundPolicy) -> Self {
        self.not_found = policy;
        self
    }

    /// Retry budget for network-class errors on each directory call.
    #[must_use]
    pub fn transient_retry(mut self, config: RetryConfig) -> Self {
        self.transient_retry = config;
        self
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Natural key of the object `event` declares, if present.
    #[must_use]
    pub fn natural_key<'e>(&self, event: &'e ReconciliationEvent) -> Option<&'e str> {
        event.property(&self.key_property)
    }

    /// Reconcile one event.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] when the natural key is missing, or when the
    /// directory fails with anything other than "not found" (after transient
    /// retries). These are real external-system problems and are the only
    /// hard failures in the reconciliation path.
    pub fn reconcile(&self, event: &ReconciliationEvent) -> Result<ReconciliationResult, SyncError> {
        if event.is_delete() {
            debug!(logical_id = %event.logical_resource_id, "delete is a no-op for external objects");
            return Ok(ReconciliationResult::success(event.physical_id_or_logical(), Data::new()));
        }

        let key = self
            .natural_key(event)
            .ok_or_else(|| SyncError::MissingNaturalKey {
                request_id: event.request_id.clone(),
                property: self.key_property.clone(),
            })?
            .to_string();
        let physical_id = event.physical_resource_id.clone().unwrap_or_else(|| key.clone());

        let (object, created) = match self.lookup(&key) {
            Ok(existing) => {
                info!(key = %key, id = %existing.id, "external object already present");
                (existing, false)
            }
            Err(err) if err.is_not_found() => self.create(&key, event)?,
            Err(source) => return Err(SyncError::Lookup { key, source }),
        };

        let mut data = Data::new();
        data.insert(self.key_property.clone(), Value::from(object.name));
        data.insert("Id".to_string(), Value::from(object.id));
        data.insert("Created".to_string(), Value::from(created));
        Ok(ReconciliationResult::success(physical_id, data))
    }

    fn lookup(&self, key: &str) -> CloudResult<ExternalObject> {
        let once = || retry_with_backoff(&self.transient_retry, || self.directory.lookup(key));
        match self.not_found {
            NotFoundPolicy::Authoritative => once(),
            NotFoundPolicy::Confirm(config) => retry_with_backoff_if(&config, once, CloudError::is_not_found),
        }
    }

    fn create(&self, key: &str, event: &ReconciliationEvent) -> Result<(ExternalObject, bool), SyncError> {
        match retry_with_backoff(&self.transient_retry, || {
            self.directory.create(key, &event.resource_properties)
        }) {
            Ok(object) => {
                info!(key = %key, id = %object.id, "created external object");
                Ok((object, true))
            }
            // Lost a race with another writer: the declaration is satisfied.
            Err(err) if err.kind == ErrorKind::AlreadyExists => {
                debug!(key = %key, "create reported an existing object, re-checking");
                let object = retry_with_backoff_if(&self.transient_retry, || self.lookup(key), CloudError::is_not_found)
                    .map_err(|source| SyncError::Lookup { key: key.to_string(), source })?;
                Ok((object, false))
            }
            Err(source) => Err(SyncError::Create {
                key: key.to_string(),
                source,
            }),
        }
    }
}
