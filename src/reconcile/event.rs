use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FormatResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl Display for RequestType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        })
    }
}

/// A lifecycle event delivered by the external orchestrator.
///
/// Delivery is at-least-once and never concurrent for the same
/// `PhysicalResourceId`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReconciliationEvent {
    pub request_type: RequestType,
    /// Idempotency token; absent on the first `Create`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: BTreeMap<String, String>,
    pub logical_resource_id: String,
    pub request_id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ReconciliationEvent {
    pub fn new(
        request_type: RequestType,
        logical_resource_id: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            request_type,
            physical_resource_id: None,
            resource_properties: BTreeMap::new(),
            logical_resource_id: logical_resource_id.into(),
            request_id: request_id.into(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_physical_id(mut self, id: impl Into<String>) -> Self {
        self.physical_resource_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.resource_properties.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.request_type == RequestType::Delete
    }

    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.resource_properties.get(key).map(String::as_str)
    }

    /// The physical id to echo back: the one supplied, or the logical id on a
    /// first `Create`.
    #[must_use]
    pub fn physical_id_or_logical(&self) -> &str {
        self.physical_resource_id
            .as_deref()
            .unwrap_or(&self.logical_resource_id)
    }
}
