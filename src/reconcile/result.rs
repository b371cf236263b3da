use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form result data returned to the orchestrator.
pub type Data = Map<String, Value>;

const WARNING_KEY: &str = "Warning";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Success,
    /// Succeeded, but an advisory step failed. The orchestrator still sees
    /// `SUCCESS`; the warning travels in `Data`.
    SuccessWithWarning,
}

/// Outcome of a reconciliation call.
///
/// On the wire this is always `{ "Status": "SUCCESS", "PhysicalResourceId", "Data" }`,
/// with `Data.Warning` carrying any degraded outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireResult", from = "WireResult")]
pub struct ReconciliationResult {
    pub status: Status,
    pub physical_resource_id: String,
    pub data: Data,
    pub warning: Option<String>,
}

impl ReconciliationResult {
    pub fn success(physical_resource_id: impl Into<String>, data: Data) -> Self {
        Self {
            status: Status::Success,
            physical_resource_id: physical_resource_id.into(),
            data,
            warning: None,
        }
    }

    pub fn with_warning(physical_resource_id: impl Into<String>, data: Data, warning: impl Into<String>) -> Self {
        Self {
            status: Status::SuccessWithWarning,
            physical_resource_id: physical_resource_id.into(),
            data,
            warning: Some(warning.into()),
        }
    }

    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.status == Status::SuccessWithWarning
    }

    /// Wire form as a JSON value.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        Value::Object(Map::from_iter([
            ("Status".to_string(), Value::from("SUCCESS")),
            ("PhysicalResourceId".to_string(), Value::from(self.physical_resource_id.clone())),
            ("Data".to_string(), Value::Object(self.wire_data())),
        ]))
    }

    fn wire_data(&self) -> Data {
        let mut data = self.data.clone();
        if let Some(w) = &self.warning {
            data.insert(WARNING_KEY.to_string(), Value::from(w.clone()));
        }
        data
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireResult {
    status: String,
    physical_resource_id: String,
    #[serde(default)]
    data: Data,
}

impl From<ReconciliationResult> for WireResult {
    fn from(r: ReconciliationResult) -> Self {
        Self {
            status: "SUCCESS".to_string(),
            data: r.wire_data(),
            physical_resource_id: r.physical_resource_id,
        }
    }
}

impl From<WireResult> for ReconciliationResult {
    fn from(mut w: WireResult) -> Self {
        match w.data.remove(WARNING_KEY) {
            Some(warning) => Self::with_warning(
                w.physical_resource_id,
                w.data,
                warning.as_str().map_or_else(|| warning.to_string(), String::from),
            ),
            None => Self::success(w.physical_resource_id, w.data),
        }
    }
}
