//! Built-in advisory steps used by the composer for resilient components.

use super::result::Data;
use super::wrapper::{AdvisoryContext, AdvisoryStep};
use anyhow::{Result, bail};
use serde_json::Value;

/// Resource property listing input slots that did not resolve, comma separated.
pub const UNRESOLVED_INPUTS_PROPERTY: &str = "UnresolvedInputs";

/// Pre-flight check: fails (and is downgraded to a warning) if any of the
/// listed properties is missing or empty, or if the event reports unresolved
/// inputs.
#[derive(Clone, Debug, Default)]
pub struct PreflightValidator {
    required: Vec<String>,
}

impl PreflightValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn require(mut self, property: impl Into<String>) -> Self {
        self.required.push(property.into());
        self
    }
}

impl AdvisoryStep for PreflightValidator {
    fn name(&self) -> &str {
        "preflight"
    }

    fn run(&self, ctx: &AdvisoryContext<'_>) -> Result<Data> {
        let missing: Vec<&str> = self
            .required
            .iter()
            .filter(|p| ctx.event.property(p).is_none_or(str::is_empty))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            bail!("missing properties: {}", missing.join(", "));
        }
        if let Some(unresolved) = ctx.event.property(UNRESOLVED_INPUTS_PROPERTY).filter(|s| !s.is_empty()) {
            bail!("unresolved inputs: {unresolved}");
        }

        let mut data = Data::new();
        data.insert("Validated".to_string(), Value::from(true));
        Ok(data)
    }
}

/// Post-deployment summary: which outputs the unit produced.
#[derive(Clone, Copy, Debug, Default)]
pub struct SummaryReporter;

impl AdvisoryStep for SummaryReporter {
    fn name(&self) -> &str {
        "summary"
    }

    fn run(&self, ctx: &AdvisoryContext<'_>) -> Result<Data> {
        let outputs: Vec<Value> = match ctx.unit_output {
            Some(Value::Object(map)) => map.keys().cloned().map(Value::from).collect(),
            Some(_) => Vec::new(),
            None => bail!("unit produced no serializable output"),
        };
        let mut data = Data::new();
        data.insert("Component".to_string(), Value::from(ctx.event.logical_resource_id.clone()));
        data.insert("RequestType".to_string(), Value::from(ctx.event.request_type.to_string()));
        data.insert("Outputs".to_string(), Value::Array(outputs));
        Ok(data)
    }
}
