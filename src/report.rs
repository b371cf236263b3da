//! Post-composition summary of a deployment.
//!
//! A [`DeploymentReport`] is a serializable snapshot of one
//! [`Deployment`](crate::Deployment): which components exist, which were gated
//! out, which input slots did not resolve, and every advisory warning.
//!
//! ```no_run
//! # use tiergraph::{Composer, ProfileTable, stack, testing::FakeResourceProvider};
//! # fn main() -> anyhow::Result<()> {
//! let profile = ProfileTable::builtin().resolve("prod")?;
//! let deployment = Composer::new(stack::reference_stack()?)
//!     .compose(&profile, &FakeResourceProvider::new())?;
//! let report = deployment.report();
//! report.print();
//! report.save_to_file("deployment.json")?;
//! # Ok(())
//! # }
//! ```

use crate::composer::Deployment;
use crate::profile::{EnvironmentId, Tier};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// An input slot that did not resolve.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedSlot {
    pub component: String,
    pub slot: String,
    pub reason: String,
}

/// An advisory warning raised while provisioning a component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentWarning {
    pub component: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeploymentReport {
    pub environment: EnvironmentId,
    pub tier: Tier,
    pub generated_at: DateTime<Utc>,
    /// Present components, in instantiation order.
    pub present: Vec<String>,
    /// Absent components, in instantiation order.
    pub absent: Vec<String>,
    pub unresolved_slots: Vec<UnresolvedSlot>,
    pub warnings: Vec<ComponentWarning>,
}

impl DeploymentReport {
    #[must_use]
    pub fn from_deployment(deployment: &Deployment) -> Self {
        let environment = deployment.environment();
        let unresolved_slots = deployment
            .instances()
            .iter()
            .filter(|c| c.is_present())
            .flat_map(|c| {
                c.inputs().iter().filter_map(move |(slot, value)| {
                    value.unresolved_reason().map(|reason| UnresolvedSlot {
                        component: c.name().to_string(),
                        slot: slot.clone(),
                        reason: reason.to_string(),
                    })
                })
            })
            .collect();

        Self {
            environment,
            tier: environment.tier(),
            generated_at: Utc::now(),
            present: deployment.present().into_iter().map(String::from).collect(),
            absent: deployment.absent().into_iter().map(String::from).collect(),
            unresolved_slots,
            warnings: deployment
                .warnings()
                .into_iter()
                .map(|(component, message)| ComponentWarning {
                    component: component.to_string(),
                    message: message.to_string(),
                })
                .collect(),
        }
    }

    /// Did any advisory step or external reference raise a warning?
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// # Errors
    ///
    /// Returns an error if the report cannot be serialized.
    pub fn to_json(&self) -> Result<Value> {
        serde_json::to_value(self).context("serializing deployment report")
    }

    /// Print a human-readable summary to stdout.
    pub fn print(&self) {
        println!("\n========== Deployment Report ==========");
        println!("Environment: {} ({:?})", self.environment, self.tier);
        println!("Generated:   {}", self.generated_at.to_rfc3339());
        println!("---------------------------------------");
        println!("Present ({}): {}", self.present.len(), self.present.join(", "));
        println!("Absent  ({}): {}", self.absent.len(), self.absent.join(", "));
        for slot in &self.unresolved_slots {
            println!("Unresolved: {}.{} ({})", slot.component, slot.slot, slot.reason);
        }
        for warning in &self.warnings {
            println!("Warning: {}: {}", warning.component, warning.message);
        }
        println!("=======================================\n");
    }

    /// Save the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(self).context("serializing deployment report")?;
        let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        file.write_all(formatted.as_bytes())
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid report.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing report {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentSpec, Inclusion, InputSlot};
    use crate::composer::Composer;
    use crate::profile::EnvironmentProfile;
    use crate::provider::FakeResourceProvider;
    use crate::registry::ComponentRegistry;

    #[test]
    fn summarizes_presence_and_unresolved_slots() {
        let registry = ComponentRegistry::new()
            .with(ComponentSpec::new("cache", "cache").output("endpoint").gate(Inclusion::ProdOnly))
            .and_then(|r| {
                r.with(
                    ComponentSpec::new("app", "compute")
                        .input(InputSlot::output("cacheEndpoint", "cache", "endpoint").optional())
                        .output("url"),
                )
            })
            .unwrap();
        let deployment = Composer::new(registry)
            .compose(&EnvironmentProfile::new(EnvironmentId::Dev), &FakeResourceProvider::new())
            .unwrap();

        let report = deployment.report();
        assert_eq!(report.tier, Tier::NonProd);
        assert_eq!(report.present, vec!["app"]);
        assert_eq!(report.absent, vec!["cache"]);
        assert_eq!(
            report.unresolved_slots,
            vec![UnresolvedSlot {
                component: "app".into(),
                slot: "cacheEndpoint".into(),
                reason: "component `cache` is absent".into(),
            }]
        );
        assert!(!report.has_warnings());
        assert_eq!(report.to_json().unwrap()["environment"], "dev");
    }
}
