//! The composition engine.
//!
//! [`Composer::compose`] runs in two passes:
//!
//! 1. **Plan** ([`Composer::plan`]): topological order, inclusion decisions,
//!    reference and profile validation. Every configuration and composition
//!    error surfaces here, before the first provider call.
//! 2. **Execute**: walk the plan in order. Excluded components become
//!    [`ComponentInstance::absent`]; included ones are wired, checked, and
//!    provisioned through the [`ResourceProvider`]. Components marked
//!    resilient go through a [`ResilientUnit`] so their advisory validator and
//!    reporter can only ever add warnings.
//!
//! Composition is single-threaded: the order is part of the contract.
//!
//! # Example
//!
//! ```
//! use tiergraph::{Composer, ProfileTable, stack, testing::FakeResourceProvider};
//!
//! # fn main() -> anyhow::Result<()> {
//! let profile = ProfileTable::builtin().resolve("dev")?;
//! let provider = FakeResourceProvider::new();
//! let deployment = Composer::new(stack::reference_stack()?).compose(&profile, &provider)?;
//! assert!(deployment.absent().contains(&"search"));
//! # Ok(())
//! # }
//! ```

use crate::component::ComponentSpec;
use crate::error::ComposeError;
use crate::instance::ComponentInstance;
use crate::planner::{CompositionPlan, Decision};
use crate::profile::{EnvironmentId, EnvironmentProfile};
use crate::provider::{ExternalResolver, ProvisionRequest, ResourceProvider};
use crate::reconcile::{
    AdvisoryStep, PreflightValidator, ReconciliationEvent, RequestType, ResilientUnit, SummaryReporter,
    UNRESOLVED_INPUTS_PROPERTY,
};
use crate::registry::{ComponentRegistry, GateTable};
use crate::report::DeploymentReport;
use crate::value::{OutputMap, SlotValue, UnresolvedReason};
use crate::wire::{ExternalTable, WiredInputs, wire};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Whether a run creates a fresh stack or updates an existing one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeployMode {
    #[default]
    Create,
    Update,
}

impl From<DeployMode> for RequestType {
    fn from(mode: DeployMode) -> Self {
        match mode {
            DeployMode::Create => Self::Create,
            DeployMode::Update => Self::Update,
        }
    }
}

pub struct Composer {
    registry: ComponentRegistry,
    resolver: Option<Arc<dyn ExternalResolver>>,
    validator: Arc<dyn AdvisoryStep>,
    reporter: Arc<dyn AdvisoryStep>,
    mode: DeployMode,
}

impl Composer {
    #[must_use]
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry,
            resolver: None,
            validator: Arc::new(PreflightValidator::new()),
            reporter: Arc::new(SummaryReporter),
            mode: DeployMode::default(),
        }
    }

    /// Resolver for external references. Without one, every external slot
    /// stays unresolved.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ExternalResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Advisory validator for resilient components.
    #[must_use]
    pub fn with_validator(mut self, step: Arc<dyn AdvisoryStep>) -> Self {
        self.validator = step;
        self
    }

    /// Advisory reporter for resilient components.
    #[must_use]
    pub fn with_reporter(mut self, step: Arc<dyn AdvisoryStep>) -> Self {
        self.reporter = step;
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: DeployMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    #[must_use]
    pub fn gate_table(&self, profile: &EnvironmentProfile) -> GateTable {
        self.registry.gate_table(profile)
    }

    /// Side-effect-free plan for `profile`.
    ///
    /// # Errors
    ///
    /// Returns any configuration or composition error.
    pub fn plan(&self, profile: &EnvironmentProfile) -> Result<CompositionPlan, ComposeError> {
        CompositionPlan::build(&self.registry, profile)
    }

    /// Plan, then instantiate every component in order.
    ///
    /// # Errors
    ///
    /// Planning errors are returned before any provider call. Afterwards,
    /// provider failures are returned as [`ComposeError::Provisioning`] and a
    /// provider that omits a declared output as [`ComposeError::MissingOutput`].
    pub fn compose(
        &self,
        profile: &EnvironmentProfile,
        provider: &dyn ResourceProvider,
    ) -> Result<Deployment, ComposeError> {
        let plan = self.plan(profile)?;
        info!(
            environment = %profile.id(),
            components = plan.steps.len(),
            included = plan.included().len(),
            "composition planned"
        );

        let externals = self.resolve_externals();
        let mut instances: Vec<ComponentInstance> = Vec::with_capacity(plan.steps.len());
        let mut index: HashMap<String, usize> = HashMap::with_capacity(plan.steps.len());

        for step in &plan.steps {
            let spec = &self.registry.specs()[step.registry_index];
            let instance = match step.decision {
                Decision::Exclude => {
                    info!(component = %spec.name, gate = %step.gate, "component absent");
                    ComponentInstance::absent(spec)
                }
                Decision::Include => {
                    let upstream: HashMap<&str, &ComponentInstance> = spec
                        .upstream_components()
                        .into_iter()
                        .filter_map(|name| index.get(name).map(|&i| (name, &instances[i])))
                        .collect();
                    let wired = wire(spec, &upstream, profile, &externals)?;
                    wired.check_required(spec)?;
                    self.instantiate(spec, wired, profile, provider)?
                }
            };
            index.insert(spec.name.clone(), instances.len());
            instances.push(instance);
        }

        Ok(Deployment {
            environment: profile.id(),
            plan,
            instances,
            index,
        })
    }

    fn instantiate(
        &self,
        spec: &ComponentSpec,
        wired: WiredInputs,
        profile: &EnvironmentProfile,
        provider: &dyn ResourceProvider,
    ) -> Result<ComponentInstance, ComposeError> {
        let mut warnings = Vec::new();
        for (slot, reason) in wired.unresolved() {
            match reason {
                UnresolvedReason::ExternalUnresolved { .. } => {
                    warn!(component = %spec.name, slot, %reason, "skipping wiring for unresolved external");
                    warnings.push(format!("{slot}: {reason}"));
                }
                UnresolvedReason::ComponentAbsent { .. } => {
                    debug!(component = %spec.name, slot, %reason, "optional slot left unresolved");
                }
            }
        }

        let request = ProvisionRequest {
            component: &spec.name,
            kind: &spec.kind,
            environment: profile.id(),
            request_type: self.mode.into(),
            inputs: &wired.values,
            outputs: &spec.outputs,
        };

        let outputs = if spec.resilient {
            self.provision_resilient(spec, &request, provider, &mut warnings)?
        } else {
            provider
                .provision(&request)
                .map_err(|source| ComposeError::Provisioning {
                    component: spec.name.clone(),
                    source,
                })?
        };

        if let Some(missing) = spec.outputs.iter().find(|o| !outputs.contains_key(*o)) {
            return Err(ComposeError::MissingOutput {
                component: spec.name.clone(),
                output: missing.clone(),
            });
        }

        info!(
            component = %spec.name,
            kind = %spec.kind,
            outputs = spec.outputs.len(),
            warnings = warnings.len(),
            "component provisioned"
        );
        Ok(ComponentInstance::present(spec, wired.values, outputs, warnings))
    }

    fn provision_resilient(
        &self,
        spec: &ComponentSpec,
        request: &ProvisionRequest<'_>,
        provider: &dyn ResourceProvider,
        warnings: &mut Vec<String>,
    ) -> Result<OutputMap, ComposeError> {
        let event = advisory_event(spec, request);
        let mut unit = ResilientUnit::new(
            Arc::clone(&self.validator),
            |_: &ReconciliationEvent| provider.provision(request),
            Arc::clone(&self.reporter),
        );
        let run = unit.run(&event).map_err(|source| ComposeError::Provisioning {
            component: spec.name.clone(),
            source,
        })?;
        warnings.extend(run.warnings());
        Ok(run.output)
    }

    /// Resolve every declared external once. Failures are logged and kept as
    /// unresolved entries.
    fn resolve_externals(&self) -> ExternalTable {
        self.registry
            .externals()
            .iter()
            .map(|reference| {
                let value = match &self.resolver {
                    Some(resolver) => match resolver.resolve(reference) {
                        Ok(value) => SlotValue::Resolved(value),
                        Err(err) => {
                            warn!(reference = %reference.name, error = %err, "external reference unresolved");
                            SlotValue::Unresolved(UnresolvedReason::ExternalUnresolved {
                                reference: reference.name.clone(),
                                detail: err.to_string(),
                            })
                        }
                    },
                    None => SlotValue::Unresolved(UnresolvedReason::ExternalUnresolved {
                        reference: reference.name.clone(),
                        detail: "no resolver configured".to_string(),
                    }),
                };
                (reference.name.clone(), value)
            })
            .collect()
    }
}

/// Event the advisory steps see for a resilient component: wired inputs as
/// string properties, plus the names of any unresolved slots.
fn advisory_event(spec: &ComponentSpec, request: &ProvisionRequest<'_>) -> ReconciliationEvent {
    let mut event = ReconciliationEvent::new(
        request.request_type,
        spec.name.clone(),
        format!("{}/{}", request.environment, spec.name),
    );
    let mut unresolved = Vec::new();
    for (slot, value) in request.inputs {
        match value.to_property() {
            Some(text) => {
                event.resource_properties.insert(slot.clone(), text);
            }
            None => unresolved.push(slot.as_str()),
        }
    }
    if !unresolved.is_empty() {
        event
            .resource_properties
            .insert(UNRESOLVED_INPUTS_PROPERTY.to_string(), unresolved.join(","));
    }
    event
}

/// Everything one composition run produced, in instantiation order.
#[derive(Debug)]
pub struct Deployment {
    environment: EnvironmentId,
    plan: CompositionPlan,
    instances: Vec<ComponentInstance>,
    index: HashMap<String, usize>,
}

impl Deployment {
    #[must_use]
    pub fn environment(&self) -> EnvironmentId {
        self.environment
    }

    #[must_use]
    pub fn plan(&self) -> &CompositionPlan {
        &self.plan
    }

    /// Instances in instantiation order.
    #[must_use]
    pub fn instances(&self) -> &[ComponentInstance] {
        &self.instances
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ComponentInstance> {
        self.index.get(name).map(|&i| &self.instances[i])
    }

    #[must_use]
    pub fn output(&self, component: &str, output: &str) -> Option<&SlotValue> {
        self.get(component).and_then(|c| c.output(output))
    }

    #[must_use]
    pub fn order(&self) -> Vec<&str> {
        self.instances.iter().map(ComponentInstance::name).collect()
    }

    #[must_use]
    pub fn present(&self) -> Vec<&str> {
        self.instances
            .iter()
            .filter(|c| c.is_present())
            .map(ComponentInstance::name)
            .collect()
    }

    #[must_use]
    pub fn absent(&self) -> Vec<&str> {
        self.instances
            .iter()
            .filter(|c| !c.is_present())
            .map(ComponentInstance::name)
            .collect()
    }

    /// `(component, warning)` pairs in instantiation order.
    #[must_use]
    pub fn warnings(&self) -> Vec<(&str, &str)> {
        self.instances
            .iter()
            .flat_map(|c| c.warnings().iter().map(move |w| (c.name(), w.as_str())))
            .collect()
    }

    #[must_use]
    pub fn report(&self) -> DeploymentReport {
        DeploymentReport::from_deployment(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{InputSlot, Inclusion};
    use crate::profile::Subsystem;
    use crate::provider::{CloudError, ErrorKind, FakeExternalResolver, FakeResourceProvider};
    use crate::reconcile::{Data, advisory_fn};
    use anyhow::bail;
    use serde_json::json;

    fn profile(id: EnvironmentId) -> EnvironmentProfile {
        EnvironmentProfile::new(id).with_field(Subsystem::Compute, "desired_count", 2)
    }

    fn registry() -> ComponentRegistry {
        ComponentRegistry::new()
            .with(
                ComponentSpec::new("app", "compute")
                    .input(InputSlot::output("dbEndpoint", "db", "endpoint"))
                    .input(InputSlot::output("cacheEndpoint", "cache", "endpoint").optional())
                    .input(InputSlot::profile("count", Subsystem::Compute, "desired_count"))
                    .output("url"),
            )
            .and_then(|r| r.with(ComponentSpec::new("db", "database").output("endpoint")))
            .and_then(|r| {
                r.with(
                    ComponentSpec::new("cache", "cache")
                        .output("endpoint")
                        .gate(Inclusion::ProdOnly),
                )
            })
            .unwrap()
    }

    #[test]
    fn wires_upstream_outputs_in_order() {
        let provider = FakeResourceProvider::new();
        let deployment = Composer::new(registry())
            .compose(&profile(EnvironmentId::Prod), &provider)
            .unwrap();
        assert_eq!(deployment.order(), vec!["db", "cache", "app"]);
        assert_eq!(provider.provisioned(), vec!["db", "cache", "app"]);

        let app = deployment.get("app").unwrap();
        assert_eq!(app.input("dbEndpoint"), deployment.output("db", "endpoint"));
        assert_eq!(app.input("count"), Some(&SlotValue::Resolved(json!(2))));
    }

    #[test]
    fn optional_slot_tolerates_absent_upstream() {
        let provider = FakeResourceProvider::new();
        let deployment = Composer::new(registry())
            .compose(&profile(EnvironmentId::Dev), &provider)
            .unwrap();
        assert_eq!(deployment.absent(), vec!["cache"]);
        assert!(!provider.provisioned().contains(&"cache".to_string()));
        assert_eq!(
            deployment.get("app").unwrap().input("cacheEndpoint"),
            Some(&SlotValue::absent("cache"))
        );
        assert_eq!(
            deployment.output("cache", "endpoint"),
            Some(&SlotValue::absent("cache"))
        );
    }

    #[test]
    fn provider_failure_is_propagated() {
        let provider = FakeResourceProvider::new();
        provider.fail_on("db", CloudError::new(ErrorKind::RateLimited, "slow down"));
        let err = Composer::new(registry())
            .compose(&profile(EnvironmentId::Prod), &provider)
            .unwrap_err();
        assert!(matches!(err, ComposeError::Provisioning { ref component, .. } if component == "db"));
        assert_eq!(provider.call_count(), 1);
    }

    #[test]
    fn missing_declared_output_is_an_error() {
        struct Silent;
        impl ResourceProvider for Silent {
            fn provision(&self, _request: &ProvisionRequest<'_>) -> crate::provider::CloudResult<OutputMap> {
                Ok(OutputMap::new())
            }
        }
        let err = Composer::new(registry())
            .compose(&profile(EnvironmentId::Prod), &Silent)
            .unwrap_err();
        assert!(matches!(err, ComposeError::MissingOutput { ref component, .. } if component == "db"));
    }

    #[test]
    fn resilient_component_collects_advisory_warnings() {
        let registry = ComponentRegistry::new()
            .with(ComponentSpec::new("search", "search").output("endpoint").resilient())
            .unwrap();
        let validator: Arc<dyn AdvisoryStep> =
            Arc::new(advisory_fn("capacity", |_ctx| -> anyhow::Result<Data> { bail!("quota check timed out") }));
        let provider = FakeResourceProvider::new();
        let deployment = Composer::new(registry)
            .with_validator(validator)
            .compose(&profile(EnvironmentId::Prod), &provider)
            .unwrap();

        assert_eq!(provider.call_count(), 1);
        assert_eq!(
            deployment.warnings(),
            vec![("search", "capacity: quota check timed out")]
        );
    }

    #[test]
    fn externals_resolve_once_and_failures_only_warn() {
        let mut registry = ComponentRegistry::new()
            .with(
                ComponentSpec::new("dns", "dns")
                    .input(InputSlot::external("zone", "hosted-zone"))
                    .input(InputSlot::external("cert", "certificate"))
                    .output("record"),
            )
            .unwrap();
        registry.declare_external(crate::provider::ExternalResourceRef::new("hosted-zone", "Z123"));
        registry.declare_external(crate::provider::ExternalResourceRef::new("certificate", "arn:cert"));

        let resolver = FakeExternalResolver::new();
        resolver.insert("Z123", None, "zone-id");
        let deployment = Composer::new(registry)
            .with_resolver(Arc::new(resolver))
            .compose(&profile(EnvironmentId::Qa), &FakeResourceProvider::new())
            .unwrap();

        let dns = deployment.get("dns").unwrap();
        assert_eq!(dns.input("zone"), Some(&SlotValue::Resolved(json!("zone-id"))));
        assert!(!dns.input("cert").unwrap().is_resolved());
        assert_eq!(dns.warnings().len(), 1);
    }

    #[test]
    fn update_mode_is_forwarded_to_provider() {
        let provider = FakeResourceProvider::new();
        Composer::new(registry())
            .mode(DeployMode::Update)
            .compose(&profile(EnvironmentId::Prod), &provider)
            .unwrap();
        assert!(provider.calls().iter().all(|c| c.request_type == RequestType::Update));
    }
}
