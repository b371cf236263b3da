//! Pre-built registries and profiles for common testing scenarios.

use crate::component::{ComponentSpec, Inclusion, InputSlot};
use crate::config::ProfileTable;
use crate::error::ComposeError;
use crate::profile::{EnvironmentId, EnvironmentProfile};
use crate::reconcile::{ReconciliationEvent, RequestType};
use crate::registry::ComponentRegistry;

/// `db -> app`: `app.dbEndpoint` is wired from `db.endpoint`.
///
/// Declared in reverse so ordering comes from the edges, not the declaration.
///
/// # Errors
///
/// Never fails in practice; the declarations are static.
pub fn two_component_registry() -> Result<ComponentRegistry, ComposeError> {
    ComponentRegistry::new()
        .with(
            ComponentSpec::new("app", "compute")
                .input(InputSlot::output("dbEndpoint", "db", "endpoint"))
                .output("url"),
        )?
        .with(ComponentSpec::new("db", "database").outputs(["endpoint", "port"]))
}

/// `db`, a prod-only `cache`, and `app` consuming both (cache optionally).
///
/// # Errors
///
/// Never fails in practice; the declarations are static.
pub fn gated_cache_registry() -> Result<ComponentRegistry, ComposeError> {
    ComponentRegistry::new()
        .with(ComponentSpec::new("db", "database").outputs(["endpoint", "port"]))?
        .with(
            ComponentSpec::new("cache", "cache")
                .output("endpoint")
                .gate(Inclusion::ProdOnly),
        )?
        .with(
            ComponentSpec::new("app", "compute")
                .input(InputSlot::output("dbEndpoint", "db", "endpoint"))
                .input(InputSlot::output("cacheEndpoint", "cache", "endpoint").optional())
                .output("url"),
        )
}

/// `a` and `b` consume each other's outputs.
///
/// # Errors
///
/// Never fails in practice; the cycle is only detected when planning.
pub fn cyclic_registry() -> Result<ComponentRegistry, ComposeError> {
    ComponentRegistry::new()
        .with(
            ComponentSpec::new("a", "queue")
                .input(InputSlot::output("peer", "b", "arn"))
                .output("arn"),
        )?
        .with(
            ComponentSpec::new("b", "queue")
                .input(InputSlot::output("peer", "a", "arn"))
                .output("arn"),
        )
}

/// Built-in profile for `env`.
///
/// # Panics
///
/// Panics if `env` is not a known environment id.
#[must_use]
pub fn profile_for(env: &str) -> EnvironmentProfile {
    ProfileTable::builtin()
        .resolve(env)
        .unwrap_or_else(|err| panic!("fixture profile: {err}"))
}

/// Empty profile for `id`: no fields, every feature off.
#[must_use]
pub fn bare_profile(id: EnvironmentId) -> EnvironmentProfile {
    EnvironmentProfile::new(id)
}

/// An event declaring group `name` under the default key property.
#[must_use]
pub fn group_event(request_type: RequestType, name: &str, request_id: &str) -> ReconciliationEvent {
    ReconciliationEvent::new(request_type, "AdminGroup", request_id).with_property("GroupName", name)
}
