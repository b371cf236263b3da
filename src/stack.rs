//! The reference multi-tier application stack.
//!
//! One registry covers every environment; the profile decides what exists:
//!
//! | component        | gate                        |
//! |------------------|-----------------------------|
//! | `network`        | always                      |
//! | `observability`  | always                      |
//! | `database`       | always (single or cluster)  |
//! | `cache`          | feature `cache`             |
//! | `search`         | prod only, resilient        |
//! | `db-secret`      | always                      |
//! | `compute`        | always                      |
//! | `identity-group` | always, resilient           |
//! | `waf`            | prod or feature `waf`       |
//! | `cdn`            | feature `cdn`               |
//! | `dns`            | always                      |
//! | `backup`         | prod only                   |
//! | `bastion`        | non-prod and feature `bastion` |
//!
//! The database is a single component whose topology comes from the
//! `compute.db_topology` profile field, so dependents wire to the same
//! `endpoint` output whichever variant is provisioned.

use crate::component::{ComponentSpec, Inclusion, InputSlot};
use crate::error::ComposeError;
use crate::profile::Subsystem;
use crate::provider::ExternalResourceRef;
use crate::registry::ComponentRegistry;

/// Name of the external hosted zone the `dns` component writes into.
pub const HOSTED_ZONE: &str = "hosted-zone";

/// Build the reference stack.
///
/// # Errors
///
/// Returns an error only if the declarations themselves are invalid.
pub fn reference_stack() -> Result<ComponentRegistry, ComposeError> {
    let mut registry = ComponentRegistry::new()
        .with(
            ComponentSpec::new("network", "network")
                .input(InputSlot::profile("cidr", Subsystem::Network, "cidr"))
                .input(InputSlot::profile("maxAzs", Subsystem::Network, "max_azs"))
                .outputs(["vpc_id", "private_subnets", "public_subnets"]),
        )?
        .with(
            ComponentSpec::new("observability", "log-group")
                .input(InputSlot::profile("retentionDays", Subsystem::Retention, "log_days"))
                .outputs(["log_group", "alarm_topic"]),
        )?
        .with(
            ComponentSpec::new("database", "database")
                .input(InputSlot::output("vpcId", "network", "vpc_id"))
                .input(InputSlot::output("subnets", "network", "private_subnets"))
                .input(InputSlot::profile("topology", Subsystem::Compute, "db_topology"))
                .input(InputSlot::profile("instanceClass", Subsystem::Compute, "db_instance_class"))
                .input(InputSlot::profile("backupDays", Subsystem::Retention, "backup_days"))
                .outputs(["endpoint", "port", "identifier"]),
        )?
        .with(
            ComponentSpec::new("cache", "cache")
                .input(InputSlot::output("vpcId", "network", "vpc_id"))
                .input(InputSlot::profile("nodeType", Subsystem::Compute, "cache_node_type"))
                .outputs(["endpoint", "port"])
                .gate(Inclusion::feature("cache")),
        )?
        .with(
            ComponentSpec::new("search", "search")
                .input(InputSlot::output("vpcId", "network", "vpc_id"))
                .input(InputSlot::profile("instances", Subsystem::Compute, "search_instances"))
                .outputs(["endpoint", "domain_arn"])
                .gate(Inclusion::ProdOnly)
                .resilient(),
        )?
        .with(
            ComponentSpec::new("db-secret", "secret")
                .input(InputSlot::output("endpoint", "database", "endpoint"))
                .input(InputSlot::output("port", "database", "port"))
                .output("secret_arn"),
        )?
        .with(
            ComponentSpec::new("compute", "container-service")
                .input(InputSlot::output("vpcId", "network", "vpc_id"))
                .input(InputSlot::output("subnets", "network", "public_subnets"))
                .input(InputSlot::output("databaseEndpoint", "database", "endpoint"))
                .input(InputSlot::output("databaseSecret", "db-secret", "secret_arn"))
                .input(InputSlot::output("cacheEndpoint", "cache", "endpoint").optional())
                .input(InputSlot::output("searchEndpoint", "search", "endpoint").optional())
                .input(InputSlot::output("logGroup", "observability", "log_group"))
                .input(InputSlot::profile("desiredCount", Subsystem::Compute, "desired_count"))
                .outputs(["load_balancer_dns", "service_name"]),
        )?
        .with(
            ComponentSpec::new("identity-group", "access-group")
                .input(InputSlot::profile("GroupName", Subsystem::Identity, "admin_group"))
                .input(InputSlot::profile("MfaRequired", Subsystem::Identity, "mfa_required"))
                .output("group_id")
                .resilient(),
        )?
        .with(
            ComponentSpec::new("waf", "web-acl")
                .input(InputSlot::profile("rateLimit", Subsystem::Edge, "waf_rate_limit"))
                .output("web_acl_arn")
                .gate(Inclusion::AnyOf(vec![Inclusion::ProdOnly, Inclusion::feature("waf")])),
        )?
        .with(
            ComponentSpec::new("cdn", "distribution")
                .input(InputSlot::output("origin", "compute", "load_balancer_dns"))
                .input(InputSlot::output("webAcl", "waf", "web_acl_arn").optional())
                .input(InputSlot::profile("domain", Subsystem::Edge, "domain"))
                .output("distribution_domain")
                .gate(Inclusion::feature("cdn")),
        )?
        .with(
            ComponentSpec::new("dns", "dns-record")
                .input(InputSlot::profile("domain", Subsystem::Edge, "domain"))
                .input(InputSlot::output("target", "compute", "load_balancer_dns"))
                .input(InputSlot::output("cdnTarget", "cdn", "distribution_domain").optional())
                .input(InputSlot::external("zone", HOSTED_ZONE))
                .output("record_fqdn"),
        )?
        .with(
            ComponentSpec::new("backup", "backup-plan")
                .input(InputSlot::output("databaseId", "database", "identifier"))
                .input(InputSlot::profile("retentionDays", Subsystem::Retention, "backup_days"))
                .output("plan_id")
                .gate(Inclusion::ProdOnly),
        )?
        .with(
            ComponentSpec::new("bastion", "debug-host")
                .input(InputSlot::output("vpcId", "network", "vpc_id"))
                .input(InputSlot::output("subnets", "network", "public_subnets"))
                .output("instance_id")
                .gate(Inclusion::AllOf(vec![Inclusion::NonProdOnly, Inclusion::feature("bastion")])),
        )?;

    registry.declare_external(ExternalResourceRef::new(HOSTED_ZONE, "example.com").with_attribute("zone_id"));
    Ok(registry)
}
