use anyhow::Result;
use tiergraph::testing::*;
use tiergraph::{
    ComponentRegistry, ComponentSpec, ComposeError, Composer, EnvironmentId, Inclusion, InputSlot, ProfileTable,
    Subsystem,
};

#[test]
fn cycle_fails_before_any_provisioning() -> Result<()> {
    let provider = FakeResourceProvider::new();
    let err = Composer::new(cyclic_registry()?)
        .compose(&profile_for("prod"), &provider)
        .unwrap_err();

    match err {
        ComposeError::CompositionCycle { components } => assert_eq!(components, vec!["a", "b"]),
        other => panic!("expected a cycle, got {other}"),
    }
    assert_eq!(provider.call_count(), 0);
    Ok(())
}

#[test]
fn cycle_is_reported_even_when_a_member_is_gated_out() -> Result<()> {
    let registry = ComponentRegistry::new()
        .with(
            ComponentSpec::new("a", "queue")
                .input(InputSlot::output("peer", "b", "arn").optional())
                .output("arn"),
        )?
        .with(
            ComponentSpec::new("b", "queue")
                .input(InputSlot::output("peer", "a", "arn"))
                .output("arn")
                .gate(Inclusion::ProdOnly),
        )?;
    let provider = FakeResourceProvider::new();
    let err = Composer::new(registry)
        .compose(&profile_for("dev"), &provider)
        .unwrap_err();
    assert!(matches!(err, ComposeError::CompositionCycle { .. }));
    assert_eq!(provider.call_count(), 0);
    Ok(())
}

#[test]
fn unknown_environment_fails_closed() {
    let table = ProfileTable::builtin();
    for id in ["sandbox", "", "Prod", "production"] {
        assert!(
            matches!(table.resolve(id), Err(ComposeError::UnknownEnvironment { id: ref got }) if got == id),
            "{id:?} should be rejected"
        );
    }
}

#[test]
fn required_slot_on_absent_upstream_is_fatal_before_provisioning() -> Result<()> {
    let registry = ComponentRegistry::new()
        .with(
            ComponentSpec::new("cache", "cache")
                .output("endpoint")
                .gate(Inclusion::ProdOnly),
        )?
        .with(
            ComponentSpec::new("compute", "service")
                .input(InputSlot::output("cacheEndpoint", "cache", "endpoint"))
                .output("url"),
        )?;
    let provider = FakeResourceProvider::new();
    let err = Composer::new(registry)
        .compose(&profile_for("dev"), &provider)
        .unwrap_err();

    match err {
        ComposeError::MissingRequiredDependency {
            component,
            slot,
            upstream,
        } => {
            assert_eq!((component.as_str(), slot.as_str(), upstream.as_str()), ("compute", "cacheEndpoint", "cache"));
        }
        other => panic!("expected MissingRequiredDependency, got {other}"),
    }
    assert_eq!(provider.call_count(), 0);
    Ok(())
}

#[test]
fn absent_consumer_of_absent_upstream_is_fine() -> Result<()> {
    let registry = ComponentRegistry::new()
        .with(ComponentSpec::new("search", "search").output("endpoint").gate(Inclusion::ProdOnly))?
        .with(
            ComponentSpec::new("indexer", "job")
                .input(InputSlot::output("searchEndpoint", "search", "endpoint"))
                .gate(Inclusion::ProdOnly),
        )?;
    let deployment = Composer::new(registry).compose(&profile_for("dev"), &FakeResourceProvider::new())?;
    assert_absent(&deployment, "search");
    assert_absent(&deployment, "indexer");
    Ok(())
}

#[test]
fn missing_profile_field_names_component_and_field() -> Result<()> {
    let registry = ComponentRegistry::new().with(
        ComponentSpec::new("queue", "queue")
            .input(InputSlot::profile("visibility", Subsystem::Messaging, "queue_visibility_secs"))
            .output("arn"),
    )?;
    let provider = FakeResourceProvider::new();
    let err = Composer::new(registry)
        .compose(&bare_profile(EnvironmentId::Qa), &provider)
        .unwrap_err();

    assert!(matches!(
        err,
        ComposeError::MissingProfileField { ref component, subsystem: Subsystem::Messaging, ref field }
            if component == "queue" && field == "queue_visibility_secs"
    ));
    assert!(err.is_preflight());
    assert_eq!(provider.call_count(), 0);
    Ok(())
}

#[test]
fn excluded_component_does_not_need_its_profile_fields() -> Result<()> {
    let registry = ComponentRegistry::new().with(
        ComponentSpec::new("backup", "backup-plan")
            .input(InputSlot::profile("days", Subsystem::Retention, "backup_days"))
            .output("plan_id")
            .gate(Inclusion::ProdOnly),
    )?;
    let deployment = Composer::new(registry).compose(&bare_profile(EnvironmentId::Dev), &FakeResourceProvider::new())?;
    assert_absent(&deployment, "backup");
    Ok(())
}

#[test]
fn unknown_reference_is_rejected() -> Result<()> {
    let registry = ComponentRegistry::new().with(
        ComponentSpec::new("app", "service")
            .input(InputSlot::output("db", "databse", "endpoint"))
            .output("url"),
    )?;
    let err = Composer::new(registry).plan(&profile_for("dev")).unwrap_err();
    assert!(matches!(err, ComposeError::UnknownComponent { ref target, .. } if target == "databse"));
    Ok(())
}

#[test]
fn composition_is_deterministic() -> Result<()> {
    let composer = Composer::new(tiergraph::stack::reference_stack()?);
    let profile = profile_for("staging");

    let first_provider = FakeResourceProvider::new();
    let second_provider = FakeResourceProvider::new();
    let first = composer.compose(&profile, &first_provider)?;
    let second = composer.compose(&profile, &second_provider)?;

    assert_eq!(first.order(), second.order());
    assert_eq!(first.instances(), second.instances());
    assert_eq!(first_provider.calls(), second_provider.calls());
    assert_eq!(composer.plan(&profile)?.to_string(), composer.plan(&profile)?.to_string());
    Ok(())
}

#[test]
fn independent_components_keep_declaration_order() -> Result<()> {
    let registry = ComponentRegistry::new()
        .with(ComponentSpec::new("zeta", "bucket").output("arn"))?
        .with(ComponentSpec::new("alpha", "bucket").output("arn"))?
        .with(ComponentSpec::new("mid", "bucket").output("arn"))?;
    let deployment = Composer::new(registry).compose(&profile_for("qa"), &FakeResourceProvider::new())?;
    assert_order(&deployment, &["zeta", "alpha", "mid"]);
    Ok(())
}
