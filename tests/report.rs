use anyhow::Result;
use tempfile::TempDir;
use tiergraph::testing::*;
use tiergraph::{Composer, DeploymentReport, EnvironmentId, Tier};

#[test]
fn report_round_trips_through_a_file() -> Result<()> {
    let deployment = Composer::new(tiergraph::stack::reference_stack()?)
        .compose(&profile_for("dev"), &FakeResourceProvider::new())?;
    let report = deployment.report();

    assert_eq!(report.environment, EnvironmentId::Dev);
    assert_eq!(report.tier, Tier::NonProd);
    assert!(report.absent.contains(&"search".to_string()));
    assert_eq!(report.present.len() + report.absent.len(), deployment.instances().len());
    assert!(report.has_warnings());
    assert!(
        report
            .unresolved_slots
            .iter()
            .any(|s| s.component == "compute" && s.slot == "searchEndpoint")
    );

    let dir = TempDir::new()?;
    let path = dir.path().join("report.json");
    report.save_to_file(&path)?;
    let loaded = DeploymentReport::load_from_file(&path)?;
    assert_eq!(loaded, report);
    Ok(())
}

#[test]
fn json_uses_lowercase_environment_and_snake_case_tier() -> Result<()> {
    let deployment = Composer::new(tiergraph::stack::reference_stack()?)
        .compose(&profile_for("prod"), &FakeResourceProvider::new())?;
    let json = deployment.report().to_json()?;
    assert_eq!(json["environment"], "prod");
    assert_eq!(json["tier"], "prod");
    assert_eq!(json["absent"], serde_json::json!(["bastion"]));
    Ok(())
}
