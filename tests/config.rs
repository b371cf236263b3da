use anyhow::Result;
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;
use tiergraph::{
    BuiltinConfigSource, ComposeError, ConfigSource, EnvironmentId, JsonConfigSource, ProfileTable, Subsystem, Tier,
};

const PROFILES: &str = r#"{
    "dev": {
        "network": { "cidr": "10.1.0.0/16" },
        "features": { "cache": false }
    },
    "prod": {
        "network": { "cidr": "10.9.0.0/16" },
        "compute": { "desired_count": 6 },
        "features": { "cache": true }
    }
}"#;

#[test]
fn loads_profiles_from_a_json_file() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(PROFILES.as_bytes())?;

    let table = JsonConfigSource::Path(file.path().to_path_buf()).load()?;
    assert_eq!(table.ids().collect::<Vec<_>>(), vec![EnvironmentId::Dev, EnvironmentId::Prod]);

    let prod = table.resolve("prod")?;
    assert_eq!(prod.tier(), Tier::Prod);
    assert_eq!(prod.get(Subsystem::Compute, "desired_count"), Some(&json!(6)));
    assert!(prod.feature_enabled("cache"));
    assert!(!table.resolve("dev")?.feature_enabled("cache"));

    // known identifier, but not in this table
    assert!(matches!(table.resolve("qa"), Err(ComposeError::UnknownEnvironment { .. })));
    Ok(())
}

#[test]
fn rejects_unknown_environments_and_subsystems_in_documents() {
    assert!(JsonConfigSource::Inline(r#"{ "sandbox": {} }"#.to_string()).load().is_err());
    assert!(JsonConfigSource::Inline(r#"{ "dev": { "storage": {} } }"#.to_string()).load().is_err());
    assert!(JsonConfigSource::Path("/nonexistent/profiles.json".into()).load().is_err());
}

#[test]
fn overrides_layer_on_top_of_builtin_profiles() -> Result<()> {
    let mut table = BuiltinConfigSource.load()?;
    let vars = [
        ("TIERGRAPH__PROD__COMPUTE__DESIRED_COUNT", "8"),
        ("TIERGRAPH__DEV__FEATURES__CACHE", "true"),
        ("TIERGRAPH__QA__EDGE__DOMAIN", "qa.internal.example.com"),
        ("UNRELATED", "ignored"),
    ];
    assert_eq!(table.apply_overrides("TIERGRAPH", vars)?, 3);

    assert_eq!(
        table.resolve("prod")?.get(Subsystem::Compute, "desired_count"),
        Some(&json!(8))
    );
    assert!(table.resolve("dev")?.feature_enabled("cache"));
    assert_eq!(
        table.resolve("qa")?.get(Subsystem::Edge, "domain"),
        Some(&json!("qa.internal.example.com"))
    );
    Ok(())
}

#[test]
fn malformed_override_is_an_error() {
    let mut table = ProfileTable::builtin();
    assert!(table.apply_overrides("TIERGRAPH", [("TIERGRAPH__PROD__COMPUTE", "1")]).is_err());
    assert!(table.apply_overrides("TIERGRAPH", [("TIERGRAPH__LOCAL__COMPUTE__X", "1")]).is_err());
}

#[test]
fn profiles_round_trip_through_serde() -> Result<()> {
    let dev = ProfileTable::builtin().resolve("dev")?;
    let text = serde_json::to_string(&dev)?;
    let back: tiergraph::EnvironmentProfile = serde_json::from_str(&text)?;
    assert_eq!(back, dev);
    Ok(())
}
