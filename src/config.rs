//! Profile tables and where they come from.
//!
//! A [`ProfileTable`] holds one [`EnvironmentProfile`] per environment and is
//! produced by a [`ConfigSource`]. Resolution is a pure lookup that fails
//! closed: an identifier outside the enumerated set, or one the table does
//! not carry, is [`ComposeError::UnknownEnvironment`].
//!
//! The on-disk format is JSON keyed by environment, then subsystem:
//!
//! ```json
//! {
//!   "dev":  { "network": { "cidr": "10.10.0.0/16" }, "features": { "cache": false } },
//!   "prod": { "network": { "cidr": "10.50.0.0/16" }, "features": { "cache": true } }
//! }
//! ```

use crate::error::ComposeError;
use crate::profile::{EnvironmentId, EnvironmentProfile, FieldMap, Subsystem};
use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

type RawTable = BTreeMap<EnvironmentId, BTreeMap<Subsystem, FieldMap>>;

/// Supplies the profile table. Implementations own file formats and sources.
pub trait ConfigSource {
    /// Load the full profile table.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or parsed.
    fn load(&self) -> Result<ProfileTable>;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProfileTable {
    profiles: BTreeMap<EnvironmentId, EnvironmentProfile>,
}

impl ProfileTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON profile document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or names an unknown
    /// environment or subsystem.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawTable = serde_json::from_str(json).context("parsing profile table JSON")?;
        Ok(raw.into_iter().fold(Self::new(), |mut table, (id, subsystems)| {
            table.insert(EnvironmentProfile::from_parts(id, subsystems));
            table
        }))
    }

    pub fn insert(&mut self, profile: EnvironmentProfile) {
        self.profiles.insert(profile.id(), profile);
    }

    #[must_use]
    pub fn with_profile(mut self, profile: EnvironmentProfile) -> Self {
        self.insert(profile);
        self
    }

    pub fn ids(&self) -> impl Iterator<Item = EnvironmentId> + '_ {
        self.profiles.keys().copied()
    }

    /// Resolve an environment identifier string to its profile.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::UnknownEnvironment`] if `env_id` is not one of
    /// the enumerated identifiers or the table has no entry for it.
    pub fn resolve(&self, env_id: &str) -> Result<EnvironmentProfile, ComposeError> {
        let id: EnvironmentId = env_id.parse()?;
        self.resolve_id(id)
    }

    /// # Errors
    ///
    /// Returns [`ComposeError::UnknownEnvironment`] if the table has no entry for `id`.
    pub fn resolve_id(&self, id: EnvironmentId) -> Result<EnvironmentProfile, ComposeError> {
        self.profiles
            .get(&id)
            .cloned()
            .ok_or_else(|| ComposeError::UnknownEnvironment {
                id: id.as_str().to_string(),
            })
    }

    /// Overlay `PREFIX__ENV__SUBSYSTEM__FIELD=value` pairs onto the table.
    ///
    /// Variables are passed in by the caller (typically `std::env::vars()` at
    /// program start). Values are parsed as JSON where possible, otherwise kept
    /// as strings. Keys without the prefix are ignored. Returns how many
    /// overrides were applied.
    ///
    /// Every prefixed key is validated before any is applied, so a failed call
    /// leaves the table untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if a prefixed key is malformed or names an unknown
    /// environment or subsystem.
    pub fn apply_overrides<I, K, V>(&mut self, prefix: &str, vars: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let marker = format!("{prefix}__");
        let mut parsed: Vec<(EnvironmentId, Subsystem, String, Value)> = Vec::new();
        for (key, raw) in vars {
            let key = key.as_ref();
            let Some(rest) = key.strip_prefix(&marker) else {
                continue;
            };
            let parts: Vec<&str> = rest.splitn(3, "__").collect();
            let [env, subsystem, field] = parts.as_slice() else {
                return Err(anyhow!("override `{key}` must be {marker}ENV__SUBSYSTEM__FIELD"));
            };
            let id: EnvironmentId = env
                .to_ascii_lowercase()
                .parse()
                .with_context(|| format!("override `{key}`"))?;
            let subsystem: Subsystem = subsystem
                .to_ascii_lowercase()
                .parse()
                .map_err(|e: String| anyhow!(e))
                .with_context(|| format!("override `{key}`"))?;
            let field = field.to_ascii_lowercase();
            let value = serde_json::from_str(raw.as_ref())
                .unwrap_or_else(|_| Value::String(raw.as_ref().to_string()));

            parsed.push((id, subsystem, field, value));
        }

        let applied = parsed.len();
        for (id, subsystem, field, value) in parsed {
            debug!(environment = %id, %subsystem, field = %field, "applying profile override");
            self.profiles
                .entry(id)
                .or_insert_with(|| EnvironmentProfile::new(id))
                .set(subsystem, &field, value);
        }
        Ok(applied)
    }

    /// Built-in profiles for all five environments, sized for the
    /// [`reference_stack`](crate::stack::reference_stack).
    #[must_use]
    pub fn builtin() -> Self {
        EnvironmentId::ALL
            .into_iter()
            .map(builtin_profile)
            .fold(Self::new(), Self::with_profile)
    }
}

fn builtin_profile(id: EnvironmentId) -> EnvironmentProfile {
    // (octet, azs, desired tasks, db topology, db class, cache, cdn, waf, log days)
    let (octet, azs, desired, topology, db_class, cache, cdn, waf, log_days) = match id {
        EnvironmentId::Dev => (10, 1, 1, "single", "db.t3.medium", false, false, false, 7),
        EnvironmentId::Qa => (20, 2, 1, "single", "db.t3.medium", true, false, false, 14),
        EnvironmentId::Staging => (30, 2, 2, "cluster", "db.r6g.large", true, true, true, 30),
        EnvironmentId::Uat => (40, 2, 2, "cluster", "db.r6g.large", true, true, false, 30),
        EnvironmentId::Prod => (50, 3, 4, "cluster", "db.r6g.xlarge", true, true, true, 365),
    };
    let domain = match id {
        EnvironmentId::Prod => "app.example.com".to_string(),
        other => format!("{other}.app.example.com"),
    };

    let mut profile = EnvironmentProfile::new(id);
    let fields: [(Subsystem, &str, Value); 19] = [
        (Subsystem::Network, "cidr", json!(format!("10.{octet}.0.0/16"))),
        (Subsystem::Network, "max_azs", json!(azs)),
        (Subsystem::Compute, "desired_count", json!(desired)),
        (Subsystem::Compute, "db_topology", json!(topology)),
        (Subsystem::Compute, "db_instance_class", json!(db_class)),
        (Subsystem::Compute, "cache_node_type", json!("cache.t3.small")),
        (Subsystem::Compute, "search_instances", json!(3)),
        (Subsystem::Identity, "admin_group", json!(format!("platform-admins-{id}"))),
        (Subsystem::Identity, "mfa_required", json!(id == EnvironmentId::Prod)),
        (Subsystem::Retention, "log_days", json!(log_days)),
        (Subsystem::Retention, "backup_days", json!(35)),
        (Subsystem::Edge, "domain", json!(domain)),
        (Subsystem::Edge, "waf_rate_limit", json!(2000)),
        (Subsystem::Edge, "hosted_zone", json!("example.com")),
        (Subsystem::Messaging, "queue_visibility_secs", json!(60)),
        (Subsystem::Features, "cache", json!(cache)),
        (Subsystem::Features, "cdn", json!(cdn)),
        (Subsystem::Features, "waf", json!(waf)),
        (Subsystem::Features, "bastion", json!(id != EnvironmentId::Prod)),
    ];
    for (subsystem, field, value) in fields {
        profile.set(subsystem, field, value);
    }
    profile
}

/// Profiles from a JSON document, either a file or an in-memory string.
#[derive(Clone, Debug)]
pub enum JsonConfigSource {
    Path(PathBuf),
    Inline(String),
}

impl ConfigSource for JsonConfigSource {
    fn load(&self) -> Result<ProfileTable> {
        match self {
            Self::Path(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading profile table {}", path.display()))?;
                ProfileTable::from_json_str(&text)
                    .with_context(|| format!("loading profile table {}", path.display()))
            }
            Self::Inline(text) => ProfileTable::from_json_str(text),
        }
    }
}

/// The built-in profile set.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinConfigSource;

impl ConfigSource for BuiltinConfigSource {
    fn load(&self) -> Result<ProfileTable> {
        Ok(ProfileTable::builtin())
    }
}
