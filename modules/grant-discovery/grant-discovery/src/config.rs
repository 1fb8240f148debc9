//! Configuration for the grant discovery module.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Environment variable prefix, e.g. `GRANT_DISCOVERY_MAX_CONCURRENCY=32`.
pub const ENV_PREFIX: &str = "GRANT_DISCOVERY_";

fn default_max_concurrency() -> usize {
    16
}

fn default_snapshot_startup_timeout_ms() -> u64 {
    5_000
}

fn default_snapshot_pool_size() -> u32 {
    4
}

fn default_reserved_id() -> i64 {
    1
}

fn default_user_object_kind() -> String {
    "user".to_owned()
}

fn default_schema_object_kind() -> String {
    "schema".to_owned()
}

fn default_audit_dir() -> PathBuf {
    PathBuf::from("audit")
}

/// Module configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantDiscoveryConfig {
    /// Number of probes evaluated in parallel within one pass.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Upper bound on snapshot engine startup; exceeding it fails the run.
    #[serde(default = "default_snapshot_startup_timeout_ms")]
    pub snapshot_startup_timeout_ms: u64,

    /// Connections served by the snapshot engine.
    #[serde(default = "default_snapshot_pool_size")]
    pub snapshot_pool_size: u32,

    /// The reserved "grants everything" template.
    #[serde(default = "default_reserved_id")]
    pub super_template_id: i64,

    /// The reserved group super-privileged actors are assigned to.
    #[serde(default = "default_reserved_id")]
    pub super_group_id: i64,

    /// Object kind whose specific probe expands over actors.
    #[serde(default = "default_user_object_kind")]
    pub user_object_kind: String,

    /// Object kind handled by the general probe only when no object placeholder is present.
    #[serde(default = "default_schema_object_kind")]
    pub schema_object_kind: String,

    /// Directory receiving one audit log per run.
    #[serde(default = "default_audit_dir")]
    pub audit_dir: PathBuf,
}

impl Default for GrantDiscoveryConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            snapshot_startup_timeout_ms: default_snapshot_startup_timeout_ms(),
            snapshot_pool_size: default_snapshot_pool_size(),
            super_template_id: default_reserved_id(),
            super_group_id: default_reserved_id(),
            user_object_kind: default_user_object_kind(),
            schema_object_kind: default_schema_object_kind(),
            audit_dir: default_audit_dir(),
        }
    }
}

impl GrantDiscoveryConfig {
    /// Layer defaults, an optional YAML file and `GRANT_DISCOVERY_*` variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a provided value cannot be deserialized.
    pub fn load(file: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX)).extract()
    }

    #[must_use]
    pub fn snapshot_startup_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_startup_timeout_ms)
    }

    #[must_use]
    pub fn evaluator_width(&self) -> usize {
        self.max_concurrency.max(1)
    }
}
