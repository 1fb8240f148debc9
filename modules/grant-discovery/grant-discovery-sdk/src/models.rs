//! Catalog, output and run models for grant discovery.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Database or object id meaning "wildcard scope".
pub const NO_SCOPE: i64 = -1;

/// One probe variant of a template: SQL plus the literals it is compared against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    pub sql: String,
    pub expected_allow: String,
    pub expected_deny: String,
}

/// A policy rule pairing probe SQL with expected allow/deny literals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTemplate {
    pub id: i64,
    pub action_id: i64,
    /// `TargetObject` kind the specific probe expands over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general: Option<Probe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific: Option<Probe>,
}

/// A database principal (user + host) under one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub connection_id: i64,
    pub user: String,
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDatabase {
    pub id: i64,
    pub connection_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetObject {
    pub id: i64,
    pub database_id: i64,
    pub name: String,
    pub kind: String,
}

/// A named bundle of template ids representing one coarse action category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPolicy {
    pub id: i64,
    pub name: String,
    pub template_ids: BTreeSet<i64>,
    pub active: bool,
}

/// A bucket of list-policies an actor can be assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGroup {
    pub id: i64,
    pub name: String,
    pub list_policy_ids: BTreeSet<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    Enabled,
    Disabled,
}

impl GrantStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}

impl std::str::FromStr for GrantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enabled" => Ok(Self::Enabled),
            "disabled" => Ok(Self::Disabled),
            other => Err(format!("unknown grant status '{other}'")),
        }
    }
}

/// A persisted grant: `actor` may perform `template` on `database`/`object`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyGrant {
    pub id: i64,
    pub connection_id: i64,
    pub template_id: i64,
    pub database_id: i64,
    pub actor_id: i64,
    pub object_id: i64,
    pub status: GrantStatus,
}

/// Completion input delivered by the job layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub job_id: String,
    pub connection_id: i64,
    /// Raw snapshot payload: a JSON array of `{query_key, status, result}`.
    pub snapshot: String,
}

impl RunRequest {
    #[must_use]
    pub fn new(job_id: impl Into<String>, connection_id: i64, snapshot: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            connection_id,
            snapshot: snapshot.into(),
        }
    }
}

/// Completion signal returned to the job layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub job_id: String,
    pub success: bool,
    pub message: String,
    pub grants_created: usize,
    pub grants_existing: usize,
    pub groups_assigned: usize,
}

impl RunOutcome {
    #[must_use]
    pub fn failed(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            success: false,
            message: message.into(),
            grants_created: 0,
            grants_existing: 0,
            groups_assigned: 0,
        }
    }
}
