use std::collections::BTreeSet;

use async_trait::async_trait;
use grant_discovery_sdk::{
    AccessGroup, Actor, ListPolicy, PolicyGrant, PolicyTemplate, TargetDatabase, TargetObject,
};
use sea_orm::ConnectionTrait;

use super::error::DomainError;

/// Read-only inputs of one run.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub templates: Vec<PolicyTemplate>,
    /// Every list-policy, active or not. Undecodable id sets arrive empty.
    pub list_policies: Vec<ListPolicy>,
    pub groups: Vec<AccessGroup>,
    /// Actors of the run's connection, ascending id.
    pub actors: Vec<Actor>,
    /// Databases of the run's connection, ascending id.
    pub databases: Vec<TargetDatabase>,
}

/// Identity of a grant to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrantKey {
    pub connection_id: i64,
    pub template_id: i64,
    pub database_id: i64,
    pub actor_id: i64,
    pub object_id: i64,
}

/// How wide the duplicate check for an enabled grant looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateScope {
    /// Match on connection plus (database, actor, object, template).
    Connection,
    /// Match on (database, actor, object, template) only.
    Global,
}

#[async_trait]
pub trait GrantDiscoveryRepository: Send + Sync {
    async fn load_catalog<C: ConnectionTrait>(
        &self,
        conn: &C,
        connection_id: i64,
    ) -> Result<Catalog, DomainError>;

    /// Objects of the given kinds in the given databases.
    async fn load_objects<C: ConnectionTrait>(
        &self,
        conn: &C,
        database_ids: &[i64],
        kinds: &BTreeSet<String>,
    ) -> Result<Vec<TargetObject>, DomainError>;

    async fn find_enabled_grant<C: ConnectionTrait>(
        &self,
        conn: &C,
        key: &GrantKey,
        scope: DuplicateScope,
    ) -> Result<Option<PolicyGrant>, DomainError>;

    /// Insert an enabled grant. Returns `None` when the store already holds
    /// an enabled grant for the same (database, actor, object, template).
    async fn insert_grant<C: ConnectionTrait>(
        &self,
        conn: &C,
        key: &GrantKey,
    ) -> Result<Option<PolicyGrant>, DomainError>;

    async fn list_grants<C: ConnectionTrait>(
        &self,
        conn: &C,
        connection_id: i64,
    ) -> Result<Vec<PolicyGrant>, DomainError>;

    async fn is_member<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor_id: i64,
        group_id: i64,
    ) -> Result<bool, DomainError>;

    async fn insert_membership<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor_id: i64,
        group_id: i64,
    ) -> Result<(), DomainError>;

    /// `(actor_id, group_id)` pairs, ascending.
    async fn list_memberships<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<Vec<(i64, i64)>, DomainError>;
}
