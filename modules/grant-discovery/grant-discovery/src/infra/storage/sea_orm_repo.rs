use std::collections::BTreeSet;

use async_trait::async_trait;
use grant_discovery_sdk::{
    AccessGroup, GrantStatus, IdSet, ListPolicy, PolicyGrant, PolicyTemplate, TargetObject,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::domain::error::DomainError;
use crate::domain::repo::{Catalog, DuplicateScope, GrantDiscoveryRepository, GrantKey};

use super::entity::{
    access_group, actor, group_membership, list_policy, policy_grant, policy_template,
    target_database, target_object,
};

pub struct SeaOrmRepository;

impl SeaOrmRepository {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for SeaOrmRepository {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a stored id set; an undecodable set is logged and treated as empty.
fn decode_ids(kind: &'static str, id: i64, raw: &str) -> BTreeSet<i64> {
    match IdSet::parse(raw) {
        Ok(ids) => ids.into_inner(),
        Err(e) => {
            warn!(kind, id, error = %e, "Invalid id set; treating as empty");
            BTreeSet::new()
        }
    }
}

#[async_trait]
impl GrantDiscoveryRepository for SeaOrmRepository {
    async fn load_catalog<C: ConnectionTrait>(
        &self,
        conn: &C,
        connection_id: i64,
    ) -> Result<Catalog, DomainError> {
        let templates = policy_template::Entity::find()
            .order_by_asc(policy_template::Column::Id)
            .all(conn)
            .await?
            .into_iter()
            .map(PolicyTemplate::from)
            .collect();

        let list_policies = list_policy::Entity::find()
            .order_by_asc(list_policy::Column::Id)
            .all(conn)
            .await?
            .into_iter()
            .map(|m| ListPolicy {
                template_ids: decode_ids("list_policy", m.id, &m.template_ids),
                id: m.id,
                name: m.name,
                active: m.active,
            })
            .collect();

        let groups = access_group::Entity::find()
            .order_by_asc(access_group::Column::Id)
            .all(conn)
            .await?
            .into_iter()
            .map(|m| AccessGroup {
                list_policy_ids: decode_ids("access_group", m.id, &m.list_policy_ids),
                id: m.id,
                name: m.name,
            })
            .collect();

        let actors = actor::Entity::find()
            .filter(actor::Column::ConnectionId.eq(connection_id))
            .order_by_asc(actor::Column::Id)
            .all(conn)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        let databases = target_database::Entity::find()
            .filter(target_database::Column::ConnectionId.eq(connection_id))
            .order_by_asc(target_database::Column::Id)
            .all(conn)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        Ok(Catalog {
            templates,
            list_policies,
            groups,
            actors,
            databases,
        })
    }

    async fn load_objects<C: ConnectionTrait>(
        &self,
        conn: &C,
        database_ids: &[i64],
        kinds: &BTreeSet<String>,
    ) -> Result<Vec<TargetObject>, DomainError> {
        if database_ids.is_empty() || kinds.is_empty() {
            return Ok(Vec::new());
        }

        let objects = target_object::Entity::find()
            .filter(target_object::Column::DatabaseId.is_in(database_ids.iter().copied()))
            .filter(target_object::Column::Kind.is_in(kinds.iter().cloned()))
            .order_by_asc(target_object::Column::Id)
            .all(conn)
            .await?;

        Ok(objects.into_iter().map(Into::into).collect())
    }

    async fn find_enabled_grant<C: ConnectionTrait>(
        &self,
        conn: &C,
        key: &GrantKey,
        scope: DuplicateScope,
    ) -> Result<Option<PolicyGrant>, DomainError> {
        let mut query = policy_grant::Entity::find()
            .filter(policy_grant::Column::DatabaseId.eq(key.database_id))
            .filter(policy_grant::Column::ActorId.eq(key.actor_id))
            .filter(policy_grant::Column::ObjectId.eq(key.object_id))
            .filter(policy_grant::Column::TemplateId.eq(key.template_id))
            .filter(policy_grant::Column::Status.eq(GrantStatus::Enabled.as_str()));

        if scope == DuplicateScope::Connection {
            query = query.filter(policy_grant::Column::ConnectionId.eq(key.connection_id));
        }

        Ok(query.one(conn).await?.map(Into::into))
    }

    async fn insert_grant<C: ConnectionTrait>(
        &self,
        conn: &C,
        key: &GrantKey,
    ) -> Result<Option<PolicyGrant>, DomainError> {
        let model = policy_grant::ActiveModel {
            connection_id: Set(key.connection_id),
            template_id: Set(key.template_id),
            database_id: Set(key.database_id),
            actor_id: Set(key.actor_id),
            object_id: Set(key.object_id),
            status: Set(GrantStatus::Enabled.as_str().to_owned()),
            created_at: Set(OffsetDateTime::now_utc()),
            ..Default::default()
        };

        match model.insert(conn).await {
            Ok(inserted) => Ok(Some(inserted.into())),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                debug!(
                    actor_id = key.actor_id,
                    template_id = key.template_id,
                    database_id = key.database_id,
                    object_id = key.object_id,
                    "Enabled grant already stored"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_grants<C: ConnectionTrait>(
        &self,
        conn: &C,
        connection_id: i64,
    ) -> Result<Vec<PolicyGrant>, DomainError> {
        let grants = policy_grant::Entity::find()
            .filter(policy_grant::Column::ConnectionId.eq(connection_id))
            .order_by_asc(policy_grant::Column::Id)
            .all(conn)
            .await?;
        Ok(grants.into_iter().map(Into::into).collect())
    }

    async fn is_member<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor_id: i64,
        group_id: i64,
    ) -> Result<bool, DomainError> {
        let found = group_membership::Entity::find()
            .filter(group_membership::Column::ActorId.eq(actor_id))
            .filter(group_membership::Column::GroupId.eq(group_id))
            .one(conn)
            .await?;
        Ok(found.is_some())
    }

    async fn insert_membership<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor_id: i64,
        group_id: i64,
    ) -> Result<(), DomainError> {
        group_membership::ActiveModel {
            actor_id: Set(actor_id),
            group_id: Set(group_id),
            created_at: Set(OffsetDateTime::now_utc()),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        Ok(())
    }

    async fn list_memberships<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<Vec<(i64, i64)>, DomainError> {
        let rows = group_membership::Entity::find()
            .order_by_asc(group_membership::Column::ActorId)
            .order_by_asc(group_membership::Column::GroupId)
            .all(conn)
            .await?;
        Ok(rows.into_iter().map(|m| (m.actor_id, m.group_id)).collect())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::test_support::{inmem_db, seed_catalog, template, CatalogSeed};

    fn key(connection_id: i64) -> GrantKey {
        GrantKey {
            connection_id,
            template_id: 4,
            database_id: 10,
            actor_id: 2,
            object_id: -1,
        }
    }

    #[tokio::test]
    async fn duplicate_scope_controls_connection_matching() {
        let db = inmem_db().await;
        let repo = SeaOrmRepository::new();
        repo.insert_grant(&db, &key(1)).await.unwrap();

        let other = key(2);
        assert!(repo
            .find_enabled_grant(&db, &other, DuplicateScope::Connection)
            .await
            .unwrap()
            .is_none());
        let global = repo
            .find_enabled_grant(&db, &other, DuplicateScope::Global)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(global.connection_id, 1);
        assert_eq!(global.status, GrantStatus::Enabled);
    }

    #[tokio::test]
    async fn store_keeps_one_enabled_grant_per_scope() {
        let db = inmem_db().await;
        let repo = SeaOrmRepository::new();

        assert!(repo.insert_grant(&db, &key(1)).await.unwrap().is_some());
        // Same scope under another connection id collides with the enabled row.
        assert!(repo.insert_grant(&db, &key(2)).await.unwrap().is_none());

        // Disabled rows are outside the unique index.
        let k = key(1);
        policy_grant::ActiveModel {
            connection_id: Set(k.connection_id),
            template_id: Set(k.template_id),
            database_id: Set(k.database_id),
            actor_id: Set(k.actor_id),
            object_id: Set(k.object_id),
            status: Set(GrantStatus::Disabled.as_str().to_owned()),
            created_at: Set(OffsetDateTime::now_utc()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let statuses: Vec<GrantStatus> = repo
            .list_grants(&db, 1)
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.status)
            .collect();
        assert_eq!(statuses, vec![GrantStatus::Enabled, GrantStatus::Disabled]);
        assert!(repo.list_grants(&db, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_id_sets_load_as_empty() {
        let db = inmem_db().await;
        seed_catalog(
            &db,
            &CatalogSeed {
                templates: vec![template(1, 1)],
                list_policies: vec![
                    (1, "json", "[1, 2]", true),
                    (2, "number", "3", true),
                    (3, "csv", "4, 5", false),
                    (4, "broken", "4, x", true),
                ],
                groups: vec![(1, "super", "")],
                ..Default::default()
            },
        )
        .await;

        let catalog = SeaOrmRepository::new().load_catalog(&db, 1).await.unwrap();
        let ids: Vec<Vec<i64>> = catalog
            .list_policies
            .iter()
            .map(|lp| lp.template_ids.iter().copied().collect())
            .collect();
        assert_eq!(ids, vec![vec![1, 2], vec![3], vec![4, 5], vec![]]);
        assert!(!catalog.list_policies[2].active);
        assert!(catalog.groups[0].list_policy_ids.is_empty());
    }

    #[tokio::test]
    async fn objects_are_filtered_by_database_and_kind() {
        let db = inmem_db().await;
        seed_catalog(
            &db,
            &CatalogSeed {
                databases: vec![(10, 1, "app"), (11, 1, "billing"), (12, 2, "other")],
                objects: vec![
                    (100, 10, "orders", "table"),
                    (101, 10, "v_orders", "view"),
                    (102, 11, "invoices", "table"),
                    (103, 12, "foreign", "table"),
                ],
                ..Default::default()
            },
        )
        .await;

        let repo = SeaOrmRepository::new();
        let catalog = repo.load_catalog(&db, 1).await.unwrap();
        let database_ids: Vec<i64> = catalog.databases.iter().map(|d| d.id).collect();
        assert_eq!(database_ids, vec![10, 11]);

        let objects = repo
            .load_objects(&db, &database_ids, &BTreeSet::from(["table".to_owned()]))
            .await
            .unwrap();
        let ids: Vec<i64> = objects.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![100, 102]);
    }

    #[tokio::test]
    async fn memberships_are_queryable_after_insert() {
        let db = inmem_db().await;
        let repo = SeaOrmRepository::new();
        assert!(!repo.is_member(&db, 3, 2).await.unwrap());
        repo.insert_membership(&db, 3, 2).await.unwrap();
        assert!(repo.is_member(&db, 3, 2).await.unwrap());
        assert_eq!(repo.list_memberships(&db).await.unwrap(), vec![(3, 2)]);
    }
}
