#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use grant_discovery_sdk::{PolicyTemplate, Probe};
use sea_orm::{ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;

use crate::infra::storage::entity::{
    access_group, actor, list_policy, policy_template, target_database, target_object,
};
use crate::infra::storage::migrations::Migrator;

/// Create an in-memory database with the schema applied.
pub async fn inmem_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1)
        .min_connections(1)
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    let db = Database::connect(opts)
        .await
        .expect("Failed to connect to in-memory database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

#[must_use]
pub fn template(id: i64, action_id: i64) -> PolicyTemplate {
    PolicyTemplate {
        id,
        action_id,
        object_kind: None,
        general: None,
        specific: None,
    }
}

#[must_use]
pub fn with_general(mut t: PolicyTemplate, sql: &str, allow: &str, deny: &str) -> PolicyTemplate {
    t.general = Some(probe(sql, allow, deny));
    t
}

#[must_use]
pub fn with_specific(
    mut t: PolicyTemplate,
    kind: &str,
    sql: &str,
    allow: &str,
    deny: &str,
) -> PolicyTemplate {
    t.object_kind = Some(kind.to_owned());
    t.specific = Some(probe(sql, allow, deny));
    t
}

fn probe(sql: &str, allow: &str, deny: &str) -> Probe {
    Probe {
        sql: sql.to_owned(),
        expected_allow: allow.to_owned(),
        expected_deny: deny.to_owned(),
    }
}

/// Catalog rows to seed; tuples mirror the table columns.
#[derive(Default)]
pub struct CatalogSeed {
    pub templates: Vec<PolicyTemplate>,
    /// `(id, name, raw template ids, active)`
    pub list_policies: Vec<(i64, &'static str, &'static str, bool)>,
    /// `(id, name, raw list-policy ids)`
    pub groups: Vec<(i64, &'static str, &'static str)>,
    /// `(id, connection_id, user, host)`
    pub actors: Vec<(i64, i64, &'static str, &'static str)>,
    /// `(id, connection_id, name)`
    pub databases: Vec<(i64, i64, &'static str)>,
    /// `(id, database_id, name, kind)`
    pub objects: Vec<(i64, i64, &'static str, &'static str)>,
}

pub async fn seed_catalog(db: &impl ConnectionTrait, seed: &CatalogSeed) {
    for t in &seed.templates {
        let (general_sql, general_allow, general_deny) = split(t.general.as_ref());
        let (specific_sql, specific_allow, specific_deny) = split(t.specific.as_ref());
        policy_template::ActiveModel {
            id: Set(t.id),
            action_id: Set(t.action_id),
            object_kind: Set(t.object_kind.clone()),
            general_sql: Set(general_sql),
            general_allow: Set(general_allow),
            general_deny: Set(general_deny),
            specific_sql: Set(specific_sql),
            specific_allow: Set(specific_allow),
            specific_deny: Set(specific_deny),
        }
        .insert(db)
        .await
        .expect("Failed to seed template");
    }

    for &(id, name, ids, active) in &seed.list_policies {
        list_policy::ActiveModel {
            id: Set(id),
            name: Set(name.to_owned()),
            template_ids: Set(ids.to_owned()),
            active: Set(active),
        }
        .insert(db)
        .await
        .expect("Failed to seed list policy");
    }

    for &(id, name, ids) in &seed.groups {
        access_group::ActiveModel {
            id: Set(id),
            name: Set(name.to_owned()),
            list_policy_ids: Set(ids.to_owned()),
        }
        .insert(db)
        .await
        .expect("Failed to seed access group");
    }

    for &(id, connection_id, user, host) in &seed.actors {
        actor::ActiveModel {
            id: Set(id),
            connection_id: Set(connection_id),
            user: Set(user.to_owned()),
            host: Set(host.to_owned()),
        }
        .insert(db)
        .await
        .expect("Failed to seed actor");
    }

    for &(id, connection_id, name) in &seed.databases {
        target_database::ActiveModel {
            id: Set(id),
            connection_id: Set(connection_id),
            name: Set(name.to_owned()),
        }
        .insert(db)
        .await
        .expect("Failed to seed database");
    }

    for &(id, database_id, name, kind) in &seed.objects {
        target_object::ActiveModel {
            id: Set(id),
            database_id: Set(database_id),
            name: Set(name.to_owned()),
            kind: Set(kind.to_owned()),
        }
        .insert(db)
        .await
        .expect("Failed to seed object");
    }
}

fn split(probe: Option<&Probe>) -> (Option<String>, Option<String>, Option<String>) {
    probe.map_or((None, None, None), |p| {
        (
            Some(p.sql.clone()),
            Some(p.expected_allow.clone()),
            Some(p.expected_deny.clone()),
        )
    })
}

/// One `mysql.user` row: host, user, 15 `N` privilege flags, then `Super_priv`.
#[must_use]
pub fn user_row(host: &str, user: &str, super_priv: &str) -> serde_json::Value {
    let mut cells = vec![serde_json::json!(host), serde_json::json!(user)];
    cells.extend((2..17).map(|_| serde_json::json!("N")));
    cells.push(serde_json::json!(super_priv));
    serde_json::Value::Array(cells)
}

/// Serialize `(query_key, rows)` pairs into an agent payload.
#[must_use]
pub fn payload(entries: &[(&str, Vec<serde_json::Value>)]) -> String {
    let entries: Vec<serde_json::Value> = entries
        .iter()
        .map(|(key, rows)| {
            serde_json::json!({
                "query_key": key,
                "status": true,
                "result": rows,
            })
        })
        .collect();
    serde_json::Value::Array(entries).to_string()
}
