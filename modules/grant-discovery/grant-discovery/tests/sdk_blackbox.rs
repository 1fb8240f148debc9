#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end run through the SDK client with file-backed audit logs.

use std::sync::Arc;

use grant_discovery::domain::{GrantDiscoveryLocalClient, Service};
use grant_discovery::infra::storage::entity::{actor, list_policy, policy_template, target_database};
use grant_discovery::infra::storage::{Migrator, SeaOrmRepository};
use grant_discovery::{GrantDiscoveryClient, GrantDiscoveryConfig, GrantDiscoveryError, RunRequest};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::json;

async fn seeded_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opts).await.expect("connect");
    Migrator::up(&db, None).await.expect("migrate");

    policy_template::ActiveModel {
        id: Set(1),
        action_id: Set(1),
        object_kind: Set(None),
        general_sql: Set(Some(
            "SELECT Super_priv FROM mysql.user WHERE User = '{user}' AND Host = '{host}'".to_owned(),
        )),
        general_allow: Set(Some("Y".to_owned())),
        general_deny: Set(Some("N".to_owned())),
        specific_sql: Set(None),
        specific_allow: Set(None),
        specific_deny: Set(None),
    }
    .insert(&db)
    .await
    .unwrap();

    policy_template::ActiveModel {
        id: Set(2),
        action_id: Set(5),
        object_kind: Set(None),
        general_sql: Set(Some(
            "SELECT COUNT(*) FROM information_schema.SCHEMA_PRIVILEGES \
             WHERE GRANTEE = '''{user}''@''{host}''' AND TABLE_SCHEMA = '{database}'"
                .to_owned(),
        )),
        general_allow: Set(Some("NOT NULL".to_owned())),
        general_deny: Set(Some("0".to_owned())),
        specific_sql: Set(None),
        specific_allow: Set(None),
        specific_deny: Set(None),
    }
    .insert(&db)
    .await
    .unwrap();

    list_policy::ActiveModel {
        id: Set(1),
        name: Set("schema-access".to_owned()),
        template_ids: Set("\"2\"".to_owned()),
        active: Set(true),
    }
    .insert(&db)
    .await
    .unwrap();

    for (id, user) in [(1, "admin"), (2, "reporter")] {
        actor::ActiveModel {
            id: Set(id),
            connection_id: Set(1),
            user: Set(user.to_owned()),
            host: Set("%".to_owned()),
        }
        .insert(&db)
        .await
        .unwrap();
    }

    target_database::ActiveModel {
        id: Set(10),
        connection_id: Set(1),
        name: Set("sales".to_owned()),
    }
    .insert(&db)
    .await
    .unwrap();

    db
}

fn snapshot() -> String {
    let mut admin = vec![json!("%"), json!("admin")];
    admin.extend(std::iter::repeat_n(json!("N"), 15));
    admin.push(json!("Y"));

    json!([
        {"query_key": "mysql.user[0]", "status": "success", "result": [admin]},
        {"query_key": "information_schema.SCHEMA_PRIVILEGES", "status": true, "result": [
            ["'reporter'@'%'", "def", "sales", "SELECT", "NO"]
        ]},
        {"query_key": "mysql.unknown_table", "status": true, "result": [["x"]]}
    ])
    .to_string()
}

#[tokio::test]
async fn client_reports_outcome_and_writes_audit_file() {
    let audit_dir = tempfile::tempdir().unwrap();
    let config = GrantDiscoveryConfig {
        audit_dir: audit_dir.path().to_path_buf(),
        max_concurrency: 2,
        ..Default::default()
    };
    let svc = Arc::new(Service::new(
        seeded_db().await,
        Arc::new(SeaOrmRepository::new()),
        config,
    ));
    let client: Arc<dyn GrantDiscoveryClient> = Arc::new(GrantDiscoveryLocalClient::new(svc));

    let outcome = client
        .complete(RunRequest::new("nightly/42", 1, snapshot()))
        .await
        .unwrap();

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.grants_created, 2);
    // admin lands in the reserved super group.
    assert_eq!(outcome.groups_assigned, 1);
    assert_eq!(
        outcome.message,
        "created 2 grants (0 already present), 1 group assignments"
    );

    let log = std::fs::read_to_string(audit_dir.path().join("nightly_42.audit.log")).unwrap();
    assert!(log.contains("GRANT actor=1 template=1 database=-1 object=-1"));
    assert!(log.contains("GRANT actor=2 template=2 database=10 object=-1"));

    let again = client
        .complete(RunRequest::new("nightly/42", 1, snapshot()))
        .await;
    assert!(matches!(
        again,
        Err(GrantDiscoveryError::AlreadyProcessed { .. })
    ));
}

#[tokio::test]
async fn bad_payload_is_a_failed_outcome_not_an_error() {
    let audit_dir = tempfile::tempdir().unwrap();
    let svc = Arc::new(Service::new(
        seeded_db().await,
        Arc::new(SeaOrmRepository::new()),
        GrantDiscoveryConfig {
            audit_dir: audit_dir.path().to_path_buf(),
            ..Default::default()
        },
    ));
    let client = GrantDiscoveryLocalClient::new(svc);

    let outcome = client
        .complete(RunRequest::new("job-1", 1, "{\"query_key\": 1}"))
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.message.contains("invalid snapshot payload"));
    assert_eq!(outcome.grants_created, 0);
}
