use grant_discovery_sdk::{PolicyTemplate, Probe};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "policy_templates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub action_id: i64,
    pub object_kind: Option<String>,
    pub general_sql: Option<String>,
    pub general_allow: Option<String>,
    pub general_deny: Option<String>,
    pub specific_sql: Option<String>,
    pub specific_allow: Option<String>,
    pub specific_deny: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// A probe exists only when its SQL is set; missing literals compare as empty.
fn probe(sql: Option<String>, allow: Option<String>, deny: Option<String>) -> Option<Probe> {
    sql.filter(|s| !s.trim().is_empty()).map(|sql| Probe {
        sql,
        expected_allow: allow.unwrap_or_default(),
        expected_deny: deny.unwrap_or_default(),
    })
}

impl From<Model> for PolicyTemplate {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            action_id: m.action_id,
            object_kind: m.object_kind.filter(|k| !k.is_empty()),
            general: probe(m.general_sql, m.general_allow, m.general_deny),
            specific: probe(m.specific_sql, m.specific_allow, m.specific_deny),
        }
    }
}
