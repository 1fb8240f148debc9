use grant_discovery_sdk::{GrantStatus, PolicyGrant};
use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "policy_grants")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub connection_id: i64,
    pub template_id: i64,
    pub database_id: i64,
    pub actor_id: i64,
    pub object_id: i64,
    pub status: String,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for PolicyGrant {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            connection_id: m.connection_id,
            template_id: m.template_id,
            database_id: m.database_id,
            actor_id: m.actor_id,
            object_id: m.object_id,
            // Unknown statuses never count as an enabled duplicate.
            status: m.status.parse().unwrap_or(GrantStatus::Disabled),
        }
    }
}
