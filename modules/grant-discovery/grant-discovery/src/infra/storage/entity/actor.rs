use grant_discovery_sdk::Actor;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "actors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub connection_id: i64,
    pub user: String,
    pub host: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Actor {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            connection_id: m.connection_id,
            user: m.user,
            host: m.host,
        }
    }
}
