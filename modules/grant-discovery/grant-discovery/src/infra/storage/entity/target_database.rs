use grant_discovery_sdk::TargetDatabase;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "target_databases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub connection_id: i64,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::target_object::Entity")]
    Objects,
}

impl ActiveModelBehavior for ActiveModel {}

impl Related<super::target_object::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Objects.def()
    }
}

impl From<Model> for TargetDatabase {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            connection_id: m.connection_id,
            name: m.name,
        }
    }
}
