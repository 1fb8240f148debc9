use grant_discovery_sdk::TargetObject;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "target_objects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub database_id: i64,
    pub name: String,
    pub kind: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::target_database::Entity",
        from = "Column::DatabaseId",
        to = "super::target_database::Column::Id"
    )]
    Database,
}

impl ActiveModelBehavior for ActiveModel {}

impl Related<super::target_database::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Database.def()
    }
}

impl From<Model> for TargetObject {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            database_id: m.database_id,
            name: m.name,
            kind: m.kind,
        }
    }
}
