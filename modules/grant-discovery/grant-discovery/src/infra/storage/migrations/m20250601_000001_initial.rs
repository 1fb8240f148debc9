use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum PolicyTemplates {
    Table,
    Id,
    ActionId,
    ObjectKind,
    GeneralSql,
    GeneralAllow,
    GeneralDeny,
    SpecificSql,
    SpecificAllow,
    SpecificDeny,
}

#[derive(DeriveIden)]
enum ListPolicies {
    Table,
    Id,
    Name,
    TemplateIds,
    Active,
}

#[derive(DeriveIden)]
enum AccessGroups {
    Table,
    Id,
    Name,
    ListPolicyIds,
}

#[derive(DeriveIden)]
enum Actors {
    Table,
    Id,
    ConnectionId,
    User,
    Host,
}

#[derive(DeriveIden)]
enum TargetDatabases {
    Table,
    Id,
    ConnectionId,
    Name,
}

#[derive(DeriveIden)]
enum TargetObjects {
    Table,
    Id,
    DatabaseId,
    Name,
    Kind,
}

#[derive(DeriveIden)]
enum PolicyGrants {
    Table,
    Id,
    ConnectionId,
    TemplateId,
    DatabaseId,
    ActorId,
    ObjectId,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum GroupMemberships {
    Table,
    Id,
    ActorId,
    GroupId,
    CreatedAt,
}

fn catalog_id<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .big_integer()
        .not_null()
        .primary_key()
        .to_owned()
}

fn surrogate_id<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .big_integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PolicyTemplates::Table)
                    .if_not_exists()
                    .col(catalog_id(PolicyTemplates::Id))
                    .col(ColumnDef::new(PolicyTemplates::ActionId).big_integer().not_null())
                    .col(ColumnDef::new(PolicyTemplates::ObjectKind).string())
                    .col(ColumnDef::new(PolicyTemplates::GeneralSql).text())
                    .col(ColumnDef::new(PolicyTemplates::GeneralAllow).string())
                    .col(ColumnDef::new(PolicyTemplates::GeneralDeny).string())
                    .col(ColumnDef::new(PolicyTemplates::SpecificSql).text())
                    .col(ColumnDef::new(PolicyTemplates::SpecificAllow).string())
                    .col(ColumnDef::new(PolicyTemplates::SpecificDeny).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ListPolicies::Table)
                    .if_not_exists()
                    .col(catalog_id(ListPolicies::Id))
                    .col(ColumnDef::new(ListPolicies::Name).string().not_null())
                    .col(
                        ColumnDef::new(ListPolicies::TemplateIds)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(ListPolicies::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AccessGroups::Table)
                    .if_not_exists()
                    .col(catalog_id(AccessGroups::Id))
                    .col(ColumnDef::new(AccessGroups::Name).string().not_null())
                    .col(
                        ColumnDef::new(AccessGroups::ListPolicyIds)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Actors::Table)
                    .if_not_exists()
                    .col(catalog_id(Actors::Id))
                    .col(ColumnDef::new(Actors::ConnectionId).big_integer().not_null())
                    .col(ColumnDef::new(Actors::User).string().not_null())
                    .col(ColumnDef::new(Actors::Host).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TargetDatabases::Table)
                    .if_not_exists()
                    .col(catalog_id(TargetDatabases::Id))
                    .col(
                        ColumnDef::new(TargetDatabases::ConnectionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TargetDatabases::Name).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TargetObjects::Table)
                    .if_not_exists()
                    .col(catalog_id(TargetObjects::Id))
                    .col(ColumnDef::new(TargetObjects::DatabaseId).big_integer().not_null())
                    .col(ColumnDef::new(TargetObjects::Name).string().not_null())
                    .col(ColumnDef::new(TargetObjects::Kind).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_target_objects_database")
                            .from(TargetObjects::Table, TargetObjects::DatabaseId)
                            .to(TargetDatabases::Table, TargetDatabases::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_target_objects_kind_database")
                    .table(TargetObjects::Table)
                    .col(TargetObjects::Kind)
                    .col(TargetObjects::DatabaseId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PolicyGrants::Table)
                    .if_not_exists()
                    .col(surrogate_id(PolicyGrants::Id))
                    .col(ColumnDef::new(PolicyGrants::ConnectionId).big_integer().not_null())
                    .col(ColumnDef::new(PolicyGrants::TemplateId).big_integer().not_null())
                    .col(ColumnDef::new(PolicyGrants::DatabaseId).big_integer().not_null())
                    .col(ColumnDef::new(PolicyGrants::ActorId).big_integer().not_null())
                    .col(ColumnDef::new(PolicyGrants::ObjectId).big_integer().not_null())
                    .col(ColumnDef::new(PolicyGrants::Status).string().not_null())
                    .col(
                        ColumnDef::new(PolicyGrants::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_policy_grants_scope")
                    .table(PolicyGrants::Table)
                    .col(PolicyGrants::ActorId)
                    .col(PolicyGrants::TemplateId)
                    .col(PolicyGrants::DatabaseId)
                    .col(PolicyGrants::ObjectId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // At most one enabled grant per (database, actor, object, template).
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS uq_policy_grants_enabled \
                 ON policy_grants (database_id, actor_id, object_id, template_id) \
                 WHERE status = 'enabled'",
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupMemberships::Table)
                    .if_not_exists()
                    .col(surrogate_id(GroupMemberships::Id))
                    .col(ColumnDef::new(GroupMemberships::ActorId).big_integer().not_null())
                    .col(ColumnDef::new(GroupMemberships::GroupId).big_integer().not_null())
                    .col(
                        ColumnDef::new(GroupMemberships::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_memberships_actor_group")
                    .table(GroupMemberships::Table)
                    .col(GroupMemberships::ActorId)
                    .col(GroupMemberships::GroupId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            GroupMemberships::Table.into_iden(),
            PolicyGrants::Table.into_iden(),
            TargetObjects::Table.into_iden(),
            TargetDatabases::Table.into_iden(),
            Actors::Table.into_iden(),
            AccessGroups::Table.into_iden(),
            ListPolicies::Table.into_iden(),
            PolicyTemplates::Table.into_iden(),
        ] {
            manager
                .drop_table(Table::drop().table(table).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}
