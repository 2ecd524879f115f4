use sea_orm::{EntityTrait, Schema};
use sea_orm_migration::prelude::*;

use crate::entity::{audit_logs, cart_items, carts, order_items, orders, products, users};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(manager.get_database_backend());

        // Parents before children so foreign keys resolve.
        create_table(manager, &schema, users::Entity).await?;
        create_table(manager, &schema, products::Entity).await?;
        create_table(manager, &schema, carts::Entity).await?;
        create_table(manager, &schema, cart_items::Entity).await?;
        create_table(manager, &schema, orders::Entity).await?;
        create_table(manager, &schema, order_items::Entity).await?;
        create_table(manager, &schema, audit_logs::Entity).await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_user_id")
                    .table(orders::Entity)
                    .col(orders::Column::UserId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_order_items_order_id")
                    .table(order_items::Entity)
                    .col(order_items::Column::OrderId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .unique()
                    .name("idx_cart_items_cart_product")
                    .table(cart_items::Entity)
                    .col(cart_items::Column::CartId)
                    .col(cart_items::Column::ProductId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_table(manager, audit_logs::Entity).await?;
        drop_table(manager, order_items::Entity).await?;
        drop_table(manager, orders::Entity).await?;
        drop_table(manager, cart_items::Entity).await?;
        drop_table(manager, carts::Entity).await?;
        drop_table(manager, products::Entity).await?;
        drop_table(manager, users::Entity).await?;
        Ok(())
    }
}

async fn create_table<E>(manager: &SchemaManager<'_>, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    manager
        .create_table(schema.create_table_from_entity(entity).if_not_exists().to_owned())
        .await
}

async fn drop_table<E>(manager: &SchemaManager<'_>, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    manager
        .drop_table(Table::drop().table(entity).if_exists().to_owned())
        .await
}
