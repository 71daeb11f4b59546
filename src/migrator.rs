use sea_orm::Schema;
use sea_orm_migration::prelude::*;

use crate::entities::{
    bom, bom_line, idempotency_key, inventory_balance, inventory_lot, inventory_lot_allocation,
    inventory_reservation, inventory_txn, item, location, mrp_run, operation,
    planned_order_snapshot, production_order, purchase_order, purchase_order_line, routing,
    sales_order, sales_order_line, uom_conversion, uom_unit, work_center,
};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20240101_000001_create_core_schema::Migration)]
    }
}

/// One migration creating every table this crate owns. There is no history of prior schema
/// revisions to replay, so the full 21-table schema lands in a single step rather than the
/// incremental per-feature migrations a long-lived deployment would accumulate.
mod m20240101_000001_create_core_schema {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_core_schema"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let builder = manager.get_database_backend();
            let schema = Schema::new(builder);

            manager.create_table(schema.create_table_from_entity(item::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(location::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(inventory_balance::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(inventory_txn::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(inventory_reservation::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(inventory_lot::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(inventory_lot_allocation::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(idempotency_key::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(bom::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(bom_line::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(routing::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(operation::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(work_center::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(production_order::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(sales_order::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(sales_order_line::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(purchase_order::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(purchase_order_line::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(uom_unit::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(uom_conversion::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(mrp_run::Entity)).await?;
            manager.create_table(schema.create_table_from_entity(planned_order_snapshot::Entity)).await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            macro_rules! drop_entity {
                ($entity:expr) => {
                    manager.drop_table(Table::drop().table($entity).if_exists().to_owned()).await?;
                };
            }

            drop_entity!(planned_order_snapshot::Entity);
            drop_entity!(mrp_run::Entity);
            drop_entity!(uom_conversion::Entity);
            drop_entity!(uom_unit::Entity);
            drop_entity!(purchase_order_line::Entity);
            drop_entity!(purchase_order::Entity);
            drop_entity!(sales_order_line::Entity);
            drop_entity!(sales_order::Entity);
            drop_entity!(production_order::Entity);
            drop_entity!(work_center::Entity);
            drop_entity!(operation::Entity);
            drop_entity!(routing::Entity);
            drop_entity!(bom_line::Entity);
            drop_entity!(bom::Entity);
            drop_entity!(idempotency_key::Entity);
            drop_entity!(inventory_lot_allocation::Entity);
            drop_entity!(inventory_lot::Entity);
            drop_entity!(inventory_reservation::Entity);
            drop_entity!(inventory_txn::Entity);
            drop_entity!(inventory_balance::Entity);
            drop_entity!(location::Entity);
            drop_entity!(item::Entity);

            Ok(())
        }
    }
}
