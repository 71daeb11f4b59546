use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Records which lot(s) a consumption drew from, for lot-tracked items. One `InventoryTxn` of
/// kind `consumption` against a lot-tracked item may span several lots; each span gets a row here.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_lot_allocation")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub lot_id: i64,
    pub txn_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::inventory_lot::Entity",
        from = "Column::LotId",
        to = "super::inventory_lot::Column::Id"
    )]
    InventoryLot,
    #[sea_orm(
        belongs_to = "super::inventory_txn::Entity",
        from = "Column::TxnId",
        to = "super::inventory_txn::Column::Id"
    )]
    InventoryTxn,
}

impl Related<super::inventory_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryLot.def()
    }
}

impl Related<super::inventory_txn::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryTxn.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
