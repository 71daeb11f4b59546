use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only ledger entry kind. Transfers are posted as a paired `TransferOut`/`TransferIn`
/// with equal magnitude rather than a single signed move, so every row's sign matches its own
/// direction and the ledger never needs a compound transaction type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum TxnKind {
    #[sea_orm(string_value = "receipt")]
    Receipt,
    #[sea_orm(string_value = "issue")]
    Issue,
    #[sea_orm(string_value = "consumption")]
    Consumption,
    #[sea_orm(string_value = "reservation")]
    Reservation,
    #[sea_orm(string_value = "reservation_release")]
    ReservationRelease,
    #[sea_orm(string_value = "transfer_out")]
    TransferOut,
    #[sea_orm(string_value = "transfer_in")]
    TransferIn,
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
    #[sea_orm(string_value = "scrap")]
    Scrap,
    #[sea_orm(string_value = "shipment")]
    Shipment,
}

impl TxnKind {
    /// Reservation and release kinds move `reserved`, not `on_hand` — every other kind moves
    /// `on_hand` by its signed quantity.
    pub fn affects_on_hand(&self) -> bool {
        !matches!(self, TxnKind::Reservation | TxnKind::ReservationRelease)
    }
}

/// An immutable row in the inventory ledger. `quantity` is signed and already expressed in the
/// item's `stock_unit` — any UOM conversion happens before the transaction is built, never here.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_txn")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub item_id: i64,
    pub location_id: i64,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,
    pub kind: TxnKind,
    pub ref_kind: String,
    pub ref_id: String,
    pub lot_id: Option<i64>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::Id"
    )]
    Item,
    #[sea_orm(
        belongs_to = "super::location::Entity",
        from = "Column::LocationId",
        to = "super::location::Column::Id"
    )]
    Location,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
