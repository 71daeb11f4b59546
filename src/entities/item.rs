use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What an item is, for planning purposes. Services are never stocked; finished goods are
/// produced via a BOM; components and supplies are stocked and consumed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum ItemKind {
    #[sea_orm(string_value = "finished_good")]
    FinishedGood,
    #[sea_orm(string_value = "component")]
    Component,
    #[sea_orm(string_value = "supply")]
    Supply,
    #[sea_orm(string_value = "service")]
    Service,
}

/// Whether an item is produced in-house, purchased, or either.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ProcurementType {
    #[sea_orm(string_value = "make")]
    Make,
    #[sea_orm(string_value = "buy")]
    Buy,
    #[sea_orm(string_value = "make_or_buy")]
    MakeOrBuy,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "item")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub sku: String,
    pub name: String,
    pub kind: ItemKind,
    pub procurement: ProcurementType,
    pub stock_unit: String,
    pub material_type_id: Option<i64>,
    pub color_id: Option<i64>,
    pub standard_cost: Decimal,
    pub reorder_point: Decimal,
    pub safety_stock: Decimal,
    /// Vendor lead time in calendar days, used by MRP for buy items. Ignored for make items,
    /// whose lead time is the routing throughput estimate computed at explosion time.
    pub lead_time_days: i32,
    pub lot_tracked: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::inventory_balance::Entity")]
    InventoryBalances,
    #[sea_orm(has_many = "super::bom::Entity")]
    Boms,
    #[sea_orm(has_many = "super::bom_line::Entity")]
    BomLinesAsComponent,
    #[sea_orm(has_many = "super::production_order::Entity")]
    ProductionOrders,
    #[sea_orm(has_many = "super::sales_order_line::Entity")]
    SalesOrderLines,
    #[sea_orm(has_many = "super::purchase_order_line::Entity")]
    PurchaseOrderLines,
}

impl Related<super::inventory_balance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryBalances.def()
    }
}

impl Related<super::bom::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Boms.def()
    }
}

impl Related<super::bom_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BomLinesAsComponent.def()
    }
}

impl Related<super::production_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductionOrders.def()
    }
}

impl Related<super::sales_order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SalesOrderLines.def()
    }
}

impl Related<super::purchase_order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrderLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Material items (color + printer-material variants) must carry both attributes; service
    /// items never carry inventory.
    pub fn is_valid(&self) -> bool {
        if self.kind == ItemKind::Service {
            return true;
        }
        if self.material_type_id.is_some() != self.color_id.is_some() {
            return false;
        }
        true
    }
}
