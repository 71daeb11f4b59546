use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ProductionOrderStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "released")]
    Released,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "qc")]
    Qc,
    #[sea_orm(string_value = "complete")]
    Complete,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "split")]
    Split,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "production_order")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub code: String,
    pub item_id: i64,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub qty_ordered: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub qty_completed: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub qty_scrapped: Decimal,
    pub status: ProductionOrderStatus,
    pub sales_order_id: Option<i64>,
    pub sales_order_line_id: Option<i64>,
    pub parent_po_id: Option<i64>,
    pub needed_date: Option<NaiveDate>,
    pub work_center_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
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
        belongs_to = "super::sales_order_line::Entity",
        from = "Column::SalesOrderLineId",
        to = "super::sales_order_line::Column::Id"
    )]
    SalesOrderLine,
    #[sea_orm(
        belongs_to = "super::work_center::Entity",
        from = "Column::WorkCenterId",
        to = "super::work_center::Column::Id"
    )]
    WorkCenter,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl Related<super::sales_order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SalesOrderLine.def()
    }
}

impl Related<super::work_center::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkCenter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ProductionOrderStatus::Shipped | ProductionOrderStatus::Cancelled | ProductionOrderStatus::Split
        )
    }
}
