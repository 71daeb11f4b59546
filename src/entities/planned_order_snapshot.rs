use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum PlannedOrderKind {
    #[sea_orm(string_value = "make")]
    Make,
    #[sea_orm(string_value = "buy")]
    Buy,
}

/// A snapshot of one planned order produced by an MRP run, kept for inspection. `pegging` is a
/// JSON array of `{demand_ref_kind, demand_ref_id, quantity}` entries, not a relational join
/// table, since the set only needs to be read back whole.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "planned_order_snapshot")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub mrp_run_id: Uuid,
    pub kind: PlannedOrderKind,
    pub item_id: i64,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,
    pub release_date: NaiveDate,
    pub need_date: NaiveDate,
    #[sea_orm(column_type = "JsonBinary")]
    pub pegging: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::mrp_run::Entity",
        from = "Column::MrpRunId",
        to = "super::mrp_run::Column::Id"
    )]
    MrpRun,
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::Id"
    )]
    Item,
}

impl Related<super::mrp_run::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MrpRun.def()
    }
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
