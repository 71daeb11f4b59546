use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which stage of the production order lifecycle consumes this line. `Shipping`-stage lines
/// (packaging, labels) are consumed at `ship`, not at `complete operation`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ConsumeStage {
    #[sea_orm(string_value = "production")]
    Production,
    #[sea_orm(string_value = "shipping")]
    Shipping,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bom_line")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub bom_id: i64,
    pub seq: i32,
    pub component_id: i64,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub qty_per: Decimal,
    pub unit: String,
    #[sea_orm(column_type = "Decimal(Some((9, 6)))")]
    pub scrap_factor: Decimal,
    pub consume_stage: ConsumeStage,
    pub cost_only: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bom::Entity",
        from = "Column::BomId",
        to = "super::bom::Column::Id"
    )]
    Bom,
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ComponentId",
        to = "super::item::Column::Id"
    )]
    ComponentItem,
}

impl Related<super::bom::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bom.def()
    }
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ComponentItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
