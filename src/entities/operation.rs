use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A single step of a routing. `seq` values are unique and strictly increasing within a routing.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "operation")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub routing_id: i64,
    pub seq: i32,
    pub work_center_id: i64,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub setup_time: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub run_time_per_unit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub rate_override: Option<Decimal>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::routing::Entity",
        from = "Column::RoutingId",
        to = "super::routing::Column::Id"
    )]
    Routing,
    #[sea_orm(
        belongs_to = "super::work_center::Entity",
        from = "Column::WorkCenterId",
        to = "super::work_center::Column::Id"
    )]
    WorkCenter,
}

impl Related<super::routing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Routing.def()
    }
}

impl Related<super::work_center::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkCenter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
