use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The physical dimension a unit belongs to. Conversion across dimensions is never valid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Dimension {
    #[sea_orm(string_value = "mass")]
    Mass,
    #[sea_orm(string_value = "time")]
    Time,
    #[sea_orm(string_value = "count")]
    Count,
    #[sea_orm(string_value = "length")]
    Length,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "uom_unit")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
    pub dimension: Dimension,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
