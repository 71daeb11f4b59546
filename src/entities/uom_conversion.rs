use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One directed edge of the conversion multigraph: multiplying a quantity in `from_unit` by
/// `factor` yields the equivalent quantity in `to_unit`. Both units must share a dimension.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "uom_conversion")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub from_unit: String,
    pub to_unit: String,
    #[sea_orm(column_type = "Decimal(Some((28, 12)))")]
    pub factor: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::uom_unit::Entity",
        from = "Column::FromUnit",
        to = "super::uom_unit::Column::Code"
    )]
    FromUnit,
}

impl Related<super::uom_unit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FromUnit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
