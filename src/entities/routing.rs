use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A revision of the sequence of operations used to produce `parent_item_id`, mirroring
/// `bom::Model`'s revision/active shape.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "routing")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub parent_item_id: i64,
    pub revision: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ParentItemId",
        to = "super::item::Column::Id"
    )]
    ParentItem,
    #[sea_orm(has_many = "super::operation::Entity")]
    Operations,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ParentItem.def()
    }
}

impl Related<super::operation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Operations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
