use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One header row per invocation of `services::mrp::run`, persisted purely for
/// traceability/debugging — the planned orders it produced are ephemeral by default and are
/// only visible through `PlannedOrderSnapshot` rows tied to this run.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mrp_run")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub horizon_days: i32,
    pub sub_assembly_cascading: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub planned_order_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::planned_order_snapshot::Entity")]
    PlannedOrderSnapshots,
}

impl Related<super::planned_order_snapshot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PlannedOrderSnapshots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
