use std::collections::HashMap;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::domain::mrp::{self, DemandLine, MrpOutput, PlanningSnapshot};
use crate::entities::sales_order::SalesOrderStatus;
use crate::entities::{
    bom, bom_line, inventory_balance, item, mrp_run, operation, planned_order_snapshot,
    purchase_order, purchase_order_line, routing, sales_order, sales_order_line, work_center,
};
use crate::errors::ServiceError;
use crate::services::uom::UomService;

#[derive(Debug, Clone)]
pub struct MrpTrigger {
    pub include_safety_stock: bool,
    pub horizon_days: i64,
    pub cascade_sub_assembly_due_dates: bool,
    pub items_filter: Option<Vec<i64>>,
}

pub struct MrpService {
    db: DatabaseConnection,
    rounding_scale: u32,
}

impl MrpService {
    pub fn new(db: DatabaseConnection, rounding_scale: u32) -> Self {
        Self { db, rounding_scale }
    }

    async fn build_snapshot(&self, items_filter: &Option<Vec<i64>>) -> Result<PlanningSnapshot, ServiceError> {
        let mut query = item::Entity::find().filter(item::Column::Active.eq(true));
        if let Some(ids) = items_filter {
            query = query.filter(item::Column::Id.is_in(ids.clone()));
        }
        let items: HashMap<i64, item::Model> = query.all(&self.db).await?.into_iter().map(|i| (i.id, i)).collect();

        let all_boms = bom::Entity::find().all(&self.db).await?;
        let mut boms_by_parent: HashMap<i64, Vec<bom::Model>> = HashMap::new();
        for b in all_boms {
            boms_by_parent.entry(b.parent_item_id).or_default().push(b);
        }

        let all_bom_lines = bom_line::Entity::find().all(&self.db).await?;
        let mut bom_lines_by_bom: HashMap<i64, Vec<bom_line::Model>> = HashMap::new();
        for l in all_bom_lines {
            bom_lines_by_bom.entry(l.bom_id).or_default().push(l);
        }

        let all_routings = routing::Entity::find().all(&self.db).await?;
        let mut routings_by_parent: HashMap<i64, Vec<routing::Model>> = HashMap::new();
        for r in all_routings {
            routings_by_parent.entry(r.parent_item_id).or_default().push(r);
        }

        let all_operations = operation::Entity::find().all(&self.db).await?;
        let mut operations_by_routing: HashMap<i64, Vec<operation::Model>> = HashMap::new();
        for op in all_operations {
            operations_by_routing.entry(op.routing_id).or_default().push(op);
        }

        let work_centers: HashMap<i64, work_center::Model> = work_center::Entity::find().all(&self.db).await?.into_iter().map(|w| (w.id, w)).collect();

        let mut available_by_item: HashMap<i64, Decimal> = HashMap::new();
        for balance in inventory_balance::Entity::find().all(&self.db).await? {
            *available_by_item.entry(balance.item_id).or_insert(Decimal::ZERO) += balance.on_hand - balance.reserved;
        }

        let mut scheduled_receipts_by_item: HashMap<i64, Vec<(chrono::NaiveDate, Decimal)>> = HashMap::new();
        let open_pos = purchase_order::Entity::find()
            .filter(purchase_order::Column::Status.is_in(vec![
                purchase_order::PurchaseOrderStatus::Ordered,
                purchase_order::PurchaseOrderStatus::Partial,
            ]))
            .all(&self.db)
            .await?;
        let open_po_ids: Vec<i64> = open_pos.iter().map(|p| p.id).collect();
        let expected_by_po: HashMap<i64, Option<chrono::NaiveDate>> = open_pos.iter().map(|p| (p.id, p.expected_date)).collect();
        if !open_po_ids.is_empty() {
            for line in purchase_order_line::Entity::find().filter(purchase_order_line::Column::PoId.is_in(open_po_ids)).all(&self.db).await? {
                if let Some(Some(expected)) = expected_by_po.get(&line.po_id) {
                    let remaining = line.qty_ordered - line.qty_received;
                    if remaining > Decimal::ZERO {
                        scheduled_receipts_by_item.entry(line.item_id).or_default().push((*expected, remaining));
                    }
                }
            }
        }

        let conversions = UomService::with_rounding_scale(self.db.clone(), self.rounding_scale).load_graph().await?;

        Ok(PlanningSnapshot {
            items,
            boms_by_parent,
            bom_lines_by_bom,
            routings_by_parent,
            operations_by_routing,
            work_centers,
            available_by_item,
            scheduled_receipts_by_item,
            conversions,
            rounding_scale: self.rounding_scale,
        })
    }

    async fn collect_demand(&self, horizon_days: i64) -> Result<Vec<DemandLine>, ServiceError> {
        let horizon_end = Utc::now().date_naive() + Duration::days(horizon_days);
        let confirmed_orders = sales_order::Entity::find()
            .filter(sales_order::Column::Status.is_in(vec![SalesOrderStatus::Confirmed, SalesOrderStatus::InProgress]))
            .all(&self.db)
            .await?;

        let mut demand = Vec::new();
        for so in confirmed_orders {
            let need_date = so.requested_date.unwrap_or(horizon_end);
            if need_date > horizon_end {
                continue;
            }
            let lines = sales_order_line::Entity::find().filter(sales_order_line::Column::SoId.eq(so.id)).all(&self.db).await?;
            for line in lines {
                let outstanding = line.qty_ordered - line.qty_allocated;
                if outstanding <= Decimal::ZERO {
                    continue;
                }
                demand.push(DemandLine {
                    item_id: line.item_id,
                    quantity: outstanding,
                    need_date,
                    ref_kind: "sales_order_line".to_string(),
                    ref_id: line.id.to_string(),
                });
            }
        }
        Ok(demand)
    }

    pub async fn run(&self, trigger: MrpTrigger) -> Result<(mrp_run::Model, MrpOutput), ServiceError> {
        let snapshot = self.build_snapshot(&trigger.items_filter).await?;
        let demand = self.collect_demand(trigger.horizon_days).await?;

        for line in &demand {
            if !snapshot.items.contains_key(&line.item_id) {
                return Err(ServiceError::UnknownItem(line.item_id));
            }
        }

        let output = mrp::run(&snapshot, &demand, trigger.cascade_sub_assembly_due_dates, trigger.include_safety_stock)?;

        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let run_model = mrp_run::ActiveModel {
            id: Set(run_id),
            horizon_days: Set(trigger.horizon_days as i32),
            sub_assembly_cascading: Set(trigger.cascade_sub_assembly_due_dates),
            started_at: Set(started_at),
            completed_at: Set(Some(Utc::now())),
            planned_order_count: Set(output.planned_orders.len() as i32),
        }
        .insert(&self.db)
        .await?;

        for planned in &output.planned_orders {
            let pegging = json!(planned
                .pegging
                .iter()
                .map(|p| json!({
                    "demand_ref_kind": p.demand_ref_kind,
                    "demand_ref_id": p.demand_ref_id,
                    "quantity": p.quantity,
                }))
                .collect::<Vec<_>>());

            planned_order_snapshot::ActiveModel {
                mrp_run_id: Set(run_id),
                kind: Set(planned.kind),
                item_id: Set(planned.item_id),
                quantity: Set(planned.quantity),
                release_date: Set(planned.release_date),
                need_date: Set(planned.need_date),
                pegging: Set(pegging),
                ..Default::default()
            }
            .insert(&self.db)
            .await?;
        }

        info!(%run_id, planned_orders = output.planned_orders.len(), warnings = output.warnings.len(), "MRP run complete");
        Ok((run_model, output))
    }
}
