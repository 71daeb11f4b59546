use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use futures::future::BoxFuture;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait};
use tracing::info;

use crate::domain::mrp::far_future;
use crate::entities::bom_line::ConsumeStage;
use crate::entities::item::ProcurementType;
use crate::entities::{bom, bom_line, item, operation, routing, work_center};
use crate::errors::ServiceError;
use crate::services::uom::UomService;

#[derive(Debug, Clone)]
pub struct NewBomLine {
    pub seq: i32,
    pub component_id: i64,
    pub qty_per: Decimal,
    pub unit: String,
    pub scrap_factor: Decimal,
    pub consume_stage: ConsumeStage,
    pub cost_only: bool,
}

#[derive(Debug, Clone)]
pub struct EnrichedBomLine {
    pub component_id: i64,
    pub qty_needed: Decimal,
    pub unit: String,
    pub scrap_factor: Decimal,
    pub consume_stage: ConsumeStage,
    pub cost_only: bool,
}

/// Revision-scoped cache key for cost rollups, invalidated implicitly: a new BOM revision gets
/// a new `bom_id`, so stale entries simply stop being looked up once a revision is superseded.
type CostCacheKey = i64;

pub struct CatalogService {
    db: DatabaseConnection,
    uom: UomService,
    cost_cache: DashMap<CostCacheKey, Decimal>,
}

impl CatalogService {
    pub fn new(db: DatabaseConnection) -> Self {
        let uom = UomService::new(db.clone());
        Self { db, uom, cost_cache: DashMap::new() }
    }

    pub async fn create_bom(
        &self,
        parent_item_id: i64,
        revision: String,
        active: bool,
        effective_from: NaiveDate,
        effective_to: Option<NaiveDate>,
        lines: Vec<NewBomLine>,
    ) -> Result<bom::Model, ServiceError> {
        for line in &lines {
            let mut visited = HashSet::new();
            if self.closure_contains(line.component_id, parent_item_id, &mut visited).await? {
                return Err(ServiceError::BomCycle(parent_item_id));
            }
        }

        let txn = self.db.begin().await?;
        let now = Utc::now();

        if active {
            let siblings = bom::Entity::find()
                .filter(bom::Column::ParentItemId.eq(parent_item_id))
                .filter(bom::Column::Active.eq(true))
                .all(&txn)
                .await?;
            for sibling in siblings {
                let mut active_model: bom::ActiveModel = sibling.into();
                active_model.active = Set(false);
                active_model.effective_to = Set(Some(effective_from));
                active_model.updated_at = Set(now);
                active_model.update(&txn).await?;
            }
        }

        let bom_model = bom::ActiveModel {
            parent_item_id: Set(parent_item_id),
            revision: Set(revision),
            active: Set(active),
            effective_from: Set(effective_from),
            effective_to: Set(effective_to),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for line in lines {
            bom_line::ActiveModel {
                bom_id: Set(bom_model.id),
                seq: Set(line.seq),
                component_id: Set(line.component_id),
                qty_per: Set(line.qty_per),
                unit: Set(line.unit),
                scrap_factor: Set(line.scrap_factor),
                consume_stage: Set(line.consume_stage),
                cost_only: Set(line.cost_only),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        info!(parent_item_id, bom_id = bom_model.id, "BOM revision created");
        Ok(bom_model)
    }

    /// Whether `target` appears anywhere in `component_id`'s transitive active-BOM closure.
    fn closure_contains<'a>(&'a self, component_id: i64, target: i64, visited: &'a mut HashSet<i64>) -> BoxFuture<'a, Result<bool, ServiceError>> {
        Box::pin(async move {
            if component_id == target {
                return Ok(true);
            }
            if !visited.insert(component_id) {
                return Ok(false);
            }
            let Some(active_bom) = self.active_bom_for(component_id, far_future()).await? else {
                return Ok(false);
            };
            let lines = bom_line::Entity::find().filter(bom_line::Column::BomId.eq(active_bom.id)).all(&self.db).await?;
            for line in lines {
                if self.closure_contains(line.component_id, target, visited).await? {
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }

    pub async fn active_bom_for(&self, parent_item_id: i64, at: NaiveDate) -> Result<Option<bom::Model>, ServiceError> {
        let candidates = bom::Entity::find()
            .filter(bom::Column::ParentItemId.eq(parent_item_id))
            .filter(bom::Column::Active.eq(true))
            .filter(bom::Column::EffectiveFrom.lte(at))
            .order_by_desc(bom::Column::Revision)
            .all(&self.db)
            .await?;
        Ok(candidates
            .into_iter()
            .filter(|b| b.effective_to.map(|e| e >= at).unwrap_or(true))
            .next())
    }

    pub async fn bom_lines_enriched(&self, parent_item_id: i64, at: NaiveDate) -> Result<Vec<EnrichedBomLine>, ServiceError> {
        let active_bom = self.active_bom_for(parent_item_id, at).await?.ok_or(ServiceError::MissingActiveBom(parent_item_id))?;
        let lines = bom_line::Entity::find()
            .filter(bom_line::Column::BomId.eq(active_bom.id))
            .order_by_asc(bom_line::Column::Seq)
            .all(&self.db)
            .await?;

        let mut enriched = Vec::with_capacity(lines.len());
        for line in lines {
            let component = item::Entity::find_by_id(line.component_id)
                .one(&self.db)
                .await?
                .ok_or(ServiceError::UnknownItem(line.component_id))?;
            let qty_per = if line.unit != component.stock_unit {
                self.uom.convert(line.qty_per, &line.unit, &component.stock_unit).await?
            } else {
                line.qty_per
            };
            enriched.push(EnrichedBomLine {
                component_id: line.component_id,
                qty_needed: qty_per * (Decimal::ONE + line.scrap_factor),
                unit: component.stock_unit,
                scrap_factor: line.scrap_factor,
                consume_stage: line.consume_stage,
                cost_only: line.cost_only,
            });
        }
        Ok(enriched)
    }

    /// Depth-first cost rollup. `cost_only` lines contribute to cost but are excluded from
    /// `bom_lines_enriched`'s material-planning view. Cached per BOM revision id since a
    /// revision's lines are immutable once created.
    pub async fn rolled_up_cost(&self, parent_item_id: i64, at: NaiveDate) -> Result<Decimal, ServiceError> {
        let item = item::Entity::find_by_id(parent_item_id).one(&self.db).await?.ok_or(ServiceError::UnknownItem(parent_item_id))?;
        if item.procurement == ProcurementType::Buy {
            return Ok(item.standard_cost);
        }
        let Some(active_bom) = self.active_bom_for(parent_item_id, at).await? else {
            return Ok(item.standard_cost);
        };
        if let Some(cached) = self.cost_cache.get(&active_bom.id) {
            return Ok(*cached);
        }

        let lines = bom_line::Entity::find().filter(bom_line::Column::BomId.eq(active_bom.id)).all(&self.db).await?;
        let mut total = Decimal::ZERO;
        for line in lines {
            let component = item::Entity::find_by_id(line.component_id).one(&self.db).await?.ok_or(ServiceError::UnknownItem(line.component_id))?;
            let qty_per = if line.unit != component.stock_unit {
                self.uom.convert(line.qty_per, &line.unit, &component.stock_unit).await?
            } else {
                line.qty_per
            };
            let qty_needed = qty_per * (Decimal::ONE + line.scrap_factor);
            let unit_cost = Box::pin(self.rolled_up_cost(line.component_id, at)).await?;
            total += qty_needed * unit_cost;
        }

        self.cost_cache.insert(active_bom.id, total);
        Ok(total)
    }

    pub async fn create_routing(&self, parent_item_id: i64, revision: String, active: bool, operations: Vec<(i32, i64, Decimal, Decimal, Option<Decimal>)>) -> Result<routing::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        if active {
            let siblings = routing::Entity::find()
                .filter(routing::Column::ParentItemId.eq(parent_item_id))
                .filter(routing::Column::Active.eq(true))
                .all(&txn)
                .await?;
            for sibling in siblings {
                let mut active_model: routing::ActiveModel = sibling.into();
                active_model.active = Set(false);
                active_model.updated_at = Set(now);
                active_model.update(&txn).await?;
            }
        }

        let routing_model = routing::ActiveModel {
            parent_item_id: Set(parent_item_id),
            revision: Set(revision),
            active: Set(active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for (seq, work_center_id, setup_time, run_time_per_unit, rate_override) in operations {
            operation::ActiveModel {
                routing_id: Set(routing_model.id),
                seq: Set(seq),
                work_center_id: Set(work_center_id),
                setup_time: Set(setup_time),
                run_time_per_unit: Set(run_time_per_unit),
                rate_override: Set(rate_override),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(routing_model)
    }

    pub async fn active_routing_for(&self, parent_item_id: i64) -> Result<Option<routing::Model>, ServiceError> {
        Ok(routing::Entity::find()
            .filter(routing::Column::ParentItemId.eq(parent_item_id))
            .filter(routing::Column::Active.eq(true))
            .order_by_desc(routing::Column::Revision)
            .one(&self.db)
            .await?)
    }

    /// Throughput estimate in whole calendar days for producing `quantity` of `parent_item_id`:
    /// sum of setup + run time per routing operation, divided by the work center's daily
    /// capacity, rounded up per operation. Falls back to the item's own `lead_time_days` when it
    /// carries no active routing or no operations, mirroring the estimate `MrpSnapshot` computes
    /// from its in-memory snapshot during a planning run.
    pub async fn routing_throughput_days(&self, parent_item_id: i64, quantity: Decimal) -> Result<i64, ServiceError> {
        let fallback = item::Entity::find_by_id(parent_item_id)
            .one(&self.db)
            .await?
            .map(|i| i.lead_time_days as i64)
            .unwrap_or(0);
        let Some(routing) = self.active_routing_for(parent_item_id).await? else {
            return Ok(fallback);
        };
        let ops = operation::Entity::find()
            .filter(operation::Column::RoutingId.eq(routing.id))
            .all(&self.db)
            .await?;
        if ops.is_empty() {
            return Ok(fallback);
        }
        let mut total_days = Decimal::ZERO;
        for op in ops {
            let time = op.setup_time + op.run_time_per_unit * quantity;
            let capacity = match work_center::Entity::find_by_id(op.work_center_id).one(&self.db).await? {
                Some(wc) if wc.daily_capacity > Decimal::ZERO => wc.daily_capacity,
                _ => Decimal::ONE,
            };
            total_days += (time / capacity).ceil();
        }
        Ok(total_days.round().to_string().parse::<i64>().unwrap_or(fallback))
    }

    pub async fn create_work_center(&self, code: String, kind: String, daily_capacity: Decimal, default_rate: Decimal) -> Result<work_center::Model, ServiceError> {
        Ok(work_center::ActiveModel {
            code: Set(code),
            kind: Set(kind),
            daily_capacity: Set(daily_capacity),
            default_rate: Set(default_rate),
            ..Default::default()
        }
        .insert(&self.db)
        .await?)
    }
}
