use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use crate::domain::uom::ConversionGraph;
use crate::entities::item::{self, ItemKind, ProcurementType};
use crate::entities::planned_order_snapshot::PlannedOrderKind;
use crate::entities::{bom, bom_line, operation, routing, work_center};
use crate::errors::ServiceError;

/// One unit of gross demand fed into a run: a confirmed sales order line, a firm planned order,
/// or a synthetic safety-stock line. `ref_kind`/`ref_id` become the pegging back-reference.
#[derive(Debug, Clone)]
pub struct DemandLine {
    pub item_id: i64,
    pub quantity: Decimal,
    pub need_date: NaiveDate,
    pub ref_kind: String,
    pub ref_id: String,
}

/// Back-reference from a planned order to one of the demand lines it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct Peg {
    pub demand_ref_kind: String,
    pub demand_ref_id: String,
    pub quantity: Decimal,
}

#[derive(Debug, Clone)]
pub struct PlannedOrder {
    pub kind: PlannedOrderKind,
    pub item_id: i64,
    pub quantity: Decimal,
    pub release_date: NaiveDate,
    pub need_date: NaiveDate,
    pub pegging: Vec<Peg>,
}

#[derive(Debug, Clone)]
pub struct MrpWarning {
    pub item_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct MrpOutput {
    pub planned_orders: Vec<PlannedOrder>,
    pub warnings: Vec<MrpWarning>,
}

/// A fully preloaded, in-memory view of the catalog and ledger an MRP run needs. Built once by
/// `services::mrp` from a consistent database snapshot; the algorithm in this module never
/// queries a connection, so it holds no cursor across the computation (per the "explicit
/// preloading" redesign).
#[derive(Debug, Clone, Default)]
pub struct PlanningSnapshot {
    pub items: HashMap<i64, item::Model>,
    pub boms_by_parent: HashMap<i64, Vec<bom::Model>>,
    pub bom_lines_by_bom: HashMap<i64, Vec<bom_line::Model>>,
    pub routings_by_parent: HashMap<i64, Vec<routing::Model>>,
    pub operations_by_routing: HashMap<i64, Vec<operation::Model>>,
    pub work_centers: HashMap<i64, work_center::Model>,
    /// `on_hand - reserved` per item, summed across all locations.
    pub available_by_item: HashMap<i64, Decimal>,
    /// Open purchase-order coverage per item: `(expected_date, qty_remaining)`.
    pub scheduled_receipts_by_item: HashMap<i64, Vec<(NaiveDate, Decimal)>>,
    pub conversions: ConversionGraph,
    pub rounding_scale: u32,
}

impl PlanningSnapshot {
    pub fn item(&self, item_id: i64) -> Result<&item::Model, ServiceError> {
        self.items.get(&item_id).ok_or(ServiceError::UnknownItem(item_id))
    }

    /// The active BOM revision for a parent item, highest revision string wins on ties at the
    /// same effective date.
    pub fn active_bom_for(&self, parent_item_id: i64, at: NaiveDate) -> Option<&bom::Model> {
        self.boms_by_parent
            .get(&parent_item_id)?
            .iter()
            .filter(|b| b.active && b.effective_from <= at && b.effective_to.map(|e| e >= at).unwrap_or(true))
            .max_by(|a, b| a.revision.cmp(&b.revision))
    }

    pub fn bom_lines(&self, bom_id: i64) -> &[bom_line::Model] {
        self.bom_lines_by_bom.get(&bom_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn active_routing_for(&self, parent_item_id: i64) -> Option<&routing::Model> {
        self.routings_by_parent
            .get(&parent_item_id)?
            .iter()
            .filter(|r| r.active)
            .max_by(|a, b| a.revision.cmp(&b.revision))
    }

    /// Lead time in whole calendar days for a given planned quantity. Buy items use the vendor
    /// lead time on the item master; make items use the routing throughput estimate (sum of
    /// setup + run time per operation, divided by the work center's daily capacity, rounded up),
    /// falling back to the item's own `lead_time_days` when it carries no active routing.
    pub fn lead_time_days(&self, item_id: i64, quantity: Decimal) -> i64 {
        let Some(item) = self.items.get(&item_id) else {
            return 0;
        };
        if item.procurement == ProcurementType::Buy {
            return item.lead_time_days as i64;
        }
        match self.active_routing_for(item_id) {
            Some(routing) => {
                let ops = self.operations_by_routing.get(&routing.id).map(Vec::as_slice).unwrap_or(&[]);
                if ops.is_empty() {
                    return item.lead_time_days as i64;
                }
                let mut total_days = Decimal::ZERO;
                for op in ops {
                    let time = op.setup_time + op.run_time_per_unit * quantity;
                    let capacity = self
                        .work_centers
                        .get(&op.work_center_id)
                        .map(|wc| wc.daily_capacity)
                        .filter(|c| *c > Decimal::ZERO)
                        .unwrap_or(Decimal::ONE);
                    total_days += (time / capacity).ceil();
                }
                total_days.round().to_string().parse::<i64>().unwrap_or(item.lead_time_days as i64)
            }
            None => item.lead_time_days as i64,
        }
    }

    fn on_hand_minus_reserved(&self, item_id: i64) -> Decimal {
        self.available_by_item.get(&item_id).copied().unwrap_or(Decimal::ZERO)
    }

    fn scheduled_receipts_on(&self, item_id: i64, date: NaiveDate) -> Decimal {
        self.scheduled_receipts_by_item
            .get(&item_id)
            .map(|rows| rows.iter().filter(|(d, _)| *d == date).map(|(_, q)| *q).sum())
            .unwrap_or(Decimal::ZERO)
    }
}

/// Assigns each item touched by `demand` a BOM depth ("level"): 0 for items with direct demand,
/// N for a component reached only through N levels of explosion. Processing levels in ascending
/// order guarantees a parent's planned orders exist before its children are netted. Detects BOM
/// cycles via a per-root ancestor path, not a global visited set, so legitimate diamond-shaped
/// dependencies (two parents sharing a component) are not mistaken for cycles.
fn compute_levels(snapshot: &PlanningSnapshot, demand: &[DemandLine]) -> Result<HashMap<i64, u32>, ServiceError> {
    let mut levels = HashMap::new();
    for line in demand {
        visit_level(snapshot, line.item_id, 0, &mut levels, &mut Vec::new())?;
    }
    Ok(levels)
}

fn visit_level(
    snapshot: &PlanningSnapshot,
    item_id: i64,
    depth: u32,
    levels: &mut HashMap<i64, u32>,
    path: &mut Vec<i64>,
) -> Result<(), ServiceError> {
    if path.contains(&item_id) {
        return Err(ServiceError::BomCycle(item_id));
    }
    let item = snapshot.item(item_id)?;
    let entry = levels.entry(item_id).or_insert(depth);
    if depth > *entry {
        *entry = depth;
    }
    if item.kind == ItemKind::Service || item.procurement == ProcurementType::Buy {
        return Ok(());
    }
    let Some(bom) = snapshot.active_bom_for(item_id, far_future()) else {
        return Ok(());
    };
    path.push(item_id);
    for line in snapshot.bom_lines(bom.id) {
        if line.cost_only {
            continue;
        }
        visit_level(snapshot, line.component_id, depth + 1, levels, path)?;
    }
    path.pop();
    Ok(())
}

/// A date past any realistic BOM effective range, used where level computation needs "is this
/// BOM active at all" rather than "is it active on a specific planning date".
pub fn far_future() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap()
}

/// Runs the full collect -> explode -> net -> generate -> peg -> cascade pipeline described for
/// the MRP engine. Processes items level-by-level (top of the BOM first) so a parent's planned
/// orders are known before its components are netted.
pub fn run(snapshot: &PlanningSnapshot, demand: &[DemandLine], cascade_sub_assembly: bool, include_safety_stock: bool) -> Result<MrpOutput, ServiceError> {
    let levels = compute_levels(snapshot, demand)?;
    let max_level = levels.values().copied().max().unwrap_or(0);

    let mut gross: HashMap<(i64, NaiveDate), Decimal> = HashMap::new();
    let mut pegs: HashMap<(i64, NaiveDate), Vec<Peg>> = HashMap::new();
    let mut bucket_root: HashMap<(i64, NaiveDate), NaiveDate> = HashMap::new();
    let mut warnings = Vec::new();
    let mut planned_orders = Vec::new();

    for line in demand {
        let item = snapshot.item(line.item_id)?;
        if !item.active {
            warnings.push(MrpWarning {
                item_id: line.item_id,
                message: "demand on inactive item skipped".to_string(),
            });
            continue;
        }
        *gross.entry((line.item_id, line.need_date)).or_insert(Decimal::ZERO) += line.quantity;
        bucket_root.entry((line.item_id, line.need_date)).or_insert(line.need_date);
        pegs.entry((line.item_id, line.need_date)).or_default().push(Peg {
            demand_ref_kind: line.ref_kind.clone(),
            demand_ref_id: line.ref_id.clone(),
            quantity: line.quantity,
        });
    }

    for lvl in 0..=max_level {
        let mut items_at_level: Vec<i64> = levels.iter().filter(|(_, &l)| l == lvl).map(|(&id, _)| id).collect();
        items_at_level.sort_unstable();

        for item_id in items_at_level {
            let item = snapshot.item(item_id)?;
            if !item.active {
                continue;
            }
            let mut buckets: Vec<NaiveDate> = gross.keys().filter(|(id, _)| *id == item_id).map(|(_, d)| *d).collect();
            if buckets.is_empty() {
                continue;
            }
            buckets.sort();
            buckets.dedup();

            let safety_stock = if include_safety_stock { item.safety_stock } else { Decimal::ZERO };
            let mut projected_available = snapshot.on_hand_minus_reserved(item_id);

            for t in buckets {
                let gross_t = *gross.get(&(item_id, t)).unwrap_or(&Decimal::ZERO);
                let scheduled_t = snapshot.scheduled_receipts_on(item_id, t);
                let deficit = if safety_stock > Decimal::ZERO {
                    (safety_stock - (projected_available + scheduled_t - gross_t)).max(Decimal::ZERO)
                } else {
                    Decimal::ZERO
                };
                let net_required = (gross_t - projected_available - scheduled_t + deficit).max(Decimal::ZERO);
                projected_available = projected_available + scheduled_t - gross_t + net_required;

                if projected_available < Decimal::ZERO {
                    warnings.push(MrpWarning {
                        item_id,
                        message: format!("projected available goes negative ({projected_available}) at {t}"),
                    });
                }

                if net_required <= Decimal::ZERO {
                    continue;
                }

                let root_date = *bucket_root.get(&(item_id, t)).unwrap_or(&t);
                let lead = snapshot.lead_time_days(item_id, net_required);
                let release_date = if lead == 0 { t } else { t - Duration::days(lead) };

                let contributors = pegs.get(&(item_id, t)).cloned().unwrap_or_default();
                let gross_sum: Decimal = contributors.iter().map(|p| p.quantity).sum();
                let scale = if gross_sum.is_zero() { Decimal::ZERO } else { net_required / gross_sum };
                let scaled_pegs: Vec<Peg> = contributors
                    .iter()
                    .map(|p| Peg {
                        demand_ref_kind: p.demand_ref_kind.clone(),
                        demand_ref_id: p.demand_ref_id.clone(),
                        quantity: (p.quantity * scale).round_dp(snapshot.rounding_scale),
                    })
                    .collect();

                let kind = match item.procurement {
                    ProcurementType::Buy => PlannedOrderKind::Buy,
                    ProcurementType::Make | ProcurementType::MakeOrBuy => PlannedOrderKind::Make,
                };
                planned_orders.push(PlannedOrder {
                    kind,
                    item_id,
                    quantity: net_required,
                    release_date,
                    need_date: t,
                    pegging: scaled_pegs,
                });

                if matches!(item.procurement, ProcurementType::Make | ProcurementType::MakeOrBuy) {
                    let Some(bom) = snapshot.active_bom_for(item_id, t) else {
                        return Err(ServiceError::MissingActiveBom(item_id));
                    };
                    let base_date = if cascade_sub_assembly { t } else { root_date };
                    for line in snapshot.bom_lines(bom.id) {
                        if line.cost_only {
                            continue;
                        }
                        let component = snapshot.item(line.component_id)?;
                        let qty_per = if line.unit != component.stock_unit {
                            snapshot.conversions.convert(line.qty_per, &line.unit, &component.stock_unit, snapshot.rounding_scale)?
                        } else {
                            line.qty_per
                        };
                        let qty_needed = qty_per * (Decimal::ONE + line.scrap_factor) * net_required;
                        let component_lead = snapshot.lead_time_days(line.component_id, qty_needed);
                        let child_date = base_date - Duration::days(component_lead);

                        *gross.entry((line.component_id, child_date)).or_insert(Decimal::ZERO) += qty_needed;
                        bucket_root.entry((line.component_id, child_date)).or_insert(root_date);
                        pegs.entry((line.component_id, child_date)).or_default().push(Peg {
                            demand_ref_kind: "planned_order".to_string(),
                            demand_ref_id: format!("{item_id}@{t}"),
                            quantity: qty_needed,
                        });
                    }
                }
            }
        }
    }

    Ok(MrpOutput { planned_orders, warnings })
}
