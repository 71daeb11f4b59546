use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::{info, warn};

use crate::entities::bom_line::ConsumeStage;
use crate::entities::inventory_reservation::{self, ReservationStatus};
use crate::entities::inventory_txn::TxnKind;
use crate::entities::production_order::{self, ProductionOrderStatus};
use crate::entities::sales_order::{self, SalesOrderStatus};
use crate::errors::ServiceError;
use crate::services::catalog::CatalogService;
use crate::services::inventory_ledger::{InventoryLedgerService, PostTxn};

#[derive(Debug, Clone)]
pub struct NewProductionOrder {
    pub item_id: i64,
    pub qty_ordered: Decimal,
    pub sales_order_id: Option<i64>,
    pub sales_order_line_id: Option<i64>,
    pub needed_date: Option<NaiveDate>,
    pub work_center_id: Option<i64>,
}

/// The 7 statuses in `ProductionOrderStatus` plus the `split` terminal form a linear happy path
/// (draft -> released -> in_progress -> qc -> complete -> shipped) with two exits (cancel, split)
/// reachable from any non-terminal status.
pub struct ProductionLifecycleService {
    db: DatabaseConnection,
    ledger: InventoryLedgerService,
    catalog: CatalogService,
    allow_oversell: bool,
}

fn transition_error(from: ProductionOrderStatus, to: &str) -> ServiceError {
    ServiceError::InvalidTransition {
        from: format!("{from:?}"),
        to: to.to_string(),
    }
}

impl ProductionLifecycleService {
    pub fn new(db: DatabaseConnection, allow_negative_on_hand: bool, allow_oversell: bool) -> Self {
        let ledger = InventoryLedgerService::with_policy(db.clone(), allow_negative_on_hand, allow_oversell);
        let catalog = CatalogService::new(db.clone());
        Self { db, ledger, catalog, allow_oversell }
    }

    async fn next_code(&self) -> Result<String, ServiceError> {
        let existing = production_order::Entity::find()
            .filter(production_order::Column::Code.starts_with("PO-"))
            .order_by_desc(production_order::Column::Code)
            .all(&self.db)
            .await?;
        let next_n = existing
            .iter()
            .filter_map(|p| p.code.strip_prefix("PO-"))
            .filter_map(|suffix| suffix.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        Ok(format!("PO-{next_n:06}"))
    }

    pub async fn create(&self, new_order: NewProductionOrder) -> Result<production_order::Model, ServiceError> {
        let code = self.next_code().await?;
        let now = Utc::now();
        let model = production_order::ActiveModel {
            code: Set(code),
            item_id: Set(new_order.item_id),
            qty_ordered: Set(new_order.qty_ordered),
            qty_completed: Set(Decimal::ZERO),
            qty_scrapped: Set(Decimal::ZERO),
            status: Set(ProductionOrderStatus::Draft),
            sales_order_id: Set(new_order.sales_order_id),
            sales_order_line_id: Set(new_order.sales_order_line_id),
            parent_po_id: Set(None),
            needed_date: Set(new_order.needed_date),
            work_center_id: Set(new_order.work_center_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        info!(code = %model.code, "production order created");
        Ok(model)
    }

    async fn load(&self, id: i64) -> Result<production_order::Model, ServiceError> {
        production_order::Entity::find_by_id(id).one(&self.db).await?.ok_or_else(|| ServiceError::UnknownOrder(id.to_string()))
    }

    async fn set_status(&self, po: &production_order::Model, status: ProductionOrderStatus) -> Result<production_order::Model, ServiceError> {
        let mut active: production_order::ActiveModel = po.clone().into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    /// Reserves up to `required` of `component_id`, reserving whatever is actually available
    /// instead of failing the whole order when one component is short. The gap between what was
    /// reserved and what was required is picked up downstream by the blocking-issues analyzer,
    /// which compares required quantity against total available stock independently.
    async fn reserve_best_effort(&self, component_id: i64, location_id: i64, required: Decimal, ref_id: &str) -> Result<(), ServiceError> {
        if required <= Decimal::ZERO {
            return Ok(());
        }
        let available = self.ledger.available(component_id, location_id).await?;
        let to_reserve = required.min(available);
        if to_reserve <= Decimal::ZERO {
            warn!(component_id, %required, "no stock available to reserve; component is fully short");
            return Ok(());
        }
        if to_reserve < required {
            warn!(component_id, %required, reserved = %to_reserve, "reservation is partial; shortage surfaces as a blocking issue");
        }
        self.ledger.reserve(component_id, location_id, to_reserve, "production_order".to_string(), ref_id.to_string()).await?;
        Ok(())
    }

    /// Reserves every production-stage BOM component at `location_id` against the order's
    /// outstanding quantity. Called once, at release. A component with insufficient stock is
    /// reserved as far as it goes rather than aborting the release; the order still moves to
    /// `Released` and the shortage shows up as a blocking issue for the caller to resolve.
    pub async fn release(&self, id: i64, location_id: i64) -> Result<production_order::Model, ServiceError> {
        let po = self.load(id).await?;
        if po.status != ProductionOrderStatus::Draft {
            return Err(transition_error(po.status, "released"));
        }

        let lines = self.catalog.bom_lines_enriched(po.item_id, po.needed_date.unwrap_or_else(|| Utc::now().date_naive())).await?;
        for line in lines.iter().filter(|l| !l.cost_only && l.consume_stage == ConsumeStage::Production) {
            let required = line.qty_needed * po.qty_ordered;
            self.reserve_best_effort(line.component_id, location_id, required, &po.code).await?;
        }

        info!(code = %po.code, "production order released, materials reserved as far as stock allows");
        self.set_status(&po, ProductionOrderStatus::Released).await
    }

    pub async fn start(&self, id: i64) -> Result<production_order::Model, ServiceError> {
        let po = self.load(id).await?;
        if po.status != ProductionOrderStatus::Released {
            return Err(transition_error(po.status, "in_progress"));
        }
        self.set_status(&po, ProductionOrderStatus::InProgress).await
    }

    async fn reservations_for(&self, po: &production_order::Model) -> Result<Vec<inventory_reservation::Model>, ServiceError> {
        Ok(inventory_reservation::Entity::find()
            .filter(inventory_reservation::Column::RefKind.eq("production_order"))
            .filter(inventory_reservation::Column::RefId.eq(po.code.clone()))
            .filter(inventory_reservation::Column::Status.eq(ReservationStatus::Active))
            .all(&self.db)
            .await?)
    }

    /// Consumes reserved production-stage materials, receives the completed finished-good
    /// quantity, and posts any scrap, then moves the order into quality inspection.
    pub async fn complete_operation(&self, id: i64, location_id: i64, qty_completed: Decimal, qty_scrapped: Decimal) -> Result<production_order::Model, ServiceError> {
        let po = self.load(id).await?;
        if po.status != ProductionOrderStatus::InProgress {
            return Err(transition_error(po.status, "qc"));
        }
        let total_after = po.qty_completed + qty_completed + po.qty_scrapped + qty_scrapped;
        if total_after > po.qty_ordered {
            return Err(ServiceError::InvalidTransition {
                from: format!("{} already accounted for", po.qty_completed + po.qty_scrapped),
                to: format!("{total_after} exceeds qty_ordered {}", po.qty_ordered),
            });
        }

        for reservation in self.reservations_for(&po).await? {
            let remaining = reservation.remaining();
            if remaining > Decimal::ZERO {
                self.ledger.consume(reservation.id, remaining, "production_order".to_string(), po.code.clone()).await?;
            }
        }

        if qty_completed > Decimal::ZERO {
            self.ledger
                .post(PostTxn {
                    item_id: po.item_id,
                    location_id,
                    quantity: qty_completed,
                    kind: TxnKind::Receipt,
                    ref_kind: "production_order".to_string(),
                    ref_id: po.code.clone(),
                    lot_id: None,
                    idempotency_key: None,
                    created_by: "production_lifecycle".to_string(),
                })
                .await?;
        }
        if qty_scrapped > Decimal::ZERO {
            self.ledger
                .post(PostTxn {
                    item_id: po.item_id,
                    location_id,
                    quantity: -qty_scrapped,
                    kind: TxnKind::Scrap,
                    ref_kind: "production_order".to_string(),
                    ref_id: po.code.clone(),
                    lot_id: None,
                    idempotency_key: None,
                    created_by: "production_lifecycle".to_string(),
                })
                .await?;
        }

        let mut active: production_order::ActiveModel = po.clone().into();
        active.qty_completed = Set(po.qty_completed + qty_completed);
        active.qty_scrapped = Set(po.qty_scrapped + qty_scrapped);
        active.status = Set(ProductionOrderStatus::Qc);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&self.db).await?;
        info!(code = %po.code, %qty_completed, %qty_scrapped, "production operation complete, sent to QC");
        Ok(updated)
    }

    /// Passes quality inspection. If the order is linked to a sales order and the order's lines
    /// are now fully covered by completed production, the sales order advances to ready-to-ship.
    pub async fn pass_qc(&self, id: i64) -> Result<production_order::Model, ServiceError> {
        let po = self.load(id).await?;
        if po.status != ProductionOrderStatus::Qc {
            return Err(transition_error(po.status, "complete"));
        }
        let updated = self.set_status(&po, ProductionOrderStatus::Complete).await?;

        if let Some(so_id) = updated.sales_order_id {
            let lines = crate::entities::sales_order_line::Entity::find()
                .filter(crate::entities::sales_order_line::Column::SoId.eq(so_id))
                .all(&self.db)
                .await?;
            let mut fully_covered = true;
            for line in &lines {
                let completed: Decimal = production_order::Entity::find()
                    .filter(production_order::Column::SalesOrderLineId.eq(line.id))
                    .filter(production_order::Column::Status.is_in(vec![ProductionOrderStatus::Complete, ProductionOrderStatus::Shipped]))
                    .all(&self.db)
                    .await?
                    .into_iter()
                    .map(|p| p.qty_completed)
                    .sum();
                if completed < line.qty_ordered {
                    fully_covered = false;
                    break;
                }
            }
            if fully_covered {
                if let Some(so) = sales_order::Entity::find_by_id(so_id).one(&self.db).await? {
                    if so.status == SalesOrderStatus::InProgress {
                        let mut active: sales_order::ActiveModel = so.into();
                        active.status = Set(SalesOrderStatus::ReadyToShip);
                        active.updated_at = Set(Utc::now());
                        active.update(&self.db).await?;
                    }
                }
            }
        }

        Ok(updated)
    }

    /// Releases any still-active reservations and marks the order cancelled. Valid from any
    /// non-terminal status.
    pub async fn cancel(&self, id: i64) -> Result<production_order::Model, ServiceError> {
        let po = self.load(id).await?;
        if po.is_terminal() {
            return Err(transition_error(po.status, "cancelled"));
        }
        for reservation in self.reservations_for(&po).await? {
            self.ledger.release(reservation.id).await?;
        }
        self.set_status(&po, ProductionOrderStatus::Cancelled).await
    }

    /// Splits an order into child orders with the given quantities, which must sum to the
    /// parent's outstanding (ordered minus completed) quantity. Active reservations are released
    /// on the parent and re-reserved per child proportionally, preserving pegging by reference.
    pub async fn split(&self, id: i64, location_id: i64, child_quantities: Vec<Decimal>) -> Result<Vec<production_order::Model>, ServiceError> {
        let po = self.load(id).await?;
        if !matches!(po.status, ProductionOrderStatus::Released | ProductionOrderStatus::InProgress) {
            return Err(transition_error(po.status, "split"));
        }
        let outstanding = po.qty_ordered - po.qty_completed;
        let total: Decimal = child_quantities.iter().sum();
        if total != outstanding {
            return Err(ServiceError::InvalidTransition {
                from: format!("{outstanding}"),
                to: format!("sum of child quantities {total}"),
            });
        }

        let reservations = self.reservations_for(&po).await?;
        for reservation in &reservations {
            self.ledger.release(reservation.id).await?;
        }

        let mut children = Vec::with_capacity(child_quantities.len());
        for qty in child_quantities {
            let code = self.next_code().await?;
            let now = Utc::now();
            let child = production_order::ActiveModel {
                code: Set(code.clone()),
                item_id: Set(po.item_id),
                qty_ordered: Set(qty),
                qty_completed: Set(Decimal::ZERO),
                qty_scrapped: Set(Decimal::ZERO),
                status: Set(po.status),
                sales_order_id: Set(po.sales_order_id),
                sales_order_line_id: Set(po.sales_order_line_id),
                parent_po_id: Set(Some(po.id)),
                needed_date: Set(po.needed_date),
                work_center_id: Set(po.work_center_id),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&self.db)
            .await?;

            let lines = self.catalog.bom_lines_enriched(po.item_id, po.needed_date.unwrap_or_else(|| Utc::now().date_naive())).await?;
            for line in lines.iter().filter(|l| !l.cost_only && l.consume_stage == ConsumeStage::Production) {
                let required = line.qty_needed * qty;
                self.reserve_best_effort(line.component_id, location_id, required, &code).await?;
            }
            children.push(child);
        }

        let mut parent_active: production_order::ActiveModel = po.clone().into();
        parent_active.status = Set(ProductionOrderStatus::Split);
        parent_active.updated_at = Set(Utc::now());
        parent_active.update(&self.db).await?;

        info!(code = %po.code, children = children.len(), "production order split");
        Ok(children)
    }

    /// Consumes shipping-stage materials, posts the shipment, and marks the order shipped.
    /// Requires the order to be complete and, if oversell is not allowed, the shipping-stage
    /// materials to be available.
    pub async fn ship(&self, id: i64, location_id: i64) -> Result<production_order::Model, ServiceError> {
        let po = self.load(id).await?;
        if po.status != ProductionOrderStatus::Complete {
            return Err(ServiceError::ShipmentBlocked(format!("production order {} is not complete", po.code)));
        }

        let lines = self.catalog.bom_lines_enriched(po.item_id, po.needed_date.unwrap_or_else(|| Utc::now().date_naive())).await?;
        for line in lines.iter().filter(|l| !l.cost_only && l.consume_stage == ConsumeStage::Shipping) {
            let required = line.qty_needed * po.qty_completed;
            if required <= Decimal::ZERO {
                continue;
            }
            let available = self.ledger.available(line.component_id, location_id).await?;
            if !self.allow_oversell && available < required {
                return Err(ServiceError::ShipmentBlocked(format!("shipping material {} short: need {required}, have {available}", line.component_id)));
            }
            let reservation_id = self.ledger.reserve(line.component_id, location_id, required, "production_order".to_string(), po.code.clone()).await?;
            self.ledger.consume(reservation_id, required, "production_order".to_string(), po.code.clone()).await?;
        }

        self.ledger
            .post(PostTxn {
                item_id: po.item_id,
                location_id,
                quantity: -po.qty_completed,
                kind: TxnKind::Shipment,
                ref_kind: "production_order".to_string(),
                ref_id: po.code.clone(),
                lot_id: None,
                idempotency_key: None,
                created_by: "production_lifecycle".to_string(),
            })
            .await?;

        info!(code = %po.code, "production order shipped");
        self.set_status(&po, ProductionOrderStatus::Shipped).await
    }
}
