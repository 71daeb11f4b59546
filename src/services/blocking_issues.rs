use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::domain::blocking_issues::{Analysis, Issue, IssueType, MaterialShortfall};
use crate::entities::production_order::ProductionOrderStatus;
use crate::entities::purchase_order::PurchaseOrderStatus;
use crate::entities::{
    inventory_balance, production_order, purchase_order, purchase_order_line, sales_order,
    sales_order_line,
};
use crate::errors::ServiceError;
use crate::services::catalog::CatalogService;

/// Finds what stands between a sales order or production order and being shippable/completable,
/// per the taxonomy in `domain::blocking_issues`: missing or incomplete production, material
/// shortages (with purchase-order coverage checked before calling a shortage blocking), and
/// inventory tied up in other reservations.
pub struct BlockingIssuesService {
    db: DatabaseConnection,
    catalog: CatalogService,
}

impl BlockingIssuesService {
    pub fn new(db: DatabaseConnection) -> Self {
        let catalog = CatalogService::new(db.clone());
        Self { db, catalog }
    }

    async fn balances(&self, item_id: i64) -> Result<Vec<inventory_balance::Model>, ServiceError> {
        Ok(inventory_balance::Entity::find().filter(inventory_balance::Column::ItemId.eq(item_id)).all(&self.db).await?)
    }

    async fn open_po_coverage(&self, item_id: i64, shortage: Decimal) -> Result<Option<(purchase_order::Model, purchase_order_line::Model)>, ServiceError> {
        let open_lines = purchase_order_line::Entity::find()
            .filter(purchase_order_line::Column::ItemId.eq(item_id))
            .all(&self.db)
            .await?;
        for line in open_lines {
            let remaining = line.qty_ordered - line.qty_received;
            if remaining < shortage {
                continue;
            }
            let Some(po) = purchase_order::Entity::find_by_id(line.po_id).one(&self.db).await? else {
                continue;
            };
            if matches!(po.status, PurchaseOrderStatus::Ordered | PurchaseOrderStatus::Partial) {
                return Ok(Some((po, line)));
            }
        }
        Ok(None)
    }

    /// Material shortfall for one component given a required quantity, against total available
    /// inventory across all locations (ledger reservations already netted out). Carries the raw
    /// on-hand total too, so a caller can tell a true physical shortage apart from stock that
    /// exists but is tied up in someone else's reservation.
    async fn material_shortfall(&self, item_id: i64, required: Decimal) -> Result<Option<MaterialShortfall>, ServiceError> {
        let balances = self.balances(item_id).await?;
        let on_hand: Decimal = balances.iter().map(|b| b.on_hand).sum();
        let available: Decimal = balances.iter().map(|b| b.on_hand - b.reserved).sum();
        if required <= available {
            return Ok(None);
        }
        Ok(Some(MaterialShortfall {
            item_id,
            required,
            available,
            on_hand,
            shortage: required - available,
        }))
    }

    async fn production_issues_for(&self, po: &production_order::Model, issues: &mut Vec<Issue>, latest_ready: &mut Option<NaiveDate>) -> Result<(), ServiceError> {
        match po.status {
            ProductionOrderStatus::Draft | ProductionOrderStatus::Released | ProductionOrderStatus::InProgress => {
                issues.push(Issue {
                    issue_type: IssueType::ProductionIncomplete,
                    item_id: Some(po.item_id),
                    message: format!("production order {} is still {:?}", po.code, po.status),
                    reference_type: "production_order".to_string(),
                    reference_id: po.id.to_string(),
                });
                if let Some(needed) = po.needed_date {
                    *latest_ready = Some(latest_ready.map_or(needed, |d| d.max(needed)));
                }
            }
            ProductionOrderStatus::Qc => {
                issues.push(Issue {
                    issue_type: IssueType::QualityHold,
                    item_id: Some(po.item_id),
                    message: format!("production order {} is awaiting quality inspection", po.code),
                    reference_type: "production_order".to_string(),
                    reference_id: po.id.to_string(),
                });
            }
            ProductionOrderStatus::Complete | ProductionOrderStatus::Shipped | ProductionOrderStatus::Cancelled | ProductionOrderStatus::Split => {}
        }

        if matches!(po.status, ProductionOrderStatus::Released | ProductionOrderStatus::InProgress) {
            let needed_date = po.needed_date.unwrap_or_else(|| Utc::now().date_naive());
            let enriched = self.catalog.bom_lines_enriched(po.item_id, needed_date).await;
            if let Ok(lines) = enriched {
                let outstanding = po.qty_ordered - po.qty_completed;
                for line in lines {
                    if line.cost_only {
                        continue;
                    }
                    let required = line.qty_needed * outstanding;
                    if let Some(shortfall) = self.material_shortfall(line.component_id, required).await? {
                        self.push_shortage_issue(shortfall, po.item_id, outstanding, issues, latest_ready).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Pushes the issue a material shortfall resolves to. Stock that's physically on hand but
    /// tied up in someone else's reservation is an `InventoryReserved` warning, not a shortage: no
    /// purchase order or production order fixes it, reassigning the competing reservation does.
    /// A genuine shortage covered by an open purchase order threads that PO's `expected_date`
    /// plus the owning production order's routing throughput into `latest_ready`, so the analysis
    /// reports when the order could realistically complete rather than just that it's blocked.
    async fn push_shortage_issue(
        &self,
        shortfall: MaterialShortfall,
        parent_item_id: i64,
        outstanding: Decimal,
        issues: &mut Vec<Issue>,
        latest_ready: &mut Option<NaiveDate>,
    ) -> Result<(), ServiceError> {
        if shortfall.on_hand >= shortfall.required {
            issues.push(Issue {
                issue_type: IssueType::InventoryReserved,
                item_id: Some(shortfall.item_id),
                message: format!(
                    "{} on hand but reserved elsewhere, short {} net of other reservations",
                    shortfall.on_hand, shortfall.shortage
                ),
                reference_type: "item".to_string(),
                reference_id: shortfall.item_id.to_string(),
            });
            return Ok(());
        }
        if let Some((po, _line)) = self.open_po_coverage(shortfall.item_id, shortfall.shortage).await? {
            if let Some(expected) = po.expected_date {
                let throughput = self.catalog.routing_throughput_days(parent_item_id, outstanding).await?;
                let ready = expected + chrono::Duration::days(throughput);
                *latest_ready = Some(latest_ready.map_or(ready, |d| d.max(ready)));
            }
            issues.push(Issue {
                issue_type: IssueType::PurchasePending,
                item_id: Some(shortfall.item_id),
                message: format!("{} short, covered by open purchase order {}", shortfall.shortage, po.code),
                reference_type: "purchase_order".to_string(),
                reference_id: po.id.to_string(),
            });
        } else {
            issues.push(Issue {
                issue_type: IssueType::MaterialShortage,
                item_id: Some(shortfall.item_id),
                message: format!("short {} of item {}, no open purchase order covers it", shortfall.shortage, shortfall.item_id),
                reference_type: "item".to_string(),
                reference_id: shortfall.item_id.to_string(),
            });
        }
        Ok(())
    }

    /// True when every issue found is a `Warning` (nothing truly blocks), the case the covering
    /// PO's `expected_date` can't already have set `latest_ready` for.
    fn all_warnings_only(issues: &[Issue]) -> bool {
        !issues.is_empty() && issues.iter().all(|i| i.severity() == crate::domain::blocking_issues::Severity::Warning)
    }

    fn build_actions(issues: &[Issue]) -> Vec<crate::domain::blocking_issues::ResolutionAction> {
        use crate::domain::blocking_issues::ResolutionAction;
        let mut actions = Vec::new();
        for issue in issues {
            let action = match issue.issue_type {
                IssueType::PurchasePending => Some((0, "expedite the open purchase order")),
                IssueType::MaterialShortage => Some((1, "create a purchase order to cover the shortage")),
                IssueType::ProductionIncomplete => Some((2, "complete the in-flight production order")),
                IssueType::ProductionMissing => Some((3, "create a production order")),
                IssueType::InventoryReserved => Some((4, "reassign the competing reservation")),
                IssueType::QualityHold => None,
            };
            if let Some((priority, description)) = action {
                actions.push(ResolutionAction {
                    priority,
                    description: description.to_string(),
                    reference_type: issue.reference_type.clone(),
                    reference_id: issue.reference_id.clone(),
                });
            }
        }
        actions.sort_by_key(|a| a.priority);
        actions
    }

    pub async fn production_order_issues(&self, production_order_id: i64) -> Result<Analysis, ServiceError> {
        let po = production_order::Entity::find_by_id(production_order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::UnknownOrder(production_order_id.to_string()))?;

        let mut issues = Vec::new();
        let mut estimated_ready_date = None;
        self.production_issues_for(&po, &mut issues, &mut estimated_ready_date).await?;
        if estimated_ready_date.is_none() && Self::all_warnings_only(&issues) {
            let outstanding = po.qty_ordered - po.qty_completed;
            let throughput = self.catalog.routing_throughput_days(po.item_id, outstanding).await?;
            estimated_ready_date = Some(Utc::now().date_naive() + chrono::Duration::days(throughput));
        }

        let actions = Self::build_actions(&issues);
        let can_proceed = !issues.iter().any(|i| i.severity() == crate::domain::blocking_issues::Severity::Blocking);
        Ok(Analysis {
            can_proceed,
            issue_count: issues.len(),
            estimated_ready_date,
            issues,
            actions,
        })
    }

    pub async fn sales_order_issues(&self, sales_order_id: i64) -> Result<Analysis, ServiceError> {
        let so = sales_order::Entity::find_by_id(sales_order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::UnknownOrder(sales_order_id.to_string()))?;
        let lines = sales_order_line::Entity::find()
            .filter(sales_order_line::Column::SoId.eq(so.id))
            .all(&self.db)
            .await?;

        let mut issues = Vec::new();
        let mut estimated_ready_date = None;
        let mut fallback_source: Option<(i64, Decimal)> = None;

        for line in &lines {
            let outstanding = line.qty_ordered - line.qty_allocated;
            if outstanding <= Decimal::ZERO {
                continue;
            }

            let backing_orders = production_order::Entity::find()
                .filter(production_order::Column::SalesOrderLineId.eq(line.id))
                .all(&self.db)
                .await?;

            if backing_orders.is_empty() {
                issues.push(Issue {
                    issue_type: IssueType::ProductionMissing,
                    item_id: Some(line.item_id),
                    message: format!("sales order line {} has no production order", line.id),
                    reference_type: "sales_order_line".to_string(),
                    reference_id: line.id.to_string(),
                });
                continue;
            }

            for po in &backing_orders {
                self.production_issues_for(po, &mut issues, &mut estimated_ready_date).await?;
                if matches!(po.status, ProductionOrderStatus::Released | ProductionOrderStatus::InProgress) {
                    fallback_source = Some((po.item_id, po.qty_ordered - po.qty_completed));
                }
            }
        }
        if estimated_ready_date.is_none() && Self::all_warnings_only(&issues) {
            if let Some((item_id, outstanding)) = fallback_source {
                let throughput = self.catalog.routing_throughput_days(item_id, outstanding).await?;
                estimated_ready_date = Some(Utc::now().date_naive() + chrono::Duration::days(throughput));
            }
        }

        let actions = Self::build_actions(&issues);
        let can_proceed = !issues.iter().any(|i| i.severity() == crate::domain::blocking_issues::Severity::Blocking);
        Ok(Analysis {
            can_proceed,
            issue_count: issues.len(),
            estimated_ready_date,
            issues,
            actions,
        })
    }
}
