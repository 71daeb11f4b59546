pub mod blocking_issues;
pub mod catalog;
pub mod inventory_ledger;
pub mod item_master;
pub mod mrp;
pub mod production_lifecycle;
pub mod uom;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use blocking_issues::BlockingIssuesService;
use catalog::CatalogService;
use inventory_ledger::InventoryLedgerService;
use item_master::ItemMasterService;
use mrp::MrpService;
use production_lifecycle::ProductionLifecycleService;
use uom::UomService;

/// Constructs every service from one shared connection and the resolved configuration, the way
/// a deployment's composition root would. Each service owns its own lightweight handle (a clone
/// of the pool, plus whatever policy flags it needs) rather than sharing a single facade object,
/// so services can be used independently in tests without pulling in the others.
pub struct ServiceFactory {
    db: DatabaseConnection,
    config: AppConfig,
}

impl ServiceFactory {
    pub fn new(db: DatabaseConnection, config: AppConfig) -> Self {
        Self { db, config }
    }

    pub fn item_master(&self) -> ItemMasterService {
        ItemMasterService::new(self.db.clone())
    }

    pub fn inventory_ledger(&self) -> InventoryLedgerService {
        InventoryLedgerService::with_policy(
            self.db.clone(),
            self.config.inventory_allow_negative_on_hand,
            self.config.inventory_allow_oversell,
        )
    }

    pub fn catalog(&self) -> CatalogService {
        CatalogService::new(self.db.clone())
    }

    pub fn uom(&self) -> UomService {
        UomService::with_rounding_scale(self.db.clone(), self.config.uom_rounding_scale)
    }

    pub fn mrp(&self) -> MrpService {
        MrpService::new(self.db.clone(), self.config.uom_rounding_scale)
    }

    pub fn blocking_issues(&self) -> BlockingIssuesService {
        BlockingIssuesService::new(self.db.clone())
    }

    pub fn production_lifecycle(&self) -> ProductionLifecycleService {
        ProductionLifecycleService::new(
            self.db.clone(),
            self.config.inventory_allow_negative_on_hand,
            self.config.inventory_allow_oversell,
        )
    }

    pub fn default_mrp_trigger(&self) -> mrp::MrpTrigger {
        mrp::MrpTrigger {
            include_safety_stock: true,
            horizon_days: self.config.mrp_default_horizon_days as i64,
            cascade_sub_assembly_due_dates: self.config.mrp_enable_sub_assembly_cascading,
            items_filter: None,
        }
    }
}
