use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait};
use tracing::info;

use crate::entities::item::{self, ItemKind, ProcurementType};
use crate::entities::{inventory_balance, inventory_txn};
use crate::errors::ServiceError;
use crate::services::inventory_ledger::{InventoryLedgerService, PostTxn};

fn sku_prefix(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::FinishedGood => "FG-",
        ItemKind::Component => "CP-",
        ItemKind::Supply => "SP-",
        ItemKind::Service => "SV-",
    }
}

#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub kind: Option<ItemKind>,
    pub category_material_type_id: Option<i64>,
    pub active: Option<bool>,
    /// When true, only items whose on-hand-at-default-location is at or below `reorder_point`.
    pub low_stock_only: bool,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub sku: Option<String>,
    pub name: String,
    pub kind: ItemKind,
    pub procurement: ProcurementType,
    pub stock_unit: String,
    pub material_type_id: Option<i64>,
    pub color_id: Option<i64>,
    pub standard_cost: Decimal,
    pub reorder_point: Decimal,
    pub safety_stock: Decimal,
    pub lead_time_days: i32,
    pub lot_tracked: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub standard_cost: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
    pub safety_stock: Option<Decimal>,
    pub lead_time_days: Option<i32>,
    pub active: Option<bool>,
}

/// The result of the material-create shortcut: the created item plus the ledger transaction id
/// of its initial receipt, when an initial quantity was supplied.
#[derive(Debug, Clone)]
pub struct MaterialCreated {
    pub item: item::Model,
    pub initial_txn_id: Option<uuid::Uuid>,
}

pub struct ItemMasterService {
    db: DatabaseConnection,
}

impl ItemMasterService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// SKUs are unique case-insensitively; lookups always compare on the lowercased column.
    async fn find_by_sku_ci(&self, sku: &str) -> Result<Option<item::Model>, ServiceError> {
        Ok(item::Entity::find()
            .filter(Expr::expr(Func::lower(Expr::col(item::Column::Sku))).eq(sku.to_lowercase()))
            .one(&self.db)
            .await?)
    }

    async fn next_sku(&self, kind: ItemKind) -> Result<String, ServiceError> {
        let prefix = sku_prefix(kind);
        let existing = item::Entity::find()
            .filter(item::Column::Sku.starts_with(prefix))
            .order_by_desc(item::Column::Sku)
            .all(&self.db)
            .await?;

        let next_n = existing
            .iter()
            .filter_map(|i| i.sku.strip_prefix(prefix))
            .filter_map(|suffix| suffix.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        Ok(format!("{prefix}{next_n:06}"))
    }

    pub async fn create_item(&self, new_item: NewItem) -> Result<item::Model, ServiceError> {
        let sku = match new_item.sku {
            Some(sku) => sku.to_uppercase(),
            None => self.next_sku(new_item.kind).await?,
        };

        if self.find_by_sku_ci(&sku).await?.is_some() {
            return Err(ServiceError::DuplicateSku(sku));
        }

        let now = Utc::now();
        let active_model = item::ActiveModel {
            sku: Set(sku.clone()),
            name: Set(new_item.name),
            kind: Set(new_item.kind),
            procurement: Set(new_item.procurement),
            stock_unit: Set(new_item.stock_unit),
            material_type_id: Set(new_item.material_type_id),
            color_id: Set(new_item.color_id),
            standard_cost: Set(new_item.standard_cost),
            reorder_point: Set(new_item.reorder_point),
            safety_stock: Set(new_item.safety_stock),
            lead_time_days: Set(new_item.lead_time_days),
            lot_tracked: Set(new_item.lot_tracked),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active_model.insert(&self.db).await?;
        if !model.is_valid() {
            return Err(ServiceError::CatalogInconsistency(format!(
                "item {sku} must carry both material_type_id and color_id or neither"
            )));
        }
        info!(sku = %model.sku, "item created");
        Ok(model)
    }

    /// The material-create shortcut: builds the `MAT-{type}-{color}` item and, if `initial_qty`
    /// is positive, posts its initial receipt into the default location, in one transaction.
    pub async fn create_material(
        &self,
        material_type_code: &str,
        color_code: &str,
        material_type_id: i64,
        color_id: i64,
        stock_unit: &str,
        initial_qty: Decimal,
        cost: Decimal,
        default_location_id: i64,
    ) -> Result<MaterialCreated, ServiceError> {
        let sku = format!("MAT-{material_type_code}-{color_code}").to_uppercase();
        if self.find_by_sku_ci(&sku).await?.is_some() {
            return Err(ServiceError::DuplicateSku(sku));
        }

        let txn = self.db.begin().await?;
        let now = Utc::now();
        let active_model = item::ActiveModel {
            sku: Set(sku.clone()),
            name: Set(format!("{material_type_code} {color_code}")),
            kind: Set(ItemKind::Supply),
            procurement: Set(ProcurementType::Buy),
            stock_unit: Set(stock_unit.to_string()),
            material_type_id: Set(Some(material_type_id)),
            color_id: Set(Some(color_id)),
            standard_cost: Set(cost),
            reorder_point: Set(Decimal::ZERO),
            safety_stock: Set(Decimal::ZERO),
            lead_time_days: Set(0),
            lot_tracked: Set(false),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = active_model.insert(&txn).await?;

        let initial_txn_id = if initial_qty > Decimal::ZERO {
            let ledger = InventoryLedgerService::new(self.db.clone());
            let txn_id = ledger
                .post_within(
                    &txn,
                    PostTxn {
                        item_id: model.id,
                        location_id: default_location_id,
                        quantity: initial_qty,
                        kind: inventory_txn::TxnKind::Receipt,
                        ref_kind: "item_create".to_string(),
                        ref_id: sku.clone(),
                        lot_id: None,
                        idempotency_key: None,
                        created_by: "item_master".to_string(),
                    },
                )
                .await?;
            Some(txn_id)
        } else {
            None
        };

        txn.commit().await?;
        info!(sku = %sku, "material item created");
        Ok(MaterialCreated { item: model, initial_txn_id })
    }

    pub async fn update_item(&self, id: i64, update: ItemUpdate) -> Result<item::Model, ServiceError> {
        let existing = item::Entity::find_by_id(id).one(&self.db).await?.ok_or(ServiceError::UnknownItem(id))?;
        let mut active: item::ActiveModel = existing.into();
        if let Some(name) = update.name {
            active.name = Set(name);
        }
        if let Some(cost) = update.standard_cost {
            active.standard_cost = Set(cost);
        }
        if let Some(rop) = update.reorder_point {
            active.reorder_point = Set(rop);
        }
        if let Some(ss) = update.safety_stock {
            active.safety_stock = Set(ss);
        }
        if let Some(lt) = update.lead_time_days {
            active.lead_time_days = Set(lt);
        }
        if let Some(active_flag) = update.active {
            active.active = Set(active_flag);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    pub async fn soft_delete(&self, id: i64) -> Result<(), ServiceError> {
        let existing = item::Entity::find_by_id(id).one(&self.db).await?.ok_or(ServiceError::UnknownItem(id))?;
        let mut active: item::ActiveModel = existing.into();
        active.active = Set(false);
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await?;
        Ok(())
    }

    pub async fn get_by_sku(&self, sku: &str) -> Result<item::Model, ServiceError> {
        self.find_by_sku_ci(sku).await?.ok_or_else(|| ServiceError::UnknownItem(0))
    }

    pub async fn list(&self, filter: ItemFilter) -> Result<Vec<item::Model>, ServiceError> {
        let mut query = item::Entity::find();
        if let Some(kind) = filter.kind {
            query = query.filter(item::Column::Kind.eq(kind));
        }
        if let Some(mt) = filter.category_material_type_id {
            query = query.filter(item::Column::MaterialTypeId.eq(mt));
        }
        if let Some(active) = filter.active {
            query = query.filter(item::Column::Active.eq(active));
        }
        let items = query.all(&self.db).await?;

        if !filter.low_stock_only {
            return Ok(items);
        }

        let mut low_stock = Vec::new();
        for i in items {
            let on_hand: Decimal = inventory_balance::Entity::find()
                .filter(inventory_balance::Column::ItemId.eq(i.id))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|b| b.on_hand)
                .sum();
            if on_hand <= i.reorder_point {
                low_stock.push(i);
            }
        }
        Ok(low_stock)
    }
}
