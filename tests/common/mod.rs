use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;

use stateset_planner::entities::item::{ItemKind, ProcurementType};
use stateset_planner::entities::{item, location, uom_conversion, uom_unit};
use stateset_planner::migrator::Migrator;

/// A fresh in-memory SQLite database with the full schema applied, isolated per test.
pub async fn test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.expect("connect sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    db
}

pub async fn default_location(db: &DatabaseConnection) -> location::Model {
    location::ActiveModel {
        code: Set("MAIN".to_string()),
        name: Set("Main warehouse".to_string()),
        is_default: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert location")
}

#[derive(Debug, Clone)]
pub struct ItemSpec {
    pub sku: &'static str,
    pub name: &'static str,
    pub kind: ItemKind,
    pub procurement: ProcurementType,
    pub stock_unit: &'static str,
    pub on_hand: Decimal,
    pub lead_time_days: i32,
    pub safety_stock: Decimal,
}

impl ItemSpec {
    pub fn make(sku: &'static str, stock_unit: &'static str, lead_time_days: i32) -> Self {
        Self {
            sku,
            name: sku,
            kind: ItemKind::FinishedGood,
            procurement: ProcurementType::Make,
            stock_unit,
            on_hand: Decimal::ZERO,
            lead_time_days,
            safety_stock: Decimal::ZERO,
        }
    }

    pub fn buy(sku: &'static str, stock_unit: &'static str, lead_time_days: i32) -> Self {
        Self {
            sku,
            name: sku,
            kind: ItemKind::Component,
            procurement: ProcurementType::Buy,
            stock_unit,
            on_hand: Decimal::ZERO,
            lead_time_days,
            safety_stock: Decimal::ZERO,
        }
    }

    pub fn with_on_hand(mut self, qty: Decimal) -> Self {
        self.on_hand = qty;
        self
    }
}

/// Inserts an item and, if `on_hand` is positive, an inventory balance row for it at `location`.
pub async fn create_item(db: &DatabaseConnection, location_id: i64, spec: ItemSpec) -> item::Model {
    let now = Utc::now();
    let model = item::ActiveModel {
        sku: Set(spec.sku.to_string()),
        name: Set(spec.name.to_string()),
        kind: Set(spec.kind),
        procurement: Set(spec.procurement),
        stock_unit: Set(spec.stock_unit.to_string()),
        material_type_id: Set(None),
        color_id: Set(None),
        standard_cost: Set(Decimal::ONE),
        reorder_point: Set(Decimal::ZERO),
        safety_stock: Set(spec.safety_stock),
        lead_time_days: Set(spec.lead_time_days),
        lot_tracked: Set(false),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert item");

    if spec.on_hand > Decimal::ZERO {
        stateset_planner::entities::inventory_balance::ActiveModel {
            item_id: Set(model.id),
            location_id: Set(location_id),
            on_hand: Set(spec.on_hand),
            reserved: Set(Decimal::ZERO),
            available: Set(spec.on_hand),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("insert balance");
    }
    model
}

pub async fn seed_mass_units(db: &DatabaseConnection) {
    use stateset_planner::entities::uom_unit::Dimension;
    for (code, dim) in [("kg", Dimension::Mass), ("g", Dimension::Mass), ("each", Dimension::Count)] {
        uom_unit::ActiveModel { code: Set(code.to_string()), dimension: Set(dim) }.insert(db).await.expect("insert unit");
    }
    uom_conversion::ActiveModel {
        from_unit: Set("g".to_string()),
        to_unit: Set("kg".to_string()),
        factor: Set(Decimal::new(1, 3)),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert conversion g->kg");
    uom_conversion::ActiveModel {
        from_unit: Set("kg".to_string()),
        to_unit: Set("g".to_string()),
        factor: Set(Decimal::new(1000, 0)),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert conversion kg->g");
}
