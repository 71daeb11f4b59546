mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};

use stateset_planner::entities::bom_line::ConsumeStage;
use stateset_planner::entities::item::{ItemKind, ProcurementType};
use stateset_planner::entities::planned_order_snapshot;
use stateset_planner::entities::sales_order::SalesOrderStatus;
use stateset_planner::services::catalog::{CatalogService, NewBomLine};
use stateset_planner::services::item_master::{ItemFilter, ItemMasterService, ItemUpdate, NewItem};
use stateset_planner::services::mrp::{MrpService, MrpTrigger};
use stateset_planner::services::uom::UomService;
use stateset_planner::ServiceError;

use common::{create_item, default_location, seed_mass_units, test_db, ItemSpec};

fn new_finished_good(name: &str) -> NewItem {
    NewItem {
        sku: None,
        name: name.to_string(),
        kind: ItemKind::FinishedGood,
        procurement: ProcurementType::Make,
        stock_unit: "each".to_string(),
        material_type_id: None,
        color_id: None,
        standard_cost: Decimal::ZERO,
        reorder_point: Decimal::ZERO,
        safety_stock: Decimal::ZERO,
        lead_time_days: 0,
        lot_tracked: false,
    }
}

/// SKUs auto-generate with the kind-specific prefix and a zero-padded sequence, and a caller
/// supplying a SKU that collides with an existing one is rejected.
#[tokio::test]
async fn item_master_sku_generation_and_duplicate_rejection() {
    let db = test_db().await;
    let items = ItemMasterService::new(db.clone());

    let widget = items.create_item(new_finished_good("Widget")).await.unwrap();
    assert_eq!(widget.sku, "FG-000001");
    let gadget = items.create_item(new_finished_good("Gadget")).await.unwrap();
    assert_eq!(gadget.sku, "FG-000002");

    let mut explicit = new_finished_good("Widget Pro");
    explicit.sku = Some("FG-000001".to_string());
    let err = items.create_item(explicit).await.unwrap_err();
    assert_matches!(err, ServiceError::DuplicateSku(sku) if sku == "FG-000001");
}

/// SKUs are unique case-insensitively: a caller-supplied SKU differing only in case from an
/// existing one is rejected, and `get_by_sku` finds it regardless of the case queried with.
#[tokio::test]
async fn sku_lookup_and_uniqueness_are_case_insensitive() {
    let db = test_db().await;
    let items = ItemMasterService::new(db.clone());

    let mut widget = new_finished_good("Widget");
    widget.sku = Some("widget-1".to_string());
    let created = items.create_item(widget).await.unwrap();
    assert_eq!(created.sku, "WIDGET-1");

    let mut clash = new_finished_good("Widget Again");
    clash.sku = Some("Widget-1".to_string());
    let err = items.create_item(clash).await.unwrap_err();
    assert_matches!(err, ServiceError::DuplicateSku(_));

    let found = items.get_by_sku("widget-1").await.unwrap();
    assert_eq!(found.id, created.id);
}

/// The material-create shortcut builds a `MAT-{type}-{color}` SKU and, when given a positive
/// initial quantity, posts it as a receipt in the same transaction the item is created in.
#[tokio::test]
async fn create_material_posts_initial_receipt() {
    let db = test_db().await;
    let location = default_location(&db).await;
    let items = ItemMasterService::new(db.clone());

    let created = items
        .create_material("PLA", "BLK", 1, 1, "kg", dec!(25), dec!(18.5), location.id)
        .await
        .unwrap();
    assert_eq!(created.item.sku, "MAT-PLA-BLK");
    assert!(created.initial_txn_id.is_some());

    let ledger = stateset_planner::services::inventory_ledger::InventoryLedgerService::new(db.clone());
    assert_eq!(ledger.available(created.item.id, location.id).await.unwrap(), dec!(25));

    let dup = items.create_material("PLA", "BLK", 1, 1, "kg", Decimal::ZERO, dec!(18.5), location.id).await.unwrap_err();
    assert_matches!(dup, ServiceError::DuplicateSku(_));
}

/// `update_item`/`soft_delete` mutate in place; `list` with `low_stock_only` filters to items
/// whose total on-hand has fallen to or below their reorder point.
#[tokio::test]
async fn item_update_and_low_stock_listing() {
    let db = test_db().await;
    let location = default_location(&db).await;
    let items = ItemMasterService::new(db.clone());

    let mut spec = new_finished_good("Low Stock Widget");
    spec.reorder_point = dec!(10);
    let widget = items.create_item(spec).await.unwrap();

    let updated = items
        .update_item(
            widget.id,
            ItemUpdate {
                name: Some("Renamed Widget".to_string()),
                lead_time_days: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Renamed Widget");
    assert_eq!(updated.lead_time_days, 5);

    let low_stock = items.list(ItemFilter { low_stock_only: true, ..Default::default() }).await.unwrap();
    assert!(low_stock.iter().any(|i| i.id == widget.id), "zero on-hand against a positive reorder point is low stock");

    items.soft_delete(widget.id).await.unwrap();
    let active_only = items.list(ItemFilter { active: Some(true), ..Default::default() }).await.unwrap();
    assert!(active_only.iter().all(|i| i.id != widget.id));

    let _ = location.id;
}

/// UOM service: converting through the loaded catalog matches the pure `ConversionGraph`
/// behavior, and an internally consistent catalog passes validation.
#[tokio::test]
async fn uom_service_converts_and_validates_catalog() {
    let db = test_db().await;
    seed_mass_units(&db).await;
    let uom = UomService::new(db.clone());

    let grams = uom.convert(dec!(2.5), "kg", "g").await.unwrap();
    assert_eq!(grams, dec!(2500.000000));

    uom.validate_catalog().await.unwrap();
}

/// End-to-end MRP service run: a confirmed sales order line against a single-level BOM produces
/// a persisted `MrpRun` and matching `planned_order_snapshot` rows for the shortage.
#[tokio::test]
async fn mrp_service_run_persists_planned_orders() {
    let db = test_db().await;
    let location = default_location(&db).await;

    let widget = create_item(&db, location.id, ItemSpec::make("WIDGET", "each", 0)).await;
    let shaft = create_item(&db, location.id, ItemSpec::buy("SHAFT", "each", 7).with_on_hand(dec!(5))).await;

    let catalog = CatalogService::new(db.clone());
    catalog
        .create_bom(
            widget.id,
            "A".to_string(),
            true,
            chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            None,
            vec![NewBomLine {
                seq: 1,
                component_id: shaft.id,
                qty_per: dec!(1),
                unit: "each".to_string(),
                scrap_factor: Decimal::ZERO,
                consume_stage: ConsumeStage::Production,
                cost_only: false,
            }],
        )
        .await
        .unwrap();

    let now = Utc::now();
    let need_date = Utc::now().date_naive() + Duration::days(14);
    let so = stateset_planner::entities::sales_order::ActiveModel {
        number: Set("SO-000010".to_string()),
        customer_id: Set(1),
        status: Set(SalesOrderStatus::Confirmed),
        requested_date: Set(Some(need_date)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();
    stateset_planner::entities::sales_order_line::ActiveModel {
        so_id: Set(so.id),
        seq: Set(1),
        item_id: Set(widget.id),
        qty_ordered: Set(dec!(10)),
        qty_allocated: Set(Decimal::ZERO),
        unit_price: Set(dec!(50)),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();

    let mrp = MrpService::new(db.clone(), 6);
    let (run, output) = mrp
        .run(MrpTrigger {
            include_safety_stock: false,
            horizon_days: 30,
            cascade_sub_assembly_due_dates: true,
            items_filter: None,
        })
        .await
        .unwrap();

    assert_eq!(run.planned_order_count, output.planned_orders.len() as i32);
    assert!(output.planned_orders.iter().any(|p| p.item_id == shaft.id && p.quantity == dec!(5)));

    let persisted = planned_order_snapshot::Entity::find().count(&db).await.unwrap();
    assert_eq!(persisted, output.planned_orders.len() as u64);
}
