mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};

use stateset_planner::entities::bom_line::ConsumeStage;
use stateset_planner::entities::inventory_txn::{self, TxnKind};
use stateset_planner::entities::production_order::{self, ProductionOrderStatus};
use stateset_planner::services::catalog::{CatalogService, NewBomLine};
use stateset_planner::services::inventory_ledger::{InventoryLedgerService, PostTxn};
use stateset_planner::services::production_lifecycle::{NewProductionOrder, ProductionLifecycleService};

use common::{create_item, default_location, test_db, ItemSpec};

/// Scenario D — reservation and cancellation: reserving against on-hand stock moves the quantity
/// from available into reserved without changing on-hand; releasing undoes it exactly, and the
/// ledger carries a paired `Reservation`/`ReservationRelease` row for each half of the round trip.
#[tokio::test]
async fn scenario_d_reservation_and_cancellation() {
    let db = test_db().await;
    let location = default_location(&db).await;
    let bolt = create_item(&db, location.id, ItemSpec::buy("BOLT", "each", 3).with_on_hand(dec!(100))).await;

    let ledger = InventoryLedgerService::new(db.clone());
    let reservation_id = ledger
        .reserve(bolt.id, location.id, dec!(40), "production_order".to_string(), "PO-000001".to_string())
        .await
        .unwrap();

    assert_eq!(ledger.available(bolt.id, location.id).await.unwrap(), dec!(60));

    ledger.release(reservation_id).await.unwrap();
    assert_eq!(ledger.available(bolt.id, location.id).await.unwrap(), dec!(100));

    let txns = inventory_txn::Entity::find()
        .filter(inventory_txn::Column::ItemId.eq(bolt.id))
        .all(&db)
        .await
        .unwrap();
    assert!(txns.iter().any(|t| t.kind == TxnKind::Reservation && t.quantity == dec!(40)));
    assert!(txns.iter().any(|t| t.kind == TxnKind::ReservationRelease && t.quantity == dec!(-40)));

    // Invariant 1: on_hand equals the signed sum of on-hand-affecting transactions. BOLT's only
    // such transaction here is its seeded balance, so on_hand is unaffected by reserve/release.
    let on_hand_affecting: Decimal = txns.iter().filter(|t| t.kind.affects_on_hand()).map(|t| t.quantity).sum();
    assert_eq!(on_hand_affecting, Decimal::ZERO, "reserve/release never touch on_hand");
}

/// Testable property 8: posting with the same idempotency key twice returns the same
/// transaction id and leaves exactly one ledger row behind.
#[tokio::test]
async fn idempotent_post_replays_without_double_posting() {
    let db = test_db().await;
    let location = default_location(&db).await;
    let shaft = create_item(&db, location.id, ItemSpec::buy("SHAFT", "each", 7)).await;
    let ledger = InventoryLedgerService::new(db.clone());

    let build = || PostTxn {
        item_id: shaft.id,
        location_id: location.id,
        quantity: dec!(25),
        kind: TxnKind::Receipt,
        ref_kind: "purchase_order".to_string(),
        ref_id: "PO-000002".to_string(),
        lot_id: None,
        idempotency_key: Some("po-000002-line-1".to_string()),
        created_by: "test".to_string(),
    };

    let first = ledger.post(build()).await.unwrap();
    let second = ledger.post(build()).await.unwrap();
    assert_eq!(first, second);

    let count = inventory_txn::Entity::find().filter(inventory_txn::Column::ItemId.eq(shaft.id)).count(&db).await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(ledger.available(shaft.id, location.id).await.unwrap(), dec!(25));
}

/// Builds a production order for `widget` whose single BOM line consumes `component` 1-for-1,
/// released and started so it sits in `InProgress` with materials reserved.
async fn released_production_order(
    lifecycle: &ProductionLifecycleService,
    catalog: &CatalogService,
    widget_id: i64,
    component_id: i64,
    location_id: i64,
    qty_ordered: Decimal,
) -> production_order::Model {
    catalog
        .create_bom(
            widget_id,
            "A".to_string(),
            true,
            chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            None,
            vec![NewBomLine {
                seq: 1,
                component_id,
                qty_per: dec!(1),
                unit: "each".to_string(),
                scrap_factor: Decimal::ZERO,
                consume_stage: ConsumeStage::Production,
                cost_only: false,
            }],
        )
        .await
        .unwrap();

    let order = lifecycle
        .create(NewProductionOrder {
            item_id: widget_id,
            qty_ordered,
            sales_order_id: None,
            sales_order_line_id: None,
            needed_date: None,
            work_center_id: None,
        })
        .await
        .unwrap();
    lifecycle.release(order.id, location_id).await.unwrap();
    lifecycle.start(order.id).await.unwrap()
}

/// Scenario F — splitting a production order with some quantity already completed releases the
/// parent's reservation and re-reserves proportionally across the children, whose quantities sum
/// to the parent's outstanding amount.
#[tokio::test]
async fn scenario_f_split_production_order() {
    let db = test_db().await;
    let location = default_location(&db).await;
    let widget = create_item(&db, location.id, ItemSpec::make("WIDGET", "each", 0)).await;
    let bolt = create_item(&db, location.id, ItemSpec::buy("BOLT", "each", 3).with_on_hand(dec!(1000))).await;

    let catalog = CatalogService::new(db.clone());
    let lifecycle = ProductionLifecycleService::new(db.clone(), false, false);
    let order = released_production_order(&lifecycle, &catalog, widget.id, bolt.id, location.id, dec!(100)).await;

    // 20 units already completed outside the normal complete_operation path (which would also
    // advance status past the splittable in_progress state) — a plant-floor partial count.
    let mut active: production_order::ActiveModel = order.clone().into();
    active.qty_completed = Set(dec!(20));
    active.updated_at = Set(Utc::now());
    active.update(&db).await.unwrap();

    let children = lifecycle.split(order.id, location.id, vec![dec!(60), dec!(20)]).await.unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].qty_ordered, dec!(60));
    assert_eq!(children[1].qty_ordered, dec!(20));
    assert!(children.iter().all(|c| c.parent_po_id == Some(order.id)));
    assert_eq!(children.iter().map(|c| c.qty_ordered).sum::<Decimal>() + dec!(20), dec!(100));

    let parent = production_order::Entity::find_by_id(order.id).one(&db).await.unwrap().unwrap();
    assert_eq!(parent.status, ProductionOrderStatus::Split);

    // Reservations are redistributed proportionally: 80 BOLT outstanding across both children,
    // down from the parent's original reservation of 100 (the full qty_ordered).
    let ledger = InventoryLedgerService::new(db.clone());
    assert_eq!(ledger.available(bolt.id, location.id).await.unwrap(), dec!(920));
}

/// A draft order cannot be started or completed directly; only `release` moves it out of draft.
#[tokio::test]
async fn invalid_transitions_are_rejected() {
    let db = test_db().await;
    let location = default_location(&db).await;
    let widget = create_item(&db, location.id, ItemSpec::make("WIDGET", "each", 0)).await;
    let bolt = create_item(&db, location.id, ItemSpec::buy("BOLT", "each", 0).with_on_hand(dec!(10))).await;
    let catalog = CatalogService::new(db.clone());
    let lifecycle = ProductionLifecycleService::new(db.clone(), false, false);

    catalog
        .create_bom(
            widget.id,
            "A".to_string(),
            true,
            chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            None,
            vec![NewBomLine {
                seq: 1,
                component_id: bolt.id,
                qty_per: dec!(1),
                unit: "each".to_string(),
                scrap_factor: Decimal::ZERO,
                consume_stage: ConsumeStage::Production,
                cost_only: false,
            }],
        )
        .await
        .unwrap();

    let order = lifecycle
        .create(NewProductionOrder {
            item_id: widget.id,
            qty_ordered: dec!(5),
            sales_order_id: None,
            sales_order_line_id: None,
            needed_date: None,
            work_center_id: None,
        })
        .await
        .unwrap();

    let err = lifecycle.start(order.id).await.unwrap_err();
    assert_matches!(err, stateset_planner::ServiceError::InvalidTransition { .. });
}
