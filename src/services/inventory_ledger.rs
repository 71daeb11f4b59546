use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::inventory_lot::{self, LotStatus};
use crate::entities::inventory_reservation::{self, ReservationStatus};
use crate::entities::inventory_txn::{self, TxnKind};
use crate::entities::item;
use crate::entities::{idempotency_key, inventory_balance, inventory_lot_allocation};
use crate::errors::ServiceError;

#[derive(Debug, Clone)]
pub struct PostTxn {
    pub item_id: i64,
    pub location_id: i64,
    /// Signed, already in the item's stock_unit.
    pub quantity: Decimal,
    pub kind: TxnKind,
    pub ref_kind: String,
    pub ref_id: String,
    pub lot_id: Option<i64>,
    pub idempotency_key: Option<String>,
    pub created_by: String,
}

/// The Inventory Ledger is the single writer of balance state. Every mutation here runs
/// inside one transaction: it either fully commits or leaves no trace. `allow_negative_on_hand`
/// and `allow_oversell` come from `AppConfig` and are threaded through at construction.
pub struct InventoryLedgerService {
    db: DatabaseConnection,
    allow_negative_on_hand: bool,
    allow_oversell: bool,
}

impl InventoryLedgerService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            allow_negative_on_hand: false,
            allow_oversell: false,
        }
    }

    pub fn with_policy(db: DatabaseConnection, allow_negative_on_hand: bool, allow_oversell: bool) -> Self {
        Self {
            db,
            allow_negative_on_hand,
            allow_oversell,
        }
    }

    /// Locks (or creates, if absent) the balance row for `(item_id, location_id)`. Callers that
    /// need to lock more than one balance row in a single transaction (`transfer`) must acquire
    /// them in `(item_id ASC, location_id ASC)` order to avoid deadlocks.
    async fn lock_or_create_balance(
        &self,
        txn: &DatabaseTransaction,
        item_id: i64,
        location_id: i64,
    ) -> Result<inventory_balance::Model, ServiceError> {
        let existing = inventory_balance::Entity::find()
            .filter(inventory_balance::Column::ItemId.eq(item_id))
            .filter(inventory_balance::Column::LocationId.eq(location_id))
            .lock_exclusive()
            .one(txn)
            .await?;
        if let Some(balance) = existing {
            return Ok(balance);
        }

        let now = Utc::now();
        let created = inventory_balance::ActiveModel {
            item_id: Set(item_id),
            location_id: Set(location_id),
            on_hand: Set(Decimal::ZERO),
            reserved: Set(Decimal::ZERO),
            available: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Ok(created.insert(txn).await?)
    }

    pub async fn available(&self, item_id: i64, location_id: i64) -> Result<Decimal, ServiceError> {
        let balance = inventory_balance::Entity::find()
            .filter(inventory_balance::Column::ItemId.eq(item_id))
            .filter(inventory_balance::Column::LocationId.eq(location_id))
            .one(&self.db)
            .await?;
        Ok(balance.map(|b| b.available).unwrap_or(Decimal::ZERO))
    }

    pub async fn post(&self, input: PostTxn) -> Result<Uuid, ServiceError> {
        let txn = self.db.begin().await?;
        let id = self.post_within(&txn, input).await?;
        txn.commit().await?;
        Ok(id)
    }

    /// The core of `post`, usable inside a caller-owned transaction (e.g. the material-create
    /// shortcut's single-transaction item-plus-receipt operation).
    pub async fn post_within(&self, txn: &DatabaseTransaction, input: PostTxn) -> Result<Uuid, ServiceError> {
        if let Some(key) = &input.idempotency_key {
            if let Some(existing) = idempotency_key::Entity::find_by_id(key.clone()).one(txn).await? {
                info!(key, txn_id = %existing.txn_id, "idempotent post replay");
                return Ok(existing.txn_id);
            }
        }

        let balance = self.lock_or_create_balance(txn, input.item_id, input.location_id).await?;

        let mut on_hand = balance.on_hand;
        let mut reserved = balance.reserved;

        if input.kind.affects_on_hand() {
            let candidate = on_hand + input.quantity;
            let bypass = self.allow_negative_on_hand && input.kind == TxnKind::Adjustment;
            if candidate < Decimal::ZERO && !bypass {
                return Err(ServiceError::InsufficientStock {
                    item_id: input.item_id,
                    location_id: input.location_id,
                    required: -input.quantity,
                    available: on_hand,
                });
            }
            on_hand = candidate;
        } else {
            let candidate = reserved + input.quantity;
            if candidate < Decimal::ZERO {
                return Err(ServiceError::LedgerCorruption(format!(
                    "reservation quantity would go negative for item {} at location {}",
                    input.item_id, input.location_id
                )));
            }
            if candidate > on_hand && !self.allow_oversell {
                return Err(ServiceError::InsufficientStock {
                    item_id: input.item_id,
                    location_id: input.location_id,
                    required: candidate,
                    available: on_hand,
                });
            }
            reserved = candidate;
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let txn_model = inventory_txn::ActiveModel {
            id: Set(id),
            item_id: Set(input.item_id),
            location_id: Set(input.location_id),
            quantity: Set(input.quantity),
            kind: Set(input.kind),
            ref_kind: Set(input.ref_kind),
            ref_id: Set(input.ref_id),
            lot_id: Set(input.lot_id),
            idempotency_key: Set(input.idempotency_key.clone()),
            created_at: Set(now),
            created_by: Set(input.created_by),
        };
        txn_model.insert(txn).await?;

        let mut balance_active: inventory_balance::ActiveModel = balance.into();
        balance_active.on_hand = Set(on_hand);
        balance_active.reserved = Set(reserved);
        balance_active.available = Set(on_hand - reserved);
        balance_active.updated_at = Set(now);
        balance_active.update(txn).await?;

        if let Some(key) = input.idempotency_key {
            idempotency_key::ActiveModel {
                key: Set(key),
                txn_id: Set(id),
                created_at: Set(now),
            }
            .insert(txn)
            .await?;
        }

        Ok(id)
    }

    /// Posts a paired `TransferOut`/`TransferIn` of equal magnitude. Locks are acquired in
    /// `(location_id ASC)` order for the fixed item to satisfy the deadlock-avoidance rule.
    pub async fn transfer(&self, item_id: i64, from_location: i64, to_location: i64, quantity: Decimal, ref_id: String) -> Result<(Uuid, Uuid), ServiceError> {
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::NegativeQuantity(quantity));
        }
        let (first, second) = if from_location <= to_location {
            (from_location, to_location)
        } else {
            (to_location, from_location)
        };
        let txn = self.db.begin().await?;
        self.lock_or_create_balance(&txn, item_id, first).await?;
        if first != second {
            self.lock_or_create_balance(&txn, item_id, second).await?;
        }

        let out_id = self
            .post_within(
                &txn,
                PostTxn {
                    item_id,
                    location_id: from_location,
                    quantity: -quantity,
                    kind: TxnKind::TransferOut,
                    ref_kind: "transfer".to_string(),
                    ref_id: ref_id.clone(),
                    lot_id: None,
                    idempotency_key: None,
                    created_by: "inventory_ledger".to_string(),
                },
            )
            .await?;
        let in_id = self
            .post_within(
                &txn,
                PostTxn {
                    item_id,
                    location_id: to_location,
                    quantity,
                    kind: TxnKind::TransferIn,
                    ref_kind: "transfer".to_string(),
                    ref_id,
                    lot_id: None,
                    idempotency_key: None,
                    created_by: "inventory_ledger".to_string(),
                },
            )
            .await?;
        txn.commit().await?;
        Ok((out_id, in_id))
    }

    pub async fn reserve(&self, item_id: i64, location_id: i64, quantity: Decimal, ref_kind: String, ref_id: String) -> Result<Uuid, ServiceError> {
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::NegativeQuantity(quantity));
        }
        let txn = self.db.begin().await?;
        self.post_within(
            &txn,
            PostTxn {
                item_id,
                location_id,
                quantity,
                kind: TxnKind::Reservation,
                ref_kind: ref_kind.clone(),
                ref_id: ref_id.clone(),
                lot_id: None,
                idempotency_key: None,
                created_by: "inventory_ledger".to_string(),
            },
        )
        .await?;

        let now = Utc::now();
        let reservation_id = Uuid::new_v4();
        inventory_reservation::ActiveModel {
            id: Set(reservation_id),
            item_id: Set(item_id),
            location_id: Set(location_id),
            quantity: Set(quantity),
            quantity_consumed: Set(Decimal::ZERO),
            status: Set(ReservationStatus::Active),
            ref_kind: Set(ref_kind),
            ref_id: Set(ref_id),
            expires_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;
        Ok(reservation_id)
    }

    async fn load_active_reservation(&self, txn: &DatabaseTransaction, reservation_id: Uuid) -> Result<inventory_reservation::Model, ServiceError> {
        inventory_reservation::Entity::find_by_id(reservation_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or(ServiceError::UnknownReservation(reservation_id))
    }

    pub async fn release(&self, reservation_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let reservation = self.load_active_reservation(&txn, reservation_id).await?;
        if reservation.status != ReservationStatus::Active {
            warn!(%reservation_id, status = ?reservation.status, "release on non-active reservation is a no-op");
            txn.commit().await?;
            return Ok(());
        }
        let remaining = reservation.remaining();

        self.post_within(
            &txn,
            PostTxn {
                item_id: reservation.item_id,
                location_id: reservation.location_id,
                quantity: -remaining,
                kind: TxnKind::ReservationRelease,
                ref_kind: reservation.ref_kind.clone(),
                ref_id: reservation.ref_id.clone(),
                lot_id: None,
                idempotency_key: None,
                created_by: "inventory_ledger".to_string(),
            },
        )
        .await?;

        let mut active: inventory_reservation::ActiveModel = reservation.into();
        active.status = Set(ReservationStatus::Released);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Consumes up to `quantity` of a reservation's remaining balance. Partial consume is
    /// allowed; consuming more than remains fails with `InsufficientReservation`.
    pub async fn consume(&self, reservation_id: Uuid, quantity: Decimal, ref_kind: String, ref_id: String) -> Result<Uuid, ServiceError> {
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::NegativeQuantity(quantity));
        }
        let txn = self.db.begin().await?;
        let reservation = self.load_active_reservation(&txn, reservation_id).await?;
        if reservation.status != ReservationStatus::Active {
            return Err(ServiceError::UnknownReservation(reservation_id));
        }
        let remaining = reservation.remaining();
        if quantity > remaining {
            return Err(ServiceError::InsufficientReservation {
                reservation_id,
                required: quantity,
                reserved: remaining,
            });
        }

        let consumption_id = self
            .post_within(
                &txn,
                PostTxn {
                    item_id: reservation.item_id,
                    location_id: reservation.location_id,
                    quantity: -quantity,
                    kind: TxnKind::Consumption,
                    ref_kind,
                    ref_id,
                    lot_id: None,
                    idempotency_key: None,
                    created_by: "inventory_ledger".to_string(),
                },
            )
            .await?;

        if let Some(source_item) = item::Entity::find_by_id(reservation.item_id).one(&txn).await? {
            if source_item.lot_tracked {
                self.allocate_lots_fifo(&txn, reservation.item_id, reservation.location_id, quantity, consumption_id).await?;
            }
        }

        // Consuming reserved stock retires it from the reserved pool at the same time it
        // leaves on_hand, so `available` is unaffected.
        self.post_within(
            &txn,
            PostTxn {
                item_id: reservation.item_id,
                location_id: reservation.location_id,
                quantity: -quantity,
                kind: TxnKind::ReservationRelease,
                ref_kind: reservation.ref_kind.clone(),
                ref_id: reservation.ref_id.clone(),
                lot_id: None,
                idempotency_key: None,
                created_by: "inventory_ledger".to_string(),
            },
        )
        .await?;

        let new_consumed = reservation.quantity_consumed + quantity;
        let fully_consumed = new_consumed >= reservation.quantity;
        let mut active: inventory_reservation::ActiveModel = reservation.into();
        active.quantity_consumed = Set(new_consumed);
        active.status = Set(if fully_consumed { ReservationStatus::Consumed } else { ReservationStatus::Active });
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;
        txn.commit().await?;
        Ok(consumption_id)
    }

    /// Creates a new lot for a lot-tracked receipt and posts the receipt transaction against it
    /// in one step, so a lot never exists without the ledger row that brought it into being.
    pub async fn receive_lot(
        &self,
        item_id: i64,
        location_id: i64,
        lot_number: String,
        quantity: Decimal,
        received_date: NaiveDate,
        ref_kind: String,
        ref_id: String,
    ) -> Result<(Uuid, i64), ServiceError> {
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::NegativeQuantity(quantity));
        }
        let txn = self.db.begin().await?;
        let now = Utc::now();
        let lot = inventory_lot::ActiveModel {
            item_id: Set(item_id),
            location_id: Set(location_id),
            lot_number: Set(lot_number),
            quantity: Set(quantity),
            original_quantity: Set(quantity),
            received_date: Set(received_date),
            status: Set(LotStatus::Available),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let txn_id = self
            .post_within(
                &txn,
                PostTxn {
                    item_id,
                    location_id,
                    quantity,
                    kind: TxnKind::Receipt,
                    ref_kind,
                    ref_id,
                    lot_id: Some(lot.id),
                    idempotency_key: None,
                    created_by: "inventory_ledger".to_string(),
                },
            )
            .await?;
        txn.commit().await?;
        Ok((txn_id, lot.id))
    }

    /// Draws `quantity` from the item's available lots at `location_id`, oldest `received_date`
    /// first, recording one `inventory_lot_allocation` row per lot the draw spans. Assumes the
    /// caller already validated availability via the reservation it is consuming.
    async fn allocate_lots_fifo(&self, txn: &DatabaseTransaction, item_id: i64, location_id: i64, quantity: Decimal, consumption_txn_id: Uuid) -> Result<(), ServiceError> {
        let mut remaining = quantity;
        let lots = inventory_lot::Entity::find()
            .filter(inventory_lot::Column::ItemId.eq(item_id))
            .filter(inventory_lot::Column::LocationId.eq(location_id))
            .filter(inventory_lot::Column::Status.eq(LotStatus::Available))
            .order_by_asc(inventory_lot::Column::ReceivedDate)
            .all(txn)
            .await?;

        for lot in lots {
            if remaining <= Decimal::ZERO {
                break;
            }
            let draw = remaining.min(lot.quantity);
            if draw <= Decimal::ZERO {
                continue;
            }
            inventory_lot_allocation::ActiveModel {
                lot_id: Set(lot.id),
                txn_id: Set(consumption_txn_id),
                quantity: Set(draw),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(txn)
            .await?;

            let new_qty = lot.quantity - draw;
            let mut active: inventory_lot::ActiveModel = lot.into();
            active.quantity = Set(new_qty);
            active.status = Set(if new_qty <= Decimal::ZERO { LotStatus::Consumed } else { LotStatus::Available });
            active.updated_at = Set(Utc::now());
            active.update(txn).await?;
            remaining -= draw;
        }

        if remaining > Decimal::ZERO {
            warn!(item_id, location_id, %remaining, "lot-tracked consumption exceeds available lot quantity; falling back to unallocated draw");
        }
        Ok(())
    }

    /// Forward trace: starting from the ledger rows posted under `ref_kind`/`ref_id`, follows any
    /// lot those rows carry to every later transaction that drew on the same lot — "where did
    /// this material go". Returns the origin rows and their downstream consumers together,
    /// ordered by `created_at`.
    pub async fn trace_forward(&self, ref_kind: &str, ref_id: &str) -> Result<Vec<inventory_txn::Model>, ServiceError> {
        let origin = inventory_txn::Entity::find()
            .filter(inventory_txn::Column::RefKind.eq(ref_kind))
            .filter(inventory_txn::Column::RefId.eq(ref_id))
            .order_by_asc(inventory_txn::Column::CreatedAt)
            .all(&self.db)
            .await?;

        let lot_ids: Vec<i64> = origin.iter().filter_map(|t| t.lot_id).collect();
        let mut downstream = Vec::new();
        if !lot_ids.is_empty() {
            let allocations = inventory_lot_allocation::Entity::find()
                .filter(inventory_lot_allocation::Column::LotId.is_in(lot_ids))
                .all(&self.db)
                .await?;
            let txn_ids: Vec<Uuid> = allocations.into_iter().map(|a| a.txn_id).collect();
            if !txn_ids.is_empty() {
                downstream = inventory_txn::Entity::find()
                    .filter(inventory_txn::Column::Id.is_in(txn_ids))
                    .order_by_asc(inventory_txn::Column::CreatedAt)
                    .all(&self.db)
                    .await?;
            }
        }

        let mut all = origin;
        all.extend(downstream);
        all.dedup_by_key(|t| t.id);
        Ok(all)
    }

    /// Backward trace: given `ref_kind`/`ref_id` (typically a production order), returns the
    /// lots its consumption transactions drew from — "what lots made this output".
    pub async fn trace_backward(&self, ref_kind: &str, ref_id: &str) -> Result<Vec<inventory_lot::Model>, ServiceError> {
        let consuming_txns = inventory_txn::Entity::find()
            .filter(inventory_txn::Column::RefKind.eq(ref_kind))
            .filter(inventory_txn::Column::RefId.eq(ref_id))
            .filter(inventory_txn::Column::Kind.eq(TxnKind::Consumption))
            .all(&self.db)
            .await?;
        let txn_ids: Vec<Uuid> = consuming_txns.into_iter().map(|t| t.id).collect();
        if txn_ids.is_empty() {
            return Ok(Vec::new());
        }
        let allocations = inventory_lot_allocation::Entity::find()
            .filter(inventory_lot_allocation::Column::TxnId.is_in(txn_ids))
            .all(&self.db)
            .await?;
        let lot_ids: Vec<i64> = allocations.into_iter().map(|a| a.lot_id).collect();
        if lot_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut lots = inventory_lot::Entity::find().filter(inventory_lot::Column::Id.is_in(lot_ids)).all(&self.db).await?;
        lots.dedup_by_key(|l| l.id);
        Ok(lots)
    }

    /// Maintenance operation: releases every reservation past its `expires_at`. Never invoked
    /// automatically (see `PostTxn`/reservation design notes) — a deployment opts in by scheduling
    /// this on its own cadence.
    pub async fn sweep_expired_reservations(&self, now: chrono::DateTime<Utc>) -> Result<usize, ServiceError> {
        let expired = inventory_reservation::Entity::find()
            .filter(inventory_reservation::Column::Status.eq(ReservationStatus::Active))
            .filter(inventory_reservation::Column::ExpiresAt.is_not_null())
            .filter(inventory_reservation::Column::ExpiresAt.lte(now))
            .all(&self.db)
            .await?;
        let count = expired.len();
        for reservation in expired {
            self.release(reservation.id).await?;
        }
        Ok(count)
    }
}
