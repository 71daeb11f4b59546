pub mod bom;
pub mod bom_line;
pub mod idempotency_key;
pub mod inventory_balance;
pub mod inventory_lot;
pub mod inventory_lot_allocation;
pub mod inventory_reservation;
pub mod inventory_txn;
pub mod item;
pub mod location;
pub mod mrp_run;
pub mod operation;
pub mod planned_order_snapshot;
pub mod production_order;
pub mod purchase_order;
pub mod purchase_order_line;
pub mod routing;
pub mod sales_order;
pub mod sales_order_line;
pub mod uom_conversion;
pub mod uom_unit;
pub mod work_center;
