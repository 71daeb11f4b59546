//! Pure, database-free value types shared across services. Nothing here implements
//! `ActiveModelBehavior` or touches a `DatabaseConnection` — these are the plain structs the
//! MRP engine and the blocking-issues analyzer compute over once their inputs have been loaded.

pub mod blocking_issues;
pub mod mrp;
pub mod uom;
