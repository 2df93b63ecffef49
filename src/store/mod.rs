//! Persistence layer: libSQL-backed storage for interview progress and budgets.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use traits::PlanStore;
