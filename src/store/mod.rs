//! Persistence layer — tenant-scoped storage behind the `Database` trait.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{CallFilter, Database, MessageFilter, TaskFilter};
