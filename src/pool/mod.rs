//! Pooling proxy administration
//!
//! Client traffic reaches every backend through pgbouncer. Taking a
//! backend out of service means disabling its pool and killing its
//! connections; putting it back means resuming and enabling the pool.

mod console;
mod controller;
mod errors;

pub use console::{validate_pool_name, PgBouncerConsole, PoolCommand, PoolConsole, PoolEntry};
pub use controller::PoolController;
pub use errors::{DiscoveryError, PoolError, PoolResult};
