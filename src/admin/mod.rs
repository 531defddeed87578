//! Database administration
//!
//! Direct, autocommit access to the master and its streaming replicas,
//! plus the single transactional connection to the master that the
//! upgrade and security steps share.

mod administrator;
mod dsn;
mod errors;
mod pg;
mod session;

pub use administrator::{ConnectionAdministrator, ReplicationHealth};
pub use dsn::Dsn;
pub use errors::{AdminError, AdminResult};
pub use pg::{PgConnector, PgMasterTransaction, PgSession};
pub use session::{BackendSession, ClientBackend, Connector, MasterTransaction};
