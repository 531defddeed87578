//! Live topology of one logical database behind the pooling proxy
//!
//! Nothing here is persisted. A [`Topology`] is discovered once per
//! invocation and describes which pool entry fronts the master and which
//! front streaming replicas.

use serde::Serialize;

use crate::admin::Dsn;

/// Role of a backend as reported by `pg_is_in_recovery()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Slave,
}

impl Role {
    pub fn from_recovery(in_recovery: bool) -> Self {
        if in_recovery {
            Role::Slave
        } else {
            Role::Master
        }
    }
}

/// A pool entry together with the direct connection string of the
/// backend it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub pool_name: String,
    pub dsn: Dsn,
}

impl Backend {
    pub fn new(pool_name: impl Into<String>, dsn: Dsn) -> Self {
        Self {
            pool_name: pool_name.into(),
            dsn,
        }
    }
}

/// Exactly one master and zero or more slaves for a logical database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub dbname: String,
    pub master: Backend,
    pub slaves: Vec<Backend>,
}

impl Topology {
    pub fn slave_names(&self) -> Vec<&str> {
        self.slaves.iter().map(|s| s.pool_name.as_str()).collect()
    }

    /// Master first, then slaves in discovery order.
    pub fn backends(&self) -> impl Iterator<Item = &Backend> {
        std::iter::once(&self.master).chain(self.slaves.iter())
    }

    pub fn summary(&self) -> TopologySummary {
        TopologySummary {
            dbname: self.dbname.clone(),
            master: PoolSummary::from_backend(&self.master, Role::Master),
            slaves: self
                .slaves
                .iter()
                .map(|s| PoolSummary::from_backend(s, Role::Slave))
                .collect(),
        }
    }
}

/// Serializable view of a topology for the `topology` command.
#[derive(Debug, Clone, Serialize)]
pub struct TopologySummary {
    pub dbname: String,
    pub master: PoolSummary,
    pub slaves: Vec<PoolSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolSummary {
    pub pool: String,
    pub role: Role,
    pub host: Option<String>,
    pub port: u16,
}

impl PoolSummary {
    fn from_backend(backend: &Backend, role: Role) -> Self {
        Self {
            pool: backend.pool_name.clone(),
            role,
            host: backend.dsn.host().map(str::to_string),
            port: backend.dsn.port(),
        }
    }
}

/// Join pool names for log lines.
pub fn join_names(names: &[&str]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}
