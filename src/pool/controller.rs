//! Pool Controller
//!
//! Redirects client traffic away from backends under maintenance by
//! administering the pooling proxy.
//!
//! Discovery happens at construction: every `SHOW DATABASES` entry that
//! targets the logical database is classified by asking its backend
//! whether it is in recovery. Exactly one master must be found.
//!
//! Disable is `DISABLE` then `KILL`; enable is the inverse, `RESUME` then
//! `ENABLE`. Neither raises: failures are logged and reported as `false`.

use tracing::{error, info};

use super::console::{PoolCommand, PoolConsole};
use super::errors::DiscoveryError;
use crate::admin::{ConnectionAdministrator, Dsn};
use crate::policy::Aggregation;
use crate::topology::{join_names, Backend, Role, Topology};

pub struct PoolController {
    console: Box<dyn PoolConsole>,
    topology: Topology,
}

impl std::fmt::Debug for PoolController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolController")
            .field("topology", &self.topology)
            .finish_non_exhaustive()
    }
}

impl PoolController {
    /// Discover the topology of `dbname` and take ownership of the console.
    ///
    /// Fails with [`DiscoveryError::NoMaster`] when no entry reports "not in
    /// recovery" and with [`DiscoveryError::MultipleMasters`] when more than
    /// one does. Nothing is mutated on either path.
    pub fn discover(
        mut console: Box<dyn PoolConsole>,
        admin: &ConnectionAdministrator,
        dbname: &str,
        dbuser: &str,
    ) -> Result<Self, DiscoveryError> {
        let entries = console.show_databases()?;

        let mut masters = Vec::new();
        let mut slaves = Vec::new();
        for entry in entries.iter().filter(|e| e.database == dbname) {
            let dsn = Dsn::backend(entry.host.as_deref(), entry.port, dbname, dbuser);
            let in_recovery =
                admin
                    .is_in_recovery(&dsn)
                    .map_err(|source| DiscoveryError::Classification {
                        pool: entry.name.clone(),
                        source,
                    })?;
            let backend = Backend::new(entry.name.clone(), dsn);
            match Role::from_recovery(in_recovery) {
                Role::Master => masters.push(backend),
                Role::Slave => slaves.push(backend),
            }
        }

        if masters.len() > 1 {
            let pools: Vec<String> = masters.into_iter().map(|m| m.pool_name).collect();
            error!(dbname, pools = %pools.join(", "), "multiple masters detected");
            return Err(DiscoveryError::MultipleMasters {
                dbname: dbname.to_string(),
                pools,
            });
        }
        let master = match masters.pop() {
            Some(master) => master,
            None => {
                error!(dbname, "no master detected");
                return Err(DiscoveryError::NoMaster {
                    dbname: dbname.to_string(),
                });
            }
        };

        let topology = Topology {
            dbname: dbname.to_string(),
            master,
            slaves,
        };
        info!(
            dbname,
            master = %topology.master.pool_name,
            slaves = %join_names(&topology.slave_names()),
            "topology discovered"
        );

        Ok(Self { console, topology })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn master_name(&self) -> &str {
        &self.topology.master.pool_name
    }

    /// Stop new connections to `pool`, then drop existing ones.
    pub fn disable(&mut self, pool: &str) -> bool {
        let result = self
            .console
            .execute(PoolCommand::Disable, pool)
            .and_then(|_| self.console.execute(PoolCommand::Kill, pool));
        match result {
            Ok(()) => true,
            Err(e) => {
                error!(pool, error = %e, "unable to disable pool");
                false
            }
        }
    }

    /// Release queued clients, then accept new connections.
    pub fn enable(&mut self, pool: &str) -> bool {
        let result = self
            .console
            .execute(PoolCommand::Resume, pool)
            .and_then(|_| self.console.execute(PoolCommand::Enable, pool));
        match result {
            Ok(()) => true,
            Err(e) => {
                error!(pool, error = %e, "unable to enable pool");
                false
            }
        }
    }

    pub fn disable_master(&mut self) -> bool {
        let name = self.master_name().to_string();
        info!(pool = %name, "disabling access to master");
        self.disable(&name)
    }

    pub fn enable_master(&mut self) -> bool {
        let name = self.master_name().to_string();
        info!(pool = %name, "enabling access to master");
        self.enable(&name)
    }

    /// Disable every slave pool, stopping at the first failure.
    pub fn disable_slaves(&mut self) -> bool {
        let names = self.owned_slave_names();
        info!(slaves = %join_names(&borrowed(&names)), "disabling access to slaves");
        Aggregation::AllOrAbort.apply(&names, |name| self.disable(name))
    }

    /// Enable every slave pool, attempting all of them.
    pub fn enable_slaves(&mut self) -> bool {
        let names = self.owned_slave_names();
        info!(slaves = %join_names(&borrowed(&names)), "enabling access to slaves");
        Aggregation::BestEffortAll.apply(&names, |name| self.enable(name))
    }

    fn owned_slave_names(&self) -> Vec<String> {
        self.topology
            .slaves
            .iter()
            .map(|s| s.pool_name.clone())
            .collect()
    }
}

fn borrowed(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}
