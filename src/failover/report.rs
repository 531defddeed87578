//! Machine-readable summary of one run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::exit::ExitStatus;
use super::state::{FailoverRun, Phase};
use crate::topology::Topology;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub dbname: String,
    pub master_pool: Option<String>,
    pub slave_pools: Vec<String>,
    pub exit_code: i32,
    pub outcome: &'static str,
    pub phases: Vec<Phase>,
    pub outage_started_at: Option<DateTime<Utc>>,
    pub outage_ended_at: Option<DateTime<Utc>>,
    pub outage_seconds: Option<f64>,
    pub outage_ongoing: bool,
    pub sync_achieved: Option<bool>,
    pub degradations: Vec<String>,
}

impl RunReport {
    /// A run that stopped before any phase was entered.
    pub fn setup_failure(run_id: Uuid, dbname: &str, status: ExitStatus) -> Self {
        Self {
            run_id,
            dbname: dbname.to_string(),
            master_pool: None,
            slave_pools: Vec::new(),
            exit_code: status.code(),
            outcome: status.label(),
            phases: Vec::new(),
            outage_started_at: None,
            outage_ended_at: None,
            outage_seconds: None,
            outage_ongoing: false,
            sync_achieved: None,
            degradations: Vec::new(),
        }
    }

    pub fn with_topology(mut self, topology: &Topology) -> Self {
        self.master_pool = Some(topology.master.pool_name.clone());
        self.slave_pools = topology.slaves.iter().map(|s| s.pool_name.clone()).collect();
        self
    }

    pub fn from_run(
        run_id: Uuid,
        topology: &Topology,
        run: &FailoverRun,
        status: ExitStatus,
        sync_achieved: Option<bool>,
        degradations: Vec<String>,
    ) -> Self {
        let outage_ongoing = run.outage_started_at().is_some() && run.outage_ended_at().is_none();
        let outage_seconds = match (run.outage_started_at(), run.outage_ended_at()) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        };

        Self {
            run_id,
            dbname: topology.dbname.clone(),
            master_pool: Some(topology.master.pool_name.clone()),
            slave_pools: topology.slaves.iter().map(|s| s.pool_name.clone()).collect(),
            exit_code: status.code(),
            outcome: status.label(),
            phases: run.history().to_vec(),
            outage_started_at: run.outage_started_at(),
            outage_ended_at: run.outage_ended_at(),
            outage_seconds,
            outage_ongoing,
            sync_achieved,
            degradations,
        }
    }
}
