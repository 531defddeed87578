//! Full-update run state
//!
//! A run walks a fixed sequence of phases. Alongside the phase it keeps
//! the set of undo obligations: every mutating step that has been
//! attempted leaves an obligation until it is explicitly reversed. The
//! cleanup plan is derived from the obligations alone.
//!
//! Phase sequence:
//! Init → PreflightOk → ReplicationPaused → OutageStarted → MasterDisabled
//! → UpgradeDone → SecurityDone → MasterReenabled → SlavesDisabled
//! → ReplicationResumed → SlavesReenabled → Done
//!
//! A degraded step after SecurityDone (master, replication or slaves not
//! restored) leaves the phase where it was and the obligation in place.
//! Failed is reachable from every phase except Done.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::errors::{RunStateError, RunStateResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Init,
    PreflightOk,
    ReplicationPaused,
    OutageStarted,
    MasterDisabled,
    UpgradeDone,
    SecurityDone,
    MasterReenabled,
    SlavesDisabled,
    ReplicationResumed,
    SlavesReenabled,
    Done,
    Failed,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Init => "INIT",
            Phase::PreflightOk => "PREFLIGHT_OK",
            Phase::ReplicationPaused => "REPLICATION_PAUSED",
            Phase::OutageStarted => "OUTAGE_STARTED",
            Phase::MasterDisabled => "MASTER_DISABLED",
            Phase::UpgradeDone => "UPGRADE_DONE",
            Phase::SecurityDone => "SECURITY_DONE",
            Phase::MasterReenabled => "MASTER_REENABLED",
            Phase::SlavesDisabled => "SLAVES_DISABLED",
            Phase::ReplicationResumed => "REPLICATION_RESUMED",
            Phase::SlavesReenabled => "SLAVES_REENABLED",
            Phase::Done => "DONE",
            Phase::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

/// Undo obligations accumulated by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Obligations {
    /// Replay was paused (or pausing was attempted) and not yet resumed.
    pub replication_paused: bool,
    /// The master pool was disabled (or disabling was attempted) and not
    /// yet re-enabled.
    pub master_disabled: bool,
    /// Slave pools were disabled (or disabling was attempted) and not yet
    /// re-enabled.
    pub slaves_disabled: bool,
    /// The security step succeeded, so the shared transaction is settled.
    pub security_done: bool,
}

impl Obligations {
    pub fn cleanup_plan(&self) -> CleanupPlan {
        CleanupPlan {
            rollback_master: !self.security_done,
            reenable_master: self.master_disabled,
            resume_replication: self.replication_paused,
            reenable_slaves: self.slaves_disabled,
        }
    }
}

/// Undo actions for the cleanup phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanupPlan {
    pub rollback_master: bool,
    pub reenable_master: bool,
    pub resume_replication: bool,
    pub reenable_slaves: bool,
}

impl CleanupPlan {
    pub fn is_empty(&self) -> bool {
        !(self.rollback_master
            || self.reenable_master
            || self.resume_replication
            || self.reenable_slaves)
    }
}

#[derive(Debug, Clone)]
pub struct FailoverRun {
    phase: Phase,
    history: Vec<Phase>,
    obligations: Obligations,
    outage_started_at: Option<DateTime<Utc>>,
    outage_ended_at: Option<DateTime<Utc>>,
}

impl Default for FailoverRun {
    fn default() -> Self {
        Self::new()
    }
}

impl FailoverRun {
    pub fn new() -> Self {
        Self {
            phase: Phase::Init,
            history: vec![Phase::Init],
            obligations: Obligations::default(),
            outage_started_at: None,
            outage_ended_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase entered, in order.
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn obligations(&self) -> Obligations {
        self.obligations
    }

    pub fn outage_started_at(&self) -> Option<DateTime<Utc>> {
        self.outage_started_at
    }

    pub fn outage_ended_at(&self) -> Option<DateTime<Utc>> {
        self.outage_ended_at
    }

    /// Outage length so far; `None` before the outage starts.
    pub fn outage_duration(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.outage_started_at
            .map(|start| self.outage_ended_at.unwrap_or(now) - start)
    }

    fn advance(&mut self, allowed: &[Phase], to: Phase) -> RunStateResult<()> {
        if !allowed.contains(&self.phase) {
            return Err(RunStateError::forbidden_transition(self.phase, to));
        }
        if self.phase != to {
            self.phase = to;
            self.history.push(to);
        }
        Ok(())
    }

    fn require(&self, allowed: &[Phase], to: Phase) -> RunStateResult<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(RunStateError::forbidden_transition(self.phase, to))
        }
    }

    // =========================================================================
    // HAPPY PATH
    // =========================================================================

    /// Init → PreflightOk
    pub fn preflight_passed(&mut self) -> RunStateResult<()> {
        self.advance(&[Phase::Init], Phase::PreflightOk)
    }

    /// PreflightOk → ReplicationPaused, or Failed.
    ///
    /// Some slaves may have paused before another failed, so the
    /// obligation is taken either way.
    pub fn replication_pause(&mut self, ok: bool) -> RunStateResult<()> {
        let to = if ok { Phase::ReplicationPaused } else { Phase::Failed };
        self.advance(&[Phase::PreflightOk], to)?;
        self.obligations.replication_paused = true;
        Ok(())
    }

    /// ReplicationPaused → OutageStarted
    pub fn outage_started(&mut self, at: DateTime<Utc>) -> RunStateResult<()> {
        self.advance(&[Phase::ReplicationPaused], Phase::OutageStarted)?;
        self.outage_started_at = Some(at);
        Ok(())
    }

    /// OutageStarted → MasterDisabled, or Failed. The obligation is taken
    /// either way: DISABLE may have succeeded before KILL failed.
    pub fn master_disable(&mut self, ok: bool) -> RunStateResult<()> {
        let to = if ok { Phase::MasterDisabled } else { Phase::Failed };
        self.advance(&[Phase::OutageStarted], to)?;
        self.obligations.master_disabled = true;
        Ok(())
    }

    /// MasterDisabled → UpgradeDone
    pub fn upgrade_applied(&mut self) -> RunStateResult<()> {
        self.advance(&[Phase::MasterDisabled], Phase::UpgradeDone)
    }

    /// UpgradeDone → SecurityDone
    pub fn security_applied(&mut self) -> RunStateResult<()> {
        self.advance(&[Phase::UpgradeDone], Phase::SecurityDone)?;
        self.obligations.security_done = true;
        Ok(())
    }

    /// SecurityDone → MasterReenabled when `ok`; otherwise the phase stays
    /// and the master obligation remains.
    pub fn master_enable(&mut self, ok: bool, at: DateTime<Utc>) -> RunStateResult<()> {
        if !ok {
            return self.require(&[Phase::SecurityDone], Phase::MasterReenabled);
        }
        self.advance(&[Phase::SecurityDone], Phase::MasterReenabled)?;
        self.obligations.master_disabled = false;
        self.outage_ended_at = Some(at);
        Ok(())
    }

    /// SecurityDone | MasterReenabled → SlavesDisabled. The obligation is
    /// taken whatever the outcome.
    pub fn slaves_disable(&mut self) -> RunStateResult<()> {
        self.advance(
            &[Phase::SecurityDone, Phase::MasterReenabled],
            Phase::SlavesDisabled,
        )?;
        self.obligations.slaves_disabled = true;
        Ok(())
    }

    /// SlavesDisabled → ReplicationResumed when `ok`.
    pub fn replication_resume(&mut self, ok: bool) -> RunStateResult<()> {
        if !ok {
            return self.require(&[Phase::SlavesDisabled], Phase::ReplicationResumed);
        }
        self.advance(&[Phase::SlavesDisabled], Phase::ReplicationResumed)?;
        self.obligations.replication_paused = false;
        Ok(())
    }

    /// SlavesDisabled | ReplicationResumed → SlavesReenabled when `ok`.
    pub fn slaves_enable(&mut self, ok: bool) -> RunStateResult<()> {
        let allowed = [Phase::SlavesDisabled, Phase::ReplicationResumed];
        if !ok {
            return self.require(&allowed, Phase::SlavesReenabled);
        }
        self.advance(&allowed, Phase::SlavesReenabled)?;
        self.obligations.slaves_disabled = false;
        Ok(())
    }

    /// Post-slave phases → Done
    pub fn finish(&mut self) -> RunStateResult<()> {
        self.advance(
            &[
                Phase::SlavesDisabled,
                Phase::ReplicationResumed,
                Phase::SlavesReenabled,
            ],
            Phase::Done,
        )
    }

    /// Any non-Done phase → Failed
    pub fn fail(&mut self) -> RunStateResult<()> {
        if self.phase == Phase::Done {
            return Err(RunStateError::forbidden_transition(Phase::Done, Phase::Failed));
        }
        let current = self.phase;
        self.advance(&[current], Phase::Failed)
    }

    // =========================================================================
    // CLEANUP (obligations only; the phase is already terminal)
    // =========================================================================

    /// The shared transaction was rolled back; nothing left to settle.
    pub fn rolled_back(&mut self) {
        self.obligations.security_done = true;
    }

    pub fn master_recovered(&mut self, at: DateTime<Utc>) {
        self.obligations.master_disabled = false;
        if self.outage_started_at.is_some() {
            self.outage_ended_at = Some(at);
        }
    }

    pub fn replication_recovered(&mut self) {
        self.obligations.replication_paused = false;
    }

    pub fn slaves_recovered(&mut self) {
        self.obligations.slaves_disabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn through_security() -> FailoverRun {
        let mut run = FailoverRun::new();
        run.preflight_passed().unwrap();
        run.replication_pause(true).unwrap();
        run.outage_started(Utc::now()).unwrap();
        run.master_disable(true).unwrap();
        run.upgrade_applied().unwrap();
        run.security_applied().unwrap();
        run
    }

    #[test]
    fn test_new_run_has_no_obligations() {
        let run = FailoverRun::new();
        assert_eq!(run.phase(), Phase::Init);
        assert_eq!(run.obligations(), Obligations::default());
        let plan = run.obligations().cleanup_plan();
        assert!(plan.rollback_master);
        assert!(!plan.reenable_master && !plan.resume_replication && !plan.reenable_slaves);
    }

    #[test]
    fn test_happy_path_clears_every_obligation() {
        let mut run = through_security();
        run.master_enable(true, Utc::now()).unwrap();
        run.slaves_disable().unwrap();
        run.replication_resume(true).unwrap();
        run.slaves_enable(true).unwrap();
        run.finish().unwrap();

        assert_eq!(run.phase(), Phase::Done);
        assert!(run.obligations().cleanup_plan().is_empty());
        assert_eq!(
            run.history(),
            &[
                Phase::Init,
                Phase::PreflightOk,
                Phase::ReplicationPaused,
                Phase::OutageStarted,
                Phase::MasterDisabled,
                Phase::UpgradeDone,
                Phase::SecurityDone,
                Phase::MasterReenabled,
                Phase::SlavesDisabled,
                Phase::ReplicationResumed,
                Phase::SlavesReenabled,
                Phase::Done,
            ]
        );
        assert!(run.outage_ended_at().is_some());
    }

    #[test]
    fn test_failed_pause_still_obliges_resume() {
        let mut run = FailoverRun::new();
        run.preflight_passed().unwrap();
        run.replication_pause(false).unwrap();

        assert_eq!(run.phase(), Phase::Failed);
        let plan = run.obligations().cleanup_plan();
        assert!(plan.resume_replication);
        assert!(!plan.reenable_master);
    }

    #[test]
    fn test_failed_master_disable_obliges_enable() {
        let mut run = FailoverRun::new();
        run.preflight_passed().unwrap();
        run.replication_pause(true).unwrap();
        run.outage_started(Utc::now()).unwrap();
        run.master_disable(false).unwrap();

        assert_eq!(run.phase(), Phase::Failed);
        let plan = run.obligations().cleanup_plan();
        assert!(plan.reenable_master);
        assert!(plan.resume_replication);
        assert!(plan.rollback_master);
    }

    #[test]
    fn test_degraded_master_enable_keeps_phase_and_obligation() {
        let mut run = through_security();
        run.master_enable(false, Utc::now()).unwrap();
        assert_eq!(run.phase(), Phase::SecurityDone);
        assert!(run.obligations().master_disabled);
        assert!(run.outage_ended_at().is_none());

        // Slave handling still proceeds.
        run.slaves_disable().unwrap();
        assert_eq!(run.phase(), Phase::SlavesDisabled);
    }

    #[test]
    fn test_degraded_resume_keeps_obligation() {
        let mut run = through_security();
        run.master_enable(true, Utc::now()).unwrap();
        run.slaves_disable().unwrap();
        run.replication_resume(false).unwrap();
        assert_eq!(run.phase(), Phase::SlavesDisabled);
        assert!(run.obligations().replication_paused);

        run.slaves_enable(true).unwrap();
        run.finish().unwrap();
        assert!(run.obligations().cleanup_plan().resume_replication);
    }

    #[test]
    fn test_forbidden_transitions() {
        let mut run = FailoverRun::new();
        let err = run.upgrade_applied().unwrap_err();
        assert_eq!(
            err,
            RunStateError::forbidden_transition(Phase::Init, Phase::UpgradeDone)
        );
        assert!(run.security_applied().is_err());
        assert!(run.master_enable(false, Utc::now()).is_err());
        assert!(run.finish().is_err());
        assert_eq!(run.phase(), Phase::Init);
    }

    #[test]
    fn test_fail_from_any_phase_but_done() {
        let mut run = through_security();
        run.fail().unwrap();
        assert_eq!(run.phase(), Phase::Failed);
        // Idempotent.
        run.fail().unwrap();
        assert_eq!(run.history().last(), Some(&Phase::Failed));

        let mut done = through_security();
        done.master_enable(true, Utc::now()).unwrap();
        done.slaves_disable().unwrap();
        done.finish().unwrap();
        assert!(done.fail().is_err());
    }

    #[test]
    fn test_cleanup_records_clear_obligations() {
        let mut run = FailoverRun::new();
        run.preflight_passed().unwrap();
        run.replication_pause(true).unwrap();
        run.outage_started(Utc::now()).unwrap();
        run.master_disable(true).unwrap();
        run.fail().unwrap();

        run.rolled_back();
        run.master_recovered(Utc::now());
        run.replication_recovered();
        assert!(run.obligations().cleanup_plan().is_empty());
        assert!(run.outage_ended_at().is_some());
    }

    #[test]
    fn test_plan_matches_every_obligation_combination() {
        for bits in 0u8..16 {
            let obligations = Obligations {
                replication_paused: bits & 1 != 0,
                master_disabled: bits & 2 != 0,
                slaves_disabled: bits & 4 != 0,
                security_done: bits & 8 != 0,
            };
            let plan = obligations.cleanup_plan();
            assert_eq!(plan.resume_replication, obligations.replication_paused);
            assert_eq!(plan.reenable_master, obligations.master_disabled);
            assert_eq!(plan.reenable_slaves, obligations.slaves_disabled);
            assert_eq!(plan.rollback_master, !obligations.security_done);
        }
    }

    #[test]
    fn test_outage_duration() {
        let mut run = FailoverRun::new();
        let now = Utc::now();
        assert!(run.outage_duration(now).is_none());

        run.preflight_passed().unwrap();
        run.replication_pause(true).unwrap();
        let start = now - chrono::Duration::seconds(5);
        run.outage_started(start).unwrap();
        assert_eq!(run.outage_duration(now), Some(chrono::Duration::seconds(5)));
    }
}
