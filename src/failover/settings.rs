use std::collections::BTreeSet;

use crate::preflight::PreflightLimits;
use crate::streaming::SyncWaiter;

/// Resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct FailoverSettings {
    pub dbname: String,
    /// Superuser the controller connects as.
    pub dbuser: String,
    /// Users whose connections are never reported or terminated. Always
    /// contains `dbuser`.
    pub system_users: BTreeSet<String>,
    pub limits: PreflightLimits,
    pub sync: SyncWaiter,
    pub dry_run: bool,
}

impl FailoverSettings {
    pub fn new(dbname: impl Into<String>, dbuser: impl Into<String>) -> Self {
        let dbuser = dbuser.into();
        let mut system_users = BTreeSet::new();
        system_users.insert("postgres".to_string());
        system_users.insert(dbuser.clone());
        Self {
            dbname: dbname.into(),
            dbuser,
            system_users,
            limits: PreflightLimits::default(),
            sync: SyncWaiter::default(),
            dry_run: false,
        }
    }

    /// Replace the allowlist. `dbuser` is kept regardless.
    pub fn with_system_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.system_users = users.into_iter().map(Into::into).collect();
        self.system_users.insert(self.dbuser.clone());
        self
    }

    pub fn with_limits(mut self, limits: PreflightLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_sync(mut self, sync: SyncWaiter) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dbuser_always_allowed() {
        let settings = FailoverSettings::new("main", "admin");
        assert!(settings.system_users.contains("admin"));
        assert!(settings.system_users.contains("postgres"));

        let settings = settings.with_system_users(["slony"]);
        assert!(settings.system_users.contains("admin"));
        assert!(settings.system_users.contains("slony"));
        assert!(!settings.system_users.contains("postgres"));
    }
}
