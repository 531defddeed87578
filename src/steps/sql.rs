//! SQL-file backed maintenance steps.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::errors::StepResult;
use super::{MaintenanceStep, StepContext, StepOutcome};

/// `*.sql` files in `dir`, sorted by file name.
pub fn patch_files(dir: &Path) -> StepResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Applies pending schema patches. Never commits.
#[derive(Debug, Clone, Default)]
pub struct SqlPatchUpgrade {
    dir: Option<PathBuf>,
}

impl SqlPatchUpgrade {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

impl MaintenanceStep for SqlPatchUpgrade {
    fn name(&self) -> &str {
        "upgrade"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> StepResult<StepOutcome> {
        let Some(dir) = &self.dir else {
            info!("no upgrade directory configured; nothing to apply");
            return Ok(StepOutcome::success());
        };

        let files = patch_files(dir)?;
        info!(count = files.len(), dir = %dir.display(), "applying schema patches");
        for file in &files {
            let sql = fs::read_to_string(file)?;
            info!(patch = %file.display(), "applying patch");
            if let Err(e) = ctx.master.batch_execute(&sql) {
                return Ok(StepOutcome::failure(
                    1,
                    format!("{} failed: {}", file.display(), e),
                ));
            }
        }
        Ok(StepOutcome::success())
    }
}

/// Reapplies role grants, then commits the shared transaction (or rolls
/// it back in a dry run).
#[derive(Debug, Clone, Default)]
pub struct SqlSecurityReset {
    script: Option<PathBuf>,
}

impl SqlSecurityReset {
    pub fn new(script: Option<PathBuf>) -> Self {
        Self { script }
    }
}

impl MaintenanceStep for SqlSecurityReset {
    fn name(&self) -> &str {
        "security"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> StepResult<StepOutcome> {
        if let Some(script) = &self.script {
            let sql = fs::read_to_string(script)?;
            info!(script = %script.display(), "resetting permissions");
            if let Err(e) = ctx.master.batch_execute(&sql) {
                return Ok(StepOutcome::failure(
                    1,
                    format!("{} failed: {}", script.display(), e),
                ));
            }
        }

        if ctx.dry_run {
            warn!("dry run; rolling back schema and security changes");
            ctx.master.rollback()?;
            return Ok(StepOutcome::success());
        }

        match ctx.master.commit() {
            Ok(()) => Ok(StepOutcome::success()),
            Err(e) => Ok(StepOutcome::failure(1, format!("commit failed: {}", e))),
        }
    }
}
