//! Purpose: Remove the staged Rox artifact after the run phase.
//! Exports: `CleanupDispatcher`.
//! Role: Cleanup half of the Rox lifecycle, driven by the gate's activation state.
//! Invariants: Inactive state means nothing was staged and nothing is removed.
//! Invariants: Only `<working_dir>/rox.yml` is targeted; symlinks are not followed.

use std::path::Path;

use super::error::{Error, Phase};
use super::gate::ActivationState;
use super::log::Logger;
use super::options::{ARTIFACT_NAME, PluginOptions, ProjectContext};
use super::remove::{FileRemover, FileSet};

pub struct CleanupDispatcher<R> {
    project: ProjectContext,
    remover: R,
}

impl<R: FileRemover> CleanupDispatcher<R> {
    pub fn new(project: ProjectContext, remover: R) -> Self {
        Self { project, remover }
    }

    pub fn artifact_fileset(working_dir: &Path) -> FileSet {
        FileSet::new(working_dir)
            .include(ARTIFACT_NAME)
            .with_exclude_defaults(true)
            .with_follow_symlinks(false)
    }

    pub fn cleanup(
        &self,
        options: &PluginOptions,
        state: ActivationState,
        working_dir: &Path,
        logger: &dyn Logger,
    ) -> Result<(), Error> {
        if options.verbose {
            logger.info("cleaning rox configuration files");
        }
        if !state.is_active() {
            return Ok(());
        }

        let fileset = Self::artifact_fileset(working_dir);
        let removed = self
            .remover
            .remove(&self.project, &fileset)
            .map_err(|err| err.with_phase(Phase::Cleanup))?;
        if options.verbose {
            logger.info(&format!(
                "removed {removed} staged file(s) from {}",
                working_dir.display()
            ));
        }
        Ok(())
    }
}
