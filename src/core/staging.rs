//! Purpose: Compose the activation gate, a feature, and the cleanup dispatcher into one lifecycle.
//! Exports: `RoxStaging`, `Feature`, `FeatureContext`.
//! Role: The concrete Rox lifecycle every feature (CLI command, library hook) runs inside.
//! Invariants: Cleanup consults only the state recorded by setup; no state means nothing staged.

use std::path::{Path, PathBuf};

use super::cleanup::CleanupDispatcher;
use super::error::Error;
use super::filter::{PropertyFilter, ResourceFilter};
use super::gate::{ActivationGate, ActivationState, InactiveReason};
use super::lifecycle::{Lifecycle, execute_lifecycle};
use super::log::Logger;
use super::options::{ARTIFACT_NAME, PluginOptions, ProjectContext};
use super::remove::{FileRemover, GlobRemover};

/// What the run phase gets to see.
#[derive(Clone, Debug)]
pub struct FeatureContext<'a> {
    pub state: ActivationState,
    pub artifact: Option<PathBuf>,
    pub working_dir: &'a Path,
    pub filters: &'a [String],
    pub seed: Option<i64>,
    pub verbose: bool,
}

pub trait Feature {
    fn run(&mut self, ctx: &FeatureContext<'_>, logger: &dyn Logger) -> Result<(), Error>;
}

impl<F> Feature for F
where
    F: FnMut(&FeatureContext<'_>, &dyn Logger) -> Result<(), Error>,
{
    fn run(&mut self, ctx: &FeatureContext<'_>, logger: &dyn Logger) -> Result<(), Error> {
        self(ctx, logger)
    }
}

pub struct RoxStaging<F, Fi = PropertyFilter, R = GlobRemover> {
    options: PluginOptions,
    working_dir: PathBuf,
    gate: ActivationGate<Fi>,
    dispatcher: CleanupDispatcher<R>,
    feature: F,
    state: Option<ActivationState>,
}

impl<F: Feature> RoxStaging<F> {
    pub fn new(
        project: ProjectContext,
        options: PluginOptions,
        working_dir: impl Into<PathBuf>,
        feature: F,
    ) -> Self {
        Self::with_collaborators(
            project,
            options,
            working_dir,
            feature,
            PropertyFilter::new(),
            GlobRemover::new(),
        )
    }
}

impl<F, Fi, R> RoxStaging<F, Fi, R>
where
    F: Feature,
    Fi: ResourceFilter,
    R: FileRemover,
{
    pub fn with_collaborators(
        project: ProjectContext,
        options: PluginOptions,
        working_dir: impl Into<PathBuf>,
        feature: F,
        filter: Fi,
        remover: R,
    ) -> Self {
        Self {
            options,
            working_dir: working_dir.into(),
            gate: ActivationGate::new(project.clone(), filter),
            dispatcher: CleanupDispatcher::new(project, remover),
            feature,
            state: None,
        }
    }

    /// Activation decided by the last setup, if one ran.
    pub fn state(&self) -> Option<ActivationState> {
        self.state
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.working_dir.join(ARTIFACT_NAME)
    }

    pub fn feature(&self) -> &F {
        &self.feature
    }

    pub fn execute(&mut self, logger: &dyn Logger) -> Result<(), Error> {
        let options = self.options.clone();
        execute_lifecycle(&options, logger, self)
    }
}

impl<F, Fi, R> Lifecycle for RoxStaging<F, Fi, R>
where
    F: Feature,
    Fi: ResourceFilter,
    R: FileRemover,
{
    fn setup(&mut self, logger: &dyn Logger) -> Result<(), Error> {
        self.state = None;
        let state = self.gate.setup(&self.options, &self.working_dir, logger)?;
        self.state = Some(state);
        Ok(())
    }

    fn run(&mut self, logger: &dyn Logger) -> Result<(), Error> {
        let state = self
            .state
            .unwrap_or(ActivationState::Inactive(InactiveReason::Unconfigured));
        let ctx = FeatureContext {
            state,
            artifact: state.is_active().then(|| self.working_dir.join(ARTIFACT_NAME)),
            working_dir: &self.working_dir,
            filters: &self.options.filters,
            seed: self.options.seed,
            verbose: self.options.verbose,
        };
        self.feature.run(&ctx, logger)
    }

    fn cleanup(&mut self, logger: &dyn Logger) -> Result<(), Error> {
        let Some(state) = self.state else {
            return Ok(());
        };
        self.dispatcher
            .cleanup(&self.options, state, &self.working_dir, logger)
    }
}
