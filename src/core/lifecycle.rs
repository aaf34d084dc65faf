//! Purpose: Three-phase execution template (setup, run, cleanup).
//! Exports: `Lifecycle`, `execute`, `execute_lifecycle`.
//! Role: Drives every plugin invocation; concrete features supply the hooks.
//! Invariants: `skip` bypasses all three hooks.
//! Invariants: Cleanup runs exactly once per non-skipped execution, including on panic.
//! Invariants: The first setup/run error wins; a later cleanup error is only logged.

use super::error::{Error, Phase};
use super::log::Logger;
use super::options::PluginOptions;

pub trait Lifecycle {
    fn setup(&mut self, _logger: &dyn Logger) -> Result<(), Error> {
        Ok(())
    }

    fn run(&mut self, logger: &dyn Logger) -> Result<(), Error>;

    fn cleanup(&mut self, _logger: &dyn Logger) -> Result<(), Error> {
        Ok(())
    }
}

/// Runs `setup`, then `run` if setup succeeded, then always `cleanup`.
pub fn execute<S, R, C>(
    options: &PluginOptions,
    logger: &dyn Logger,
    setup: S,
    run: R,
    cleanup: C,
) -> Result<(), Error>
where
    S: FnOnce() -> Result<(), Error>,
    R: FnOnce() -> Result<(), Error>,
    C: FnOnce() -> Result<(), Error>,
{
    let mut hooks = FnLifecycle {
        setup: Some(setup),
        run: Some(run),
        cleanup: Some(cleanup),
    };
    execute_lifecycle(options, logger, &mut hooks)
}

pub fn execute_lifecycle<L>(
    options: &PluginOptions,
    logger: &dyn Logger,
    lifecycle: &mut L,
) -> Result<(), Error>
where
    L: Lifecycle + ?Sized,
{
    if options.skip {
        logger.info("plugin execution skipped");
        return Ok(());
    }

    let mut guard = CleanupGuard {
        lifecycle,
        logger,
        armed: true,
    };

    if options.verbose {
        logger.info("lifecycle: setup");
    }
    let primary = guard
        .lifecycle
        .setup(logger)
        .map_err(|err| err.or_phase(Phase::Setup))
        .and_then(|()| {
            if options.verbose {
                logger.info("lifecycle: run");
            }
            guard
                .lifecycle
                .run(logger)
                .map_err(|err| err.or_phase(Phase::Run))
        });

    if options.verbose {
        logger.info("lifecycle: cleanup");
    }
    let cleanup = guard.finish();
    settle(primary, cleanup, logger)
}

fn settle(
    primary: Result<(), Error>,
    cleanup: Result<(), Error>,
    logger: &dyn Logger,
) -> Result<(), Error> {
    match (primary, cleanup) {
        (Err(primary), Err(cleanup)) => {
            logger.warn("cleanup failed after an earlier error", Some(&cleanup));
            Err(primary)
        }
        (Err(primary), Ok(())) => Err(primary),
        (Ok(()), cleanup) => cleanup,
    }
}

// Runs cleanup on drop unless `finish` already did; covers unwinding out of setup/run.
struct CleanupGuard<'a, L: Lifecycle + ?Sized> {
    lifecycle: &'a mut L,
    logger: &'a dyn Logger,
    armed: bool,
}

impl<L: Lifecycle + ?Sized> CleanupGuard<'_, L> {
    fn finish(mut self) -> Result<(), Error> {
        self.armed = false;
        self.lifecycle
            .cleanup(self.logger)
            .map_err(|err| err.or_phase(Phase::Cleanup))
    }
}

impl<L: Lifecycle + ?Sized> Drop for CleanupGuard<'_, L> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        if let Err(err) = self.lifecycle.cleanup(self.logger) {
            self.logger
                .warn("cleanup failed while unwinding", Some(&err.or_phase(Phase::Cleanup)));
        }
    }
}

struct FnLifecycle<S, R, C> {
    setup: Option<S>,
    run: Option<R>,
    cleanup: Option<C>,
}

impl<S, R, C> Lifecycle for FnLifecycle<S, R, C>
where
    S: FnOnce() -> Result<(), Error>,
    R: FnOnce() -> Result<(), Error>,
    C: FnOnce() -> Result<(), Error>,
{
    fn setup(&mut self, _logger: &dyn Logger) -> Result<(), Error> {
        self.setup.take().map_or(Ok(()), |setup| setup())
    }

    fn run(&mut self, _logger: &dyn Logger) -> Result<(), Error> {
        self.run.take().map_or(Ok(()), |run| run())
    }

    fn cleanup(&mut self, _logger: &dyn Logger) -> Result<(), Error> {
        self.cleanup.take().map_or(Ok(()), |cleanup| cleanup())
    }
}
