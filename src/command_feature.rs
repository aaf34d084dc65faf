//! Purpose: Run a child command as the feature while the Rox configuration is staged.
//! Exports: `CommandFeature`.
//! Role: The `run` phase of the `roxstage` CLI.
//! Invariants: The child runs in the working directory with inherited stdio.
//! Invariants: `ROX_CONFIG` is only set when staging is active.

use std::ffi::OsString;
use std::process::{Command, ExitStatus};

use roxstage::api::{Error, ErrorKind, Feature, FeatureContext, Logger};

pub(crate) struct CommandFeature {
    argv: Vec<OsString>,
}

impl CommandFeature {
    pub(crate) fn new(argv: Vec<OsString>) -> Self {
        Self { argv }
    }

    fn display(&self) -> String {
        self.argv
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Feature for CommandFeature {
    fn run(&mut self, ctx: &FeatureContext<'_>, logger: &dyn Logger) -> Result<(), Error> {
        let Some((program, args)) = self.argv.split_first() else {
            if ctx.verbose {
                logger.info("no command given; nothing to run");
            }
            return Ok(());
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(ctx.working_dir)
            .env("ROX_ACTIVE", if ctx.state.is_active() { "true" } else { "false" })
            .env("ROX_FILTERS", ctx.filters.join(","));
        match &ctx.artifact {
            Some(artifact) => command.env("ROX_CONFIG", artifact),
            None => command.env_remove("ROX_CONFIG"),
        };
        match ctx.seed {
            Some(seed) => command.env("ROX_SEED", seed.to_string()),
            None => command.env_remove("ROX_SEED"),
        };

        if ctx.verbose {
            logger.info(&format!("running `{}`", self.display()));
        }
        let status = command.status().map_err(|err| {
            Error::new(ErrorKind::Feature)
                .with_message(format!("failed to start `{}`", self.display()))
                .with_hint("Check that the command exists and is executable.")
                .with_source(err)
        })?;
        if status.success() {
            return Ok(());
        }
        Err(Error::new(ErrorKind::Feature)
            .with_message(format!("`{}` {}", self.display(), describe_status(status))))
    }
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".to_string(),
    }
}
