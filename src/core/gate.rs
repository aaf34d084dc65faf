//! Purpose: Decide whether Rox staging is active and stage the configuration when it is.
//! Exports: `ActivationGate`, `ActivationState`, `InactiveReason`, `ConfigIssue`,
//! `validate_config_path`.
//! Role: Setup half of the Rox lifecycle; its state drives the cleanup dispatcher.
//! Invariants: Configuration and staging problems degrade to `Inactive`; they never fail setup.
//! Invariants: Once inactive, a gate stays inactive for the rest of the invocation.
//! Invariants: A failed staging attempt leaves no artifact behind.
//! Invariants: Only an unusable working directory or an undeletable partial artifact is a
//! setup fault.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::error::{Error, ErrorKind, Phase};
use super::filter::{FilterRequest, ResourceFilter};
use super::log::Logger;
use super::options::{ARTIFACT_NAME, CONFIG_EXTENSION, PluginOptions, ProjectContext};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigIssue {
    Missing,
    NotAFile,
    WrongExtension,
    SourceIsArtifact,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigIssue::Missing => write!(f, "file does not exist"),
            ConfigIssue::NotAFile => write!(f, "not a regular file"),
            ConfigIssue::WrongExtension => write!(f, "name does not end with {CONFIG_EXTENSION}"),
            ConfigIssue::SourceIsArtifact => {
                write!(f, "file is the staged {ARTIFACT_NAME} location itself")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InactiveReason {
    Declined,
    Unconfigured,
    Invalid(ConfigIssue),
    StagingFailed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActivationState {
    Active,
    Inactive(InactiveReason),
}

impl ActivationState {
    pub fn is_active(self) -> bool {
        matches!(self, ActivationState::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivationState::Active => "active",
            ActivationState::Inactive(_) => "inactive",
        }
    }
}

/// Checks existence, file type, and extension. Symlinks are followed.
pub fn validate_config_path(path: &Path) -> Result<(), ConfigIssue> {
    let meta = fs::metadata(path).map_err(|_| ConfigIssue::Missing)?;
    if !meta.is_file() {
        return Err(ConfigIssue::NotAFile);
    }
    let has_extension = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(CONFIG_EXTENSION));
    if !has_extension {
        return Err(ConfigIssue::WrongExtension);
    }
    Ok(())
}

pub struct ActivationGate<F> {
    project: ProjectContext,
    filter: F,
    latch: Option<InactiveReason>,
}

impl<F: ResourceFilter> ActivationGate<F> {
    pub fn new(project: ProjectContext, filter: F) -> Self {
        Self {
            project,
            filter,
            latch: None,
        }
    }

    /// Reason the gate latched off, if it did.
    pub fn latched(&self) -> Option<InactiveReason> {
        self.latch
    }

    pub fn setup(
        &mut self,
        options: &PluginOptions,
        working_dir: &Path,
        logger: &dyn Logger,
    ) -> Result<ActivationState, Error> {
        if options.verbose {
            logger.info("preparing rox configuration");
        }
        if let Some(reason) = self.latch {
            if options.verbose {
                logger.info("rox already disabled for this invocation");
            }
            return Ok(ActivationState::Inactive(reason));
        }

        let config = match (&options.config_path, options.active) {
            (_, false) => {
                logger.info("rox is disabled; no configuration staged");
                return Ok(self.latch_off(InactiveReason::Declined));
            }
            (None, true) => {
                logger.info("no rox configuration to use");
                return Ok(self.latch_off(InactiveReason::Unconfigured));
            }
            (Some(path), true) => path,
        };

        if let Err(issue) = validate_config_path(config) {
            return Ok(self.degrade_invalid(config, issue, logger));
        }

        ensure_working_dir(working_dir)?;
        if is_artifact_location(config, working_dir) {
            return Ok(self.degrade_invalid(config, ConfigIssue::SourceIsArtifact, logger));
        }

        let request = staging_request(config, working_dir, &options.encoding);
        if let Err(err) = self.filter.filter_copy(&self.project, &request) {
            logger.warn(
                &format!(
                    "unable to filter rox configuration {}; rox will be disabled",
                    config.display()
                ),
                Some(&err),
            );
            let state = self.latch_off(InactiveReason::StagingFailed);
            discard_partial_artifact(&request.dest_path())?;
            return Ok(state);
        }

        if options.verbose {
            logger.info(&format!(
                "staged rox configuration at {}",
                request.dest_path().display()
            ));
        }
        Ok(ActivationState::Active)
    }

    fn degrade_invalid(
        &mut self,
        config: &Path,
        issue: ConfigIssue,
        logger: &dyn Logger,
    ) -> ActivationState {
        logger.warn(
            &format!(
                "rox configuration {} is unusable ({issue}); rox will be disabled",
                config.display()
            ),
            None,
        );
        self.latch_off(InactiveReason::Invalid(issue))
    }

    fn latch_off(&mut self, reason: InactiveReason) -> ActivationState {
        self.latch = Some(reason);
        ActivationState::Inactive(reason)
    }
}

fn staging_request(config: &Path, working_dir: &Path, encoding: &str) -> FilterRequest {
    let source_dir = config
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let source_file = config
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    FilterRequest {
        source_dir,
        source_file,
        dest_dir: working_dir.to_path_buf(),
        dest_file: ARTIFACT_NAME.to_string(),
        encoding: encoding.to_string(),
    }
}

fn ensure_working_dir(working_dir: &Path) -> Result<(), Error> {
    match fs::metadata(working_dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::new(ErrorKind::Io)
            .with_message("working directory is not a directory")
            .with_path(working_dir)
            .with_phase(Phase::Setup)),
        Err(err) => Err(Error::new(ErrorKind::Io)
            .with_message("working directory is not accessible")
            .with_path(working_dir)
            .with_phase(Phase::Setup)
            .with_source(err)),
    }
}

// A filter may fail after creating the destination; cleanup skips inactive runs.
fn discard_partial_artifact(dest: &Path) -> Result<(), Error> {
    match fs::symlink_metadata(dest) {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(discard_failed(dest, err)),
    }
    match fs::remove_file(dest) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(discard_failed(dest, err)),
    }
}

fn discard_failed(dest: &Path, err: io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("failed to discard partially staged configuration")
        .with_path(dest)
        .with_phase(Phase::Setup)
        .with_source(err)
}

// Also catches a pre-existing artifact symlinked back to the source.
fn is_artifact_location(config: &Path, working_dir: &Path) -> bool {
    let dest = working_dir.join(ARTIFACT_NAME);
    match (fs::canonicalize(config), fs::canonicalize(dest)) {
        (Ok(source), Ok(dest)) => source == dest,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ActivationGate, ActivationState, ConfigIssue, InactiveReason, validate_config_path,
    };
    use crate::core::error::{Error, ErrorKind, Phase};
    use crate::core::filter::{FilterRequest, PropertyFilter, ResourceFilter};
    use crate::core::log::RecordingLogger;
    use crate::core::options::{PluginOptions, ProjectContext};
    use std::cell::Cell;
    use std::fs;
    use std::path::Path;

    struct FailingFilter;

    impl ResourceFilter for FailingFilter {
        fn filter_copy(&self, _: &ProjectContext, _: &FilterRequest) -> Result<(), Error> {
            Err(Error::new(ErrorKind::Filter).with_message("boom"))
        }
    }

    struct TruncatingFilter;

    impl ResourceFilter for TruncatingFilter {
        fn filter_copy(&self, _: &ProjectContext, request: &FilterRequest) -> Result<(), Error> {
            fs::write(request.dest_path(), "half: ").expect("partial write");
            Err(Error::new(ErrorKind::Filter).with_message("no space left on device"))
        }
    }

    #[derive(Default)]
    struct CountingFilter {
        calls: Cell<usize>,
    }

    impl ResourceFilter for CountingFilter {
        fn filter_copy(&self, project: &ProjectContext, request: &FilterRequest) -> Result<(), Error> {
            self.calls.set(self.calls.get() + 1);
            PropertyFilter::new().filter_copy(project, request)
        }
    }

    fn write_config(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let resources = dir.join("src").join("test").join("resources");
        fs::create_dir_all(&resources).expect("resources dir");
        let path = resources.join(name);
        fs::write(&path, content).expect("write config");
        path
    }

    fn work_dir(dir: &Path) -> std::path::PathBuf {
        let work = dir.join("work");
        fs::create_dir_all(&work).expect("work dir");
        work
    }

    #[test]
    fn validation_reports_each_issue() {
        let temp = tempfile::tempdir().expect("tempdir");
        let good = write_config(temp.path(), "rox.yml", "");
        let txt = write_config(temp.path(), "notes.txt", "");
        let dir = temp.path().join("dir.yml");
        fs::create_dir_all(&dir).expect("mkdir");

        assert_eq!(validate_config_path(&good), Ok(()));
        assert_eq!(validate_config_path(&txt), Err(ConfigIssue::WrongExtension));
        assert_eq!(validate_config_path(&dir), Err(ConfigIssue::NotAFile));
        assert_eq!(
            validate_config_path(&temp.path().join("nope.yml")),
            Err(ConfigIssue::Missing)
        );
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_counts_as_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let link = temp.path().join("rox.yml");
        std::os::unix::fs::symlink(temp.path().join("absent.yml"), &link).expect("symlink");
        assert_eq!(validate_config_path(&link), Err(ConfigIssue::Missing));
    }

    #[test]
    fn declined_and_unconfigured_log_info_only() {
        let temp = tempfile::tempdir().expect("tempdir");
        let work = work_dir(temp.path());
        let logger = RecordingLogger::new();

        let mut gate = ActivationGate::new(ProjectContext::new(temp.path()), PropertyFilter::new());
        let options = PluginOptions::default()
            .with_config_path(write_config(temp.path(), "rox.yml", "a: 1"))
            .with_active(false);
        let state = gate.setup(&options, &work, &logger).expect("setup");
        assert_eq!(state, ActivationState::Inactive(InactiveReason::Declined));

        let mut gate = ActivationGate::new(ProjectContext::new(temp.path()), PropertyFilter::new());
        let state = gate
            .setup(&PluginOptions::default(), &work, &logger)
            .expect("setup");
        assert_eq!(state, ActivationState::Inactive(InactiveReason::Unconfigured));

        assert!(logger.warnings().is_empty());
        assert_eq!(logger.infos().len(), 2);
        assert!(!work.join("rox.yml").exists());
    }

    #[test]
    fn zero_length_config_is_staged() {
        let temp = tempfile::tempdir().expect("tempdir");
        let work = work_dir(temp.path());
        let config = write_config(temp.path(), "rox.yml", "");
        let logger = RecordingLogger::new();

        let mut gate = ActivationGate::new(ProjectContext::new(temp.path()), PropertyFilter::new());
        let options = PluginOptions::default().with_config_path(config);
        assert_eq!(
            gate.setup(&options, &work, &logger).expect("setup"),
            ActivationState::Active
        );
        assert_eq!(fs::read(work.join("rox.yml")).expect("staged"), b"");
    }

    #[test]
    fn custom_config_name_stages_under_artifact_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        let work = work_dir(temp.path());
        let config = write_config(temp.path(), "ci-rox.yml", "name: ${n}\n");
        let logger = RecordingLogger::new();

        let project = ProjectContext::new(temp.path()).with_property("n", "ci");
        let mut gate = ActivationGate::new(project, PropertyFilter::new());
        let options = PluginOptions::default().with_config_path(config);
        assert!(gate.setup(&options, &work, &logger).expect("setup").is_active());
        assert_eq!(
            fs::read_to_string(work.join("rox.yml")).expect("staged"),
            "name: ci\n"
        );
        assert!(!work.join("ci-rox.yml").exists());
    }

    #[test]
    fn repeated_setup_overwrites_artifact() {
        let temp = tempfile::tempdir().expect("tempdir");
        let work = work_dir(temp.path());
        let config = write_config(temp.path(), "rox.yml", "v: 1\n");
        let logger = RecordingLogger::new();

        let filter = CountingFilter::default();
        let mut gate = ActivationGate::new(ProjectContext::new(temp.path()), filter);
        let options = PluginOptions::default().with_config_path(&config);
        assert!(gate.setup(&options, &work, &logger).expect("first").is_active());

        fs::write(&config, "v: 2\n").expect("rewrite");
        assert!(gate.setup(&options, &work, &logger).expect("second").is_active());
        assert_eq!(fs::read_to_string(work.join("rox.yml")).expect("staged"), "v: 2\n");
        assert_eq!(gate.filter.calls.get(), 2);
        assert!(logger.warnings().is_empty());
    }

    #[test]
    fn staging_failure_degrades_and_latches() {
        let temp = tempfile::tempdir().expect("tempdir");
        let work = work_dir(temp.path());
        let config = write_config(temp.path(), "rox.yml", "a: 1");
        let logger = RecordingLogger::new();

        let mut gate = ActivationGate::new(ProjectContext::new(temp.path()), FailingFilter);
        let options = PluginOptions::default().with_config_path(config);
        let state = gate.setup(&options, &work, &logger).expect("setup");
        assert_eq!(state, ActivationState::Inactive(InactiveReason::StagingFailed));

        let warnings = logger.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].cause.as_deref().unwrap_or_default().contains("boom"));

        let again = gate.setup(&options, &work, &logger).expect("setup again");
        assert_eq!(again, state);
        assert_eq!(gate.latched(), Some(InactiveReason::StagingFailed));
        assert_eq!(logger.warnings().len(), 1);
    }

    #[test]
    fn config_inside_working_dir_is_not_staged_over_itself() {
        let temp = tempfile::tempdir().expect("tempdir");
        let work = work_dir(temp.path());
        fs::write(work.join("rox.yml"), "keep: ${me}\n").expect("write");
        let logger = RecordingLogger::new();

        let mut gate = ActivationGate::new(ProjectContext::new(temp.path()), PropertyFilter::new());
        let options = PluginOptions::default().with_config_path(work.join("rox.yml"));
        let state = gate.setup(&options, &work, &logger).expect("setup");
        assert_eq!(
            state,
            ActivationState::Inactive(InactiveReason::Invalid(ConfigIssue::SourceIsArtifact))
        );
        assert_eq!(
            fs::read_to_string(work.join("rox.yml")).expect("source"),
            "keep: ${me}\n"
        );
    }

    #[test]
    fn missing_working_dir_is_a_setup_fault() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = write_config(temp.path(), "rox.yml", "a: 1");
        let logger = RecordingLogger::new();

        let mut gate = ActivationGate::new(ProjectContext::new(temp.path()), PropertyFilter::new());
        let options = PluginOptions::default().with_config_path(config);
        let err = gate
            .setup(&options, &temp.path().join("missing"), &logger)
            .expect_err("fault");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.phase(), Some(Phase::Setup));
    }

    #[test]
    fn verbose_adds_progress_messages() {
        let temp = tempfile::tempdir().expect("tempdir");
        let work = work_dir(temp.path());
        let config = write_config(temp.path(), "rox.yml", "a: 1");

        let quiet = RecordingLogger::new();
        let mut gate = ActivationGate::new(ProjectContext::new(temp.path()), PropertyFilter::new());
        let options = PluginOptions::default().with_config_path(&config);
        gate.setup(&options, &work, &quiet).expect("setup");
        assert!(quiet.entries().is_empty());

        let loud = RecordingLogger::new();
        let mut gate = ActivationGate::new(ProjectContext::new(temp.path()), PropertyFilter::new());
        gate.setup(&options.clone().with_verbose(true), &work, &loud)
            .expect("setup");
        assert_eq!(loud.infos().len(), 2);
    }

    #[test]
    fn partial_artifact_is_discarded_when_staging_fails() {
        let temp = tempfile::tempdir().expect("tempdir");
        let work = work_dir(temp.path());
        let config = write_config(temp.path(), "rox.yml", "a: 1");
        let logger = RecordingLogger::new();

        let mut gate = ActivationGate::new(ProjectContext::new(temp.path()), TruncatingFilter);
        let options = PluginOptions::default().with_config_path(config);
        let state = gate.setup(&options, &work, &logger).expect("setup");

        assert_eq!(state, ActivationState::Inactive(InactiveReason::StagingFailed));
        assert!(fs::symlink_metadata(work.join("rox.yml")).is_err());
        assert_eq!(logger.warnings().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn artifact_symlinked_to_config_is_not_staged_over_it() {
        let temp = tempfile::tempdir().expect("tempdir");
        let work = work_dir(temp.path());
        let config = write_config(temp.path(), "rox.yml", "keep: ${me}\n");
        std::os::unix::fs::symlink(&config, work.join("rox.yml")).expect("symlink");
        let logger = RecordingLogger::new();

        let project = ProjectContext::new(temp.path()).with_property("me", "x");
        let mut gate = ActivationGate::new(project, PropertyFilter::new());
        let options = PluginOptions::default().with_config_path(&config);
        let state = gate.setup(&options, &work, &logger).expect("setup");

        assert_eq!(
            state,
            ActivationState::Inactive(InactiveReason::Invalid(ConfigIssue::SourceIsArtifact))
        );
        assert_eq!(fs::read_to_string(&config).expect("source"), "keep: ${me}\n");
        assert!(
            fs::symlink_metadata(work.join("rox.yml"))
                .expect("link kept")
                .file_type()
                .is_symlink()
        );
        assert_eq!(logger.warnings().len(), 1);
    }
}
