use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Filter,
    Io,
    Feature,
}

/// Lifecycle phase an error surfaced from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Setup,
    Run,
    Cleanup,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Run => "run",
            Phase::Cleanup => "cleanup",
        }
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    path: Option<PathBuf>,
    phase: Option<Phase>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            path: None,
            phase: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Tags the phase unless a hook already did.
    pub(crate) fn or_phase(mut self, phase: Phase) -> Self {
        if self.phase.is_none() {
            self.phase = Some(phase);
        }
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        if let Some(phase) = self.phase {
            write!(f, " (phase: {})", phase.as_str())?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::Filter => 3,
        ErrorKind::Io => 4,
        ErrorKind::Feature => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, Phase, to_exit_code};

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::Usage, 2),
            (ErrorKind::Filter, 3),
            (ErrorKind::Io, 4),
            (ErrorKind::Feature, 5),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn or_phase_keeps_existing_tag() {
        let err = Error::new(ErrorKind::Io)
            .with_phase(Phase::Setup)
            .or_phase(Phase::Cleanup);
        assert_eq!(err.phase(), Some(Phase::Setup));

        let err = Error::new(ErrorKind::Io).or_phase(Phase::Cleanup);
        assert_eq!(err.phase(), Some(Phase::Cleanup));
    }

    #[test]
    fn display_includes_context() {
        let err = Error::new(ErrorKind::Feature)
            .with_message("command exited with status 3")
            .with_path("/tmp/work")
            .with_phase(Phase::Run);
        assert_eq!(
            err.to_string(),
            "Feature: command exited with status 3 (path: /tmp/work) (phase: run)"
        );
    }
}
