//! Purpose: Filtered copy of a single resource with placeholder substitution.
//! Exports: `ResourceFilter`, `FilterRequest`, `PropertyFilter`, `Encoding`.
//! Role: Default staging collaborator behind the activation gate.
//! Invariants: Every failure is reported as `ErrorKind::Filter`; nothing panics on bad input.
//! Invariants: The destination is replaced atomically; a failed copy leaves it untouched.
//! Invariants: An existing destination symlink is replaced, never written through.
//! Invariants: Unresolved placeholders stay verbatim.

use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tempfile::NamedTempFile;

use super::error::{Error, ErrorKind};
use super::options::ProjectContext;

pub trait ResourceFilter {
    fn filter_copy(&self, project: &ProjectContext, request: &FilterRequest) -> Result<(), Error>;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FilterRequest {
    pub source_dir: PathBuf,
    pub source_file: String,
    pub dest_dir: PathBuf,
    pub dest_file: String,
    pub encoding: String,
}

impl FilterRequest {
    pub fn source_path(&self) -> PathBuf {
        self.source_dir.join(&self.source_file)
    }

    pub fn dest_path(&self) -> PathBuf {
        self.dest_dir.join(&self.dest_file)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Encoding {
    Utf8,
    Ascii,
    Latin1,
}

impl Encoding {
    pub fn parse(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "utf-8" | "utf8" => Some(Encoding::Utf8),
            "us-ascii" | "ascii" => Some(Encoding::Ascii),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => Some(Encoding::Latin1),
            _ => None,
        }
    }

    fn decode(self, bytes: Vec<u8>) -> Result<String, Error> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes).map_err(|err| {
                Error::new(ErrorKind::Filter)
                    .with_message("resource is not valid UTF-8")
                    .with_source(err)
            }),
            Encoding::Ascii => {
                if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
                    return Err(Error::new(ErrorKind::Filter)
                        .with_message(format!("non-ASCII byte at offset {pos}")));
                }
                Ok(bytes.into_iter().map(char::from).collect())
            }
            Encoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }

    fn encode(self, text: &str) -> Result<Vec<u8>, Error> {
        let limit = match self {
            Encoding::Utf8 => return Ok(text.as_bytes().to_vec()),
            Encoding::Ascii => 0x7f,
            Encoding::Latin1 => 0xff,
        };
        text.chars()
            .map(|c| {
                u8::try_from(u32::from(c))
                    .ok()
                    .filter(|b| u32::from(*b) <= limit)
                    .ok_or_else(|| {
                        Error::new(ErrorKind::Filter).with_message(format!(
                            "character {c:?} cannot be encoded as {self:?}"
                        ))
                    })
            })
            .collect()
    }
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}\s]+)\}|@([A-Za-z0-9_.\-]+)@").expect("placeholder pattern")
});

type EnvLookup = fn(&str) -> Option<String>;

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Copies one resource, substituting `${name}` and `@name@` placeholders.
///
/// Names resolve against the project's user properties first, then
/// `env.NAME` from the process environment, then the built-ins `basedir`,
/// `project.basedir`, and `project.build.sourceEncoding`.
#[derive(Clone, Copy, Debug)]
pub struct PropertyFilter {
    env: EnvLookup,
}

impl Default for PropertyFilter {
    fn default() -> Self {
        Self { env: process_env }
    }
}

impl PropertyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    pub fn interpolate<'a>(&self, project: &ProjectContext, text: &'a str) -> Cow<'a, str> {
        PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            self.resolve(project, name)
                .unwrap_or_else(|| caps[0].to_string())
        })
    }

    fn resolve(&self, project: &ProjectContext, name: &str) -> Option<String> {
        if let Some(value) = project.property(name) {
            return Some(value.to_string());
        }
        if let Some(var) = name.strip_prefix("env.") {
            return (self.env)(var);
        }
        match name {
            "basedir" | "project.basedir" => Some(project.basedir().display().to_string()),
            "project.build.sourceEncoding" => Some(project.source_encoding().to_string()),
            _ => None,
        }
    }
}

impl ResourceFilter for PropertyFilter {
    fn filter_copy(&self, project: &ProjectContext, request: &FilterRequest) -> Result<(), Error> {
        let encoding = Encoding::parse(&request.encoding).ok_or_else(|| {
            Error::new(ErrorKind::Filter)
                .with_message(format!("unsupported encoding {:?}", request.encoding))
                .with_hint("Use UTF-8, US-ASCII, or ISO-8859-1.")
        })?;

        let source = request.source_path();
        let bytes = fs::read(&source).map_err(|err| {
            Error::new(ErrorKind::Filter)
                .with_message("failed to read resource")
                .with_path(&source)
                .with_source(err)
        })?;
        let text = encoding
            .decode(bytes)
            .map_err(|err| err.with_path(&source))?;

        let filtered = self.interpolate(project, &text);
        let encoded = encoding.encode(&filtered)?;

        write_replacing(&request.dest_path(), &encoded)
    }
}

// Rename over `dest` so a symlink there is swapped out rather than followed.
fn write_replacing(dest: &Path, bytes: &[u8]) -> Result<(), Error> {
    let write_failed = |err: std::io::Error| {
        Error::new(ErrorKind::Filter)
            .with_message("failed to write filtered resource")
            .with_path(dest)
            .with_source(err)
    };
    let dir = dest
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(dir).map_err(write_failed)?;
    staged.write_all(bytes).map_err(write_failed)?;
    staged.as_file().sync_all().map_err(write_failed)?;
    staged.persist(dest).map_err(|err| write_failed(err.error))?;
    Ok(())
}
