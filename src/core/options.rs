//! Purpose: Per-invocation plugin options and the opaque project context.
//! Exports: `PluginOptions`, `ProjectContext`, `ARTIFACT_NAME`, `CONFIG_EXTENSION`.
//! Role: Fixed configuration surface consumed by the runner, gate, and dispatcher.
//! Invariants: Options are immutable once built; the gate never writes back to them.
//! Invariants: `filters` and `seed` are carried for the feature, never read by the core.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the staged Rox configuration inside the working directory.
pub const ARTIFACT_NAME: &str = "rox.yml";

/// Required suffix for a usable Rox configuration path.
pub const CONFIG_EXTENSION: &str = ".yml";

pub const DEFAULT_ENCODING: &str = "UTF-8";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PluginOptions {
    pub skip: bool,
    pub verbose: bool,
    pub active: bool,
    pub config_path: Option<PathBuf>,
    pub encoding: String,
    pub filters: Vec<String>,
    pub seed: Option<i64>,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            skip: false,
            verbose: false,
            active: true,
            config_path: None,
            encoding: DEFAULT_ENCODING.to_string(),
            filters: Vec::new(),
            seed: None,
        }
    }
}

impl PluginOptions {
    /// Defaults for a project rooted at `basedir`.
    pub fn for_project(project: &ProjectContext) -> Self {
        Self {
            config_path: Some(default_config_path(project.basedir())),
            encoding: project.source_encoding().to_string(),
            ..Self::default()
        }
    }

    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn with_filters(mut self, filters: Vec<String>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_seed(mut self, seed: Option<i64>) -> Self {
        self.seed = seed;
        self
    }
}

/// Conventional location under the project's test resources.
pub fn default_config_path(basedir: &Path) -> PathBuf {
    basedir
        .join("src")
        .join("test")
        .join("resources")
        .join(ARTIFACT_NAME)
}

/// Project handle passed through to the filter and remover collaborators.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProjectContext {
    basedir: PathBuf,
    properties: BTreeMap<String, String>,
    source_encoding: Option<String>,
}

impl ProjectContext {
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            basedir: basedir.into(),
            properties: BTreeMap::new(),
            source_encoding: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties<I, K, V>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.properties.extend(
            properties
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
        self
    }

    pub fn with_source_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.source_encoding = Some(encoding.into());
        self
    }

    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Declared source encoding, UTF-8 when the project declares none.
    pub fn source_encoding(&self) -> &str {
        self.source_encoding.as_deref().unwrap_or(DEFAULT_ENCODING)
    }
}
