//! Purpose: Define a stable, structured schema for non-fatal stderr notices.
//! Exports: `Notice`, `notice_json`.
//! Role: Shared contract for degradation warnings emitted by the CLI.
//! Invariants: Notices are non-fatal and never change the exit status.
//! Invariants: JSON schema is additive-only once published; absent optional fields are omitted.
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

/// A warning about the staged Rox configuration at `artifact`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: String,
    pub time: String,
    pub cmd: String,
    pub artifact: PathBuf,
    pub config: Option<PathBuf>,
    pub message: String,
    pub cause: Option<String>,
}

impl Notice {
    pub fn warning(cmd: &str, artifact: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind: "warning".to_string(),
            time: String::new(),
            cmd: cmd.to_string(),
            artifact: artifact.into(),
            config: None,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = time.into();
        self
    }

    pub fn with_config(mut self, config: Option<&Path>) -> Self {
        self.config = config.map(Path::to_path_buf);
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut body = json!({
        "kind": notice.kind,
        "time": notice.time,
        "cmd": notice.cmd,
        "artifact": notice.artifact.display().to_string(),
        "message": notice.message,
    });
    if let Some(config) = &notice.config {
        body["config"] = json!(config.display().to_string());
    }
    if let Some(cause) = &notice.cause {
        body["cause"] = json!(cause);
    }
    json!({ "notice": body })
}
