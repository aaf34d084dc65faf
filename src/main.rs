//! Purpose: `roxstage` CLI entry point.
//! Role: Binary crate root; parses args, runs the Rox lifecycle around an optional command.
//! Invariants: Exit status 0 on success, including skipped and degraded runs.
//! Invariants: Non-interactive errors and notices are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::error::Error as StdError;
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{ArgAction, Parser, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

mod command_feature;

use command_feature::CommandFeature;
use roxstage::api::{
    ARTIFACT_NAME, Error, ErrorKind, Logger, PluginOptions, ProjectContext, RoxStaging,
    to_exit_code,
};
use roxstage::notice::{Notice, notice_json};

const CMD: &str = "roxstage";

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                return Ok(0);
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Try `roxstage --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    init_tracing();
    execute_cli(cli).map_err(|err| (err, color_mode))?;
    Ok(0)
}

fn execute_cli(cli: Cli) -> Result<(), Error> {
    let working_dir = std::env::current_dir().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to resolve the current directory")
            .with_source(err)
    })?;
    let basedir = cli.basedir.clone().unwrap_or_else(|| working_dir.clone());

    let mut project = ProjectContext::new(&basedir).with_properties(cli.defines.clone());
    if let Some(encoding) = &cli.source_encoding {
        project = project.with_source_encoding(encoding);
    }

    let mut options = PluginOptions::for_project(&project)
        .with_skip(cli.skip)
        .with_verbose(cli.verbose)
        .with_active(cli.rox_active)
        .with_filters(cli.filters.clone())
        .with_seed(cli.seed);
    if let Some(path) = &cli.rox_config {
        options = options.with_config_path(path);
    }
    if let Some(encoding) = &cli.encoding {
        options = options.with_encoding(encoding);
    }

    let logger = NoticeLogger {
        color_mode: cli.color,
        artifact: working_dir.join(ARTIFACT_NAME),
        config: options.config_path.clone(),
    };
    let feature = CommandFeature::new(cli.command);
    let mut staging = RoxStaging::new(project, options, working_dir, feature);
    let result = staging.execute(&logger);
    if cli.verbose
        && let Some(state) = staging.state()
    {
        logger.info(&format!("rox staging was {}", state.as_str()));
    }
    result
}

#[derive(Parser)]
#[command(
    name = "roxstage",
    version,
    about = "Stage a filtered rox.yml for one build step, then always remove it",
    long_about = None,
    after_help = r#"EXAMPLES
  $ roxstage -- mvn test
  $ roxstage --rox-config ci/rox.yml -D apiKey=abc123 -- ./run-tests.sh
  $ roxstage --rox-active false -- ./run-tests.sh

The command runs in the current directory with ROX_ACTIVE, ROX_CONFIG,
ROX_FILTERS, and ROX_SEED set. An unusable configuration disables rox with a
warning; it never fails the build."#
)]
struct Cli {
    #[arg(long, help = "Skip setup, run, and cleanup entirely")]
    skip: bool,
    #[arg(short, long, help = "Log each lifecycle step")]
    verbose: bool,
    #[arg(
        long,
        value_name = "BOOL",
        default_value_t = true,
        action = ArgAction::Set,
        help = "Whether rox staging should be attempted"
    )]
    rox_active: bool,
    #[arg(
        long,
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        help = "Rox configuration (default: <basedir>/src/test/resources/rox.yml)"
    )]
    rox_config: Option<PathBuf>,
    #[arg(
        long,
        value_name = "DIR",
        value_hint = ValueHint::DirPath,
        help = "Project base directory (default: current directory)"
    )]
    basedir: Option<PathBuf>,
    #[arg(
        long,
        value_name = "ENC",
        help = "Encoding used when filtering (default: project source encoding)"
    )]
    encoding: Option<String>,
    #[arg(
        long,
        value_name = "ENC",
        help = "Project source encoding (default: UTF-8)"
    )]
    source_encoding: Option<String>,
    #[arg(
        short = 'D',
        long = "define",
        value_name = "KEY=VALUE",
        value_parser = parse_define,
        help = "Property substituted for ${KEY} and @KEY@ placeholders"
    )]
    defines: Vec<(String, String)>,
    #[arg(
        long = "filter",
        value_name = "FILTER",
        help = "Filter passed to the command as ROX_FILTERS"
    )]
    filters: Vec<String>,
    #[arg(
        long,
        value_name = "N",
        allow_negative_numbers = true,
        help = "Seed passed to the command as ROX_SEED"
    )]
    seed: Option<i64>,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,
    #[arg(last = true, value_name = "COMMAND", help = "Command to run while rox.yml is staged")]
    command: Vec<OsString>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

fn parse_define(raw: &str) -> Result<(String, String), String> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(format!("expected KEY=VALUE, got `{raw}`"));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err("property name must not be empty".to_string());
    }
    Ok((key.to_string(), value.to_string()))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Info goes to tracing; warnings become structured notices about the staged artifact.
struct NoticeLogger {
    color_mode: ColorMode,
    artifact: PathBuf,
    config: Option<PathBuf>,
}

impl Logger for NoticeLogger {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str, cause: Option<&(dyn StdError + 'static)>) {
        let mut notice = Notice::warning(CMD, &self.artifact, message)
            .with_time(notice_time_now().unwrap_or_default())
            .with_config(self.config.as_deref());
        if let Some(cause) = cause {
            notice = notice.with_cause(cause.to_string());
        }
        emit_notice(&notice, self.color_mode);
    }
}

enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn notice_time_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()?;
    ts.format(&Rfc3339).ok()
}

fn emit_notice(notice: &Notice, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", notice_text(notice, color_mode.use_color(is_tty)));
        return;
    }

    let value = notice_json(notice);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn notice_text(notice: &Notice, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("warning:", use_color, AnsiColor::Yellow),
        notice.message
    )];
    if let Some(config) = &notice.config {
        lines.push(format!("  config: {}", config.display()));
    }
    lines.push(format!("  artifact: {}", notice.artifact.display()));
    if let Some(cause) = &notice.cause {
        lines.push(format!("  caused by: {cause}"));
    }
    lines.join("\n")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Filter => "resource filtering failed".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Feature => "command failed".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut body = json!({
        "kind": format!("{:?}", err.kind()),
        "message": error_message(err),
    });
    if let Some(hint) = err.hint() {
        body["hint"] = json!(hint);
    }
    if let Some(path) = err.path() {
        body["path"] = json!(path.display().to_string());
    }
    if let Some(phase) = err.phase() {
        body["phase"] = json!(phase.as_str());
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        body["causes"] = json!(causes);
    }
    json!({ "error": body })
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    )];
    match (err.phase(), err.path()) {
        (Some(phase), Some(path)) => {
            lines.push(format!("  during {}: {}", phase.as_str(), path.display()));
        }
        (Some(phase), None) => lines.push(format!("  during {}", phase.as_str())),
        (None, Some(path)) => lines.push(format!("  at {}", path.display())),
        (None, None) => {}
    }
    lines.extend(
        error_causes(err)
            .into_iter()
            .map(|cause| format!("  caused by: {cause}")),
    );
    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
