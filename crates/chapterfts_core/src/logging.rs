//! Logging bootstrap.
//!
//! # Responsibility
//! - Start the `flexi_logger` backend once per process, writing either to
//!   stderr or to size-rotated files.
//! - Record panics as log events before the previous hook runs.
//!
//! # Invariants
//! - Repeating initialization with the same level and target succeeds.
//! - Repeating it with a different level or target is an error.
//! - Initialization never panics.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, LogSpecification, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const LOG_FILE_BASENAME: &str = "chapterfts";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 4;
const PANIC_PAYLOAD_LIMIT: usize = 200;

static ACTIVE_LOGGER: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// Destination of log records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Rolling files under an absolute directory.
    Directory(PathBuf),
}

impl Display for LogTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stderr => write!(f, "stderr"),
            Self::Directory(dir) => write!(f, "{}", dir.display()),
        }
    }
}

struct ActiveLogger {
    level: LevelFilter,
    target: LogTarget,
    _handle: LoggerHandle,
}

/// Initializes logging with `level` (`trace`..`error`, or `warning`) and `target`.
///
/// Errors are returned as messages: unknown levels, relative log
/// directories, conflicting re-initialization, or a backend failure.
pub fn init_logging(level: &str, target: LogTarget) -> Result<(), String> {
    let level = parse_level(level)?;
    let target = check_target(target)?;

    let active = ACTIVE_LOGGER.get_or_try_init(|| start_logger(level, target.clone()))?;

    if active.level != level || active.target != target {
        return Err(format!(
            "logging already running with level={} target={}; cannot switch to level={level} target={target}",
            active.level, active.target
        ));
    }
    Ok(())
}

/// Level and target of the running logger, if any.
pub fn logging_status() -> Option<(LevelFilter, LogTarget)> {
    ACTIVE_LOGGER
        .get()
        .map(|active| (active.level, active.target.clone()))
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_logger(level: LevelFilter, target: LogTarget) -> Result<ActiveLogger, String> {
    let spec = LogSpecification::builder().default(level).build();
    let logger = Logger::with(spec);

    let logger = match &target {
        LogTarget::Stderr => logger
            .log_to_stderr()
            .format_for_stderr(flexi_logger::default_format),
        LogTarget::Directory(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|err| format!("cannot create log directory `{}`: {err}", dir.display()))?;
            let files = FileSpec::default()
                .directory(dir.as_path())
                .basename(LOG_FILE_BASENAME);
            logger
                .log_to_file(files)
                .rotate(
                    Criterion::Size(ROTATE_AT_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
                )
                .write_mode(WriteMode::BufferAndFlush)
                .append()
                .format_for_files(flexi_logger::detailed_format)
        }
    };

    let handle = logger
        .start()
        .map_err(|err| format!("logger backend did not start: {err}"))?;
    install_panic_hook();

    info!(
        "event=logging_init module=core status=ok level={level} target={target} version={}",
        crate::core_version()
    );
    Ok(ActiveLogger {
        level,
        target,
        _handle: handle,
    })
}

fn parse_level(level: &str) -> Result<LevelFilter, String> {
    let name = level.trim().to_ascii_lowercase();
    let name = if name == "warning" { "warn" } else { name.as_str() };
    match name.parse::<LevelFilter>() {
        Ok(LevelFilter::Off) | Err(_) => Err(format!(
            "unknown log level `{}`; use trace, debug, info, warn or error",
            level.trim()
        )),
        Ok(parsed) => Ok(parsed),
    }
}

fn check_target(target: LogTarget) -> Result<LogTarget, String> {
    if let LogTarget::Directory(dir) = &target {
        if !dir.is_absolute() {
            return Err(format!(
                "log directory `{}` is not an absolute path",
                dir.display()
            ));
        }
    }
    Ok(target)
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map_or_else(|| "unknown".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));
        error!(
            "event=panic module=core status=error location={location} payload={}",
            one_line(&panic_payload(info.payload()), PANIC_PAYLOAD_LIMIT)
        );
        previous(info);
    }));
}

fn panic_payload(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<non-string payload>".to_string())
}

/// Joins lines and cuts to `limit` characters; panic messages may quote chapter text.
fn one_line(value: &str, limit: usize) -> String {
    let flat = value.replace(['\r', '\n'], " ");
    match flat.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}
