//! Logging infrastructure - structured tracing around native calls
//!
//! Design: `tracing` events under fixed `natcall::*` targets (`ffi`,
//! `marshal`, `errno`, `memory`, `library`) so native-call traffic can be
//! filtered separately.
//! Installation is optional and idempotent; with no subscriber installed
//! every event is a no-op.

use once_cell::sync::OnceCell;
use std::io;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Log file path; console output when `None`
    pub log_path: Option<String>,
    /// Enable JSON format (vs human-readable)
    pub json_format: bool,
    /// Show span events (enter/exit)
    pub show_spans: bool,
    /// Tag lines with thread ids
    pub thread_ids: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_path: None,
            json_format: false,
            show_spans: false,
            thread_ids: cfg!(debug_assertions),
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // NATCALL_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level_str) = std::env::var("NATCALL_LOG_LEVEL") {
            config.level = parse_level(&level_str);
        }

        // NATCALL_LOG_FILE: path to log file
        if let Ok(path) = std::env::var("NATCALL_LOG_FILE") {
            config.log_path = Some(path);
        }

        config.json_format = std::env::var("NATCALL_LOG_JSON").is_ok();
        config.show_spans = std::env::var("NATCALL_LOG_SPANS").is_ok();

        config
    }

    /// Errors only
    pub fn performance() -> Self {
        Self {
            level: Level::ERROR,
            log_path: None,
            json_format: false,
            show_spans: false,
            thread_ids: false,
        }
    }

    /// Every native call, coercion and lock release
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            log_path: None,
            json_format: false,
            show_spans: true,
            thread_ids: true,
        }
    }
}

fn parse_level(s: &str) -> Level {
    match s.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging with configuration from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("natcall={}", config.level.as_str().to_lowercase()))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let layer = fmt::layer()
            .with_span_events(span_events)
            .with_target(true)
            .with_thread_ids(config.thread_ids);

        let layer = match &config.log_path {
            Some(path) => {
                let path = Path::new(path);
                let dir = path.parent().unwrap_or_else(|| Path::new("."));
                let file = path
                    .file_name()
                    .map(|n| n.to_os_string())
                    .unwrap_or_else(|| "natcall.log".into());
                let appender = tracing_appender::rolling::never(dir, file);
                if config.json_format {
                    layer.json().with_writer(appender).boxed()
                } else {
                    layer.with_ansi(false).with_writer(appender).boxed()
                }
            }
            None if config.json_format => layer.json().with_writer(io::stderr).boxed(),
            None => layer.with_writer(io::stderr).boxed(),
        };

        // A subscriber installed elsewhere wins
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init();
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

/// Log a native call about to be dispatched
#[inline]
pub fn log_ffi_call(function: &str, arg_count: usize, releases_lock: bool) {
    tracing::trace!(
        target: "natcall::ffi",
        function,
        args = arg_count,
        releases_lock,
        "native call"
    );
}

/// Log a native return with the captured errno
#[inline]
pub fn log_ffi_return(function: &str, errno: i32) {
    tracing::trace!(target: "natcall::ffi", function, errno, "native return");
}

/// Log a call rejected before reaching native code
pub fn log_ffi_error(function: &str, error: &dyn std::error::Error) {
    tracing::debug!(
        target: "natcall::ffi",
        function,
        error = %error,
        "native call rejected"
    );
}

/// Log a conversion through the user protocol
#[inline]
pub fn log_coercion(from: &str, to: &dyn std::fmt::Display) {
    tracing::trace!(target: "natcall::marshal", from, to = %to, "argument conversion");
}

/// Log the execution lock being released around a native call
#[inline]
pub fn log_lock_release(function: &str) {
    tracing::trace!(target: "natcall::ffi", function, "releasing execution lock");
}

/// Log an explicit last-error reset
#[inline]
pub fn log_errno_reset(slot: &str, value: Option<i64>) {
    tracing::trace!(target: "natcall::errno", slot, value = ?value, "last error set");
}

/// Log a native allocation
#[inline]
pub fn log_alloc(ptr: *const u8, size: usize) {
    tracing::trace!(target: "natcall::memory", size, ptr = ?ptr, "allocated native buffer");
}

/// Log a native release
#[inline]
pub fn log_free(ptr: *const u8, size: usize) {
    tracing::trace!(target: "natcall::memory", size, ptr = ?ptr, "released native buffer");
}

/// Log a library open or symbol lookup
pub fn log_library(library: &str, symbol: Option<&str>, found: bool) {
    tracing::debug!(target: "natcall::library", library, symbol = ?symbol, found, "library lookup");
}

/// Performance tracking utilities
pub mod perf {
    use std::time::Instant;
    use tracing::debug;

    /// Track operation duration (returns guard that logs on drop)
    #[must_use]
    pub fn track(operation: &str) -> PerformanceGuard {
        PerformanceGuard {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub struct PerformanceGuard {
        operation: String,
        start: Instant,
    }

    impl Drop for PerformanceGuard {
        fn drop(&mut self) {
            let elapsed = self.start.elapsed();
            debug!(
                operation = %self.operation,
                duration_us = elapsed.as_micros() as u64,
                "operation completed"
            );
        }
    }
}
