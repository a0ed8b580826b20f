//! Toggles Logging
//!
//! Leveled, structured logging for the toggles crates, configured from the
//! environment and overridable at runtime by front-ends such as `togglectl`.
//!
//! # Usage
//!
//! ```rust
//! use toggles_log::{debug, info, warn};
//!
//! info!("Serving feature requests");
//! debug!(target: "toggles::store", "Beginning transaction");
//!
//! // Key/value pairs go before the message, separated by `;`
//! let id = "bb7fe5b6-24a5-4218-bc61-b487bbad9580";
//! info!(feature_id = id, customers = 3; "Created feature");
//! warn!(feature_id = id; "Stale update rejected");
//! ```
//!
//! # Environment Variables
//!
//! - `TOGGLES_DEBUG=1` - Enable debug logging
//! - `TOGGLES_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `TOGGLES_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `TOGGLES_LOG_COLOR=1|0` - Enable/disable colors
//! - `TOGGLES_LOG_TIMESTAMPS=1|0` - Include timestamps
//! - `TOGGLES_LOG_MODULE=1|0` - Include the module path

use once_cell::sync::OnceCell;
use std::env;
use std::fmt::Display;
use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

// ============================================================================
// Log Levels
// ============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    /// Trace level (most verbose)
    Trace = 0,
    /// Debug level
    Debug = 1,
    /// Info level
    Info = 2,
    /// Warning level
    Warn = 3,
    /// Error level (least verbose)
    Error = 4,
    /// Off (no logging)
    Off = 5,
}

impl Level {
    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Get level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Off => "OFF",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            4 => Level::Error,
            _ => Level::Off,
        }
    }

    #[cfg(feature = "color")]
    fn colored(&self) -> colored::ColoredString {
        use colored::Colorize;
        match self {
            Level::Trace => "TRACE".magenta(),
            Level::Debug => "DEBUG".blue(),
            Level::Info => "INFO".green(),
            Level::Warn => "WARN".yellow(),
            Level::Error => "ERROR".red().bold(),
            Level::Off => "OFF".white(),
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable, one line per event with aligned level
    Pretty,
    /// Short single-line format
    Compact,
    /// One JSON object per line
    Json,
}

impl Format {
    /// Parse a format name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Global Configuration
// ============================================================================

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

static CONFIG: OnceCell<LogConfig> = OnceCell::new();

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether colors are enabled
    pub color: bool,
    /// Whether to include timestamps
    pub timestamps: bool,
    /// Whether to include module path
    pub module_path: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            color: false,
            timestamps: true,
            module_path: true,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

impl LogConfig {
    /// Read the configuration from `TOGGLES_*` environment variables.
    pub fn from_env() -> Self {
        let debug = env_flag("TOGGLES_DEBUG").unwrap_or(false);

        let level = env::var("TOGGLES_LOG_LEVEL")
            .ok()
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = env::var("TOGGLES_LOG_FORMAT")
            .ok()
            .and_then(|s| Format::parse(&s))
            .unwrap_or(Format::Json);

        let color = env_flag("TOGGLES_LOG_COLOR")
            .unwrap_or_else(|| env::var("NO_COLOR").is_err() && std::io::stderr().is_terminal());

        Self {
            debug,
            level,
            format,
            color,
            timestamps: env_flag("TOGGLES_LOG_TIMESTAMPS").unwrap_or(true),
            module_path: env_flag("TOGGLES_LOG_MODULE").unwrap_or(true),
        }
    }

    /// Set the minimum level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the output format.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }
}

/// Initialize logging from the environment.
///
/// Called lazily by the first emitted line; calling it eagerly pins the
/// configuration before any other thread logs.
pub fn init() {
    config();
}

/// Initialize logging with an explicit configuration.
///
/// Returns `false` when logging was already initialized, in which case only
/// the level and debug flag are updated.
pub fn init_with(config: LogConfig) -> bool {
    DEBUG_ENABLED.store(config.debug, Ordering::SeqCst);
    LOG_LEVEL.store(config.level as u8, Ordering::SeqCst);
    CONFIG.set(config).is_ok()
}

/// Check if debug logging is enabled.
#[inline]
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Check if a log level is enabled.
#[inline]
pub fn is_level_enabled(level: Level) -> bool {
    config();
    level != Level::Off && level as u8 >= LOG_LEVEL.load(Ordering::Relaxed)
}

/// Get current log level.
pub fn current_level() -> Level {
    Level::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set log level at runtime.
pub fn set_level(level: Level) {
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Enable or disable debug mode at runtime.
pub fn set_debug(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    if enabled && current_level() > Level::Debug {
        set_level(Level::Debug);
    }
}

/// Get the active configuration, reading the environment on first use.
pub fn config() -> &'static LogConfig {
    CONFIG.get_or_init(|| {
        let config = LogConfig::from_env();
        DEBUG_ENABLED.store(config.debug, Ordering::SeqCst);
        LOG_LEVEL.store(config.level as u8, Ordering::SeqCst);
        config
    })
}

// ============================================================================
// Log Output
// ============================================================================

/// A key/value pair attached to a log line.
pub type Field<'a> = (&'a str, &'a dyn Display);

/// Emit a line. Used by the macros; call them instead.
#[doc(hidden)]
pub fn log(level: Level, target: &str, message: &str, fields: &[Field<'_>]) {
    if !is_level_enabled(level) {
        return;
    }

    let config = config();
    let line = match config.format {
        Format::Pretty => render_pretty(level, target, message, fields, config),
        Format::Compact => render_compact(level, target, message, fields, config),
        Format::Json => render_json(level, target, message, fields),
    };

    let _ = writeln!(std::io::stderr().lock(), "{}", line);
}

fn render_fields(out: &mut String, fields: &[Field<'_>]) {
    for (key, value) in fields {
        out.push(' ');
        out.push_str(key);
        out.push('=');
        out.push_str(&value.to_string());
    }
}

fn render_pretty(
    level: Level,
    target: &str,
    message: &str,
    fields: &[Field<'_>],
    config: &LogConfig,
) -> String {
    let mut out = String::new();

    if config.timestamps {
        let now = chrono::Utc::now();
        out.push_str(&now.format("%Y-%m-%d %H:%M:%S%.3f ").to_string());
    }

    #[cfg(feature = "color")]
    let level_name = if config.color {
        format!("{:5}", level.colored())
    } else {
        format!("{:5}", level.as_str())
    };
    #[cfg(not(feature = "color"))]
    let level_name = format!("{:5}", level.as_str());
    out.push_str(&level_name);
    out.push(' ');

    if config.module_path && !target.is_empty() {
        out.push('[');
        out.push_str(target);
        out.push_str("] ");
    }

    out.push_str(message);
    render_fields(&mut out, fields);
    out
}

fn render_compact(
    level: Level,
    target: &str,
    message: &str,
    fields: &[Field<'_>],
    config: &LogConfig,
) -> String {
    let mut out = String::new();

    if config.timestamps {
        out.push_str(&chrono::Utc::now().format("%H:%M:%S ").to_string());
    }

    out.push(level.as_str().chars().next().unwrap_or('?'));
    out.push(' ');

    if config.module_path && !target.is_empty() {
        out.push_str(target);
        out.push_str(": ");
    }

    out.push_str(message);
    render_fields(&mut out, fields);
    out
}

#[cfg(feature = "json")]
fn render_json(level: Level, target: &str, message: &str, fields: &[Field<'_>]) -> String {
    use serde::Serialize;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct LogEntry<'a> {
        timestamp: String,
        level: &'a str,
        target: &'a str,
        message: &'a str,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        fields: BTreeMap<&'a str, String>,
    }

    let entry = LogEntry {
        timestamp: chrono::Utc::now().to_rfc3339(),
        level: level.as_str(),
        target,
        message,
        fields: fields
            .iter()
            .map(|(key, value)| (*key, value.to_string()))
            .collect(),
    };

    serde_json::to_string(&entry).unwrap_or_else(|_| message.to_string())
}

#[cfg(not(feature = "json"))]
fn render_json(level: Level, target: &str, message: &str, fields: &[Field<'_>]) -> String {
    let mut out = format!(
        r#"{{"timestamp":"{}","level":"{}","target":"{}","message":"{}""#,
        chrono::Utc::now().to_rfc3339(),
        level.as_str(),
        escape_json(target),
        escape_json(message)
    );
    if !fields.is_empty() {
        out.push_str(r#","fields":{"#);
        for (i, (key, value)) in fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&format!(
                r#""{}":"{}""#,
                escape_json(key),
                escape_json(&value.to_string())
            ));
        }
        out.push('}');
    }
    out.push('}');
    out
}

#[cfg(not(feature = "json"))]
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => result.push_str(&format!("\\u{:04x}", c as u32)),
            c => result.push(c),
        }
    }
    result
}

// ============================================================================
// Macros
// ============================================================================

/// Shared expansion for the level macros.
#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($level:expr, target: $target:expr, $($key:ident = $value:expr),+ ; $($arg:tt)+) => {
        if $crate::is_level_enabled($level) {
            $crate::log(
                $level,
                $target,
                &format!($($arg)+),
                &[$((stringify!($key), &$value as &dyn ::std::fmt::Display)),+],
            );
        }
    };
    ($level:expr, target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($level) {
            $crate::log($level, $target, &format!($($arg)+), &[]);
        }
    };
    ($level:expr, $($key:ident = $value:expr),+ ; $($arg:tt)+) => {
        $crate::__log!($level, target: module_path!(), $($key = $value),+ ; $($arg)+)
    };
    ($level:expr, $($arg:tt)+) => {
        $crate::__log!($level, target: module_path!(), $($arg)+)
    };
}

/// Log a trace message.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Trace, $($arg)+) };
}

/// Log a debug message.
///
/// Emitted when `TOGGLES_DEBUG=1` or `TOGGLES_LOG_LEVEL` is `debug` or lower.
///
/// # Example
///
/// ```rust
/// use toggles_log::debug;
///
/// let count = 2;
/// debug!("Saving {} entitlements", count);
/// debug!(target: "toggles::store", "Committing transaction");
/// ```
#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => {
        if $crate::is_debug_enabled() || $crate::is_level_enabled($crate::Level::Debug) {
            $crate::__log!($crate::Level::Debug, $($arg)+)
        }
    };
}

/// Log an info message.
#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Info, $($arg)+) };
}

/// Log a warning message.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Warn, $($arg)+) };
}

/// Log an error message.
#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Error, $($arg)+) };
}

// ============================================================================
// Tests
// ============================================================================
