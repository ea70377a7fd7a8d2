//! Process-wide log setup with a terminal-dependent line format.
//!
//! The line style is chosen once, from [`LogSettings`], before the global
//! subscriber is installed:
//!
//! - [`LogStyle::Modern`]: tracing-subscriber's standard coloured lines.
//! - [`LogStyle::Legacy`]: plain text for consoles without ANSI support:
//!   `[NFO] (main) 2026-01-01T00:00:00.000000Z src/exit.rs:42\tmessage`

use std::fmt;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use overlayctl_config::LoggingConfig;

/// Errors from installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to install log subscriber: {0}")]
    Init(String),
}

/// How each log line is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStyle {
    Modern,
    Legacy,
}

impl LogStyle {
    /// Probe the attached console.
    pub fn detect() -> Self {
        if terminal_supports_ansi() {
            LogStyle::Modern
        } else {
            LogStyle::Legacy
        }
    }

    /// Resolve a configured style; `"auto"` (or anything unknown) probes.
    pub fn from_setting(setting: &str) -> Self {
        match setting {
            "modern" => LogStyle::Modern,
            "legacy" => LogStyle::Legacy,
            _ => Self::detect(),
        }
    }
}

/// Whether stderr can render ANSI escape sequences.
#[cfg(windows)]
pub fn terminal_supports_ansi() -> bool {
    crossterm::ansi_support::supports_ansi()
}

/// Whether stderr can render ANSI escape sequences.
#[cfg(not(windows))]
pub fn terminal_supports_ansi() -> bool {
    use std::io::IsTerminal;

    std::io::stderr().is_terminal()
        && std::env::var("TERM").is_ok_and(|term| !term.is_empty() && term != "dumb")
}

/// Verbosity and line style, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub style: LogStyle,
}

impl LogSettings {
    /// `-v` raises the level to debug, `-vv` to trace; otherwise the
    /// configured level applies.
    pub fn from_config(config: &LoggingConfig, verbose: u8) -> Self {
        let filter = match verbose {
            0 => config.level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        };
        Self {
            filter,
            style: LogStyle::from_setting(&config.style),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.filter))
    }

    /// Install the global subscriber. Fails if one is already set.
    pub fn init(&self) -> Result<(), LoggingError> {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.env_filter())
            .with_writer(std::io::stderr);

        let installed = match self.style {
            LogStyle::Modern => builder.with_ansi(true).try_init(),
            LogStyle::Legacy => builder
                .with_ansi(false)
                .event_format(LegacyFormat::new())
                .try_init(),
        };
        installed.map_err(|e| LoggingError::Init(e.to_string()))
    }
}

/// Legacy line format: level tag, thread, timestamp, and source location.
#[derive(Debug, Clone)]
pub struct LegacyFormat<T = SystemTime> {
    timer: T,
}

impl LegacyFormat {
    pub fn new() -> Self {
        Self { timer: SystemTime }
    }
}

impl Default for LegacyFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LegacyFormat<T> {
    /// Use a custom clock (tests pin the timestamp with this).
    pub fn with_timer(timer: T) -> Self {
        Self { timer }
    }
}

fn level_tag(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRC]",
        Level::DEBUG => "[DBG]",
        Level::INFO => "[NFO]",
        Level::WARN => "[WRN]",
        _ => "[ERR]",
    }
}

impl<S, N, T> FormatEvent<S, N> for LegacyFormat<T>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    T: FormatTime,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let thread = std::thread::current();

        write!(writer, "{} ", level_tag(meta.level()))?;
        match thread.name() {
            Some(name) => write!(writer, "({name}) ")?,
            None => write!(writer, "({:?}) ", thread.id())?,
        }
        self.timer.format_time(&mut writer)?;
        write!(
            writer,
            " {}:{}\t",
            meta.file().unwrap_or_else(|| meta.target()),
            meta.line().unwrap_or(0)
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
