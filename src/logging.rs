//! Logging setup for binaries using this library
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the application. [`init`] writes one line per event:
//!
//! ```text
//! 2024-01-02 03:04:05.123456 - driutils::io::query - ERROR - Query failed | caused by: ...
//! ```

use crate::error::{Error, Result};
use crate::types::LogLevel;
use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// `timestamp - target - LEVEL - message`, multi-line messages folded onto
/// one line with ` | `
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut message = String::new();
        ctx.format_fields(Writer::new(&mut message), event)?;

        let metadata = event.metadata();
        writeln!(
            writer,
            "{} - {} - {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f"),
            metadata.target(),
            metadata.level(),
            fold_lines(&message)
        )
    }
}

/// Join the non-blank lines of `text`, trimmed, with ` | `
pub(crate) fn fold_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Build the filter used by [`init`]
///
/// `RUST_LOG` directives take precedence; `level` applies to everything
/// they do not mention.
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(tracing::Level::from(level).into())
        .from_env_lossy()
}

/// Install a global [`LineFormat`] subscriber writing to stderr
///
/// Fails if a global subscriber is already installed.
pub fn init(level: LogLevel) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .event_format(LineFormat)
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to initialise logging: {e}")))
}
