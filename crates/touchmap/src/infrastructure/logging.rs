//! Console logging.
//!
//! Every event is printed as a single tagged line, e.g.
//!
//! ```text
//! [INFO] device R58M123 ready, rate cap 250 Hz
//! [WARN] layout reload failed, keeping previous zones: ...
//! ```
//!
//! Verbosity follows `RUST_LOG` and defaults to `info`.

use std::fmt;

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// `[LEVEL] message key=value ...`
#[derive(Debug, Default, Clone, Copy)]
pub struct TaggedLine;

impl<S, N> FormatEvent<S, N> for TaggedLine
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
        write!(writer, "[{}] ", event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Installs the global subscriber.  Calling it twice is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(TaggedLine)
        .try_init();
}
