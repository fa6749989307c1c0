use miette::{Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime, UtcOffset};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{format, FmtContext, FormatEvent, FormatFields},
    registry::LookupSpan,
    FmtSubscriber,
};

/// Install the console logger as the global subscriber.
///
/// Call it first thing in `main`: the local offset cannot be read safely
/// once other threads exist on some platforms, and UTC is used then.
pub fn init_logging(level: Level) -> Result<()> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    let subscriber = FmtSubscriber::builder()
        .event_format(ConsoleFormat { offset })
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .into_diagnostic()
        .wrap_err("Could not install the logger")
}

const CLOCK: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

/// `12:34:56  INFO main message`, one line per event
struct ConsoleFormat {
    offset: UtcOffset,
}

/// Level padded to the width of the longest one, colored on terminals
fn level_label(level: Level, ansi: bool) -> String {
    let padded = format!("{level:>5}");
    if !ansi {
        return padded;
    }
    match level {
        Level::ERROR => padded.red().to_string(),
        Level::WARN => padded.yellow().to_string(),
        Level::DEBUG | Level::TRACE => padded.blue().to_string(),
        _ => padded.green().to_string(),
    }
}

impl<S, N> FormatEvent<S, N> for ConsoleFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let clock = OffsetDateTime::now_utc()
            .to_offset(self.offset)
            .time()
            .format(CLOCK)
            .map_err(|_| std::fmt::Error)?;

        let ansi = writer.has_ansi_escapes();
        let level = level_label(*event.metadata().level(), ansi);

        let thread = std::thread::current();
        let thread = thread.name().unwrap_or("unnamed");
        if ansi {
            write!(writer, "{clock} {level} {} ", thread.dimmed())?;
        } else {
            write!(writer, "{clock} {level} {thread} ")?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
