// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::{Args, ValueEnum};
use owo_colors::{OwoColorize, Style, style};
use std::fmt;
use swrite::{SWrite, swrite};
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

pub(crate) mod clap_styles {
    use clap::builder::{
        Styles,
        styling::{AnsiColor, Effects, Style},
    };

    const HEADER: Style = AnsiColor::Green.on_default().effects(Effects::BOLD);
    const USAGE: Style = AnsiColor::Green.on_default().effects(Effects::BOLD);
    const LITERAL: Style = AnsiColor::Cyan.on_default().effects(Effects::BOLD);
    const PLACEHOLDER: Style = AnsiColor::Cyan.on_default();
    const ERROR: Style = AnsiColor::Red.on_default().effects(Effects::BOLD);
    const VALID: Style = AnsiColor::Cyan.on_default().effects(Effects::BOLD);
    const INVALID: Style = AnsiColor::Yellow.on_default().effects(Effects::BOLD);

    pub(crate) const fn style() -> Styles {
        Styles::styled()
            .header(HEADER)
            .usage(USAGE)
            .literal(LITERAL)
            .placeholder(PLACEHOLDER)
            .error(ERROR)
            .valid(VALID)
            .invalid(INVALID)
    }
}

/// Environment variable holding the log filter, in `tracing-subscriber`'s
/// `Targets` syntax.
pub const LOG_ENV: &str = "TESTRUN_LOG";

#[derive(Copy, Clone, Debug, Args)]
#[must_use]
pub(crate) struct OutputOpts {
    /// Log at debug level unless TESTRUN_LOG says otherwise
    #[arg(long, short, global = true, env = "TESTRUN_VERBOSE")]
    pub(crate) verbose: bool,

    /// Produce color output: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        global = true,
        value_name = "WHEN",
        env = "TESTRUN_COLOR"
    )]
    pub(crate) color: Color,
}

impl OutputOpts {
    pub(crate) fn init(self) -> OutputContext {
        let OutputOpts { verbose, color } = self;

        color.init(verbose);

        OutputContext { color }
    }
}

#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    pub(crate) color: Color,
}

impl OutputContext {
    /// Returns general stderr styles for the current output context.
    pub fn stderr_styles(&self) -> StderrStyles {
        let mut styles = StderrStyles::default();
        if self.color.should_colorize(supports_color::Stream::Stderr) {
            styles.colorize();
        }
        styles
    }

    /// Returns styles for data printed to stdout.
    pub fn stdout_styles(&self) -> StdoutStyles {
        let mut styles = StdoutStyles::default();
        if self.color.should_colorize(supports_color::Stream::Stdout) {
            styles.colorize();
        }
        styles
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
#[must_use]
pub enum Color {
    #[default]
    Auto,
    Always,
    Never,
}

static INIT_LOGGER: std::sync::Once = std::sync::Once::new();

/// Events logged with this target are printed without a level heading.
pub(crate) const NO_HEADING_TARGET: &str = "testrun_collector::no_heading";

struct SimpleFormatter {
    styles: LogStyles,
}

impl<S, N> FormatEvent<S, N> for SimpleFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        if metadata.target() != NO_HEADING_TARGET {
            match *metadata.level() {
                Level::ERROR => write!(writer, "{}: ", "error".style(self.styles.error))?,
                Level::WARN => write!(writer, "{}: ", "warning".style(self.styles.warning))?,
                Level::INFO => write!(writer, "{}: ", "info".style(self.styles.info))?,
                Level::DEBUG => write!(writer, "{}: ", "debug".style(self.styles.debug))?,
                Level::TRACE => write!(writer, "{}: ", "trace".style(self.styles.trace))?,
            }
        }

        let mut visitor = MessageVisitor {
            message: String::new(),
            fields: String::new(),
        };
        event.record(&mut visitor);

        write!(writer, "{}", visitor.message)?;
        if !visitor.fields.is_empty() {
            write!(writer, "{}", visitor.fields.style(self.styles.fields))?;
        }
        writeln!(writer)
    }
}

static MESSAGE_FIELD: &str = "message";

/// Collects the message and, separately, the remaining fields as ` key=value`
/// pairs.
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == MESSAGE_FIELD {
            self.message.push_str(value);
        } else {
            swrite!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == MESSAGE_FIELD {
            swrite!(self.message, "{value:?}");
        } else {
            swrite!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl Color {
    pub(crate) fn init(self, verbose: bool) {
        let mut log_styles = LogStyles::default();
        if self.should_colorize(supports_color::Stream::Stderr) {
            log_styles.colorize();
        }

        INIT_LOGGER.call_once(|| {
            let default_level = if verbose {
                LevelFilter::DEBUG
            } else {
                LevelFilter::INFO
            };
            let targets = log_targets(std::env::var(LOG_ENV).ok().as_deref(), default_level);

            let layer = tracing_subscriber::fmt::layer()
                .event_format(SimpleFormatter { styles: log_styles })
                .with_writer(std::io::stderr)
                .with_filter(targets);

            tracing_subscriber::registry().with(layer).init();
        });
    }

    pub(crate) fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(stream).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

/// Parses a log filter, falling back to `default_level` if it's unset, empty
/// or invalid.
fn log_targets(filter: Option<&str>, default_level: LevelFilter) -> Targets {
    let default = Targets::new().with_default(default_level);
    match filter.map(str::trim) {
        None | Some("") => default,
        Some(filter) => filter.parse().unwrap_or_else(|error| {
            // The subscriber isn't installed yet, so this can't go through
            // tracing.
            eprintln!("warning: ignoring invalid {LOG_ENV} `{filter}`: {error}");
            default
        }),
    }
}

#[derive(Debug, Default)]
struct LogStyles {
    error: Style,
    warning: Style,
    info: Style,
    debug: Style,
    trace: Style,
    fields: Style,
}

impl LogStyles {
    fn colorize(&mut self) {
        self.error = style().red().bold();
        self.warning = style().yellow().bold();
        self.info = style().bold();
        self.debug = style().bold();
        self.trace = style().dimmed();
        self.fields = style().dimmed();
    }
}

#[derive(Debug, Default)]
pub struct StderrStyles {
    pub(crate) bold: Style,
    pub(crate) error: Style,
}

impl StderrStyles {
    fn colorize(&mut self) {
        self.bold = style().bold();
        self.error = style().red().bold();
    }
}

/// Styles used when printing records.
#[derive(Clone, Debug, Default)]
pub struct StdoutStyles {
    pub(crate) heading: Style,
    pub(crate) id: Style,
    pub(crate) passed: Style,
    pub(crate) failed: Style,
    pub(crate) skipped: Style,
    pub(crate) open: Style,
}

impl StdoutStyles {
    fn colorize(&mut self) {
        self.heading = style().bold().underline();
        self.id = style().cyan();
        self.passed = style().green().bold();
        self.failed = style().red().bold();
        self.skipped = style().yellow().bold();
        self.open = style().dimmed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(None, Some(LevelFilter::INFO) ; "unset uses default")]
    #[test_case(Some("  "), Some(LevelFilter::INFO) ; "blank uses default")]
    #[test_case(Some("warn"), Some(LevelFilter::WARN) ; "bare level")]
    #[test_case(Some("testrun_store=trace"), None ; "target only")]
    fn parses_default_level(filter: Option<&str>, expected: Option<LevelFilter>) {
        let targets = log_targets(filter, LevelFilter::INFO);
        assert_eq!(targets.default_level(), expected);
    }

    #[test]
    fn per_target_levels() {
        let targets = log_targets(Some("testrun_store=trace,warn"), LevelFilter::INFO);
        assert!(targets.would_enable("testrun_store::store", &Level::TRACE));
        assert!(!targets.would_enable("testrun_collector", &Level::INFO));
        assert!(targets.would_enable("testrun_collector", &Level::WARN));
    }

    #[test]
    fn invalid_log_filter_falls_back() {
        let targets = log_targets(Some("testrun=loud"), LevelFilter::WARN);
        assert_eq!(targets.default_level(), Some(LevelFilter::WARN));
    }
}
