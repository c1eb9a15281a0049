//! Terminal styling for batch output
//!
//! Record lines, retry notices, and the final summary share one palette. Each
//! role carries the stream it is usually printed to, so color detection follows
//! the right TTY; `for_stdout`/`for_stderr` switch it when a role is printed
//! elsewhere.
//!
//! | Role         | Look   | Printed for                                  |
//! |--------------|--------|----------------------------------------------|
//! | `accent`     | cyan   | titles, work item ids, counts                |
//! | `success`    | green  | created or deleted records                   |
//! | `error`      | red    | failed records, row and validation errors    |
//! | `warn`       | yellow | retries, skipped records, cancellations      |
//! | `muted`      | dim    | row numbers, timings, request urls           |
//! | `emphasis`   | bold   | the dry-run header                           |

use indicatif::ProgressStyle;
use owo_colors::{OwoColorize, Style};
use std::fmt::{self, Display};
use std::sync::OnceLock;

pub use owo_colors::Stream;

const ACCENT: Style = Style::new().cyan();
const SUCCESS: Style = Style::new().green();
const ERROR: Style = Style::new().red();
const WARN: Style = Style::new().yellow();
const MUTED: Style = Style::new().dimmed();
const EMPHASIS: Style = Style::new().bold();

/// Value rendered in one palette role
///
/// Colors are dropped when the target stream is not a color terminal or
/// `NO_COLOR` is set.
#[derive(Clone, Debug)]
pub struct Styled<T> {
    value: T,
    style: Style,
    stream: Stream,
}

impl<T> Styled<T> {
    const fn new(value: T, style: Style, stream: Stream) -> Self {
        Self {
            value,
            style,
            stream,
        }
    }

    /// Detect color support on stderr
    #[must_use]
    pub const fn for_stderr(mut self) -> Self {
        self.stream = Stream::Stderr;
        self
    }

    /// Detect color support on stdout
    #[must_use]
    pub const fn for_stdout(mut self) -> Self {
        self.stream = Stream::Stdout;
        self
    }
}

impl<T: Display> Display for Styled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.value
                .if_supports_color(self.stream, |v| v.style(self.style))
        )
    }
}

/// Palette roles for anything printable
pub trait Stylize: Display {
    /// Titles, ids, and counts
    fn accent(&self) -> Styled<&Self> {
        Styled::new(self, ACCENT, Stream::Stdout)
    }

    /// Records that went through
    fn success(&self) -> Styled<&Self> {
        Styled::new(self, SUCCESS, Stream::Stdout)
    }

    /// Failed records and aborted batches; stderr by default
    fn error(&self) -> Styled<&Self> {
        Styled::new(self, ERROR, Stream::Stderr)
    }

    /// Retries and skipped rows; stderr by default
    fn warn(&self) -> Styled<&Self> {
        Styled::new(self, WARN, Stream::Stderr)
    }

    /// Row numbers, timings, urls
    fn muted(&self) -> Styled<&Self> {
        Styled::new(self, MUTED, Stream::Stdout)
    }

    /// Headers
    fn emphasis(&self) -> Styled<&Self> {
        Styled::new(self, EMPHASIS, Stream::Stdout)
    }
}

impl<T: Display + ?Sized> Stylize for T {}

/// Marks a record that succeeded
pub const fn check() -> Styled<&'static str> {
    Styled::new("✓", SUCCESS, Stream::Stdout)
}

/// Marks a failed record or a rejected row
pub const fn cross() -> Styled<&'static str> {
    Styled::new("✗", ERROR, Stream::Stderr)
}

/// Leads each planned request in a dry run
pub const fn arrow() -> Styled<&'static str> {
    Styled::new("→", ACCENT, Stream::Stdout)
}

/// Marks an attempt that will be repeated after a backoff
pub const fn retry() -> Styled<&'static str> {
    Styled::new("↻", WARN, Stream::Stderr)
}

/// Work item url, clickable where the terminal understands OSC 8
pub fn hyperlink_url(stream: Stream, url: &str) -> String {
    let target = match stream {
        Stream::Stdout => supports_hyperlinks::Stream::Stdout,
        Stream::Stderr => supports_hyperlinks::Stream::Stderr,
    };
    if supports_hyperlinks::on(target) {
        terminal_link::Link::new(url, url).to_string()
    } else {
        url.to_string()
    }
}

/// Bar shown while records are in flight: done/total plus elapsed time
pub fn bar_style() -> ProgressStyle {
    static STYLE: OnceLock<ProgressStyle> = OnceLock::new();
    STYLE
        .get_or_init(|| {
            ProgressStyle::with_template(
                "{spinner:.cyan} {msg} [{bar:30.cyan/dim}] {pos}/{len} ({elapsed})",
            )
            .expect("hardcoded progress template is valid")
            .progress_chars("=> ")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        })
        .clone()
}
