//! User-facing messages.
//!
//! Three channels: info and warnings go to stdout behind a colored `  ==>`
//! prefix, critical messages go to stderr in red between blank lines. Styling
//! is dropped when `NO_COLOR` is set, and per stream when that stream is not
//! a terminal.
//!
//! Diagnostics for developers go through `tracing` instead.

use std::ffi::OsStr;
use std::io::{self, IsTerminal, Write};
use std::sync::{Mutex, PoisonError};

use crossterm::QueueableCommand;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

/// Sink for the messages an installation run prints.
pub trait Reporter: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn crit(&self, message: &str);
}

/// Prefix shared by the info and warning channels.
pub const PREFIX: &str = "  ==>";

/// Writes styled messages to a pair of writers.
pub struct ConsoleReporter<O: Write + Send, E: Write + Send> {
    out: Mutex<O>,
    err: Mutex<E>,
    out_styled: bool,
    err_styled: bool,
}

impl ConsoleReporter<io::Stdout, io::Stderr> {
    /// Reporter on the process's stdout and stderr.
    #[must_use]
    pub fn stdio() -> Self {
        let no_color = std::env::var_os("NO_COLOR");
        let (out, err) = (io::stdout(), io::stderr());
        let out_styled = wants_color(no_color.as_deref(), out.is_terminal());
        let err_styled = wants_color(no_color.as_deref(), err.is_terminal());
        Self::new(out, err, out_styled).with_err_styled(err_styled)
    }
}

fn wants_color(no_color: Option<&OsStr>, terminal: bool) -> bool {
    terminal && no_color.is_none_or(OsStr::is_empty)
}

impl<O: Write + Send, E: Write + Send> ConsoleReporter<O, E> {
    /// Reporter styling both writers alike.
    pub fn new(out: O, err: E, styled: bool) -> Self {
        Self {
            out: Mutex::new(out),
            err: Mutex::new(err),
            out_styled: styled,
            err_styled: styled,
        }
    }

    /// Overrides styling of the critical channel.
    #[must_use]
    pub fn with_err_styled(mut self, styled: bool) -> Self {
        self.err_styled = styled;
        self
    }

    /// Returns the writers, e.g. to inspect captured output.
    pub fn into_inner(self) -> (O, E) {
        (
            self.out.into_inner().unwrap_or_else(PoisonError::into_inner),
            self.err.into_inner().unwrap_or_else(PoisonError::into_inner),
        )
    }

    fn prefixed(&self, color: Color, message: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = write_prefixed(&mut *out, self.out_styled, color, message);
    }
}

fn write_prefixed<W: Write>(w: &mut W, styled: bool, color: Color, message: &str) -> io::Result<()> {
    if styled {
        w.queue(SetForegroundColor(color))?
            .queue(Print(PREFIX))?
            .queue(ResetColor)?;
    } else {
        w.queue(Print(PREFIX))?;
    }
    writeln!(w, " {message}")?;
    w.flush()
}

fn write_crit<W: Write>(w: &mut W, styled: bool, message: &str) -> io::Result<()> {
    writeln!(w)?;
    if styled {
        w.queue(Print("  "))?
            .queue(SetForegroundColor(Color::DarkRed))?
            .queue(Print(message))?
            .queue(ResetColor)?;
        writeln!(w)?;
    } else {
        writeln!(w, "  {message}")?;
    }
    writeln!(w)?;
    w.flush()
}

impl<O: Write + Send, E: Write + Send> Reporter for ConsoleReporter<O, E> {
    fn info(&self, message: &str) {
        self.prefixed(Color::Blue, message);
    }

    fn warn(&self, message: &str) {
        self.prefixed(Color::DarkYellow, message);
    }

    fn crit(&self, message: &str) {
        let mut err = self.err.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = write_crit(&mut *err, self.err_styled, message);
    }
}

/// Formats a pre-flight error from the release-metadata service.
#[must_use]
pub fn server_error(message: &str) -> String {
    format!("server error: {message}")
}

#[cfg(test)]
pub(crate) mod recording {
    use super::Reporter;
    use std::sync::Mutex;

    /// Captured message with its channel.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Line {
        Info(String),
        Warn(String),
        Crit(String),
    }

    #[derive(Default)]
    pub struct RecordingReporter {
        lines: Mutex<Vec<Line>>,
    }

    impl RecordingReporter {
        pub fn lines(&self) -> Vec<Line> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl Reporter for RecordingReporter {
        fn info(&self, message: &str) {
            self.lines.lock().unwrap().push(Line::Info(message.to_string()));
        }

        fn warn(&self, message: &str) {
            self.lines.lock().unwrap().push(Line::Warn(message.to_string()));
        }

        fn crit(&self, message: &str) {
            self.lines.lock().unwrap().push(Line::Crit(message.to_string()));
        }
    }
}
