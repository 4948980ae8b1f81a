//! Message formatting and terminal output.
//!
//! [`render_message`] turns one inbound message into display lines, grouping
//! consecutive messages from the same sender:
//!
//! ```text
//!
//! alice.0001 at 12:00
//! > first message
//! 12:01 > second message from alice
//!
//! bob.0002 at 12:02
//! > bob's message
//! ```
//!
//! The [`Renderer`] trait is where those lines, and the client's notices, end
//! up.  [`PlainTextRenderer`] writes them to stdout (or any writer).

use std::fmt::{Display, Write as _};
use std::io::{self, Stdout, Write};

use chrono::{DateTime, Local, TimeZone};

use crate::config::TIME_FORMAT_KEY;
use crate::error::{Error, Result};
use crate::types::Message;

/// ANSI escape code for yellow text (used for notices).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for dim text (used for info lines).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// The output of [`render_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Lines to display, without trailing newlines.
    pub lines: Vec<String>,
    /// The sender id the caller should remember for the next message.
    pub last_sender: String,
}

/// Render `message` stamped with the current local time.
pub fn render_message(
    message: &Message,
    last_sender: Option<&str>,
    time_format: &str,
) -> Result<RenderedMessage> {
    render_message_at(message, last_sender, time_format, &Local::now())
}

/// Render `message` stamped with `now`.
///
/// A message from `last_sender` becomes one condensed `<time> > <content>`
/// line.  Anything else gets a blank separator, a `<user>.<tag> at <time>`
/// header and a `> <content>` line.
pub fn render_message_at<Tz>(
    message: &Message,
    last_sender: Option<&str>,
    time_format: &str,
    now: &DateTime<Tz>,
) -> Result<RenderedMessage>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let time = format_time(now, time_format)?;
    let lines = if last_sender == Some(message.sender.id.as_str()) {
        vec![format!("{time} > {}", message.content)]
    } else {
        let mut lines = vec![String::new()];
        lines.extend(message_block(message, &time));
        lines
    };
    Ok(RenderedMessage {
        lines,
        last_sender: message.sender.id.clone(),
    })
}

/// The full header block for a message: `<user>.<tag> at <time>` then
/// `> <content>`.
pub fn message_block(message: &Message, time: &str) -> Vec<String> {
    vec![
        format!("{} at {time}", message.sender),
        format!("> {}", message.content),
    ]
}

/// Format `now` with a strftime pattern.
pub fn format_time<Tz>(now: &DateTime<Tz>, time_format: &str) -> Result<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    write!(out, "{}", now.format(time_format)).map_err(|_| {
        Error::validation(
            format!("'{time_format}' is not a valid time format"),
            Some(TIME_FORMAT_KEY.to_string()),
        )
    })?;
    Ok(out)
}

/// Trait for rendering client output.
///
/// Message lines come from [`render_message`]; everything else the client
/// says goes through the info, notice and error channels.
pub trait Renderer: Send {
    /// Print rendered message lines verbatim.
    fn print_lines(&mut self, lines: &[String]);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print a notice the user should not miss, such as why a stream ended.
    fn print_notice(&mut self, notice: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);
}

/// Plain text renderer with optional ANSI styling.
///
/// Info lines are prefixed with `<i>` and notices with `<!>`, one prefix per
/// line of text.  Errors always go to stderr.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer on stdout with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            out: io::stdout(),
            use_color,
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer writing uncolored output to `out`.
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            use_color: false,
        }
    }

    /// The underlying writer.
    pub fn writer(&self) -> &W {
        &self.out
    }

    /// Consumes the renderer and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_prefixed(&mut self, prefix: &str, color: &str, text: &str) {
        for line in text.lines() {
            let _ = if self.use_color {
                writeln!(self.out, "{color}{prefix} {line}{ANSI_RESET}")
            } else {
                writeln!(self.out, "{prefix} {line}")
            };
        }
        let _ = self.out.flush();
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_lines(&mut self, lines: &[String]) {
        for line in lines {
            let _ = writeln!(self.out, "{line}");
        }
        let _ = self.out.flush();
    }

    fn print_info(&mut self, info: &str) {
        self.write_prefixed("<i>", ANSI_DIM, info);
    }

    fn print_notice(&mut self, notice: &str) {
        self.write_prefixed("<!>", ANSI_YELLOW, notice);
    }

    fn print_error(&mut self, error: &str) {
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}
