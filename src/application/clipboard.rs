//! Copying converted HTML to the system clipboard.
//!
//! The rich strategy publishes `text/html`; when it fails, one plain-text
//! fallback carries the HTML source instead. There are no further retries.

use std::{
    io::{self, ErrorKind, Write},
    process::{Command, Stdio},
};

use thiserror::Error;
use tracing::{info, warn};

const LOG_TARGET: &str = "application::clipboard";

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard command `{program}` not found")]
    Unavailable { program: String },
    #[error("clipboard command `{program}` failed: {message}")]
    Command { program: String, message: String },
    #[error("clipboard does not accept rich content")]
    RichUnsupported,
    #[error("copy failed ({primary}); fallback failed ({fallback})")]
    Exhausted {
        primary: Box<ClipboardError>,
        fallback: Box<ClipboardError>,
    },
}

/// Which strategy ended up populating the clipboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Rich,
    PlainFallback,
}

pub trait ClipboardWriter {
    /// Publish `html` as rich content with `plain` as its text alternative.
    fn write_rich(&self, html: &str, plain: &str) -> Result<(), ClipboardError>;

    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Try rich content first, then exactly one plain-text fallback with the HTML source.
pub fn copy_with_fallback<W>(
    writer: &W,
    html: &str,
    plain: &str,
) -> Result<CopyOutcome, ClipboardError>
where
    W: ClipboardWriter + ?Sized,
{
    let primary = match writer.write_rich(html, plain) {
        Ok(()) => {
            info!(target = LOG_TARGET, op = "clipboard::copy", result = "rich", "Copied HTML");
            return Ok(CopyOutcome::Rich);
        }
        Err(err) => err,
    };

    warn!(
        target = LOG_TARGET,
        op = "clipboard::copy",
        result = "fallback",
        error = %primary,
        "Rich copy failed; falling back to plain text"
    );

    match writer.write_text(html) {
        Ok(()) => Ok(CopyOutcome::PlainFallback),
        Err(fallback) => Err(ClipboardError::Exhausted {
            primary: Box::new(primary),
            fallback: Box::new(fallback),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    fn pipe(&self, input: &str) -> Result<(), ClipboardError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| self.spawn_error(err))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .map_err(|err| self.command_error(err.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|err| self.command_error(err.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(self.command_error(format!(
                "exit {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    fn spawn_error(&self, err: io::Error) -> ClipboardError {
        if err.kind() == ErrorKind::NotFound {
            ClipboardError::Unavailable {
                program: self.program.clone(),
            }
        } else {
            self.command_error(err.to_string())
        }
    }

    fn command_error(&self, message: String) -> ClipboardError {
        ClipboardError::Command {
            program: self.program.clone(),
            message,
        }
    }
}

/// Clipboard backed by platform command-line tools.
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    rich: Option<CommandSpec>,
    plain: CommandSpec,
}

impl CommandClipboard {
    pub fn new(rich: Option<CommandSpec>, plain: CommandSpec) -> Self {
        Self { rich, plain }
    }

    /// `wl-copy` under Wayland, `pbcopy` on macOS, `xclip` elsewhere.
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            return Self::new(None, CommandSpec::new("pbcopy", &[]));
        }
        if std::env::var_os("WAYLAND_DISPLAY").is_some() {
            return Self::new(
                Some(CommandSpec::new("wl-copy", &["--type", "text/html"])),
                CommandSpec::new("wl-copy", &[]),
            );
        }
        Self::new(
            Some(CommandSpec::new(
                "xclip",
                &["-selection", "clipboard", "-t", "text/html"],
            )),
            CommandSpec::new("xclip", &["-selection", "clipboard"]),
        )
    }
}

impl ClipboardWriter for CommandClipboard {
    fn write_rich(&self, html: &str, _plain: &str) -> Result<(), ClipboardError> {
        match &self.rich {
            Some(spec) => spec.pipe(html),
            None => Err(ClipboardError::RichUnsupported),
        }
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.plain.pipe(text)
    }
}
