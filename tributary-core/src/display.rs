use std::io::{self, IsTerminal, Write};

use colored::Colorize;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

/// In-memory mirror of everything the console prints while a capture is
/// active. Line-oriented: the console never emits partial lines, so there is
/// nothing byte-level to buffer.
#[derive(Default)]
struct CaptureBuffers {
    out: String,
    err: String,
}

/// The one place user-visible output goes through: leveled diagnostics to
/// stderr, explicit command output to stdout, and an optional capture mirror
/// so tests can assert on lines without scraping real stdio.
pub struct Console {
    level: LogLevel,
    ansi: bool,
    capture: Option<CaptureBuffers>,
}

impl Console {
    fn new() -> Self {
        Self {
            level: LogLevel::Warn,
            ansi: io::stderr().is_terminal(),
            capture: None,
        }
    }

    fn line_out(&mut self, line: &str) {
        if let Some(capture) = &mut self.capture {
            capture.out.push_str(line);
            capture.out.push('\n');
        }
        let mut stdout = io::stdout();
        let _ = writeln!(stdout, "{line}");
        let _ = stdout.flush();
    }

    fn line_err(&mut self, line: &str) {
        if let Some(capture) = &mut self.capture {
            capture.err.push_str(line);
            capture.err.push('\n');
        }
        let mut stderr = io::stderr();
        let _ = writeln!(stderr, "{line}");
        let _ = stderr.flush();
    }

    fn drain_capture(&mut self) -> (String, String) {
        match &mut self.capture {
            Some(capture) => (
                std::mem::take(&mut capture.out),
                std::mem::take(&mut capture.err),
            ),
            None => (String::new(), String::new()),
        }
    }
}

static CONSOLE: Lazy<Mutex<Console>> = Lazy::new(|| Mutex::new(Console::new()));

pub fn set_level(level: LogLevel) {
    CONSOLE.lock().level = level;
}

pub fn level() -> LogLevel {
    CONSOLE.lock().level
}

pub fn set_ansi(enabled: bool) {
    CONSOLE.lock().ansi = enabled;
}

fn log(gate: LogLevel, prefix: &str, message: &str) {
    let mut console = CONSOLE.lock();
    if gate > console.level {
        return;
    }
    let line = if console.ansi {
        let tag = match gate {
            LogLevel::Error => prefix.red().bold().to_string(),
            LogLevel::Warn => prefix.yellow().to_string(),
            LogLevel::Info => prefix.blue().to_string(),
            LogLevel::Debug => prefix.dimmed().to_string(),
        };
        format!("{tag} {message}")
    } else {
        format!("{prefix} {message}")
    };
    console.line_err(&line);
}

pub fn error(message: impl AsRef<str>) {
    log(LogLevel::Error, "error:", message.as_ref());
}

pub fn warn(message: impl AsRef<str>) {
    log(LogLevel::Warn, "warning:", message.as_ref());
}

pub fn info(message: impl AsRef<str>) {
    log(LogLevel::Info, "info:", message.as_ref());
}

pub fn debug(message: impl AsRef<str>) {
    log(LogLevel::Debug, "debug:", message.as_ref());
}

/// Explicit command output (summaries, dry-run listings). Always printed,
/// independent of verbosity, to stdout.
pub fn emit(message: impl AsRef<str>) {
    CONSOLE.lock().line_out(message.as_ref());
}

/// Mirror console output into memory for the duration of the guard. Dropping
/// the guard stops the mirror; lines still reach real stdio either way.
pub struct CaptureGuard;

impl CaptureGuard {
    pub fn start() -> Self {
        CONSOLE.lock().capture = Some(CaptureBuffers::default());
        Self
    }

    pub fn take_both(&self) -> (String, String) {
        CONSOLE.lock().drain_capture()
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CONSOLE.lock().capture = None;
    }
}
