//! Session log: one file next to the settings file, replaced on every launch.
//!
//! The `log_info!` / `log_warn!` / `log_err!` macros are usable from anywhere
//! in the crate. They cost nothing until [`init`] opens the file, so library
//! callers, tests and headless replay never touch the disk.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::settings;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        })
    }
}

struct SessionLog {
    path: PathBuf,
    out: Mutex<BufWriter<File>>,
}

static SESSION: OnceLock<SessionLog> = OnceLock::new();

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, format_args!($($arg)*))
    };
}

/// Open (truncating) `sketchpad.log` in the config directory and mirror
/// panics into it. Only the first call has any effect.
pub fn init() {
    if SESSION.get().is_some() {
        return;
    }
    let Some(path) = settings::config_dir().map(|dir| dir.join("sketchpad.log")) else {
        eprintln!("[logger] no config directory; session log disabled");
        return;
    };
    let file = match File::create(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("[logger] cannot create {}: {}", path.display(), e);
            return;
        }
    };
    let _ = SESSION.set(SessionLog {
        path,
        out: Mutex::new(BufWriter::new(file)),
    });

    write(Level::Info, format_args!("Sketchpad {} session started", env!("CARGO_PKG_VERSION")));

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write(Level::Error, format_args!("panic: {}", info));
        previous(info);
    }));
}

/// Where this session is being logged, once [`init`] has succeeded.
pub fn path() -> Option<&'static Path> {
    SESSION.get().map(|s| s.path.as_path())
}

/// Append one line. Each line is flushed so a crash loses nothing.
pub fn write(level: Level, msg: fmt::Arguments<'_>) {
    let Some(session) = SESSION.get() else { return };
    let Ok(mut out) = session.out.lock() else { return };
    let _ = writeln!(out, "{}", format_line(level, seconds_since_epoch(), msg));
    let _ = out.flush();
}

fn seconds_since_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// `HH:MM:SS LEVEL message`, UTC clock time.
fn format_line(level: Level, secs: u64, msg: fmt::Arguments<'_>) -> String {
    let day = secs % 86_400;
    format!(
        "{:02}:{:02}:{:02} {:<5} {}",
        day / 3600,
        day % 3600 / 60,
        day % 60,
        level,
        msg
    )
}
