//! Logging setup shared by Shardwise binaries.
//!
//! Logs go to stderr and, when a log directory can be created, to
//! `$SHARDWISE_HOME/logs/<app>.log` with size-based rotation.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "shardwise=info,shardwise_engine=info";
const KEEP_LOG_FILES: usize = 5;
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;

/// Logging options for a binary.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Debug output on stderr
    pub verbose: bool,
    /// Only warnings and errors on stderr
    pub quiet: bool,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter for the file layer and, unless
/// `verbose` or `quiet` is set, for stderr too.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let base_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    let stderr_filter = if config.verbose {
        EnvFilter::new("shardwise=debug,shardwise_engine=debug")
    } else if config.quiet {
        EnvFilter::new("warn")
    } else {
        base_filter()
    };

    let mut log_file = None;
    let file_layer = match logs_dir().map(|dir| RotatingLog::open(&dir, config.app_name)) {
        Some(Ok(log)) => {
            log_file = log.path();
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(log)
                    .with_ansi(false)
                    .with_filter(base_filter()),
            )
        }
        Some(Err(err)) => {
            eprintln!("warning: file logging disabled: {:#}", err);
            None
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(stderr_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(path) = log_file {
        tracing::debug!(path = %path.display(), "Logging to file");
    }
    Ok(())
}

/// Shardwise home directory: `$SHARDWISE_HOME`, else `~/.shardwise`.
pub fn shardwise_home() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SHARDWISE_HOME") {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".shardwise"))
}

pub fn logs_dir() -> Option<PathBuf> {
    shardwise_home().map(|home| home.join("logs"))
}

/// Log file writer that rotates `<name>.log` into `<name>.log.1..N`.
#[derive(Clone)]
pub struct RotatingLog {
    state: Arc<Mutex<RotationState>>,
}

struct RotationState {
    current: PathBuf,
    keep: usize,
    limit: u64,
    file: File,
    written: u64,
}

impl RotatingLog {
    pub fn open(dir: &Path, app_name: &str) -> Result<Self> {
        Self::with_limits(dir, app_name, KEEP_LOG_FILES, ROTATE_AT_BYTES)
    }

    pub fn with_limits(dir: &Path, app_name: &str, keep: usize, limit: u64) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
        let current = dir.join(format!("{}.log", file_stem(app_name)));
        let (file, written) = open_append(&current)
            .with_context(|| format!("Failed to open log file: {}", current.display()))?;

        let mut state = RotationState {
            current,
            keep: keep.max(1),
            limit,
            file,
            written,
        };
        if state.written > state.limit {
            state.rotate()?;
        }
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.state.lock().ok().map(|s| s.current.clone())
    }
}

impl RotationState {
    fn backup(&self, index: usize) -> PathBuf {
        let mut name = self.current.clone().into_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.keep > 1 {
            let oldest = self.backup(self.keep - 1);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for index in (1..self.keep - 1).rev() {
                let from = self.backup(index);
                if from.exists() {
                    fs::rename(&from, self.backup(index + 1))?;
                }
            }
            fs::rename(&self.current, self.backup(1))?;
        } else {
            fs::remove_file(&self.current)?;
        }
        let (file, written) = open_append(&self.current)?;
        self.file = file;
        self.written = written;
        Ok(())
    }

    fn append(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.limit {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl Write for RotatingLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        state.append(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        state.file.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RotatingLog {
    type Writer = RotatingLog;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
