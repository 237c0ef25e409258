pub mod inference;
pub mod toolbox;

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

/// Return the platform-standard data directory for smart-toolbox.
///
/// - macOS: `~/Library/Application Support/smart-toolbox/`
/// - Windows: `{FOLDERID_RoamingAppData}\smart-toolbox\`
/// - Linux: `$XDG_DATA_HOME/smart-toolbox/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.smart-toolbox/` only if none of the above can be resolved.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("smart-toolbox");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".smart-toolbox")
}

/// Initialize the tracing subscriber.
///
/// Rotates `planner.log` (keeps the last 3) and opens a fresh one with a
/// line-flushing writer. When the log file cannot be opened, logs go to
/// stderr instead.
pub fn init_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = data_dir();
    let _ = std::fs::create_dir_all(&log_dir);
    let log_path = log_dir.join("planner.log");

    rotate_logs(&log_path, 3);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("smart_toolbox=info,warn"));

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path);

    match log_file {
        Ok(file) => {
            fmt::fmt()
                .with_env_filter(filter)
                .with_writer(SyncedLog::new(file))
                .with_ansi(false)
                .with_target(true)
                .init();
        }
        Err(e) => {
            fmt::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .init();
            tracing::warn!(path = %log_path.display(), error = %e, "cannot open log file, logging to stderr");
        }
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %log_dir.display(),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== smart-toolbox starting ==="
    );
}

/// Shift `planner.log` to `planner.log.1`, `.1` to `.2` and so on, deleting
/// whatever would land past `.{keep}`.
fn rotate_logs(current: &Path, keep: u32) {
    let numbered = |n: u32| {
        let mut name = current.as_os_str().to_owned();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    };

    let _ = std::fs::remove_file(numbered(keep));
    for n in (1..keep).rev() {
        let _ = std::fs::rename(numbered(n), numbered(n + 1));
    }
    let _ = std::fs::rename(current, numbered(1));
}

/// Shared log file handle, flushed after every write.
#[derive(Clone)]
struct SyncedLog(Arc<Mutex<File>>);

impl SyncedLog {
    fn new(file: File) -> Self {
        Self(Arc::new(Mutex::new(file)))
    }

    fn with_file<R>(&self, op: impl FnOnce(&mut File) -> io::Result<R>) -> io::Result<R> {
        let mut file = self
            .0
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        op(&mut *file)
    }
}

impl Write for SyncedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|file| {
            file.write_all(buf)?;
            file.flush()?;
            Ok(buf.len())
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

impl<'a> MakeWriter<'a> for SyncedLog {
    type Writer = SyncedLog;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
