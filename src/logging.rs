use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Where log lines go.
pub enum Sink {
    /// The TUI owns the terminal, so log to `dpui.log` in the cache dir.
    File,
    Stderr,
}

/// Initialise logging. `RUST_LOG` is only honoured when `debug` is set;
/// otherwise the level is fixed at `info`.
///
/// The returned guard must live as long as file logging is wanted.
pub fn init(debug: bool, sink: Sink) -> Option<WorkerGuard> {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    };

    match sink {
        Sink::File => {
            let dir = log_dir();
            if std::fs::create_dir_all(&dir).is_err() {
                return None;
            }
            let appender = tracing_appender::rolling::never(dir, "dpui.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            Some(guard)
        }
        Sink::Stderr => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
            None
        }
    }
}

pub fn log_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("dpui")
}
