use std::path::PathBuf;

use uuid::Uuid;

/// Application-level constants
pub const APP_NAME: &str = "Myaview";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version tag written into the trailing comment of every checkpoint.
pub const CHECKPOINT_FORMAT_VERSION: &str = "1.0";

/// Upload ceiling enforced before a file reaches either parser.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Narrative summaries are collapsed to one line and cut at this many chars.
pub const MAX_SUMMARY_CHARS: usize = 500;

/// Lines scanned after an appointment line for its facility/clinic/location.
pub const APPOINTMENT_LOOKAHEAD: usize = 5;

/// Namespace for document ids derived from file content.
pub const DOCUMENT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6d79_6176_6965_7700_8000_0000_0000_0002);

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "MYAVIEW_DATA_DIR";

/// Get the application data directory.
/// `$MYAVIEW_DATA_DIR` when set, otherwise `~/Myaview/`.
pub fn app_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the graph database file
pub fn graph_db_path() -> PathBuf {
    app_data_dir().join("graph.db")
}

/// Default directory for exported checkpoints
pub fn checkpoints_dir() -> PathBuf {
    app_data_dir().join("checkpoints")
}

/// Log filter used when `RUST_LOG` is not set
pub fn default_log_filter() -> &'static str {
    "myaview=info,myaview_lib=info,warn"
}

/// Install the global tracing subscriber. Safe to call more than once.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_filter())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
