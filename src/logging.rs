// src/logging.rs

use color_eyre::eyre::Result;
use directories::ProjectDirs;
use lazy_static::lazy_static;
use std::path::PathBuf;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::UtcOffset;
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{self, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase().to_string();
    pub static ref LOG_ENV: String = format!("{}_LOGLEVEL", PROJECT_NAME.clone());
    pub static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "vulnvision", env!("CARGO_PKG_NAME"))
}

pub fn get_data_dir() -> PathBuf {
    if let Some(proj_dirs) = project_directory() {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}

/// The filter directive: `RUST_LOG`, then `VULNVISION_LOGLEVEL`, then info for this crate.
fn log_level() -> String {
    std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV.clone()))
        .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")))
}

/// Log timestamps in the local offset, or UTC once the offset can no longer
/// be read safely (another thread is already running).
fn timer() -> OffsetTime<&'static [BorrowedFormatItem<'static>]> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(
        offset,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"),
    )
}

/// Initializes file-based logging using the tracing subscriber.
///
/// Stdout stays reserved for scan output, so everything goes to
/// `<data dir>/vulnvision.log`.
pub fn initialize_logging() -> Result<PathBuf> {
    let directory = get_data_dir();
    std::fs::create_dir_all(&directory)?;
    let log_path = directory.join(LOG_FILE.clone());
    let log_file = std::fs::File::create(&log_path)?;

    let file_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_timer(timer())
        .with_target(false)
        .with_ansi(false)
        .with_filter(EnvFilter::new(log_level()));

    tracing_subscriber::registry()
        .with(file_subscriber)
        .with(ErrorLayer::default())
        .try_init()?;

    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::fmt::format::Writer;
    use tracing_subscriber::fmt::time::FormatTime;

    #[test]
    fn derived_names_follow_the_crate_name() {
        assert_eq!(PROJECT_NAME.as_str(), "VULNVISION");
        assert_eq!(LOG_ENV.as_str(), "VULNVISION_LOGLEVEL");
        assert_eq!(LOG_FILE.as_str(), "vulnvision.log");
    }

    #[test]
    fn timestamps_render_from_a_multithreaded_process() {
        // The test harness already runs several threads.
        let mut line = String::new();
        timer().format_time(&mut Writer::new(&mut line)).unwrap();
        assert!(!line.contains("unknown"), "timestamp not rendered: {line}");
        assert_eq!(line.len(), "2026-01-01 00:00:00.000".len());
    }
}
