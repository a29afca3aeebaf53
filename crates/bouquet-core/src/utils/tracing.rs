use std::io;
use std::path::Path;

use chrono::Local;
use tracing_appender::rolling;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Installs the global subscriber. Filtering comes from `RUST_LOG`.
///
/// With a log directory, output goes to a timestamp-named file inside it;
/// otherwise to stderr, which keeps stdout free for the line transport.
pub fn init_tracing(log_dir: Option<&Path>) -> io::Result<()> {
    let filter = EnvFilter::from_default_env();

    if let Some(log_dir) = log_dir {
        std::fs::create_dir_all(log_dir)?;
        let file_name = format!("{}.log", Local::now().format("%Y%m%d_%H%M%S"));
        let file_appender = rolling::never(log_dir, &file_name);

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::Layer::new()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter);

        tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;

        tracing::debug!(
            target: "bouquet::utils::tracing",
            path = %log_dir.join(&file_name).display(),
            "Tracing initialized with file output"
        );
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::Layer::default()
                    .with_writer(io::stderr)
                    .with_ansi(false)
                    .with_target(true),
            )
            .with(filter);

        tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;

        tracing::debug!(
            target: "bouquet::utils::tracing",
            "Tracing initialized with stderr output"
        );
    }

    Ok(())
}
