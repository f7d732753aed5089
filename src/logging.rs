// src/logging.rs
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "scalp_planner=info";

/// Daily rolling file under `dir`. The dashboard owns the terminal, so
/// stderr output is opt-in. Keep the guard alive until exit.
pub fn init(dir: &str, to_stderr: bool) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(dir, "scalp_planner.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stderr_layer = to_stderr.then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(stderr_layer)
        .init();

    guard
}
