use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. Output goes to stderr so `plan` can keep stdout for JSON.
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let default_filter = format!("fundplan={level}");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        )
        .try_init()?;

    tracing::debug!("fundplan logging initialized (default level={level})");
    Ok(())
}
