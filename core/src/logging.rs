use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set, otherwise everything from this workspace logs at `level`.
/// Calling it twice is harmless, the second subscriber is simply not installed.
pub fn init(level: &str) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		EnvFilter::new(format!(
			"warn,cumulus_core={level},cumulus_task_system={level},cumulus_cache={level}"
		))
	});

	if let Err(e) = tracing_subscriber::registry()
		.with(fmt::layer().with_target(true))
		.with(filter)
		.try_init()
	{
		tracing::debug!(%e, "Tracing subscriber already installed");
	}
}
