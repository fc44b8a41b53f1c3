use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Compact stderr logging. `RUST_LOG` wins over the verbosity flag when set.
pub fn init(verbose: bool) {
    let fallback = if verbose {
        "debug,matchlab_engine=debug"
    } else {
        "info,matchlab_engine=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr).compact())
        .with(filter)
        .try_init();
}
