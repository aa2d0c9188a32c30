use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` wins; otherwise `info`, or `debug`
/// when verbose.
pub fn init(verbose: bool) {
    let fallback = if verbose { "bayrate=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
