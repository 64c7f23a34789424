use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber for both binaries.
///
/// `RUST_LOG` wins when set; otherwise `-v` occurrences pick the level
/// (none = warn, `-v` = info, `-vv` = debug, more = trace).
pub fn init(verbose: u8) {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level_for(verbose))
    };

    // A second init (tests driving several entry points) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "logging initialised");
}

fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
