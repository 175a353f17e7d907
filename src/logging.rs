//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Setup logging of events reported by zonewalk.
///
/// Events go to stderr so that stdout only carries results. Use the
/// RUST_LOG environment variable to override the defaults.
///
/// E.g. To enable debug level logging:
///   RUST_LOG=DEBUG
///
/// Or to only follow the zone transfer crawl:
///   RUST_LOG=zonewalk::crawl=TRACE
///
/// Without RUST_LOG, only warnings and errors are shown, or everything
/// from debug level up if `verbose` is set.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_ids(verbose)
        .without_time()
        .try_init()
        .ok();
}
