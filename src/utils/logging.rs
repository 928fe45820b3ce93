/// Install the process-wide `tracing` subscriber.
///
/// Honors `RUST_LOG`; defaults to `info` when it is unset or invalid. Logs go to stderr so
/// findings printed by a host on stdout stay machine-readable. Safe to call more than once.
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("[STARTUP] Tracing initialized.");
    }
}
