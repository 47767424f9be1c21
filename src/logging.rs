use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,sitelens=debug,wgpu_core=warn,wgpu_hal=warn";

/// Installs the global `tracing` subscriber. `RUST_LOG` takes precedence over the default filter.
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}
