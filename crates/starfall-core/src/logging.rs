//! Logging setup on top of `tracing-subscriber`.

use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor an explicit filter is given.
///
/// The GPU stack is very chatty below `info`.
pub const DEFAULT_FILTER: &str = "debug,wgpu_core=info,wgpu_hal=info,naga=info";

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over [`DEFAULT_FILTER`] when set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Install the global fmt subscriber with an explicit filter directive.
///
/// Returns `false` if a global subscriber was already installed, which is
/// the common case in test binaries that call this more than once.
pub fn init_with_filter(filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .try_init()
        .is_ok()
}
