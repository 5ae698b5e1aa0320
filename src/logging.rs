//! Logging setup for embedding applications
//!
//! The library itself only emits `tracing` events. Applications that do not
//! install their own subscriber can call [`init_tracing`] once at startup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directives used when `RUST_LOG` is unset
pub const DEFAULT_DIRECTIVES: &str = "warn,treelens=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to `default_directives`
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(default_directives: &str) -> bool {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directives)),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(DEFAULT_DIRECTIVES);
        assert!(!init_tracing("debug"));
    }
}
