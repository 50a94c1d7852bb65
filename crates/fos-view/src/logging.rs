//! Tracing initialisation

use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber filtered by `filter`
///
/// `RUST_LOG` takes precedence when set. Returns `false` when a global
/// subscriber was already installed, in which case nothing changes.
pub fn init_tracing(filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let _ = init_tracing("debug");
        assert!(!init_tracing("trace"));
        tracing::debug!("still logging");
    }
}
