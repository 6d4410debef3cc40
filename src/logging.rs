// Tracing setup for hosts embedding the client.
//
// Verbosity comes from RUST_LOG, e.g. `RUST_LOG=travelgo_client=debug`.

use tracing_subscriber::EnvFilter;

// Installs a global fmt subscriber. Returns false if one was already set.
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        init_tracing();
        assert!(!init_tracing());
    }
}
