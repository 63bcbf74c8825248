use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn filter_from(value: Option<String>, verbose: bool) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    match value {
        Some(value) => EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new(fallback)),
        None => EnvFilter::new(fallback),
    }
}

/// Install the global subscriber. `WASMHOST_LOG` takes precedence over
/// `RUST_LOG`; output goes to stderr so stdout stays parseable.
pub fn init_logging(verbose: bool) {
    let value = std::env::var("WASMHOST_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter_from(value, verbose))
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(false);
        init_logging(true);
    }

    #[test]
    fn invalid_filter_falls_back() {
        assert_eq!(filter_from(Some("wasmhost=loud".to_string()), true).to_string(), "debug");
        assert_eq!(filter_from(None, false).to_string(), "info");
        assert_eq!(filter_from(Some("wasmhost=trace".to_string()), false).to_string(), "wasmhost=trace");
    }
}
