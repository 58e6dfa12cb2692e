use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber. `RUST_LOG` wins over `level`;
/// `verbose` bumps the fallback to debug.
pub fn init(level: &str, verbose: bool) {
    let level = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| fallback_filter(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn fallback_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(format!("diskagg={}", level))
        .unwrap_or_else(|_| EnvFilter::new("diskagg=info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_scopes_to_crate() {
        let f = fallback_filter("debug").to_string();
        assert!(f.contains("diskagg"));
        assert!(f.contains("debug"));
    }
}
