use std::env;

use tracing_subscriber::EnvFilter;

/// `--verbose` or `DOCQA_VERBOSE` force debug output for the docqa crates;
/// otherwise `RUST_LOG` applies, falling back to `info`.
pub fn init(verbose: bool) {
    let filter = if verbose || env_flag() {
        EnvFilter::new("info,docqa_core=debug,docqa_index=debug,docqa_rag=debug,docqa_llm=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn env_flag() -> bool {
    env::var("DOCQA_VERBOSE")
        .map(|value| parse_bool(&value))
        .unwrap_or(false)
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
