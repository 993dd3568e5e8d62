//! Process-wide `tracing` setup.
//!
//! `RUST_LOG` takes precedence when set (`pingpong=debug,hyper=info`).
//! Otherwise the configured `log.level` applies to this crate, and the HTTP,
//! TLS and WebSocket stacks stay at `warn`.

use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. Later calls are no-ops.
pub fn init(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_target(true)
        .try_init();
}

/// `RUST_LOG` if it parses, else [`default_directives`] for `level`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Directives used when `RUST_LOG` is absent. Unknown levels mean `info`.
pub fn default_directives(level: &str) -> String {
    let level = match level.trim().to_lowercase().as_str() {
        "off" => "off",
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    };
    format!("warn,pingpong={level}")
}
