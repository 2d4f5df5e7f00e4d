//! Server configuration.
//!
//! The only externally configurable setting is the bind port, resolved from
//! (in precedence order) the `--port` CLI flag, the `PORT` environment
//! variable, or a default of 8080. `PORT` is read manually rather than via
//! clap's `env` attribute so an absent or unparseable value falls back
//! silently instead of failing argument parsing.

const DEFAULT_PORT: u16 = 8080;

/// Resolves the bind port from an optional CLI override and the `PORT`
/// environment variable, falling back to 8080.
pub fn resolve_port(cli_override: Option<u16>) -> u16 {
    resolve_port_from(cli_override, std::env::var("PORT").ok())
}

/// Pure core of [`resolve_port`], taking the raw `PORT` value (if any) as a
/// parameter so the precedence/fallback logic is testable without mutating
/// process environment state.
fn resolve_port_from(cli_override: Option<u16>, port_env: Option<String>) -> u16 {
    cli_override
        .or_else(|| port_env.and_then(|v| v.parse().ok()))
        .unwrap_or(DEFAULT_PORT)
}
