//! Structured logging utilities for xbridge components.
//!
//! Provides consistent logging with component prefixes and structured fields.
//!
//! # Usage
//!
//! ```ignore
//! use xbridge_config::logging::*;
//!
//! log_server_info!("Dispatch loop started", capacity = 4096);
//! log_client_debug!("Issuing call", op = "CreateTriangleMesh");
//! ```

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const CLIENT: &'static str = "CLIENT";
    pub const SERVER: &'static str = "SERVER";
    pub const CHANNEL: &'static str = "CHANNEL";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// === CLIENT logging macros ===

#[macro_export]
macro_rules! log_client_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = "CLIENT", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_client_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "CLIENT", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_client_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "CLIENT", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_client_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "CLIENT", $($key = $value,)* $msg)
    };
}

// === SERVER logging macros ===

#[macro_export]
macro_rules! log_server_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = "SERVER", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_server_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "SERVER", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_server_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "SERVER", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_server_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "SERVER", $($key = $value,)* $msg)
    };
}

/// Initialize logging with the given level filter.
/// Call this once at application startup.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_constants() {
        assert_eq!(Component::CLIENT, "CLIENT");
        assert_eq!(Component::SERVER, "SERVER");
        assert_eq!(Component::CHANNEL, "CHANNEL");
    }

    #[test]
    fn test_component_macros_expand() {
        // No subscriber installed; this checks the macros accept the
        // message-plus-fields shapes used across the endpoint crates.
        crate::log_client_error!("client error", detail = "x".to_string());
        crate::log_client_warn!("client warn", uid = 7u64);
        crate::log_client_info!("client info");
        crate::log_client_debug!("client debug", op = "CreateTriangleMesh");
        crate::log_server_error!("server error");
        crate::log_server_warn!("server warn", token = 0u64);
        crate::log_server_info!("server info", capacity = 4096usize);
        crate::log_server_debug!("server debug");
    }
}
