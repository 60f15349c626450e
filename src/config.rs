//! Runtime mode and recoverer configuration.
//!
//! The deployment environment is read once at startup and converted into an
//! explicit [`Mode`]; request-handling code never consults the environment
//! itself. Anything that is not recognizably a development value runs as
//! production, which keeps fault details out of client responses by
//! default.

use http::StatusCode;

/// Deployment mode controlling client-facing fault detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Faults render as diagnostic HTML with clickable stack frames.
    Development,
    /// Faults render as the configured generic message.
    Production,
}

impl Mode {
    /// Parse an environment value. Unknown or empty values are production.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Mode::Development,
            _ => Mode::Production,
        }
    }

    /// Whether diagnostic rendering is enabled in this mode.
    pub fn is_development(self) -> bool {
        matches!(self, Mode::Development)
    }
}

/// Configuration for the recovering middleware.
///
/// Fixed at construction and shared read-only across requests.
#[derive(Debug, Clone)]
pub struct RecovererConfig {
    /// Status code emitted for every recovered fault.
    pub status_code: StatusCode,
    /// Client-facing message when diagnostics are off.
    pub message: String,
    /// Render fault and stack snapshot to the client.
    pub diagnostics: bool,
}

impl Default for RecovererConfig {
    fn default() -> Self {
        Self {
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Something went wrong".to_string(),
            diagnostics: false,
        }
    }
}

impl RecovererConfig {
    /// Defaults with diagnostics switched by deployment mode.
    pub fn for_mode(mode: Mode) -> Self {
        Self {
            diagnostics: mode.is_development(),
            ..Self::default()
        }
    }
}
