//! Run mode: development or production.
//!
//! The mode only changes what unmatched requests and faults look like on
//! the wire. Development answers them with diagnostic HTML pages;
//! production keeps the bodies bare. Matching itself is identical in both.

use std::env;

/// The dispatcher's run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Diagnostic fallback pages. The default.
    #[default]
    Development,
    /// Bare fallback responses.
    Production,
}

impl Mode {
    /// Reads the mode from the `WAYMARK_ENV` environment variable.
    ///
    /// `production` or `prod` (any case) selects [`Mode::Production`];
    /// anything else, including an unset variable, selects
    /// [`Mode::Development`].
    pub fn from_env() -> Self {
        match env::var("WAYMARK_ENV") {
            Ok(value) => match value.to_ascii_lowercase().as_str() {
                "production" | "prod" => Mode::Production,
                _ => Mode::Development,
            },
            Err(_) => Mode::Development,
        }
    }

    pub fn is_development(self) -> bool {
        matches!(self, Mode::Development)
    }

    pub fn is_production(self) -> bool {
        matches!(self, Mode::Production)
    }
}
