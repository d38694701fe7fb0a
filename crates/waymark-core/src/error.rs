//! Handler faults.

use std::error::Error as StdError;

use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync>;

/// An error from route handling itself, as opposed to a request that
/// simply did not match.
///
/// Faults are terminal. Once a route has matched, a fault from its handler
/// or its build step becomes an error response; the dispatcher never falls
/// through to later routes.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Fault {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl Fault {
    /// A fault with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), source: None }
    }

    /// Wraps any error, keeping it as the source.
    pub fn wrap(err: impl Into<BoxError>) -> Self {
        let source = err.into();
        Self { message: source.to_string(), source: Some(source) }
    }

    /// The fault message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for Fault {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for Fault {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<std::io::Error> for Fault {
    fn from(err: std::io::Error) -> Self {
        Self::wrap(err)
    }
}

impl From<serde_json::Error> for Fault {
    fn from(err: serde_json::Error) -> Self {
        Self::wrap(err)
    }
}
