//! # Viewer Error Taxonomy
//!
//! A single error enum shared by the fetcher, the aggregation store, the signing
//! engine and the proxy client. The HTTP layer maps each variant to a status code,
//! so variants describe *what kind* of failure happened rather than where.

use thiserror::Error;

/// Errors that can occur anywhere in the viewer backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ViewerError {
    /// Network failure, timeout, or a non-200 upstream status.
    #[error("Fetch error for {target}: {reason}")]
    Fetch {
        /// The feed name or URL that was being fetched.
        target: String,
        /// Human readable cause.
        reason: String,
    },

    /// A payload could not be decoded as the expected JSON shape.
    #[error("Parse error for {target}: {reason}")]
    Parse {
        /// The feed name or URL whose payload was malformed.
        target: String,
        /// Decoder message.
        reason: String,
    },

    /// Signing key material is unavailable or the nav document was malformed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Lookup miss on a keyed entity.
    #[error("{0} not found")]
    NotFound(String),

    /// Malformed caller input.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ViewerError {
    /// Shorthand for [`ViewerError::Fetch`].
    pub fn fetch(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for [`ViewerError::Parse`].
    pub fn parse(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias used throughout `lib_common`.
pub type Result<T> = std::result::Result<T, ViewerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_carries_feed_name() {
        let err = ViewerError::fetch("events", "HTTP 503");
        assert_eq!(err.to_string(), "Fetch error for events: HTTP 503");
    }

    #[test]
    fn not_found_message() {
        assert_eq!(ViewerError::NotFound("Gacha".into()).to_string(), "Gacha not found");
    }
}
