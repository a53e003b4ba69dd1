//! Error taxonomy for recording and replay.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error type returned by live tool implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A mismatch between two requests, citing the first differing field.
///
/// Carries both rendered values so test failures show exactly what
/// diverged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("requests differ on {field}: {left} != {right}")]
pub struct Mismatch {
    /// Name of the first field that differed (argument name, or one of
    /// `"tool"`, `"method"`, `"argument names"`, `"fingerprint"`).
    pub field: String,
    /// The field's rendered value in the first request.
    pub left: String,
    /// The field's rendered value in the second request.
    pub right: String,
}

impl Mismatch {
    pub(crate) fn new(
        field: impl Into<String>,
        left: impl ToString,
        right: impl ToString,
    ) -> Self {
        Self { field: field.into(), left: left.to_string(), right: right.to_string() }
    }
}

/// Errors surfaced by the cassette store, bindings, and sessions.
///
/// Every variant propagates to the caller; the crate never swallows a
/// correctness-relevant condition.
#[derive(Debug, Error)]
pub enum Error {
    /// A write-protected cassette was asked to serve or record a request
    /// it has no remaining interaction for. Fatal to the current test.
    #[error("cannot record new interaction for {request}: cassette {} is write-protected", .path.display())]
    CannotRecord {
        /// Rendered form of the unmatched request.
        request: String,
        /// The cassette file that refused the request.
        path: PathBuf,
    },

    /// Two requests expected to be equivalent were not.
    #[error(transparent)]
    Mismatch(#[from] Mismatch),

    /// A request or response value has no durable representation.
    #[error("cannot serialize {what}")]
    Serialize {
        /// What was being serialized (e.g. `"shell output"`).
        what: String,
        /// The underlying serde failure.
        #[source]
        source: serde_json::Error,
    },

    /// A cassette file could not be parsed or rendered as YAML.
    #[error("malformed cassette {}", .path.display())]
    CassetteFormat {
        /// The cassette file in question.
        path: PathBuf,
        /// The underlying YAML failure.
        #[source]
        source: serde_yaml::Error,
    },

    /// A cassette file could not be read or written.
    #[error("cassette I/O failed for {}", .path.display())]
    Io {
        /// The cassette file in question.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A second binding was requested for a (tool, method) pair that is
    /// already bound in the same session.
    #[error("{tool}::{method} is already bound in this session")]
    AlreadyBound {
        /// Tool type name of the duplicate call site.
        tool: String,
        /// Method name of the duplicate call site.
        method: String,
    },

    /// The session backing a cache handle has already been closed.
    #[error("session is closed; no cassette is available")]
    SessionClosed,

    /// The live tool call failed during a recording pass. The failure is
    /// propagated unmodified and never cached.
    #[error("live tool call failed")]
    Tool(#[source] BoxError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_message_cites_field_and_values() {
        let err = Mismatch::new("prompt", "\"a\"", "\"b\"");
        assert_eq!(err.to_string(), "requests differ on prompt: \"a\" != \"b\"");
    }

    #[test]
    fn cannot_record_message_names_the_cassette() {
        let err = Error::CannotRecord {
            request: "tool://SystemShell/run".into(),
            path: PathBuf::from("/tmp/t.yaml"),
        };
        let msg = err.to_string();
        assert!(msg.contains("tool://SystemShell/run"));
        assert!(msg.contains("/tmp/t.yaml"));
        assert!(msg.contains("write-protected"));
    }
}
