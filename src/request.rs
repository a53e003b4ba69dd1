//! Canonical, argument-based identity of one recordable call.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies one recordable call: the (tool, method) target plus the
/// resolved set of named arguments.
///
/// A request is fully determined by its target identifier and its
/// (name, value) pairs; the order arguments were supplied in at the call
/// site is irrelevant. Requests are immutable once built; integrations
/// construct a fresh one on every intercepted call.
///
/// Values are [`serde_json::Value`], so arguments can be text, numbers,
/// booleans, or nested structures, and equality is structural.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    tool: String,
    method: String,
    #[serde(default)]
    args: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    meta: BTreeMap<String, Value>,
}

impl Request {
    /// Creates a request targeting `method` on the tool type `tool`.
    #[must_use]
    pub fn new(tool: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            method: method.into(),
            args: BTreeMap::new(),
            meta: BTreeMap::new(),
        }
    }

    /// Adds a named argument.
    ///
    /// Integrations are responsible for naming positional arguments
    /// deterministically and for leaving out values with no durable form
    /// (progress handles and the like).
    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Adds a configuration-fingerprint entry.
    ///
    /// Fingerprints distinguish otherwise-identical call targets with
    /// different runtime state (a persistent shell session versus an
    /// ephemeral one, say). They participate in matching, so replaying
    /// against an incompatible configuration is a mismatch rather than a
    /// wrong answer.
    #[must_use]
    pub fn fingerprint(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(name.into(), value.into());
        self
    }

    /// The tool type name this request targets.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// The method name this request targets.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The named arguments, sorted by name.
    #[must_use]
    pub fn args(&self) -> &BTreeMap<String, Value> {
        &self.args
    }

    /// The configuration fingerprint, sorted by name.
    #[must_use]
    pub fn meta(&self) -> &BTreeMap<String, Value> {
        &self.meta
    }

    /// The argument names, in sorted order.
    #[must_use]
    pub fn arg_names(&self) -> Vec<&str> {
        self.args.keys().map(String::as_str).collect()
    }

    /// The call-site identifier in `tool://<tool>/<method>` form.
    #[must_use]
    pub fn target(&self) -> String {
        format!("tool://{}/{}", self.tool, self.method)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tool://{}/{}", self.tool, self.method)?;
        if !self.args.is_empty() {
            let rendered: Vec<String> =
                self.args.iter().map(|(name, value)| format!("{name}={value}")).collect();
            write!(f, " {{{}}}", rendered.join(", "))?;
        }
        Ok(())
    }
}
