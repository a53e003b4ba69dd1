//! Request-equivalence predicates used to look up cached responses.
//!
//! A matcher checks one aspect of equivalence between two requests and
//! reports the first differing field on failure. The cassette store runs
//! a predicate list over every stored request; two requests are
//! equivalent only if every predicate passes.

use crate::error::Mismatch;
use crate::request::Request;

/// One equivalence predicate over a pair of requests.
///
/// Returns `Ok(())` when the compared aspect is equal, otherwise a
/// [`Mismatch`] citing the differing field and both values.
pub type Matcher = fn(&Request, &Request) -> Result<(), Mismatch>;

/// The predicate list used when a cassette is opened without an explicit
/// one: exact equality on target, argument set, and fingerprint.
pub const DEFAULT_MATCHERS: &[Matcher] = &[target, arguments, fingerprint];

/// Matches when both requests address the same (tool, method) call site.
///
/// # Errors
///
/// Returns a [`Mismatch`] citing the tool or method that differed.
pub fn target(a: &Request, b: &Request) -> Result<(), Mismatch> {
    if a.tool() != b.tool() {
        return Err(Mismatch::new("tool", a.tool(), b.tool()));
    }
    if a.method() != b.method() {
        return Err(Mismatch::new("method", a.method(), b.method()));
    }
    Ok(())
}

/// Matches when both requests carry exactly the same argument names and
/// every corresponding value is structurally equal.
///
/// An extra or missing argument name on either side is itself a mismatch:
/// the canonical set of names must be identical. This catches
/// intercepting the wrong call signature. There is no normalization of
/// whitespace, casing, or numeric tolerance.
///
/// # Errors
///
/// Returns a [`Mismatch`] citing the differing name sets, or the first
/// argument (in name order) whose values differ.
pub fn arguments(a: &Request, b: &Request) -> Result<(), Mismatch> {
    let a_names = a.arg_names();
    let b_names = b.arg_names();
    if a_names != b_names {
        return Err(Mismatch::new(
            "argument names",
            format!("{a_names:?}"),
            format!("{b_names:?}"),
        ));
    }
    for (name, left) in a.args() {
        let right = &b.args()[name];
        if left != right {
            return Err(Mismatch::new(name.clone(), left, right));
        }
    }
    Ok(())
}

/// Matches when both requests carry an equal configuration fingerprint.
///
/// # Errors
///
/// Returns a [`Mismatch`] citing the first fingerprint entry (or entry
/// set) that differed.
pub fn fingerprint(a: &Request, b: &Request) -> Result<(), Mismatch> {
    if a.meta() == b.meta() {
        return Ok(());
    }
    let a_names: Vec<&str> = a.meta().keys().map(String::as_str).collect();
    let b_names: Vec<&str> = b.meta().keys().map(String::as_str).collect();
    if a_names != b_names {
        return Err(Mismatch::new(
            "fingerprint",
            format!("{a_names:?}"),
            format!("{b_names:?}"),
        ));
    }
    for (name, left) in a.meta() {
        let right = &b.meta()[name];
        if left != right {
            return Err(Mismatch::new(format!("fingerprint {name}"), left, right));
        }
    }
    Ok(())
}

/// Runs every predicate in `matchers` over the pair, failing on the
/// first mismatch.
///
/// # Errors
///
/// Returns the first predicate's [`Mismatch`].
pub fn match_all(a: &Request, b: &Request, matchers: &[Matcher]) -> Result<(), Mismatch> {
    for matcher in matchers {
        matcher(a, b)?;
    }
    Ok(())
}

/// Non-diagnostic form of [`match_all`].
#[must_use]
pub fn matches(a: &Request, b: &Request, matchers: &[Matcher]) -> bool {
    match_all(a, b, matchers).is_ok()
}
