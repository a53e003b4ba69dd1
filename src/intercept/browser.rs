//! Browser integration: page navigation and extraction through the
//! cache.

use serde_json::Value;

use super::{Binding, CallSite};
use crate::error::{BoxError, Error};
use crate::session::Session;

/// The call sites shadowed by [`CachedBrowser`]. Two methods on one tool
/// type, each with its own binding.
pub const BROWSER_NAVIGATE: CallSite = CallSite::new("Browser", "navigate");
/// Call site for [`CachedBrowser::extract_text`].
pub const BROWSER_EXTRACT_TEXT: CallSite = CallSite::new("Browser", "extract_text");

/// Drives a web browser page.
pub trait Browser {
    /// Navigates to `url` and returns a status message.
    ///
    /// # Errors
    ///
    /// Returns an error if navigation fails.
    fn navigate(&self, url: &str) -> Result<String, BoxError>;

    /// Extracts the visible text of the current page.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction fails.
    fn extract_text(&self) -> Result<String, BoxError>;
}

/// Funnels a browser's calls through a session's cassette.
pub struct CachedBrowser<T: Browser> {
    inner: T,
    navigate: Binding,
    extract_text: Binding,
}

impl<T: Browser> CachedBrowser<T> {
    /// Wraps `inner`, binding both browser call sites into `session`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyBound`] if the session already has a
    /// browser binding.
    pub fn new(session: &mut Session, inner: T) -> Result<Self, Error> {
        let navigate = session.bind(BROWSER_NAVIGATE)?;
        let extract_text = session.bind(BROWSER_EXTRACT_TEXT)?;
        Ok(Self { inner, navigate, extract_text })
    }

    /// Navigates to `url`, serving a recorded response when one matches.
    ///
    /// # Errors
    ///
    /// Returns a replay, recording, or live-navigation error.
    pub fn navigate(&self, url: &str) -> Result<String, Error> {
        let request = self.navigate.site().request().arg("url", url);
        let response = self.navigate.call(request, || {
            let status = self.inner.navigate(url)?;
            Ok(Value::String(status))
        })?;
        from_recorded(response)
    }

    /// Extracts the current page's text, serving a recorded response
    /// when one matches.
    ///
    /// # Errors
    ///
    /// Returns a replay, recording, or live-extraction error.
    pub fn extract_text(&self) -> Result<String, Error> {
        let request = self.extract_text.site().request();
        let response = self.extract_text.call(request, || {
            let text = self.inner.extract_text()?;
            Ok(Value::String(text))
        })?;
        from_recorded(response)
    }
}

fn from_recorded(response: Value) -> Result<String, Error> {
    serde_json::from_value(response)
        .map_err(|source| Error::Serialize { what: "recorded page content".into(), source })
}
