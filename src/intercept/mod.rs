//! Interception layer funneling tool calls through a cassette store.
//!
//! A [`Binding`] shadows one (tool, method) call site for the lifetime
//! of a session. Every invocation through the binding builds a
//! [`Request`], asks the store for a recorded response, and only falls
//! through to the real callable on a recordable miss. Integrations for
//! specific tools live in the submodules; new ones are written against
//! [`Binding`] without touching this layer.

pub mod browser;
pub mod llm;
pub mod shell;

use std::future::Future;
use std::sync::{Mutex, Weak};

use serde_json::Value;

use crate::cassette::store::CassetteStore;
use crate::error::{BoxError, Error};
use crate::request::Request;

/// One interceptable (tool, method) call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CallSite {
    /// Tool type name (e.g. `"SystemShell"`).
    pub tool: &'static str,
    /// Method name on the tool (e.g. `"run"`).
    pub method: &'static str,
}

impl CallSite {
    /// Creates a call site for `method` on the tool type `tool`.
    #[must_use]
    pub const fn new(tool: &'static str, method: &'static str) -> Self {
        Self { tool, method }
    }

    /// Starts a request targeting this call site.
    #[must_use]
    pub fn request(&self) -> Request {
        Request::new(self.tool, self.method)
    }
}

/// Shadows one call site so invocations are funneled through a session's
/// cassette store.
///
/// The binding holds a weak reference to the store. When the session is
/// closed or dropped the binding goes inert and calls fall through to
/// the real tool; the original behavior is restored unconditionally,
/// on every exit path.
pub struct Binding {
    site: CallSite,
    store: Weak<Mutex<CassetteStore>>,
}

impl Binding {
    pub(crate) fn new(site: CallSite, store: Weak<Mutex<CassetteStore>>) -> Self {
        Self { site, store }
    }

    /// The call site this binding shadows.
    #[must_use]
    pub fn site(&self) -> CallSite {
        self.site
    }

    /// Whether the backing session is still open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.store.strong_count() > 0
    }

    /// Resolves `request` through the cassette, invoking `live` only on
    /// a recordable miss.
    ///
    /// On a hit the real callable is not invoked, so its side effects do
    /// not occur on replay. On a miss the live result is appended and
    /// returned; a live failure propagates unmodified and is never
    /// cached. After the session has closed, the call passes straight
    /// through to `live`.
    ///
    /// The store lock is released around the live call; the
    /// matching/lookup/append logic itself never blocks on the tool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CannotRecord`] on an unmatched request against a
    /// write-protected cassette, [`Error::Tool`] when the live call
    /// fails, or an append/serialization error from the store.
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    pub fn call<F>(&self, request: Request, live: F) -> Result<Value, Error>
    where
        F: FnOnce() -> Result<Value, BoxError>,
    {
        let Some(store) = self.store.upgrade() else {
            return live().map_err(Error::Tool);
        };
        {
            let mut guard = store.lock().expect("cassette store lock poisoned");
            if let Some(response) = guard.lookup(&request)? {
                return Ok(response);
            }
        }
        let response = live().map_err(Error::Tool)?;
        let mut guard = store.lock().expect("cassette store lock poisoned");
        guard.append(request, response.clone())?;
        Ok(response)
    }

    /// Suspension-capable form of [`call`](Self::call): identical
    /// matching and caching, differing only in how the real callable is
    /// awaited.
    ///
    /// A call abandoned before the live future resolves never reaches
    /// the append, so no partial result is cached.
    ///
    /// # Errors
    ///
    /// As [`call`](Self::call).
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    pub async fn call_async<F, Fut>(&self, request: Request, live: F) -> Result<Value, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, BoxError>>,
    {
        let Some(store) = self.store.upgrade() else {
            return live().await.map_err(Error::Tool);
        };
        {
            let mut guard = store.lock().expect("cassette store lock poisoned");
            if let Some(response) = guard.lookup(&request)? {
                return Ok(response);
            }
        }
        let response = live().await.map_err(Error::Tool)?;
        let mut guard = store.lock().expect("cassette store lock poisoned");
        guard.append(request, response.clone())?;
        Ok(response)
    }
}
