//! LLM-style memoization hook backed by a session's cassette.
//!
//! Some frameworks memoize completions through a cache interface of
//! their own, `lookup(prompt, llm_string)` / `update(...)`, rather
//! than through an interceptable call site. [`LlmCache`] adapts that
//! interface onto the cassette store, and is handed out by
//! [`Session::llm_cache`](crate::session::Session::llm_cache) rather
//! than installed into any process-wide slot: the handle holds a weak
//! store reference, so it resets to "no cache" the moment the session
//! closes.

use std::sync::{Mutex, Weak};

use serde_json::Value;

use crate::cassette::store::CassetteStore;
use crate::error::Error;
use crate::intercept::llm::LLM_COMPLETE;
use crate::request::Request;

/// Memoization hook keyed on (prompt, llm_string).
///
/// Requests are built against the same call site as
/// [`CachedModel`](crate::intercept::llm::CachedModel), so a cassette
/// recorded through either surface replays through the other.
pub struct LlmCache {
    store: Weak<Mutex<CassetteStore>>,
}

impl LlmCache {
    pub(crate) fn new(store: Weak<Mutex<CassetteStore>>) -> Self {
        Self { store }
    }

    fn request(prompt: &str, llm_string: &str) -> Request {
        LLM_COMPLETE.request().arg("prompt", prompt).arg("llm_string", llm_string)
    }

    /// Looks up a recorded completion.
    ///
    /// A miss is simply `None`: the framework answers it with a live
    /// call followed by [`update`](Self::update), which is where write
    /// protection is enforced. After the session has closed, every
    /// lookup misses.
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    #[must_use]
    pub fn lookup(&self, prompt: &str, llm_string: &str) -> Option<Value> {
        let store = self.store.upgrade()?;
        let request = Self::request(prompt, llm_string);
        let mut guard = store.lock().expect("cassette store lock poisoned");
        guard.play(&request)
    }

    /// Records a completion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] after the backing session has
    /// been torn down, or [`Error::CannotRecord`] when the cassette is
    /// write-protected.
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    pub fn update(&self, prompt: &str, llm_string: &str, value: Value) -> Result<(), Error> {
        let Some(store) = self.store.upgrade() else {
            return Err(Error::SessionClosed);
        };
        let request = Self::request(prompt, llm_string);
        let mut guard = store.lock().expect("cassette store lock poisoned");
        guard.append(request, value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cassette::mode::RecordMode;
    use crate::session::Session;

    #[test]
    fn miss_then_update_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(dir.path().join("cache.yaml"), RecordMode::Once).unwrap();
        let cache = session.llm_cache();

        assert!(cache.lookup("Tell me a silly joke", "model-X").is_none());
        cache.update("Tell me a silly joke", "model-X", json!("Wow...")).unwrap();
        assert_eq!(cache.lookup("Tell me a silly joke", "model-X"), Some(json!("Wow...")));
    }

    #[test]
    fn update_on_a_write_protected_session_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("protected.yaml");
        {
            let session = Session::open(&path, RecordMode::Once).unwrap();
            let cache = session.llm_cache();
            cache.update("prompt", "model-X", json!("answer")).unwrap();
            session.close().unwrap();
        }

        let session = Session::open(&path, RecordMode::Once).unwrap();
        let cache = session.llm_cache();
        let result = cache.update("new prompt", "model-X", json!("answer"));
        assert!(matches!(result, Err(Error::CannotRecord { .. })));
    }

    #[test]
    fn handle_goes_inert_when_the_session_closes() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(dir.path().join("inert.yaml"), RecordMode::Once).unwrap();
        let cache = session.llm_cache();
        cache.update("prompt", "model-X", json!("answer")).unwrap();
        session.close().unwrap();

        assert!(cache.lookup("prompt", "model-X").is_none());
        let result = cache.update("another", "model-X", json!("answer"));
        assert!(matches!(result, Err(Error::SessionClosed)));
    }

    #[test]
    fn cache_and_model_share_one_request_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.yaml");
        {
            let session = Session::open(&path, RecordMode::Once).unwrap();
            let cache = session.llm_cache();
            cache.update("Hello", "MockModel", json!("Hi there")).unwrap();
            session.close().unwrap();
        }

        // A replaying store serves the cache-recorded interaction for a
        // request built by the interception path.
        let mut store = CassetteStore::open(&path, RecordMode::None).unwrap();
        let request =
            LLM_COMPLETE.request().arg("prompt", "Hello").arg("llm_string", "MockModel");
        assert_eq!(store.lookup(&request).unwrap(), Some(json!("Hi there")));
    }
}
