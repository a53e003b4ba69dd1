//! Session controller scoping one cassette's lifetime to a block of
//! code.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::cache::LlmCache;
use crate::cassette::mode::RecordMode;
use crate::cassette::store::CassetteStore;
use crate::error::Error;
use crate::intercept::{Binding, CallSite};
use crate::matchers::Matcher;

/// Governs one cassette's lifecycle: load on open, persist on close.
///
/// Opening a session resolves the cassette path (the `.yaml` suffix is
/// enforced), loads existing interactions, and derives write protection
/// from the [`RecordMode`] table. Integrations then register
/// [`Binding`]s through [`bind`](Self::bind); every binding is
/// invalidated when the session closes (on any exit path, including
/// panics), after which calls fall through to the real tools.
///
/// Dropping a session persists the cassette best-effort; call
/// [`close`](Self::close) to observe persistence failures.
///
/// One session owns its store exclusively. Only one binding per
/// (tool, method) is supported, and nested or concurrent sessions over
/// the same target are not supported; concurrent tasks sharing a store
/// must serialize externally.
pub struct Session {
    store: Arc<Mutex<CassetteStore>>,
    bound: BTreeSet<CallSite>,
}

impl Session {
    /// Opens a session for the cassette at `path` in the given mode.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing cassette file cannot be read or
    /// parsed.
    pub fn open(path: impl Into<PathBuf>, mode: RecordMode) -> Result<Self, Error> {
        let store = CassetteStore::open(path, mode)?;
        Ok(Self { store: Arc::new(Mutex::new(store)), bound: BTreeSet::new() })
    }

    /// Opens a session with an explicit match-predicate list.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing cassette file cannot be read or
    /// parsed.
    pub fn open_with_matchers(
        path: impl Into<PathBuf>,
        mode: RecordMode,
        matchers: Vec<Matcher>,
    ) -> Result<Self, Error> {
        let store = CassetteStore::open_with_matchers(path, mode, matchers)?;
        Ok(Self { store: Arc::new(Mutex::new(store)), bound: BTreeSet::new() })
    }

    /// Registers a binding shadowing `site` for this session's
    /// lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyBound`] when `site` is already bound in
    /// this session.
    pub fn bind(&mut self, site: CallSite) -> Result<Binding, Error> {
        if !self.bound.insert(site) {
            return Err(Error::AlreadyBound {
                tool: site.tool.to_string(),
                method: site.method.to_string(),
            });
        }
        Ok(Binding::new(site, Arc::downgrade(&self.store)))
    }

    /// Hands out the LLM memoization hook backed by this session's
    /// cassette. The hook goes inert when the session closes.
    #[must_use]
    pub fn llm_cache(&self) -> LlmCache {
        LlmCache::new(Arc::downgrade(&self.store))
    }

    /// Whether the cassette refuses new interactions.
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    #[must_use]
    pub fn write_protected(&self) -> bool {
        self.store.lock().expect("cassette store lock poisoned").write_protected()
    }

    /// Persists the cassette and tears the session down, returning the
    /// cassette path.
    ///
    /// All bindings and cache handles go inert here; subsequent calls
    /// through them reach the real tools directly.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette cannot be written.
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    pub fn close(self) -> Result<PathBuf, Error> {
        let path = {
            let mut store = self.store.lock().expect("cassette store lock poisoned");
            store.persist()?;
            store.path().to_path_buf()
        };
        // Drop releases the last strong store reference; its persist is
        // a no-op because nothing is dirty anymore.
        drop(self);
        Ok(path)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Ok(mut store) = self.store.lock() {
            if let Err(err) = store.persist() {
                warn!("failed to persist cassette on session teardown: {err}");
            }
        }
    }
}

/// Runs `f` against a freshly opened session, closing it afterwards.
///
/// The decorator-style form: wrap a test body in the closure and the
/// cassette is loaded before it and persisted after it. When `f` fails,
/// its error takes precedence and the cassette is still persisted.
///
/// # Errors
///
/// Returns the error from opening, from `f`, or from closing.
pub fn with_cassette<T>(
    path: impl Into<PathBuf>,
    mode: RecordMode,
    f: impl FnOnce(&mut Session) -> Result<T, Error>,
) -> Result<T, Error> {
    let mut session = Session::open(path, mode)?;
    match f(&mut session) {
        Ok(value) => {
            session.close()?;
            Ok(value)
        }
        Err(err) => {
            let _ = session.close();
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::intercept::shell::SHELL_RUN;

    #[test]
    fn open_enforces_the_yaml_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(dir.path().join("suffixless"), RecordMode::Once).unwrap();
        let path = session.close().unwrap();
        assert_eq!(path.extension().unwrap(), "yaml");
        assert!(path.exists());
    }

    #[test]
    fn duplicate_binding_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::open(dir.path().join("dupe"), RecordMode::Once).unwrap();
        let _first = session.bind(SHELL_RUN).unwrap();
        let second = session.bind(SHELL_RUN);
        assert!(matches!(second, Err(Error::AlreadyBound { .. })));
    }

    #[test]
    fn bindings_go_inert_after_close() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::open(dir.path().join("inert"), RecordMode::Once).unwrap();
        let binding = session.bind(SHELL_RUN).unwrap();
        assert!(binding.is_active());
        session.close().unwrap();
        assert!(!binding.is_active());

        // An inert binding passes straight through to the live closure.
        let value = binding
            .call(SHELL_RUN.request().arg("commands", "ls"), || Ok(json!("live output")))
            .unwrap();
        assert_eq!(value, json!("live output"));
    }

    #[test]
    fn drop_persists_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.yaml");
        {
            let mut session = Session::open(&path, RecordMode::Once).unwrap();
            let binding = session.bind(SHELL_RUN).unwrap();
            binding
                .call(SHELL_RUN.request().arg("commands", "ls"), || Ok(json!("out")))
                .unwrap();
            // No close: the session is dropped here.
        }
        assert!(path.exists(), "drop must persist the recording");

        let mut store = CassetteStore::open(&path, RecordMode::None).unwrap();
        let hit = store.lookup(&SHELL_RUN.request().arg("commands", "ls")).unwrap();
        assert_eq!(hit, Some(json!("out")));
    }

    #[test]
    fn with_cassette_closes_around_the_closure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scoped.yaml");

        let value = with_cassette(&path, RecordMode::Once, |session| {
            let binding = session.bind(SHELL_RUN)?;
            binding.call(SHELL_RUN.request().arg("commands", "pwd"), || Ok(json!("/root")))
        })
        .unwrap();
        assert_eq!(value, json!("/root"));
        assert!(path.exists());
    }

    #[test]
    fn with_cassette_persists_even_when_the_closure_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failing.yaml");

        let result: Result<(), Error> = with_cassette(&path, RecordMode::Once, |session| {
            let binding = session.bind(SHELL_RUN)?;
            binding.call(SHELL_RUN.request().arg("commands", "ls"), || Ok(json!("kept")))?;
            Err(Error::SessionClosed) // stand-in for a failing test body
        });
        assert!(matches!(result, Err(Error::SessionClosed)));
        assert!(path.exists(), "recordings before the failure are kept");
    }
}
