//! LLM integration: text completions through the cache.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use super::{Binding, CallSite};
use crate::error::{BoxError, Error};
use crate::session::Session;

/// The call site shadowed by [`CachedModel`]. The
/// [`LlmCache`](crate::cache::LlmCache) hook builds requests against the
/// same site, so cassettes recorded through either are interchangeable.
pub const LLM_COMPLETE: CallSite = CallSite::new("TextModel", "complete");

/// Boxed future type alias used by [`TextModel`] to keep the trait
/// dyn-compatible.
pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, BoxError>> + Send + 'a>>;

/// Generates text completions for prompts.
pub trait TextModel: Send + Sync {
    /// A stable identifier for the model and its sampling configuration
    /// (e.g. `"model-X temperature=0"`). Folded into every request so
    /// recordings from different models never match each other.
    fn llm_string(&self) -> String;

    /// Generates a completion for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails (network, auth,
    /// rate-limit, etc.).
    fn complete(&self, prompt: &str) -> CompletionFuture<'_>;
}

/// Funnels a model's `complete` calls through a session's cassette.
pub struct CachedModel<T: TextModel> {
    inner: T,
    binding: Binding,
}

impl<T: TextModel> CachedModel<T> {
    /// Wraps `inner`, binding its `complete` call site into `session`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyBound`] if the session already has a
    /// model binding.
    pub fn new(session: &mut Session, inner: T) -> Result<Self, Error> {
        let binding = session.bind(LLM_COMPLETE)?;
        Ok(Self { inner, binding })
    }

    /// Completes `prompt`, serving a recorded response when one matches.
    ///
    /// On replay the real model is never awaited.
    ///
    /// # Errors
    ///
    /// Returns a replay, recording, or live-completion error.
    pub async fn complete(&self, prompt: &str) -> Result<String, Error> {
        let request = self
            .binding
            .site()
            .request()
            .arg("prompt", prompt)
            .arg("llm_string", self.inner.llm_string());
        let response = self
            .binding
            .call_async(request, || async {
                let text = self.inner.complete(prompt).await?;
                Ok(Value::String(text))
            })
            .await?;
        serde_json::from_value(response)
            .map_err(|source| Error::Serialize { what: "recorded completion".into(), source })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::cassette::mode::RecordMode;

    /// Counting model whose answer changes on every live call, so a
    /// replayed answer is distinguishable from a fresh one.
    struct MockModel {
        calls: Arc<AtomicU32>,
    }

    impl TextModel for MockModel {
        fn llm_string(&self) -> String {
            "MockModel".into()
        }

        fn complete(&self, prompt: &str) -> CompletionFuture<'_> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let text = format!(
                "Wow, you really think you can ask me to '{prompt}'? \
                 You've asked me to do this {n} times."
            );
            Box::pin(async move { Ok(text) })
        }
    }

    #[tokio::test]
    async fn record_once_then_replay_within_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicU32::new(0));

        let mut session = Session::open(dir.path().join("llm.yaml"), RecordMode::Once).unwrap();
        let model = CachedModel::new(&mut session, MockModel { calls: Arc::clone(&calls) }).unwrap();

        let first = model.complete("Tell me a silly joke").await.unwrap();
        let second = model.complete("Tell me a silly joke").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A different prompt is a different request.
        let other = model.complete("Tell me a serious joke").await.unwrap();
        assert_ne!(first, other);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn llm_string_participates_in_matching() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.yaml");

        {
            let mut session = Session::open(&path, RecordMode::Once).unwrap();
            let model = CachedModel::new(
                &mut session,
                MockModel { calls: Arc::new(AtomicU32::new(0)) },
            )
            .unwrap();
            model.complete("Hello").await.unwrap();
            session.close().unwrap();
        }

        /// Same prompt, different model identifier.
        struct OtherModel;
        impl TextModel for OtherModel {
            fn llm_string(&self) -> String {
                "OtherModel".into()
            }
            fn complete(&self, _prompt: &str) -> CompletionFuture<'_> {
                Box::pin(async { Ok("fresh".to_string()) })
            }
        }

        let mut session = Session::open(&path, RecordMode::None).unwrap();
        let model = CachedModel::new(&mut session, OtherModel).unwrap();
        let result = model.complete("Hello").await;
        assert!(matches!(result, Err(Error::CannotRecord { .. })));
    }
}
