//! Shell integration: command execution through the cache.

use std::collections::BTreeMap;
use std::process::Command;

use serde_json::Value;

use super::{Binding, CallSite};
use crate::error::{BoxError, Error};
use crate::session::Session;

/// The call site shadowed by [`CachedShell`].
pub const SHELL_RUN: CallSite = CallSite::new("ShellTool", "run");

/// Executes shell command strings.
///
/// Implementations must be safe to skip entirely on replay: the caller
/// relies only on the returned output, never on a side effect.
pub trait ShellTool {
    /// Runs the command string and returns its captured output.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be spawned or fails to
    /// execute.
    fn run(&self, commands: &str) -> Result<String, BoxError>;

    /// Configuration fingerprint folded into every request.
    ///
    /// Distinguishes tool configurations whose recordings must not be
    /// mixed: sessions recorded with a persistent terminal are invalid
    /// for an ephemeral one, and vice versa.
    fn fingerprint(&self) -> BTreeMap<String, Value> {
        BTreeMap::new()
    }
}

/// Live shell executor that runs command strings via `sh -c`.
///
/// Every invocation spawns a fresh process; there is no persistent
/// session, and the fingerprint says so.
#[derive(Debug, Clone)]
pub struct SystemShell {
    strip_newlines: bool,
    return_err_output: bool,
}

impl SystemShell {
    /// Creates a shell with default configuration: output is returned
    /// as captured, stderr is discarded.
    #[must_use]
    pub fn new() -> Self {
        Self { strip_newlines: false, return_err_output: false }
    }

    /// Trim leading and trailing whitespace from command output.
    #[must_use]
    pub fn strip_newlines(mut self, strip: bool) -> Self {
        self.strip_newlines = strip;
        self
    }

    /// Append captured stderr to the returned output.
    #[must_use]
    pub fn return_err_output(mut self, return_err: bool) -> Self {
        self.return_err_output = return_err;
        self
    }
}

impl Default for SystemShell {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellTool for SystemShell {
    fn run(&self, commands: &str) -> Result<String, BoxError> {
        let output = Command::new("sh").arg("-c").arg(commands).output()?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        if self.return_err_output {
            text.push_str(&String::from_utf8_lossy(&output.stderr));
        }
        if self.strip_newlines {
            text = text.trim().to_string();
        }
        Ok(text)
    }

    fn fingerprint(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("persistent".to_string(), Value::Bool(false)),
            ("strip_newlines".to_string(), Value::Bool(self.strip_newlines)),
            ("return_err_output".to_string(), Value::Bool(self.return_err_output)),
        ])
    }
}

/// Funnels a shell tool's `run` calls through a session's cassette.
pub struct CachedShell<T: ShellTool> {
    inner: T,
    binding: Binding,
}

impl<T: ShellTool> CachedShell<T> {
    /// Wraps `inner`, binding its `run` call site into `session`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyBound`] if the session already has a
    /// shell binding.
    pub fn new(session: &mut Session, inner: T) -> Result<Self, Error> {
        let binding = session.bind(SHELL_RUN)?;
        Ok(Self { inner, binding })
    }

    /// Runs `commands`, serving a recorded response when one matches.
    ///
    /// The natural positional argument is normalized to the canonical
    /// name `commands` here, so every equivalent call builds an equal
    /// request.
    ///
    /// # Errors
    ///
    /// Returns a replay, recording, or live-execution error.
    pub fn run(&self, commands: &str) -> Result<String, Error> {
        let mut request = self.binding.site().request().arg("commands", commands);
        for (name, value) in self.inner.fingerprint() {
            request = request.fingerprint(name, value);
        }
        let response = self.binding.call(request, || {
            let output = self.inner.run(commands)?;
            Ok(Value::String(output))
        })?;
        serde_json::from_value(response)
            .map_err(|source| Error::Serialize { what: "recorded shell output".into(), source })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::cassette::mode::RecordMode;

    /// Fake shell with a call counter, for proving replay never goes
    /// live.
    struct FakeShell {
        output: String,
        calls: Arc<AtomicU32>,
        meta: BTreeMap<String, Value>,
    }

    impl ShellTool for FakeShell {
        fn run(&self, _commands: &str) -> Result<String, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.output.clone())
        }

        fn fingerprint(&self) -> BTreeMap<String, Value> {
            self.meta.clone()
        }
    }

    #[test]
    fn system_shell_runs_echo() {
        let shell = SystemShell::new();
        let output = shell.run("echo hello").unwrap();
        assert_eq!(output, "hello\n");
    }

    #[test]
    fn system_shell_strips_newlines_when_asked() {
        let shell = SystemShell::new().strip_newlines(true);
        let output = shell.run("echo hello").unwrap();
        assert_eq!(output, "hello");
    }

    #[test]
    fn system_shell_captures_stderr_when_asked() {
        let shell = SystemShell::new().return_err_output(true);
        let output = shell.run("echo oops >&2").unwrap();
        assert_eq!(output, "oops\n");
    }

    #[test]
    fn configuration_changes_the_fingerprint() {
        let plain = SystemShell::new();
        let stripped = SystemShell::new().strip_newlines(true);
        assert_ne!(plain.fingerprint(), stripped.fingerprint());
    }

    #[test]
    fn second_identical_command_is_served_from_the_recording() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicU32::new(0));

        let mut session =
            Session::open(dir.path().join("shell.yaml"), RecordMode::Once).unwrap();
        let shell = CachedShell::new(
            &mut session,
            FakeShell {
                output: "ls: missing_file: No such file or directory\n".into(),
                calls: Arc::clone(&calls),
                meta: BTreeMap::new(),
            },
        )
        .unwrap();

        let first = shell.run("ls missing_file").unwrap();
        let second = shell.run("ls missing_file").unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "second call must not go live");
    }

    #[test]
    fn fingerprint_mismatch_fails_strict_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fingerprint.yaml");

        {
            let mut session = Session::open(&path, RecordMode::Once).unwrap();
            let shell = CachedShell::new(
                &mut session,
                FakeShell {
                    output: "recorded\n".into(),
                    calls: Arc::new(AtomicU32::new(0)),
                    meta: BTreeMap::new(),
                },
            )
            .unwrap();
            shell.run("ls").unwrap();
            session.close().unwrap();
        }

        // Same command, but now from a persistent-terminal configuration.
        let mut session = Session::open(&path, RecordMode::None).unwrap();
        let shell = CachedShell::new(
            &mut session,
            FakeShell {
                output: "never recorded\n".into(),
                calls: Arc::new(AtomicU32::new(0)),
                meta: BTreeMap::from([("persistent".to_string(), Value::Bool(true))]),
            },
        )
        .unwrap();
        let result = shell.run("ls");
        assert!(matches!(result, Err(Error::CannotRecord { .. })));
    }
}
