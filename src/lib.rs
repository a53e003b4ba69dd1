//! Record-and-replay cache for side-effecting tool calls in tests.
//!
//! A test suite runs once against real external systems (LLM
//! completions, shell commands, browser actions) while every
//! request/response pair is recorded to a durable YAML cassette.
//! Subsequent runs replay the recorded responses deterministically and
//! offline; the real systems are never re-invoked on a hit.
//!
//! ```no_run
//! use tapedeck::intercept::shell::{CachedShell, SystemShell};
//! use tapedeck::{RecordMode, Session};
//!
//! # fn main() -> Result<(), tapedeck::Error> {
//! // First run records; every run after replays the same cassette.
//! let mut session = Session::open("tests/cassettes/listing", RecordMode::Once)?;
//! let shell = CachedShell::new(&mut session, SystemShell::new())?;
//! let listing = shell.run("ls")?;
//! println!("{listing}");
//! session.close()?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cassette;
pub mod error;
pub mod intercept;
pub mod matchers;
pub mod request;
pub mod session;

pub use cassette::mode::RecordMode;
pub use error::{BoxError, Error, Mismatch};
pub use request::Request;
pub use session::{with_cassette, Session};
