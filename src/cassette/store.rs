//! Runtime cassette store: lookup, append, persist.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::format::{self, Cassette, Interaction};
use super::mode::RecordMode;
use crate::error::Error;
use crate::matchers::{self, Matcher};
use crate::request::Request;

/// One stored interaction plus its replay bookkeeping.
#[derive(Debug)]
struct Slot {
    interaction: Interaction,
    plays: u32,
}

/// The durable, ordered collection of recorded interactions behind one
/// cassette file.
///
/// The store answers replay queries in first-unplayed-match order: each
/// recorded interaction is served at most once per loaded session, so a
/// request recorded N times (as N entries) replays exactly N times and
/// the (N+1)-th identical request is unmatched. There is no wrap-around.
///
/// A store is used by one logical test flow at a time; it does not
/// promise any ordering across concurrent tasks.
pub struct CassetteStore {
    path: PathBuf,
    name: String,
    recorded_at: DateTime<Utc>,
    mode: RecordMode,
    write_protected: bool,
    matchers: Vec<Matcher>,
    slots: Vec<Slot>,
    dirty: bool,
    existed: bool,
}

impl CassetteStore {
    /// Opens the store for the cassette at `path` (the `.yaml` suffix is
    /// appended if missing), loading existing interactions if the file
    /// is present. Write protection follows the [`RecordMode`] table.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing cassette file cannot be read or
    /// parsed.
    pub fn open(path: impl Into<PathBuf>, mode: RecordMode) -> Result<Self, Error> {
        Self::open_with_matchers(path, mode, matchers::DEFAULT_MATCHERS.to_vec())
    }

    /// Opens the store with an explicit match-predicate list.
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
        let path = format::ensure_suffix(path);
        let existed = path.exists();
        let (name, recorded_at, slots) = if existed {
            let cassette = Cassette::load(&path)?;
            let slots = cassette
                .interactions
                .into_iter()
                .map(|interaction| Slot { interaction, plays: 0 })
                .collect();
            (cassette.name, cassette.recorded_at, slots)
        } else {
            let name = path
                .file_stem()
                .map_or_else(|| "cassette".to_string(), |stem| stem.to_string_lossy().into_owned());
            (name, Utc::now(), Vec::new())
        };
        Ok(Self {
            write_protected: mode.write_protected(existed),
            path,
            name,
            recorded_at,
            mode,
            matchers,
            slots,
            dirty: false,
            existed,
        })
    }

    /// The cassette file this store persists to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The record mode this store was opened with.
    #[must_use]
    pub fn mode(&self) -> RecordMode {
        self.mode
    }

    /// Whether new interactions are refused.
    #[must_use]
    pub fn write_protected(&self) -> bool {
        self.write_protected
    }

    /// Number of stored interactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the store holds no interactions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Serves the first unplayed interaction matching `request`, if any,
    /// incrementing its play count.
    ///
    /// This is the bare probe: a miss is simply `None`, with no
    /// write-protection enforcement. Cache integrations use it because
    /// their misses are answered by an `update` call, not by a failure.
    pub fn play(&mut self, request: &Request) -> Option<Value> {
        if !self.mode.replay_enabled() {
            return None;
        }
        let matchers = &self.matchers;
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| {
                slot.plays == 0 && matchers::matches(&slot.interaction.request, request, matchers)
            })?;
        slot.plays += 1;
        debug!(%request, "serving recorded response from cassette");
        Some(slot.interaction.response.clone())
    }

    /// Resolves `request` to a recorded response, or to permission to
    /// perform the live call.
    ///
    /// `Ok(Some(response))` is a replay hit. `Ok(None)` means no stored
    /// interaction matches and the caller should perform the real
    /// operation, then [`append`](Self::append) the outcome. When the
    /// store is write-protected an unmatched request is a hard failure
    /// instead, so live calls are never silently made during strict
    /// replay.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CannotRecord`] on an unmatched request against a
    /// write-protected store.
    pub fn lookup(&mut self, request: &Request) -> Result<Option<Value>, Error> {
        if let Some(response) = self.play(request) {
            return Ok(Some(response));
        }
        if self.write_protected {
            return Err(Error::CannotRecord {
                request: request.to_string(),
                path: self.path.clone(),
            });
        }
        Ok(None)
    }

    /// Appends a new interaction record.
    ///
    /// Appended interactions preserve insertion order and are eligible
    /// for [`lookup`](Self::lookup) immediately, so a second identical
    /// call within the same recording session replays the first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CannotRecord`] when the store is
    /// write-protected.
    pub fn append(&mut self, request: Request, response: Value) -> Result<(), Error> {
        if self.write_protected {
            return Err(Error::CannotRecord {
                request: request.to_string(),
                path: self.path.clone(),
            });
        }
        debug!(%request, "recording new interaction");
        self.slots.push(Slot { interaction: Interaction { request, response }, plays: 0 });
        self.dirty = true;
        Ok(())
    }

    /// Serializes the full interaction list to the cassette file.
    ///
    /// Idempotent: repeated calls with no new interactions do not write
    /// again. A cassette whose file did not previously exist is written
    /// even when empty, so the file's existence marks a completed
    /// session.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    pub fn persist(&mut self) -> Result<(), Error> {
        if !self.dirty && self.existed {
            return Ok(());
        }
        let cassette = Cassette {
            name: self.name.clone(),
            recorded_at: self.recorded_at,
            interactions: self.slots.iter().map(|slot| slot.interaction.clone()).collect(),
        };
        cassette.save(&self.path)?;
        self.dirty = false;
        self.existed = true;
        Ok(())
    }
}
