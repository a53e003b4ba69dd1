//! Record modes governing cassette write protection.

/// How a session treats existing and new interactions.
///
/// The mode is fixed for the lifetime of one session; there are no
/// transitions mid-session. Combined with whether the cassette file
/// already existed when the session opened, the mode determines the
/// store's write protection:
///
/// | Mode          | No existing cassette      | Existing cassette               |
/// |---------------|---------------------------|---------------------------------|
/// | `Once`        | record                    | replay only                     |
/// | `None`        | fail on any call          | replay only, fail on unmatched  |
/// | `NewEpisodes` | record                    | replay existing + record new    |
/// | `All`         | always record             | always record, ignore matches   |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    /// Record a fresh cassette once, then replay it forever after.
    Once,
    /// Strict replay: never record; every call must be served from the
    /// cassette.
    None,
    /// Replay what the cassette has, record requests with no match.
    NewEpisodes,
    /// Re-record everything; existing interactions are never served.
    All,
}

impl RecordMode {
    /// Whether a store opened in this mode refuses new interactions.
    #[must_use]
    pub fn write_protected(self, cassette_exists: bool) -> bool {
        match self {
            Self::Once => cassette_exists,
            Self::None => true,
            Self::NewEpisodes | Self::All => false,
        }
    }

    /// Whether recorded interactions are served at all. `All` ignores
    /// existing matches and re-records every call.
    #[must_use]
    pub fn replay_enabled(self) -> bool {
        !matches!(self, Self::All)
    }
}
