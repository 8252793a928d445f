use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Lifecycle phase of an exchange.
///
/// The ordering of the variants is the ordering of the lifecycle, so phases can be compared
/// directly (`state >= ReadyState::Headers`). The numeric values match the classic
/// `XMLHttpRequest.readyState` codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ReadyState {
    /// Created, request not yet dispatched
    #[default]
    Unsent = 0,
    /// Transport channel established, request in flight
    Opened = 1,
    /// Response status and headers received
    Headers = 2,
    /// Body bytes arriving
    Loading = 3,
    /// Finished, either successfully or with an error
    Done = 4,
}

impl ReadyState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_done(self) -> bool {
        self == ReadyState::Done
    }

    /// Returns true when `next` is a legal successor of this state.
    ///
    /// `Loading -> Loading` is the only self-loop. Any non-terminal state may jump to `Done`
    /// since a transport failure can happen at any point.
    pub fn can_advance_to(self, next: ReadyState) -> bool {
        use ReadyState::*;

        match (self, next) {
            (Done, _) => false,
            (_, Done) => true,
            (Unsent, Opened) => true,
            (Opened, Headers) => true,
            (Headers, Loading) => true,
            (Loading, Loading) => true,
            _ => false,
        }
    }
}

impl TryFrom<u8> for ReadyState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ReadyState::Unsent),
            1 => Ok(ReadyState::Opened),
            2 => Ok(ReadyState::Headers),
            3 => Ok(ReadyState::Loading),
            4 => Ok(ReadyState::Done),
            other => Err(other),
        }
    }
}

impl Display for ReadyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadyState::Unsent => write!(f, "Unsent"),
            ReadyState::Opened => write!(f, "Opened"),
            ReadyState::Headers => write!(f, "Headers"),
            ReadyState::Loading => write!(f, "Loading"),
            ReadyState::Done => write!(f, "Done"),
        }
    }
}
