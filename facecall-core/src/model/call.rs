use serde::{Deserialize, Serialize};
use std::fmt;

/// Application-level call status stored in the call document.
///
/// Independent of [`ConnectionState`](crate::ConnectionState): `Connecting` is
/// a UI trigger written by the participants, not a transport observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Calling,
    Answered,
    Connecting,
}

impl CallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Calling => "calling",
            Self::Answered => "answered",
            Self::Connecting => "connecting",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
