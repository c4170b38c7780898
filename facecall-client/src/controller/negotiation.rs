use facecall_core::SdpKind;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NegotiationPhase {
    Idle,
    SessionCreated,
    OfferSent,
    AnswerSent,
    RemoteApplied,
    Connected,
    Failed,
    Closed,
}

impl NegotiationPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

/// Facts about one session. Each only ever goes from unset to set, which
/// keeps the derived phase from moving backwards.
#[derive(Debug, Clone, Default)]
pub(crate) struct Milestones {
    pub session: bool,
    pub local: Option<SdpKind>,
    pub remote_applied: bool,
    pub connected: bool,
    pub failed: bool,
    pub closed: bool,
}

impl Milestones {
    pub fn phase(&self) -> NegotiationPhase {
        if self.closed {
            NegotiationPhase::Closed
        } else if self.failed {
            NegotiationPhase::Failed
        } else if self.connected {
            NegotiationPhase::Connected
        } else if self.local.is_some() && self.remote_applied {
            NegotiationPhase::RemoteApplied
        } else if let Some(kind) = self.local {
            match kind {
                SdpKind::Offer => NegotiationPhase::OfferSent,
                SdpKind::Answer => NegotiationPhase::AnswerSent,
            }
        } else if self.session {
            NegotiationPhase::SessionCreated
        } else {
            NegotiationPhase::Idle
        }
    }
}
