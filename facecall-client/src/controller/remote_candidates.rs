use facecall_core::IceCandidate;
use std::collections::{HashSet, VecDeque};

/// Remote candidates of one session, held back until the remote
/// description is applied.
#[derive(Debug, Default)]
pub(crate) struct RemoteCandidates {
    remote_applied: bool,
    pending: VecDeque<IceCandidate>,
    seen: HashSet<IceCandidate>,
}

pub(crate) enum Admission {
    Duplicate,
    Buffered,
    Apply,
}

impl RemoteCandidates {
    pub fn admit(&mut self, candidate: &IceCandidate) -> Admission {
        if !self.seen.insert(candidate.clone()) {
            return Admission::Duplicate;
        }
        if self.remote_applied {
            Admission::Apply
        } else {
            self.pending.push_back(candidate.clone());
            Admission::Buffered
        }
    }

    /// Marks the remote description applied and hands back the buffered
    /// candidates in arrival order.
    pub fn release(&mut self) -> Vec<IceCandidate> {
        self.remote_applied = true;
        self.pending.drain(..).collect()
    }

    pub fn is_remote_applied(&self) -> bool {
        self.remote_applied
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
