use crate::signaling::{
    CALLER_ID_FIELD, Document, STATUS_FIELD, SignalingChannel, call_document, read_field,
};
use facecall_core::{CallStatus, PeerId, Result};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Current content of a call document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInfo {
    pub status: CallStatus,
    pub caller_id: Option<PeerId>,
}

/// Maps call actions onto writes of the callee's call document.
///
/// Status changes are last-writer-wins; deleting the document cancels
/// the call.
#[derive(Clone)]
pub struct CallCoordinator {
    signaling: Arc<dyn SignalingChannel>,
}

impl CallCoordinator {
    pub fn new(signaling: Arc<dyn SignalingChannel>) -> Self {
        Self { signaling }
    }

    pub async fn start_call(&self, callee: &PeerId, caller: &PeerId) -> Result<()> {
        let mut fields = Document::new();
        fields.insert(STATUS_FIELD.into(), CallStatus::Calling.as_str().into());
        fields.insert(CALLER_ID_FIELD.into(), caller.to_string().into());
        self.signaling.merge(&call_document(callee), fields).await?;
        info!("Calling {}", callee);
        Ok(())
    }

    /// Fails with `DocumentNotFound` when the call was cancelled.
    pub async fn answer_call(&self, callee: &PeerId) -> Result<()> {
        self.set_status(callee, CallStatus::Answered).await
    }

    /// Fails with `DocumentNotFound` when the call was cancelled.
    pub async fn connecting_call(&self, callee: &PeerId) -> Result<()> {
        self.set_status(callee, CallStatus::Connecting).await
    }

    pub async fn cancel_call(&self, callee: &PeerId) -> Result<()> {
        self.signaling.delete(&call_document(callee)).await?;
        info!("Call to {} cancelled", callee);
        Ok(())
    }

    pub async fn current_call(&self, callee: &PeerId) -> Result<Option<CallInfo>> {
        let doc = self.signaling.get(&call_document(callee)).await?;
        Ok(doc.and_then(|doc| decode_call(callee, &doc)))
    }

    /// `true` while a call document exists for `callee`.
    pub fn watch_incoming(&self, callee: &PeerId) -> BoxStream<'static, bool> {
        self.signaling
            .watch_document(&call_document(callee))
            .map(|doc| doc.is_some())
            .boxed()
    }

    /// Status of the call to `callee`, `None` once the call is gone.
    pub fn watch_status(&self, callee: &PeerId) -> BoxStream<'static, Option<CallStatus>> {
        let callee = callee.clone();
        self.signaling
            .watch_document(&call_document(&callee))
            .map(move |doc| doc.and_then(|doc| decode_call(&callee, &doc)).map(|c| c.status))
            .boxed()
    }

    async fn set_status(&self, callee: &PeerId, status: CallStatus) -> Result<()> {
        let mut fields = Document::new();
        fields.insert(STATUS_FIELD.into(), status.as_str().into());
        self.signaling.update(&call_document(callee), fields).await?;
        debug!("Call to {} is now {}", callee, status);
        Ok(())
    }
}

fn decode_call(callee: &PeerId, doc: &Document) -> Option<CallInfo> {
    let status = match read_field::<CallStatus>(doc, STATUS_FIELD) {
        Ok(Some(status)) => status,
        Ok(None) => return None,
        Err(e) => {
            warn!("Call document of {} has an invalid status: {}", callee, e);
            return None;
        }
    };
    let caller_id = read_field::<String>(doc, CALLER_ID_FIELD)
        .ok()
        .flatten()
        .and_then(|id| id.parse().ok());
    Some(CallInfo { status, caller_id })
}
