use crate::signaling::{CollectionPath, Document, DocumentPath};
use facecall_core::{Error, PeerId, PeerRole, Result, RoomId};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const CALLS_COLLECTION: &str = "calls";
pub const ROOMS_COLLECTION: &str = "rooms";
pub const HOST_CANDIDATES: &str = "hostCandidates";
pub const GUEST_CANDIDATES: &str = "guestCandidates";

pub const STATUS_FIELD: &str = "status";
pub const CALLER_ID_FIELD: &str = "callerId";
pub const OFFER_FIELD: &str = "offer";
pub const ANSWER_FIELD: &str = "answer";

/// `calls/{peer_id}`: call status of the callee.
pub fn call_document(peer: &PeerId) -> DocumentPath {
    CollectionPath::new(CALLS_COLLECTION).document(&peer.to_string())
}

/// `rooms/{room_id}`: offer and answer of one negotiation.
pub fn room_document(room: &RoomId) -> DocumentPath {
    CollectionPath::new(ROOMS_COLLECTION).document(&room.to_string())
}

/// Collection the given role publishes its candidates into.
pub fn candidates_collection(room: &RoomId, role: PeerRole) -> CollectionPath {
    let name = match role {
        PeerRole::Host => HOST_CANDIDATES,
        PeerRole::Guest => GUEST_CANDIDATES,
    };
    room_document(room).collection(name)
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(Error::Signaling(format!(
            "expected an object body, got {}",
            other
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::Object(doc))?)
}

/// Single-field document body.
pub fn field<T: Serialize>(name: &str, value: &T) -> Result<Document> {
    let mut doc = Document::new();
    doc.insert(name.to_owned(), serde_json::to_value(value)?);
    Ok(doc)
}

/// Decodes `name` from `doc`, `Ok(None)` when the field is absent.
pub fn read_field<T: DeserializeOwned>(doc: &Document, name: &str) -> Result<Option<T>> {
    match doc.get(name) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
    }
}
