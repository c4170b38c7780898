use async_trait::async_trait;
use facecall_core::Result;
use futures::stream::BoxStream;
use std::fmt;

/// Body of a signaling document.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Slash-separated path of a document, e.g. `rooms/{room_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath(String);

/// Slash-separated path of a collection, e.g. `rooms/{room_id}/hostCandidates`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl DocumentPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment.
    pub fn id(&self) -> &str {
        self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, id)| id)
    }

    /// Collection holding this document, `None` for a bare id.
    pub fn parent(&self) -> Option<CollectionPath> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| CollectionPath::new(parent))
    }

    pub fn collection(&self, name: &str) -> CollectionPath {
        CollectionPath(format!("{}/{}", self.0, name))
    }
}

impl CollectionPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn document(&self, id: &str) -> DocumentPath {
        DocumentPath(format!("{}/{}", self.0, id))
    }

    pub fn contains(&self, path: &DocumentPath) -> bool {
        path.parent().as_ref() == Some(self)
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Document store with change notification, used to exchange call status
/// and negotiation payloads between the two parties.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Creates the document or merges `fields` into it. Fields not named
    /// in `fields` are left alone.
    async fn merge(&self, path: &DocumentPath, fields: Document) -> Result<()>;

    /// Overwrites the named fields of an existing document.
    /// Fails with `DocumentNotFound` when the document does not exist.
    async fn update(&self, path: &DocumentPath, fields: Document) -> Result<()>;

    /// Deleting a missing document is not an error.
    async fn delete(&self, path: &DocumentPath) -> Result<()>;

    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>>;

    /// Adds a document with a generated id.
    async fn add(&self, collection: &CollectionPath, body: Document) -> Result<DocumentPath>;

    async fn clear_collection(&self, collection: &CollectionPath) -> Result<()>;

    /// Current body first, then the full body after every change. `None`
    /// means the document does not exist.
    fn watch_document(&self, path: &DocumentPath) -> BoxStream<'static, Option<Document>>;

    /// Existing documents first, then each added document, in insertion
    /// order. Deletions are not reported.
    fn watch_collection(
        &self,
        collection: &CollectionPath,
    ) -> BoxStream<'static, (DocumentPath, Document)>;
}
