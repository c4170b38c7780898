use crate::signaling::{CollectionPath, Document, DocumentPath, SignalingChannel};
use async_trait::async_trait;
use dashmap::DashMap;
use facecall_core::{Error, Result};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, trace, warn};
use uuid::Uuid;

const CHANGE_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct StoredDocument {
    body: Document,
    /// Sequence number of the write that created the document.
    created: u64,
}

#[derive(Debug, Clone)]
struct Change {
    path: DocumentPath,
    /// `None` after a deletion.
    body: Option<Document>,
    created: bool,
}

struct Store {
    documents: DashMap<DocumentPath, StoredDocument>,
    /// Serializes writes with each other and with watcher registration, so
    /// a watcher's initial snapshot and its change feed never overlap.
    writes: Mutex<u64>,
    changes: broadcast::Sender<Change>,
}

impl Store {
    fn write(&self) -> MutexGuard<'_, u64> {
        self.writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, change: Change) {
        // No receivers is fine.
        let _ = self.changes.send(change);
    }

    fn snapshot(&self, path: &DocumentPath) -> Option<Document> {
        self.documents.get(path).map(|doc| doc.body.clone())
    }

    /// Documents of `collection` not in `skip`, oldest first.
    fn collection_documents(
        &self,
        collection: &CollectionPath,
        skip: &HashSet<DocumentPath>,
    ) -> VecDeque<(DocumentPath, Document)> {
        let mut docs: Vec<(u64, DocumentPath, Document)> = self
            .documents
            .iter()
            .filter(|entry| collection.contains(entry.key()) && !skip.contains(entry.key()))
            .map(|entry| (entry.created, entry.key().clone(), entry.body.clone()))
            .collect();
        docs.sort_by_key(|(created, _, _)| *created);
        docs.into_iter()
            .map(|(_, path, body)| (path, body))
            .collect()
    }
}

/// In-process [`SignalingChannel`]. Clones share one store.
#[derive(Clone)]
pub struct MemorySignaling {
    store: Arc<Store>,
}

impl MemorySignaling {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            store: Arc::new(Store {
                documents: DashMap::new(),
                writes: Mutex::new(0),
                changes,
            }),
        }
    }

    pub fn document_count(&self) -> usize {
        self.store.documents.len()
    }

    fn apply(&self, path: &DocumentPath, fields: Document, merge: bool) -> Result<()> {
        let mut seq = self.store.write();
        *seq += 1;

        let (body, created) = match self.store.documents.get_mut(path) {
            Some(mut existing) => {
                for (key, value) in fields {
                    if merge {
                        merge_value(existing.body.entry(key).or_insert(serde_json::Value::Null), value);
                    } else {
                        existing.body.insert(key, value);
                    }
                }
                (existing.body.clone(), false)
            }
            None if merge => {
                self.store.documents.insert(
                    path.clone(),
                    StoredDocument {
                        body: fields.clone(),
                        created: *seq,
                    },
                );
                (fields, true)
            }
            None => return Err(Error::DocumentNotFound(path.to_string())),
        };

        trace!("Document {} written", path);
        self.store.publish(Change {
            path: path.clone(),
            body: Some(body),
            created,
        });
        Ok(())
    }

    fn remove(&self, path: &DocumentPath) -> bool {
        let _seq = self.store.write();
        if self.store.documents.remove(path).is_none() {
            return false;
        }
        self.store.publish(Change {
            path: path.clone(),
            body: None,
            created: false,
        });
        true
    }
}

impl Default for MemorySignaling {
    fn default() -> Self {
        Self::new()
    }
}

/// Nested objects merge key by key; anything else is replaced.
fn merge_value(target: &mut serde_json::Value, value: serde_json::Value) {
    match (target, value) {
        (serde_json::Value::Object(target), serde_json::Value::Object(fields)) => {
            for (key, value) in fields {
                merge_value(target.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, value) => *target = value,
    }
}

#[async_trait]
impl SignalingChannel for MemorySignaling {
    async fn merge(&self, path: &DocumentPath, fields: Document) -> Result<()> {
        self.apply(path, fields, true)
    }

    async fn update(&self, path: &DocumentPath, fields: Document) -> Result<()> {
        self.apply(path, fields, false)
    }

    async fn delete(&self, path: &DocumentPath) -> Result<()> {
        if self.remove(path) {
            debug!("Document {} deleted", path);
        }
        Ok(())
    }

    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        Ok(self.store.snapshot(path))
    }

    async fn add(&self, collection: &CollectionPath, body: Document) -> Result<DocumentPath> {
        let path = collection.document(&Uuid::new_v4().simple().to_string());
        self.apply(&path, body, true)?;
        Ok(path)
    }

    async fn clear_collection(&self, collection: &CollectionPath) -> Result<()> {
        let paths: Vec<DocumentPath> = self
            .store
            .documents
            .iter()
            .filter(|entry| collection.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        let removed = paths.iter().filter(|path| self.remove(path)).count();
        debug!("Cleared {} documents from {}", removed, collection);
        Ok(())
    }

    fn watch_document(&self, path: &DocumentPath) -> BoxStream<'static, Option<Document>> {
        let (rx, current) = {
            let _seq = self.store.write();
            (self.store.changes.subscribe(), self.store.snapshot(path))
        };

        let store = Arc::clone(&self.store);
        let path = path.clone();
        let changes = stream::unfold((rx, store, path), |(mut rx, store, path)| async move {
            loop {
                match rx.recv().await {
                    Ok(change) if change.path == path => {
                        return Some((change.body, (rx, store, path)));
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Watcher of {} lagged by {} changes, resyncing", path, missed);
                        let body = store.snapshot(&path);
                        return Some((body, (rx, store, path)));
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        stream::once(async move { current }).chain(changes).boxed()
    }

    fn watch_collection(
        &self,
        collection: &CollectionPath,
    ) -> BoxStream<'static, (DocumentPath, Document)> {
        let (rx, backlog) = {
            let _seq = self.store.write();
            (
                self.store.changes.subscribe(),
                self.store.collection_documents(collection, &HashSet::new()),
            )
        };

        let state = CollectionWatch {
            rx,
            store: Arc::clone(&self.store),
            collection: collection.clone(),
            emitted: backlog.iter().map(|(path, _)| path.clone()).collect(),
            backlog,
        };

        stream::unfold(state, |mut state| async move {
            let item = state.next_item().await?;
            Some((item, state))
        })
        .boxed()
    }
}

struct CollectionWatch {
    rx: broadcast::Receiver<Change>,
    store: Arc<Store>,
    collection: CollectionPath,
    emitted: HashSet<DocumentPath>,
    backlog: VecDeque<(DocumentPath, Document)>,
}

impl CollectionWatch {
    async fn next_item(&mut self) -> Option<(DocumentPath, Document)> {
        loop {
            if let Some(item) = self.backlog.pop_front() {
                return Some(item);
            }

            match self.rx.recv().await {
                Ok(Change {
                    path,
                    body: Some(body),
                    created: true,
                }) if self.collection.contains(&path) => {
                    if self.emitted.insert(path.clone()) {
                        return Some((path, body));
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!(
                        "Watcher of {} lagged by {} changes, resyncing",
                        self.collection, missed
                    );
                    let missing = self.store.collection_documents(&self.collection, &self.emitted);
                    self.emitted
                        .extend(missing.iter().map(|(path, _)| path.clone()));
                    self.backlog = missing;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
