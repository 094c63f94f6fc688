//! Document storage and debounced saving.
//!
//! Edits apply to the canonical tree immediately; persistence trails behind. Each edit hands the
//! latest snapshot to a [`SaveScheduler`], which holds at most one pending save and pushes its
//! deadline out by the quiescence window on every new edit. Superseded snapshots are dropped,
//! never queued. Time is passed in explicitly, so hosts drive the scheduler from their own event
//! loop and tests can step it deterministically.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::error::PersistError;
use crate::snapshot::PersistedDocument;
use crate::tree::Document;

/// Listing entry returned by [`DocumentStore::list_recent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    /// Document id.
    pub id: String,
    /// Title.
    pub title: String,
    /// Number of pages.
    pub page_count: usize,
    /// Last modification time, epoch ms UTC.
    pub updated_at: i64,
}

impl From<&PersistedDocument> for DocumentSummary {
    fn from(doc: &PersistedDocument) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            page_count: doc.pages.len(),
            updated_at: doc.updated_at,
        }
    }
}

/// Key-value store for documents.
pub trait DocumentStore {
    /// Insert or replace a document.
    fn put(&mut self, document: &PersistedDocument) -> Result<(), PersistError>;

    /// Load a document; [`PersistError::NotFound`] if it does not exist.
    fn get(&self, id: &str) -> Result<PersistedDocument, PersistError>;

    /// Most recently updated documents first (ties broken by id), at most `limit`.
    fn list_recent(&self, limit: usize) -> Result<Vec<DocumentSummary>, PersistError>;

    /// Delete a document; [`PersistError::NotFound`] if it does not exist.
    fn delete(&mut self, id: &str) -> Result<(), PersistError>;
}

/// In-process store keeping each document as a JSON string.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: BTreeMap<String, String>,
    puts: usize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of successful `put` calls so far.
    pub fn put_count(&self) -> usize {
        self.puts
    }
}

impl DocumentStore for MemoryStore {
    fn put(&mut self, document: &PersistedDocument) -> Result<(), PersistError> {
        let json = document.to_json()?;
        self.documents.insert(document.id.clone(), json);
        self.puts += 1;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<PersistedDocument, PersistError> {
        let json = self
            .documents
            .get(id)
            .ok_or_else(|| PersistError::NotFound(id.to_string()))?;
        PersistedDocument::from_json(json)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<DocumentSummary>, PersistError> {
        let mut summaries = self
            .documents
            .values()
            .map(|json| PersistedDocument::from_json(json).map(|doc| DocumentSummary::from(&doc)))
            .collect::<Result<Vec<_>, _>>()?;
        summaries.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        summaries.truncate(limit);
        Ok(summaries)
    }

    fn delete(&mut self, id: &str) -> Result<(), PersistError> {
        self.documents
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PersistError::NotFound(id.to_string()))
    }
}

/// Persistence state shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    /// Everything is stored.
    #[default]
    Saved,
    /// Edits are waiting for the quiescence window to pass.
    Dirty,
    /// A write is in progress.
    Saving,
    /// The last write failed; it will be retried after the next window.
    Failed,
}

#[derive(Debug, Clone)]
struct PendingSave {
    snapshot: PersistedDocument,
    due: Instant,
}

/// Debounces document writes.
#[derive(Debug, Clone)]
pub struct SaveScheduler {
    delay: Duration,
    pending: Option<PendingSave>,
    status: SaveStatus,
    last_error: Option<String>,
}

impl SaveScheduler {
    /// Create a scheduler with the given quiescence window.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            status: SaveStatus::Saved,
            last_error: None,
        }
    }

    /// The quiescence window.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Current status.
    pub fn status(&self) -> SaveStatus {
        self.status
    }

    /// Message of the most recent failed write, cleared on success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Check whether a save is waiting.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending save becomes due.
    pub fn due_at(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.due)
    }

    /// Record an edit: replace any pending snapshot and restart the window.
    pub fn note_edit(&mut self, now: Instant, document: &Document) {
        self.pending = Some(PendingSave {
            snapshot: PersistedDocument::from(document),
            due: now + self.delay,
        });
        self.status = SaveStatus::Dirty;
    }

    /// Write the pending snapshot if its window has elapsed.
    ///
    /// Returns `None` when nothing was attempted.
    pub fn poll<S>(&mut self, now: Instant, store: &mut S) -> Option<Result<(), PersistError>>
    where
        S: DocumentStore + ?Sized,
    {
        if self.pending.as_ref()?.due > now {
            return None;
        }
        self.write(now, store)
    }

    /// Write the pending snapshot immediately, ignoring the window.
    pub fn flush<S>(&mut self, now: Instant, store: &mut S) -> Option<Result<(), PersistError>>
    where
        S: DocumentStore + ?Sized,
    {
        self.write(now, store)
    }

    fn write<S>(&mut self, now: Instant, store: &mut S) -> Option<Result<(), PersistError>>
    where
        S: DocumentStore + ?Sized,
    {
        let pending = self.pending.take()?;
        self.status = SaveStatus::Saving;
        match store.put(&pending.snapshot) {
            Ok(()) => {
                tracing::debug!(id = %pending.snapshot.id, "document saved");
                self.status = SaveStatus::Saved;
                self.last_error = None;
                Some(Ok(()))
            }
            Err(err) => {
                tracing::warn!(id = %pending.snapshot.id, error = %err, "save failed; will retry");
                self.status = SaveStatus::Failed;
                self.last_error = Some(err.to_string());
                self.pending = Some(PendingSave {
                    snapshot: pending.snapshot,
                    due: now + self.delay,
                });
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persisted(id: &str, updated_at: i64) -> PersistedDocument {
        let mut doc = Document::new(format!("doc {id}"));
        doc.id = id.to_string();
        doc.updated_at = updated_at;
        PersistedDocument::from(&doc)
    }

    #[test]
    fn test_memory_store_crud() {
        let mut store = MemoryStore::new();
        store.put(&persisted("a", 1)).unwrap();
        assert_eq!(store.get("a").unwrap().id, "a");
        assert!(matches!(store.get("b"), Err(PersistError::NotFound(_))));
        store.delete("a").unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.delete("a"), Err(PersistError::NotFound(_))));
    }

    #[test]
    fn test_list_recent_orders_by_update_then_id() {
        let mut store = MemoryStore::new();
        for (id, at) in [("b", 5), ("a", 5), ("c", 9), ("d", 1)] {
            store.put(&persisted(id, at)).unwrap();
        }
        let ids: Vec<_> = store
            .list_recent(3)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_scheduler_waits_for_window() {
        let start = Instant::now();
        let mut scheduler = SaveScheduler::new(Duration::from_millis(800));
        let mut store = MemoryStore::new();
        let doc = Document::new("t");

        assert!(scheduler.poll(start, &mut store).is_none());
        scheduler.note_edit(start, &doc);
        assert_eq!(scheduler.status(), SaveStatus::Dirty);
        assert!(scheduler.poll(start + Duration::from_millis(799), &mut store).is_none());
        assert!(matches!(
            scheduler.poll(start + Duration::from_millis(800), &mut store),
            Some(Ok(()))
        ));
        assert_eq!(scheduler.status(), SaveStatus::Saved);
        assert!(!scheduler.is_pending());
        assert_eq!(store.put_count(), 1);
    }

    #[test]
    fn test_flush_ignores_window() {
        let now = Instant::now();
        let mut scheduler = SaveScheduler::new(Duration::from_secs(60));
        let mut store = MemoryStore::new();
        scheduler.note_edit(now, &Document::new("t"));
        assert!(matches!(scheduler.flush(now, &mut store), Some(Ok(()))));
        assert_eq!(store.len(), 1);
    }
}
