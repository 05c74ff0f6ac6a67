//! Shared scene storage.
//!
//! Provides a thread-safe [`SceneStore`] shared across the REST facade, the
//! WebSocket facade, and the tool gateway. All writes serialize behind a
//! single lock; callers never observe a half-applied mutation. The store
//! performs no payload validation - that is the normalizer's job - but it
//! does enforce that tombstones (`isDeleted`) are never retained.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::Map;

use crate::element::now_iso;
use crate::protocol::SceneData;
use crate::{CoreError, CoreResult, Element, ElementFilter};

/// A named, independent copy of the scene at a point in time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Snapshot name, unique; re-creation overwrites.
    pub name: String,
    /// Deep copies of the elements at snapshot time.
    pub elements: Vec<Element>,
    /// Creation time, ISO-8601.
    pub created_at: String,
}

/// Listing entry for a snapshot, without the element payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    /// Snapshot name.
    pub name: String,
    /// Number of elements captured.
    pub element_count: usize,
    /// Creation time, ISO-8601.
    pub created_at: String,
}

#[derive(Debug, Default)]
struct SceneInner {
    /// Z-order: first entry is back-most.
    order: Vec<String>,
    elements: HashMap<String, Element>,
    app_state: Map<String, serde_json::Value>,
    files: Map<String, serde_json::Value>,
    snapshots: BTreeMap<String, Snapshot>,
}

/// Thread-safe scene storage shared across REST, WebSocket, and the tool
/// gateway.
#[derive(Debug, Clone)]
pub struct SceneStore {
    inner: Arc<RwLock<SceneInner>>,
}

impl Default for SceneStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneStore {
    /// Create an empty store with default app state.
    #[must_use]
    pub fn new() -> Self {
        let mut app_state = Map::new();
        app_state.insert("viewBackgroundColor".into(), "#ffffff".into());
        app_state.insert("gridSize".into(), serde_json::Value::Null);
        Self {
            inner: Arc::new(RwLock::new(SceneInner {
                app_state,
                ..SceneInner::default()
            })),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SceneInner> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SceneInner> {
        self.inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// All elements in Z-order.
    #[must_use]
    pub fn list(&self) -> Vec<Element> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.elements.get(id))
            .cloned()
            .collect()
    }

    /// Number of stored elements.
    #[must_use]
    pub fn count(&self) -> usize {
        self.read().order.len()
    }

    /// Look up an element by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Element> {
        self.read().elements.get(id).cloned()
    }

    /// Insert or replace an element by id.
    ///
    /// A new id is appended to the Z-order (top-most); an existing id keeps
    /// its position. An element flagged `isDeleted` removes the entry
    /// instead - tombstones are never retained.
    pub fn put(&self, element: Element) {
        if element.is_deleted {
            self.delete(&element.id);
            return;
        }
        let mut inner = self.write();
        if !inner.elements.contains_key(&element.id) {
            inner.order.push(element.id.clone());
        }
        inner.elements.insert(element.id.clone(), element);
    }

    /// Insert a batch in the order given, applying [`SceneStore::put`]
    /// semantics per element.
    pub fn put_many(&self, elements: Vec<Element>) {
        for element in elements {
            self.put(element);
        }
    }

    /// Merge a partial update onto the element with the given id, then bump
    /// its version bookkeeping. Returns the post-mutation element.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown id and
    /// [`CoreError::InvalidArgument`] when the merged record is invalid.
    pub fn patch(&self, id: &str, updates: &Map<String, serde_json::Value>) -> CoreResult<Element> {
        let mut inner = self.write();
        let element = inner
            .elements
            .get_mut(id)
            .ok_or_else(|| CoreError::element_not_found(id))?;
        element.apply_patch(updates)?;
        element.bump_version();
        let updated = element.clone();
        if updated.is_deleted {
            // A patch may carry the deletion marker; treat it as a delete.
            inner.elements.remove(id);
            inner.order.retain(|eid| eid != id);
        }
        Ok(updated)
    }

    /// Remove an element. Returns whether it existed.
    pub fn delete(&self, id: &str) -> bool {
        let mut inner = self.write();
        let existed = inner.elements.remove(id).is_some();
        if existed {
            inner.order.retain(|eid| eid != id);
        }
        existed
    }

    /// Remove every element. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.write();
        let removed = inner.order.len();
        inner.order.clear();
        inner.elements.clear();
        removed
    }

    /// Atomically replace the element set with the provided ordered list.
    /// Returns `(before_count, after_count)`.
    pub fn replace(&self, elements: Vec<Element>) -> (usize, usize) {
        let mut inner = self.write();
        let before = inner.order.len();
        inner.order.clear();
        inner.elements.clear();
        for element in elements {
            if element.is_deleted {
                continue;
            }
            if !inner.elements.contains_key(&element.id) {
                inner.order.push(element.id.clone());
            }
            inner.elements.insert(element.id.clone(), element);
        }
        let after = inner.order.len();
        (before, after)
    }

    /// Replace elements, app state, and files in one write (full scene
    /// adoption from a peer or an import).
    pub fn replace_scene(&self, data: SceneData) -> (usize, usize) {
        let counts = self.replace(data.elements);
        let mut inner = self.write();
        if !data.app_state.is_empty() {
            inner.app_state = data.app_state;
        }
        if !data.files.is_empty() {
            inner.files = data.files;
        }
        counts
    }

    /// Elements matching a conjunctive filter, in Z-order.
    #[must_use]
    pub fn search(&self, filter: &ElementFilter) -> Vec<Element> {
        self.list()
            .into_iter()
            .filter(|element| filter.matches(element))
            .collect()
    }

    /// The full canonical scene: elements, app state, files.
    #[must_use]
    pub fn scene_data(&self) -> SceneData {
        let inner = self.read();
        SceneData {
            elements: inner
                .order
                .iter()
                .filter_map(|id| inner.elements.get(id))
                .cloned()
                .collect(),
            app_state: inner.app_state.clone(),
            files: inner.files.clone(),
        }
    }

    /// Capture a named snapshot of the current elements. An existing
    /// snapshot with the same name is overwritten.
    pub fn snapshot_create(&self, name: &str) -> SnapshotMeta {
        let elements = self.list();
        let snapshot = Snapshot {
            name: name.to_string(),
            elements,
            created_at: now_iso(),
        };
        let meta = SnapshotMeta {
            name: snapshot.name.clone(),
            element_count: snapshot.elements.len(),
            created_at: snapshot.created_at.clone(),
        };
        self.write().snapshots.insert(name.to_string(), snapshot);
        meta
    }

    /// List snapshots by name.
    #[must_use]
    pub fn snapshot_list(&self) -> Vec<SnapshotMeta> {
        self.read()
            .snapshots
            .values()
            .map(|s| SnapshotMeta {
                name: s.name.clone(),
                element_count: s.elements.len(),
                created_at: s.created_at.clone(),
            })
            .collect()
    }

    /// Fetch a snapshot with its element payload.
    #[must_use]
    pub fn snapshot_get(&self, name: &str) -> Option<Snapshot> {
        self.read().snapshots.get(name).cloned()
    }

    /// Restore the scene from a snapshot, replacing the live elements.
    /// Returns the restored element count.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown snapshot name.
    pub fn snapshot_restore(&self, name: &str) -> CoreResult<usize> {
        let elements = self
            .snapshot_get(name)
            .ok_or_else(|| CoreError::snapshot_not_found(name))?
            .elements;
        let (_, after) = self.replace(elements);
        Ok(after)
    }
}
