//! Ordered keyed entity collection with immutable, structurally shared snapshots.
//!
//! `ids` is the back-to-front paint order; `entities` maps each id to its
//! value. Every operation returns a new snapshot and leaves the receiver
//! untouched. Parts an operation does not change are shared via `Arc`, so
//! [`EntityState::ptr_eq`] is a cheap "did anything change" test.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Structural problems found when loading a persisted collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("id {0} appears more than once in the z-order")]
    DuplicateId(String),

    #[error("id {0} is listed in the z-order but has no entity")]
    MissingEntity(String),

    #[error("entity {0} is not listed in the z-order")]
    UnlistedEntity(String),

    #[error("entity stored under {key} reports id {actual}")]
    IdMismatch { key: String, actual: String },
}

/// A value that can live in an [`EntityState`].
pub trait Entity: Clone {
    /// Partial update merged by [`EntityState::update`].
    type Patch;

    fn id(&self) -> &str;

    /// Return a copy with `patch` applied. Must not change the id.
    fn merge(&self, patch: &Self::Patch) -> Self;
}

/// Immutable ordered collection of entities.
#[derive(Debug)]
pub struct EntityState<T> {
    ids: Arc<Vec<String>>,
    entities: Arc<HashMap<String, Arc<T>>>,
}

impl<T> Clone for EntityState<T> {
    fn clone(&self) -> Self {
        Self {
            ids: Arc::clone(&self.ids),
            entities: Arc::clone(&self.entities),
        }
    }
}

impl<T> Default for EntityState<T> {
    fn default() -> Self {
        Self {
            ids: Arc::new(Vec::new()),
            entities: Arc::new(HashMap::new()),
        }
    }
}

impl<T: Entity> EntityState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from explicit parts, checking that ids and map keys agree.
    pub fn from_parts(ids: Vec<String>, entities: HashMap<String, T>) -> Result<Self, DocumentError> {
        let mut seen = HashSet::with_capacity(ids.len());
        for id in &ids {
            if !seen.insert(id.as_str()) {
                return Err(DocumentError::DuplicateId(id.clone()));
            }
            if !entities.contains_key(id) {
                return Err(DocumentError::MissingEntity(id.clone()));
            }
        }
        for (key, entity) in &entities {
            if !seen.contains(key.as_str()) {
                return Err(DocumentError::UnlistedEntity(key.clone()));
            }
            if entity.id() != key {
                return Err(DocumentError::IdMismatch {
                    key: key.clone(),
                    actual: entity.id().to_string(),
                });
            }
        }

        Ok(Self {
            ids: Arc::new(ids),
            entities: Arc::new(entities.into_iter().map(|(k, v)| (k, Arc::new(v))).collect()),
        })
    }

    /// Add an entity on top. An entity with an existing id is replaced in place.
    pub fn add(&self, entity: T) -> Self {
        let id = entity.id().to_string();
        let mut entities = (*self.entities).clone();
        let existed = entities.insert(id.clone(), Arc::new(entity)).is_some();

        let ids = if existed {
            Arc::clone(&self.ids)
        } else {
            let mut ids = (*self.ids).clone();
            ids.push(id);
            Arc::new(ids)
        };
        Self {
            ids,
            entities: Arc::new(entities),
        }
    }

    /// Merge `patch` into the entity with `id`. Returns an identical snapshot if absent.
    pub fn update(&self, id: &str, patch: &T::Patch) -> Self {
        self.update_with(id, |entity| entity.merge(patch))
    }

    /// Replace the entity with `id` by `f(entity)`. The z-order is untouched.
    pub fn update_with(&self, id: &str, f: impl FnOnce(&T) -> T) -> Self {
        let Some(current) = self.entities.get(id) else {
            return self.clone();
        };
        let next = f(current);
        let mut entities = (*self.entities).clone();
        entities.insert(id.to_string(), Arc::new(next));
        Self {
            ids: Arc::clone(&self.ids),
            entities: Arc::new(entities),
        }
    }

    /// Apply `f` to several entities, producing a single new snapshot.
    /// Unknown ids are skipped. If none match, the snapshot is returned as-is.
    pub fn update_many<I, S, P>(&self, updates: I, mut f: impl FnMut(&T, P) -> T) -> Self
    where
        I: IntoIterator<Item = (S, P)>,
        S: AsRef<str>,
    {
        let mut entities: Option<HashMap<String, Arc<T>>> = None;
        for (id, payload) in updates {
            let id = id.as_ref();
            let Some(current) = self.entities.get(id) else {
                continue;
            };
            let next = f(current, payload);
            entities
                .get_or_insert_with(|| (*self.entities).clone())
                .insert(id.to_string(), Arc::new(next));
        }
        match entities {
            Some(entities) => Self {
                ids: Arc::clone(&self.ids),
                entities: Arc::new(entities),
            },
            None => self.clone(),
        }
    }

    /// Remove one entity. Unknown ids are a no-op.
    pub fn remove(&self, id: &str) -> Self {
        self.remove_many([id])
    }

    /// Remove several entities, preserving the relative order of the rest.
    pub fn remove_many<I, S>(&self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let doomed: HashSet<String> = ids
            .into_iter()
            .map(|id| id.as_ref().to_string())
            .filter(|id| self.entities.contains_key(id))
            .collect();
        if doomed.is_empty() {
            return self.clone();
        }

        let mut entities = (*self.entities).clone();
        for id in &doomed {
            entities.remove(id);
        }
        let ids = self.ids.iter().filter(|id| !doomed.contains(*id)).cloned().collect();
        Self {
            ids: Arc::new(ids),
            entities: Arc::new(entities),
        }
    }

    pub fn remove_all(&self) -> Self {
        Self::default()
    }

    /// Move `id` to `index` in the z-order (clamped to the valid range).
    pub fn reorder(&self, id: &str, index: usize) -> Self {
        let Some(from) = self.position(id) else {
            return self.clone();
        };
        let target = index.min(self.ids.len() - 1);
        if from == target {
            return self.clone();
        }
        let mut ids = (*self.ids).clone();
        let moved = ids.remove(from);
        ids.insert(target, moved);
        Self {
            ids: Arc::new(ids),
            entities: Arc::clone(&self.entities),
        }
    }

    pub fn bring_to_front(&self, id: &str) -> Self {
        self.reorder(id, usize::MAX)
    }

    pub fn send_to_back(&self, id: &str) -> Self {
        self.reorder(id, 0)
    }

    /// Swap one step towards the top.
    pub fn bring_forward(&self, id: &str) -> Self {
        match self.position(id) {
            Some(pos) => self.reorder(id, pos + 1),
            None => self.clone(),
        }
    }

    /// Swap one step towards the bottom.
    pub fn send_backward(&self, id: &str) -> Self {
        match self.position(id) {
            Some(pos) => self.reorder(id, pos.saturating_sub(1)),
            None => self.clone(),
        }
    }
}

impl<T> EntityState<T> {
    pub fn get(&self, id: &str) -> Option<&T> {
        self.entities.get(id).map(|e| e.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// Z-order index of `id`.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|candidate| candidate == id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in back-to-front order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Entities in back-to-front order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.ids
            .iter()
            .filter_map(|id| self.entities.get(id).map(|e| e.as_ref()))
    }

    /// True when both snapshots share the same storage (no mutation in between).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.ids, &other.ids) && Arc::ptr_eq(&self.entities, &other.entities)
    }
}

impl<T: PartialEq> PartialEq for EntityState<T> {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.ids, &other.ids) && Arc::ptr_eq(&self.entities, &other.entities) {
            return true;
        }
        self.ids == other.ids
            && self.entities.len() == other.entities.len()
            && self
                .entities
                .iter()
                .all(|(id, e)| other.entities.get(id).is_some_and(|o| **o == **e))
    }
}

#[derive(Serialize)]
struct EntityStateRef<'a, T> {
    ids: &'a [String],
    entities: BTreeMap<&'a str, &'a T>,
}

#[derive(Deserialize)]
struct RawEntityState<T> {
    #[serde(default)]
    ids: Vec<String>,
    #[serde(default = "HashMap::new")]
    entities: HashMap<String, T>,
}

impl<T: Serialize> Serialize for EntityState<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EntityStateRef {
            ids: &self.ids,
            entities: self
                .entities
                .iter()
                .map(|(id, e)| (id.as_str(), e.as_ref()))
                .collect(),
        }
        .serialize(serializer)
    }
}

impl<'de, T: Entity + Deserialize<'de>> Deserialize<'de> for EntityState<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawEntityState::<T>::deserialize(deserializer)?;
        Self::from_parts(raw.ids, raw.entities).map_err(D::Error::custom)
    }
}
