use crate::error::{ContentGraphError, ErrorCode};
use crate::model::{Entity, EntityKind};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use thiserror::Error;

/// Per-identifier failure. Never aborts the rest of a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ObjectError {
    #[error("{id} exists but is not of type {requested}")]
    TypeMismatch {
        id: String,
        requested: EntityKind,
        actual: EntityKind,
    },
    #[error("{id} could not be resolved as {kind}")]
    Unresolved { id: String, kind: EntityKind },
    #[error("{id} could not be fetched: {reason}")]
    FetchFailed { id: String, reason: String },
}

impl ObjectError {
    pub fn id(&self) -> &str {
        match self {
            ObjectError::TypeMismatch { id, .. }
            | ObjectError::Unresolved { id, .. }
            | ObjectError::FetchFailed { id, .. } => id,
        }
    }
}

impl ContentGraphError for ObjectError {
    fn error_code(&self) -> ErrorCode {
        match self {
            ObjectError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            ObjectError::Unresolved { .. } => ErrorCode::NotFound,
            ObjectError::FetchFailed { .. } => ErrorCode::Unavailable,
        }
    }
}

/// Typed results of one request: matching entities plus per-id errors.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub objects: Vec<Arc<Entity>>,
    pub errors: Vec<ObjectError>,
}

impl Resolution {
    pub fn ids(&self) -> Vec<&str> {
        self.objects.iter().map(|entity| entity.id()).collect()
    }
}

/// Synchronous, cache-only lookup.
pub trait EntityLookup {
    fn cached(&self, id: &str) -> Option<Arc<Entity>>;
}

/// Typed fetch path used to resolve relationship targets that are not cached.
#[async_trait]
pub trait EntityResolver: EntityLookup + Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn resolve(&self, kind: EntityKind, ids: &[String]) -> Result<Resolution, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationTarget {
    pub id: String,
    pub kind: EntityKind,
}

impl RelationTarget {
    pub fn new(id: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Relationship {
    One(Option<Arc<Entity>>),
    Many(Vec<Arc<Entity>>),
}

impl Relationship {
    pub fn len(&self) -> usize {
        match self {
            Relationship::One(target) => usize::from(target.is_some()),
            Relationship::Many(targets) => targets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<Arc<Entity>> {
        match self {
            Relationship::One(target) => target.into_iter().collect(),
            Relationship::Many(targets) => targets,
        }
    }
}

/// A named edge from one entity to others, held by identifier only.
///
/// The resolution memo holds weak references, so a node never keeps a target
/// alive and mutually relating entities cannot form a cycle. The memo only
/// records which referent each target last resolved to; every read still
/// goes through the store, which stays the source of truth after a reset or
/// a refetch.
#[derive(Debug)]
pub struct RelationshipNode {
    name: String,
    multiple: bool,
    targets: Vec<RelationTarget>,
    resolved: RwLock<Vec<Weak<Entity>>>,
}

impl RelationshipNode {
    pub fn singular(name: impl Into<String>, target: Option<RelationTarget>) -> Self {
        Self::build(name.into(), false, target.into_iter().collect())
    }

    pub fn multiple(name: impl Into<String>, targets: Vec<RelationTarget>) -> Self {
        Self::build(name.into(), true, targets)
    }

    fn build(name: String, multiple: bool, targets: Vec<RelationTarget>) -> Self {
        let resolved = targets.iter().map(|_| Weak::new()).collect();
        Self {
            name,
            multiple,
            targets,
            resolved: RwLock::new(resolved),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    pub fn number_of_relationships(&self) -> usize {
        self.targets.len()
    }

    pub fn targets(&self) -> &[RelationTarget] {
        &self.targets
    }

    /// Targets whose last resolved referent is still alive.
    pub fn resolved_count(&self) -> usize {
        self.resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|slot| slot.strong_count() > 0)
            .count()
    }

    pub fn all_ids(&self) -> Vec<&str> {
        self.targets.iter().map(|target| target.id.as_str()).collect()
    }

    pub fn ids_of_type(&self, kind: EntityKind) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|target| target.kind == kind)
            .map(|target| target.id.as_str())
            .collect()
    }

    /// Cache-only accessor; never triggers a fetch.
    pub fn relationship<L: EntityLookup + ?Sized>(&self, lookup: &L) -> Relationship {
        let mut found: Vec<Arc<Entity>> = Vec::with_capacity(self.targets.len());
        for (idx, target) in self.targets.iter().enumerate() {
            if let Some(entity) = self.lookup_target(idx, target, lookup) {
                found.push(entity);
            }
        }

        if self.multiple {
            Relationship::Many(found)
        } else {
            Relationship::One(found.into_iter().next())
        }
    }

    /// Resolve every target, fetching the uncached ones through `resolver`.
    ///
    /// Returns once all targets have settled. Objects keep document order;
    /// targets that could not be resolved are reported in `errors`.
    pub async fn get_all_objects<R: EntityResolver + ?Sized>(&self, resolver: &R) -> Resolution {
        let mut slots: Vec<Option<Arc<Entity>>> = Vec::with_capacity(self.targets.len());
        let mut pending: BTreeMap<EntityKind, Vec<String>> = BTreeMap::new();

        for (idx, target) in self.targets.iter().enumerate() {
            let hit = self.lookup_target(idx, target, resolver);
            if hit.is_none() {
                let ids = pending.entry(target.kind).or_default();
                if !ids.contains(&target.id) {
                    ids.push(target.id.clone());
                }
            }
            slots.push(hit);
        }

        let mut errors: Vec<ObjectError> = Vec::new();
        for (kind, ids) in pending {
            tracing::debug!(relation = %self.name, %kind, count = ids.len(), "resolving uncached targets");
            match resolver.resolve(kind, &ids).await {
                Ok(resolution) => {
                    errors.extend(resolution.errors);
                    for entity in resolution.objects {
                        for (idx, target) in self.targets.iter().enumerate() {
                            if slots[idx].is_none()
                                && target.kind == kind
                                && target.id == entity.id()
                            {
                                self.remember(idx, &entity);
                                slots[idx] = Some(entity.clone());
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(relation = %self.name, %kind, error = %err, "target fetch failed");
                    errors.extend(ids.iter().map(|id| ObjectError::FetchFailed {
                        id: id.clone(),
                        reason: err.to_string(),
                    }));
                }
            }
        }

        let mut objects = Vec::with_capacity(slots.len());
        for (target, slot) in self.targets.iter().zip(slots) {
            match slot {
                Some(entity) => objects.push(entity),
                None => {
                    let reported = errors.iter().any(|err| err.id() == target.id);
                    if !reported {
                        errors.push(ObjectError::Unresolved {
                            id: target.id.clone(),
                            kind: target.kind,
                        });
                    }
                }
            }
        }

        Resolution { objects, errors }
    }

    fn lookup_target<L: EntityLookup + ?Sized>(
        &self,
        idx: usize,
        target: &RelationTarget,
        lookup: &L,
    ) -> Option<Arc<Entity>> {
        let memo = self
            .resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(idx)
            .and_then(Weak::upgrade);

        let current = lookup.cached(&target.id)?;
        // Same referent as last time: nothing to re-check or re-record.
        if memo.is_some_and(|entity| Arc::ptr_eq(&entity, &current)) {
            return Some(current);
        }
        if current.kind() != target.kind {
            return None;
        }
        self.remember(idx, &current);
        Some(current)
    }

    fn remember(&self, idx: usize, entity: &Arc<Entity>) {
        let mut resolved = self.resolved.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = resolved.get_mut(idx) {
            *slot = Arc::downgrade(entity);
        }
    }
}
