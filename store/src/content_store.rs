use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use contentgraph_core::config::CacheConfig;
use contentgraph_core::document::Include;
use contentgraph_core::error::{ContentGraphError, ErrorCode};
use contentgraph_core::metrics::{MetricsSnapshot, StoreMetrics};
use contentgraph_core::model::{Entity, EntityKind};
use contentgraph_core::relationship::{EntityLookup, EntityResolver, ObjectError, Resolution};
use dashmap::DashMap;
use graph::{GraphBuilder, ParsedGraph};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("content store used before initialize()")]
    NotInitialized,
}

impl ContentGraphError for StoreError {
    fn error_code(&self) -> ErrorCode {
        match self {
            StoreError::Transport(err) => err.error_code(),
            StoreError::NotInitialized => ErrorCode::FailedPrecondition,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Empty,
    Populated,
}

/// Search hits partitioned by type, each in backend order.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub videos: Vec<Arc<Entity>>,
    pub collections: Vec<Arc<Entity>>,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.videos.len() + self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache and orchestration point for typed entity requests.
///
/// Reads go straight to a sharded map; every merge into it is serialized by
/// `merge_lock`. A refetch of an id replaces the cached entity.
pub struct ContentStore {
    transport: Arc<dyn Transport>,
    builder: GraphBuilder,
    entities: DashMap<String, Arc<Entity>>,
    merge_lock: Mutex<()>,
    initialized: AtomicBool,
    cache_enabled: bool,
    metrics: StoreMetrics,
}

impl ContentStore {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, &CacheConfig::default())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: &CacheConfig) -> Self {
        Self {
            transport,
            builder: GraphBuilder::new(),
            entities: DashMap::new(),
            merge_lock: Mutex::new(()),
            initialized: AtomicBool::new(false),
            cache_enabled: config.enabled,
            metrics: StoreMetrics::new(config.metrics_history),
        }
    }

    /// Entry gate: runs the transport bootstrap once. Later calls are no-ops.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        if self.is_initialized() {
            return Ok(());
        }
        self.transport.bootstrap().await?;
        self.initialized.store(true, Ordering::Release);
        info!("Content store initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub async fn objects_of_type<S>(
        &self,
        kind: EntityKind,
        ids: &[S],
        include: Option<&Include>,
    ) -> Result<Resolution, StoreError>
    where
        S: AsRef<str> + Sync,
    {
        self.ensure_initialized()?;
        let started = Instant::now();

        let mut seen = HashSet::new();
        let requested: Vec<String> = ids
            .iter()
            .map(|id| id.as_ref().to_string())
            .filter(|id| seen.insert(id.clone()))
            .collect();

        // Answer from what this call saw; the shared map may be reset meanwhile.
        let mut found: HashMap<String, Arc<Entity>> = HashMap::new();
        let mut missing: Vec<String> = Vec::new();
        for id in &requested {
            match self.cache_hit(id, kind) {
                Some(entity) => {
                    found.insert(id.clone(), entity);
                }
                None => missing.push(id.clone()),
            }
        }
        let served_from_cache = found.len();

        if !missing.is_empty() {
            debug!(
                "cache miss for {} {} id(s), fetching with include {:?}",
                missing.len(),
                kind,
                include.map(ToString::to_string)
            );
            let document = self
                .transport
                .fetch(kind, &missing, include)
                .await
                .map_err(|err| self.transport_failure(err))?;
            let graph = self.builder.build(document);
            let merged = self.merge(&graph).await;
            self.metrics.record_fetch(merged);
            for entity in graph.entities() {
                found.insert(entity.id().to_string(), Arc::clone(entity));
            }
        }

        let mut resolution = Resolution::default();
        for id in &requested {
            match found.get(id).cloned().or_else(|| self.cached(id)) {
                Some(entity) if entity.kind() == kind => resolution.objects.push(entity),
                Some(entity) => resolution.errors.push(ObjectError::TypeMismatch {
                    id: id.clone(),
                    requested: kind,
                    actual: entity.kind(),
                }),
                None => debug!("{} not found in cache or response", id),
            }
        }

        self.metrics.record_request(
            started.elapsed().as_micros() as u64,
            requested.len(),
            served_from_cache,
        );
        Ok(resolution)
    }

    /// Search and merge every hit. A blank term returns nothing without a request.
    pub async fn search_for_term(&self, term: &str) -> Result<SearchResults, StoreError> {
        self.ensure_initialized()?;
        let term = term.trim();
        if term.is_empty() {
            return Ok(SearchResults::default());
        }

        let document = self
            .transport
            .search(term)
            .await
            .map_err(|err| self.transport_failure(err))?;
        let graph = self.builder.build(document);
        let merged = self.merge(&graph).await;
        self.metrics.record_search(merged);

        let mut results = SearchResults::default();
        for entity in graph.primary {
            match entity.kind() {
                EntityKind::Video => results.videos.push(entity),
                EntityKind::MediaObjectCollection => results.collections.push(entity),
                other => debug!("search hit {} of type {} not partitioned", entity.id(), other),
            }
        }
        info!(
            "search '{}': {} videos, {} collections",
            term,
            results.videos.len(),
            results.collections.len()
        );
        Ok(results)
    }

    /// Resolve a named relation of `entity` through this store.
    pub async fn related(&self, entity: &Entity, relation: &str) -> Option<Resolution> {
        let node = entity.relationship_node_with_name(relation)?;
        Some(node.get_all_objects(self).await)
    }

    /// Drop every cached entity. In-flight fetches still merge when they finish.
    pub fn reset_store(&self) {
        let dropped = self.entities.len();
        self.entities.clear();
        info!("Content store reset, {} entities dropped", dropped);
    }

    pub fn cache_size(&self) -> usize {
        self.entities.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn state(&self) -> StoreState {
        if self.entities.is_empty() {
            StoreState::Empty
        } else {
            StoreState::Populated
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn ensure_initialized(&self) -> Result<(), StoreError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    fn cache_hit(&self, id: &str, kind: EntityKind) -> Option<Arc<Entity>> {
        if !self.cache_enabled {
            return None;
        }
        self.cached(id).filter(|entity| entity.kind() == kind)
    }

    fn transport_failure(&self, err: TransportError) -> StoreError {
        self.metrics.record_failure();
        if err.is_credentials_invalid() {
            warn!("backend rejected credentials: {}", err);
        } else {
            warn!("transport failure: {}", err);
        }
        StoreError::Transport(err)
    }

    async fn merge(&self, graph: &ParsedGraph) -> usize {
        let _merge_guard = self.merge_lock.lock().await;
        let mut merged = 0;
        for entity in graph.entities() {
            self.entities
                .insert(entity.id().to_string(), Arc::clone(entity));
            merged += 1;
        }
        if !graph.rejected.is_empty() {
            debug!("{} malformed record(s) skipped", graph.rejected.len());
        }
        info!("Merged {} entities into content store", merged);
        merged
    }
}

impl EntityLookup for ContentStore {
    fn cached(&self, id: &str) -> Option<Arc<Entity>> {
        self.entities.get(id).map(|entry| Arc::clone(entry.value()))
    }
}

#[async_trait]
impl EntityResolver for ContentStore {
    type Error = StoreError;

    async fn resolve(&self, kind: EntityKind, ids: &[String]) -> Result<Resolution, StoreError> {
        self.objects_of_type(kind, ids, None).await
    }
}
