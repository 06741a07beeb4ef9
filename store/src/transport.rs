use async_trait::async_trait;
use contentgraph_core::document::{Document, Include, PrimaryData, ResourceObject};
use contentgraph_core::error::{ContentGraphError, ErrorCode};
use contentgraph_core::model::EntityKind;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network unreachable: {0}")]
    Unreachable(String),
    #[error("unexpected status {status}")]
    Status { status: u16 },
    #[error("credentials rejected by backend")]
    Unauthorized,
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("transport error: {0}")]
    Other(#[from] anyhow::Error),
}

impl TransportError {
    /// Classify a non-2xx status. 401 means the credentials are no longer valid.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => TransportError::Unauthorized,
            status => TransportError::Status { status },
        }
    }

    pub fn is_credentials_invalid(&self) -> bool {
        matches!(self, TransportError::Unauthorized)
    }
}

impl ContentGraphError for TransportError {
    fn error_code(&self) -> ErrorCode {
        match self {
            TransportError::Unreachable(_) => ErrorCode::Unavailable,
            TransportError::Status { status: 404 } => ErrorCode::NotFound,
            TransportError::Status { .. } => ErrorCode::Unavailable,
            TransportError::Unauthorized => ErrorCode::Unauthenticated,
            TransportError::Malformed(_) => ErrorCode::Internal,
            TransportError::Other(_) => ErrorCode::Internal,
        }
    }
}

/// Network boundary of the content store. Implementations own authentication,
/// retries, status classification and cache-control parsing.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Load remote configuration before the first request.
    async fn bootstrap(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn fetch(
        &self,
        kind: EntityKind,
        ids: &[String],
        include: Option<&Include>,
    ) -> Result<Document, TransportError>;

    async fn search(&self, term: &str) -> Result<Document, TransportError>;
}

/// Catalog-backed backend. Serves records by id whatever their type, expands
/// include paths into `included`, and matches search terms against titles.
pub struct InMemoryTransport {
    records: HashMap<String, ResourceObject>,
    order: Vec<String>,
    cache_time: Option<u64>,
    latency: Option<Duration>,
    offline: AtomicBool,
    failure_status: Mutex<Option<u16>>,
    bootstrapped: AtomicBool,
    fetch_calls: AtomicUsize,
    search_calls: AtomicUsize,
}

impl InMemoryTransport {
    pub fn new(records: impl IntoIterator<Item = ResourceObject>) -> Self {
        let mut by_id = HashMap::new();
        let mut order = Vec::new();
        for record in records {
            let Some(id) = record.id.clone() else {
                continue;
            };
            if by_id.insert(id.clone(), record).is_none() {
                order.push(id);
            }
        }
        Self {
            records: by_id,
            order,
            cache_time: None,
            latency: None,
            offline: AtomicBool::new(false),
            failure_status: Mutex::new(None),
            bootstrapped: AtomicBool::new(false),
            fetch_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
        }
    }

    /// Build from a document whose `data` array is the whole catalog.
    pub fn from_json(raw: &str) -> Result<Self, TransportError> {
        let document = Document::from_json(raw)?;
        Ok(Self::new(document.data.into_records()))
    }

    pub fn with_cache_time(mut self, seconds: u64) -> Self {
        self.cache_time = Some(seconds);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Answer every following call with this status until cleared with `None`.
    pub fn fail_with_status(&self, status: Option<u16>) {
        *self
            .failure_status
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = status;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn search_count(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn was_bootstrapped(&self) -> bool {
        self.bootstrapped.load(Ordering::SeqCst)
    }

    async fn roundtrip(&self) -> Result<(), TransportError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable("in-memory backend is offline".into()));
        }
        let status = *self
            .failure_status
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match status {
            Some(status) => Err(TransportError::from_status(status)),
            None => Ok(()),
        }
    }

    fn respond(&self, data: Vec<ResourceObject>, included: Vec<ResourceObject>) -> Document {
        Document {
            data: PrimaryData::Many(data),
            included,
            cache_time: self.cache_time,
        }
    }

    fn expand(&self, primary: &[ResourceObject], include: &Include) -> Vec<ResourceObject> {
        let mut seen: HashSet<&str> = primary.iter().filter_map(|r| r.id.as_deref()).collect();
        let mut included: Vec<ResourceObject> = Vec::new();

        for hops in include.hops() {
            let mut frontier: Vec<&ResourceObject> = primary.iter().collect();
            for hop in hops {
                let mut next: Vec<&ResourceObject> = Vec::new();
                for record in &frontier {
                    let Some(linkage) = record
                        .relationships
                        .get(hop)
                        .and_then(|relationship| relationship.data.as_ref())
                    else {
                        continue;
                    };
                    for identifier in linkage.identifiers() {
                        let Some(target) = identifier
                            .id
                            .as_deref()
                            .and_then(|id| self.records.get(id))
                        else {
                            continue;
                        };
                        next.push(target);
                        if let Some(id) = target.id.as_deref() {
                            if seen.insert(id) {
                                included.push(target.clone());
                            }
                        }
                    }
                }
                frontier = next;
            }
        }

        included
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn bootstrap(&self) -> Result<(), TransportError> {
        self.roundtrip().await?;
        self.bootstrapped.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch(
        &self,
        kind: EntityKind,
        ids: &[String],
        include: Option<&Include>,
    ) -> Result<Document, TransportError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.roundtrip().await?;

        let data: Vec<ResourceObject> = ids
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect();
        let included = match include {
            Some(include) if !include.is_empty() => self.expand(&data, include),
            _ => Vec::new(),
        };
        debug!(
            "in-memory fetch {} {:?}: {} primary, {} included",
            kind,
            ids,
            data.len(),
            included.len()
        );
        Ok(self.respond(data, included))
    }

    async fn search(&self, term: &str) -> Result<Document, TransportError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.roundtrip().await?;

        let needle = term.to_lowercase();
        let data: Vec<ResourceObject> = self
            .order
            .iter()
            .filter_map(|id| self.records.get(id))
            .filter(|record| {
                record
                    .attributes
                    .as_ref()
                    .and_then(|attributes| attributes.get("title"))
                    .and_then(Value::as_str)
                    .is_some_and(|title| title.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        Ok(self.respond(data, Vec::new()))
    }
}
