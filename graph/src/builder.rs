use contentgraph_core::document::{Document, Linkage, RelationshipObject, ResourceIdentifier, ResourceObject};
use contentgraph_core::error::{ContentGraphError, ErrorCode};
use contentgraph_core::model::{Entity, EntityAttributes, EntityKind};
use contentgraph_core::relationship::{RelationTarget, RelationshipNode};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordRejection {
    #[error("record has no id")]
    MissingId,
    #[error("record {id} has no type")]
    MissingType { id: String },
    #[error("record {id} has no attributes")]
    MissingAttributes { id: String },
    #[error("record {id} has unknown type {kind}")]
    UnknownType { id: String, kind: String },
    #[error("record {id} has invalid attributes: {reason}")]
    InvalidAttributes { id: String, reason: String },
}

impl ContentGraphError for RecordRejection {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::InvalidArgument
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Primary,
    Included,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub section: Section,
    pub rejection: RecordRejection,
}

/// Entities built from one document. Only `primary` is ever handed back to a
/// caller as requested objects; `included` is merged into the cache only.
#[derive(Debug, Default)]
pub struct ParsedGraph {
    pub primary: Vec<Arc<Entity>>,
    pub included: Vec<Arc<Entity>>,
    pub rejected: Vec<RejectedRecord>,
}

impl ParsedGraph {
    pub fn entities(&self) -> impl Iterator<Item = &Arc<Entity>> {
        self.primary.iter().chain(self.included.iter())
    }

    pub fn len(&self) -> usize {
        self.primary.len() + self.included.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns a wire document into entities with wired relationship nodes. No I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphBuilder;

impl GraphBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, document: Document) -> ParsedGraph {
        let cache_time = document.cache_time;
        let mut graph = ParsedGraph::default();

        let mut primary = SectionBuffer::default();
        for record in document.data.into_records() {
            match build_entity(record, cache_time) {
                Ok(entity) => primary.push(entity),
                Err(rejection) => graph.reject(Section::Primary, rejection),
            }
        }

        let primary_ids: HashSet<String> = primary.ids().cloned().collect();
        let mut included = SectionBuffer::default();
        for record in document.included {
            if let Some(id) = record.id.as_deref() {
                if primary_ids.contains(id) {
                    debug!("included record {} duplicates a primary record", id);
                    continue;
                }
            }
            match build_entity(record, cache_time) {
                Ok(entity) => included.push(entity),
                Err(rejection) => graph.reject(Section::Included, rejection),
            }
        }

        graph.primary = primary.into_entities();
        graph.included = included.into_entities();
        graph
    }
}

impl ParsedGraph {
    fn reject(&mut self, section: Section, rejection: RecordRejection) {
        warn!("dropping malformed {:?} record: {}", section, rejection);
        self.rejected.push(RejectedRecord { section, rejection });
    }
}

/// Keeps document order; a repeated id replaces the earlier entity in place.
#[derive(Default)]
struct SectionBuffer {
    entities: Vec<Arc<Entity>>,
    positions: HashMap<String, usize>,
}

impl SectionBuffer {
    fn push(&mut self, entity: Entity) {
        let entity = Arc::new(entity);
        match self.positions.get(entity.id()) {
            Some(&idx) => self.entities[idx] = entity,
            None => {
                self.positions
                    .insert(entity.id().to_string(), self.entities.len());
                self.entities.push(entity);
            }
        }
    }

    fn ids(&self) -> impl Iterator<Item = &String> {
        self.positions.keys()
    }

    fn into_entities(self) -> Vec<Arc<Entity>> {
        self.entities
    }
}

fn build_entity(record: ResourceObject, cache_time: Option<u64>) -> Result<Entity, RecordRejection> {
    let id = record
        .id
        .filter(|id| !id.is_empty())
        .ok_or(RecordRejection::MissingId)?;
    let kind_name = record
        .kind
        .ok_or_else(|| RecordRejection::MissingType { id: id.clone() })?;
    let mut attributes = record
        .attributes
        .ok_or_else(|| RecordRejection::MissingAttributes { id: id.clone() })?;
    let kind: EntityKind = kind_name.parse().map_err(|_| RecordRejection::UnknownType {
        id: id.clone(),
        kind: kind_name.clone(),
    })?;

    let title = match attributes.remove("title") {
        None | Some(Value::Null) => None,
        Some(Value::String(title)) => Some(title),
        Some(other) => {
            return Err(RecordRejection::InvalidAttributes {
                id,
                reason: format!("title must be a string, got {}", other),
            })
        }
    };

    let attributes = EntityAttributes::from_wire(kind, attributes).map_err(|err| {
        RecordRejection::InvalidAttributes {
            id: id.clone(),
            reason: err.to_string(),
        }
    })?;

    let mut entity = Entity::new(id.clone(), attributes).with_cache_time(cache_time);
    if let Some(title) = title {
        entity = entity.with_title(title);
    }
    for (name, relationship) in record.relationships {
        entity = entity.with_relationship(build_node(&id, name, relationship));
    }
    Ok(entity)
}

fn build_node(owner: &str, name: String, relationship: RelationshipObject) -> RelationshipNode {
    match relationship.data {
        None => RelationshipNode::singular(name, None),
        Some(Linkage::One(identifier)) => {
            let target = relation_target(owner, &name, identifier);
            RelationshipNode::singular(name, target)
        }
        Some(Linkage::Many(identifiers)) => {
            let targets = identifiers
                .into_iter()
                .filter_map(|identifier| relation_target(owner, &name, identifier))
                .collect();
            RelationshipNode::multiple(name, targets)
        }
    }
}

fn relation_target(owner: &str, relation: &str, identifier: ResourceIdentifier) -> Option<RelationTarget> {
    let (Some(id), Some(kind_name)) = (identifier.id, identifier.kind) else {
        warn!("{}.{}: skipping identifier without id or type", owner, relation);
        return None;
    };
    match kind_name.parse::<EntityKind>() {
        Ok(kind) => Some(RelationTarget::new(id, kind)),
        Err(err) => {
            warn!("{}.{}: skipping target {}: {}", owner, relation, id, err);
            None
        }
    }
}
