use crate::relationship::RelationshipNode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    View,
    Video,
    MediaObjectCollection,
    Promotion,
    Image,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::View,
        EntityKind::Video,
        EntityKind::MediaObjectCollection,
        EntityKind::Promotion,
        EntityKind::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::View => "View",
            EntityKind::Video => "Video",
            EntityKind::MediaObjectCollection => "MediaObjectCollection",
            EntityKind::Promotion => "Promotion",
            EntityKind::Image => "Image",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown entity type: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for EntityKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewAttributes {
    pub template: Option<String>,
    pub subtitle: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoAttributes {
    pub url_string: Option<String>,
    /// Seconds.
    pub duration: Option<f64>,
    pub notes: Option<String>,
    pub thumbnail_link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionAttributes {
    pub description: Option<String>,
    pub thumbnail_link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromotionAttributes {
    pub subtitle: Option<String>,
    pub link_url: Option<String>,
    pub image_link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageAttributes {
    pub url_string: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Type-specific attributes. The variant is the entity's declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityAttributes {
    View(ViewAttributes),
    Video(VideoAttributes),
    MediaObjectCollection(CollectionAttributes),
    Promotion(PromotionAttributes),
    Image(ImageAttributes),
}

impl EntityAttributes {
    /// Decode a wire attribute map for the given kind.
    pub fn from_wire(
        kind: EntityKind,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, serde_json::Error> {
        let value = serde_json::Value::Object(attributes);
        Ok(match kind {
            EntityKind::View => EntityAttributes::View(serde_json::from_value(value)?),
            EntityKind::Video => EntityAttributes::Video(serde_json::from_value(value)?),
            EntityKind::MediaObjectCollection => {
                EntityAttributes::MediaObjectCollection(serde_json::from_value(value)?)
            }
            EntityKind::Promotion => EntityAttributes::Promotion(serde_json::from_value(value)?),
            EntityKind::Image => EntityAttributes::Image(serde_json::from_value(value)?),
        })
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityAttributes::View(_) => EntityKind::View,
            EntityAttributes::Video(_) => EntityKind::Video,
            EntityAttributes::MediaObjectCollection(_) => EntityKind::MediaObjectCollection,
            EntityAttributes::Promotion(_) => EntityKind::Promotion,
            EntityAttributes::Image(_) => EntityKind::Image,
        }
    }
}

/// A content entity. Immutable once built; a refetch replaces it in the store.
#[derive(Debug)]
pub struct Entity {
    id: String,
    title: Option<String>,
    cache_time: Option<u64>,
    attributes: EntityAttributes,
    relationships: BTreeMap<String, RelationshipNode>,
}

impl Entity {
    pub fn new(id: impl Into<String>, attributes: EntityAttributes) -> Self {
        Self {
            id: id.into(),
            title: None,
            cache_time: None,
            attributes,
            relationships: BTreeMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_cache_time(mut self, seconds: Option<u64>) -> Self {
        self.cache_time = seconds;
        self
    }

    pub fn with_relationship(mut self, node: RelationshipNode) -> Self {
        self.relationships.insert(node.name().to_string(), node);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.attributes.kind()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn cache_time(&self) -> Option<u64> {
        self.cache_time
    }

    pub fn attributes(&self) -> &EntityAttributes {
        &self.attributes
    }

    pub fn as_video(&self) -> Option<&VideoAttributes> {
        match &self.attributes {
            EntityAttributes::Video(video) => Some(video),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionAttributes> {
        match &self.attributes {
            EntityAttributes::MediaObjectCollection(collection) => Some(collection),
            _ => None,
        }
    }

    /// Absent when the entity does not declare the relation; that is not an error.
    pub fn relationship_node_with_name(&self, name: &str) -> Option<&RelationshipNode> {
        self.relationships.get(name)
    }

    pub fn relationship_names(&self) -> impl Iterator<Item = &str> {
        self.relationships.keys().map(String::as_str)
    }
}
