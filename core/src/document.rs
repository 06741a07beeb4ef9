//! Wire-level JSON:API document shapes.
//!
//! Every field of a resource object is optional here so that a single
//! malformed record never fails deserialization of a whole batch. The graph
//! builder decides which records are usable.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One transport response: primary `data` plus the optional `included` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub data: PrimaryData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<ResourceObject>,
    /// `max-age` seconds from the transport's cache metadata. Not part of the body.
    #[serde(skip)]
    pub cache_time: Option<u64>,
}

impl Document {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn with_cache_time(mut self, seconds: u64) -> Self {
        self.cache_time = Some(seconds);
        self
    }

    /// Primary records as a slice regardless of the single/array wire form.
    pub fn primary(&self) -> &[ResourceObject] {
        match &self.data {
            PrimaryData::Many(records) => records,
            PrimaryData::One(record) => std::slice::from_ref(&**record),
            PrimaryData::Empty => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Many(Vec<ResourceObject>),
    One(Box<ResourceObject>),
    #[default]
    Empty,
}

impl PrimaryData {
    pub fn into_records(self) -> Vec<ResourceObject> {
        match self {
            PrimaryData::Many(records) => records,
            PrimaryData::One(record) => vec![*record],
            PrimaryData::Empty => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub attributes: Option<Map<String, Value>>,
    #[serde(default)]
    pub relationships: BTreeMap<String, RelationshipObject>,
}

impl ResourceObject {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            kind: Some(kind.into()),
            attributes: Some(Map::new()),
            relationships: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_relationship(mut self, name: impl Into<String>, linkage: Linkage) -> Self {
        self.relationships.insert(
            name.into(),
            RelationshipObject {
                data: Some(linkage),
            },
        );
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipObject {
    #[serde(default)]
    pub data: Option<Linkage>,
}

/// Resource linkage: a to-one identifier or a to-many array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    Many(Vec<ResourceIdentifier>),
    One(ResourceIdentifier),
}

impl Linkage {
    pub fn identifiers(&self) -> &[ResourceIdentifier] {
        match self {
            Linkage::Many(ids) => ids,
            Linkage::One(id) => std::slice::from_ref(id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl ResourceIdentifier {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            kind: Some(kind.into()),
        }
    }
}

/// Include directive: relation names the backend should expand into `included`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Include {
    paths: Vec<String>,
}

impl Include {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for path in paths {
            let path = path.as_ref().trim();
            if path.is_empty() || out.iter().any(|existing| existing == path) {
                continue;
            }
            out.push(path.to_string());
        }
        Self { paths: out }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Each path split into its relation-name hops, e.g. `entities.promotion`.
    pub fn hops(&self) -> impl Iterator<Item = Vec<&str>> {
        self.paths.iter().map(|path| path.split('.').collect())
    }
}

impl FromStr for Include {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s.split(',')))
    }
}

impl fmt::Display for Include {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.paths.join(","))
    }
}
