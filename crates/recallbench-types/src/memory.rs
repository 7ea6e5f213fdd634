//! Extracted-memory types in both wire shapes.
//!
//! Extractors produce one of two incompatible shapes: a flat list of
//! `{id, content}` memories per person, or a nested entity/profile/attribute
//! graph. Both are modeled here; [`MemoryDataset`] is the tagged union the
//! rest of the pipeline branches on, with the discriminant decided once at
//! load time rather than re-detected per record.
//!
//! ID fields tolerate the legacy shapes older extractor runs produced:
//! a bare integer instead of a list, and zero-padded numeric strings
//! instead of integers. Normalization happens during deserialization so
//! downstream code only ever sees `Vec<i64>`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Wire shape of a memories file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFormat {
    /// Per-person list of `{id, content}` memories.
    Flat,
    /// Per-person list of entity/profile/attribute graphs.
    Structured,
}

impl fmt::Display for MemoryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryFormat::Flat => write!(f, "flat"),
            MemoryFormat::Structured => write!(f, "structured"),
        }
    }
}

/// A candidate memory statement in flat form.
///
/// `id` holds the fact IDs this memory has been matched to; empty means
/// unmatched. Storage order matters for display, so this is an ordered
/// sequence with uniqueness enforced manually on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatMemory {
    #[serde(default, deserialize_with = "id_list::deserialize")]
    pub id: Vec<i64>,
    pub content: String,
}

impl FlatMemory {
    /// Create an unmatched memory.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Vec::new(),
            content: content.into(),
        }
    }

    /// Append `fact_id` unless it is already present.
    ///
    /// Returns true if the ID was appended. This is the mechanism that keeps
    /// a fact ID from appearing twice in one memory even when the classifier
    /// proposes it redundantly.
    pub fn push_unique(&mut self, fact_id: i64) -> bool {
        if self.id.contains(&fact_id) {
            false
        } else {
            self.id.push(fact_id);
            true
        }
    }

    /// Whether this memory has been matched or allocated at least one ID.
    pub fn is_matched(&self) -> bool {
        !self.id.is_empty()
    }
}

/// All flat memories extracted for one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonMemories {
    pub person_id: i64,
    pub extracted_memories: Vec<FlatMemory>,
}

/// One item under a profile category: the statement text plus the fact IDs
/// it has been matched to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeItem {
    pub content: String,
    #[serde(default, deserialize_with = "id_list::deserialize")]
    pub mem_id: Vec<i64>,
}

/// A relationship edge between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: i64,
    pub relationship: String,
}

/// A person-like node in the structured representation: the subject
/// themselves or someone they mentioned.
///
/// Profile categories are stored in an order-preserving map because the
/// flatten/restore round trip must never reorder them. Serde field names
/// match the persisted wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Profile")]
    pub profile: IndexMap<String, Vec<AttributeItem>>,
    #[serde(rename = "Connections", default)]
    pub connections: Vec<Connection>,
}

/// All entities discovered within one person's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonEntities {
    pub person_id: i64,
    pub extracted_memories: Vec<Entity>,
}

/// A memories dataset with its wire shape decided at load time.
///
/// All downstream code branches on this tag, never on ad hoc field presence
/// checks beyond the single detection point in the format converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryDataset {
    Flat(Vec<PersonMemories>),
    Structured(Vec<PersonEntities>),
}

impl MemoryDataset {
    pub fn format(&self) -> MemoryFormat {
        match self {
            MemoryDataset::Flat(_) => MemoryFormat::Flat,
            MemoryDataset::Structured(_) => MemoryFormat::Structured,
        }
    }

    /// IDs of the persons present in this dataset, in file order.
    pub fn person_ids(&self) -> Vec<i64> {
        match self {
            MemoryDataset::Flat(persons) => persons.iter().map(|p| p.person_id).collect(),
            MemoryDataset::Structured(persons) => persons.iter().map(|p| p.person_id).collect(),
        }
    }
}

/// The closed vocabulary of profile attribute categories.
///
/// Structured extractors group memory-like items under these buckets; the
/// format converter keys off the same vocabulary when flattening and
/// restoring. Anything outside the vocabulary is a format error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeCategory {
    Name,
    Age,
    Job,
    Location,
    Health,
    Interests,
    Notes,
}

impl AttributeCategory {
    pub const ALL: [AttributeCategory; 7] = [
        AttributeCategory::Name,
        AttributeCategory::Age,
        AttributeCategory::Job,
        AttributeCategory::Location,
        AttributeCategory::Health,
        AttributeCategory::Interests,
        AttributeCategory::Notes,
    ];
}

impl fmt::Display for AttributeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeCategory::Name => write!(f, "name"),
            AttributeCategory::Age => write!(f, "age"),
            AttributeCategory::Job => write!(f, "job"),
            AttributeCategory::Location => write!(f, "location"),
            AttributeCategory::Health => write!(f, "health"),
            AttributeCategory::Interests => write!(f, "interests"),
            AttributeCategory::Notes => write!(f, "notes"),
        }
    }
}

impl FromStr for AttributeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" => Ok(AttributeCategory::Name),
            "age" => Ok(AttributeCategory::Age),
            "job" => Ok(AttributeCategory::Job),
            "location" => Ok(AttributeCategory::Location),
            "health" => Ok(AttributeCategory::Health),
            "interests" => Ok(AttributeCategory::Interests),
            "notes" => Ok(AttributeCategory::Notes),
            other => Err(format!("invalid attribute category: '{other}'")),
        }
    }
}

/// Tolerant deserialization for matched-ID lists.
///
/// Accepts a list of integers (the canonical shape), a bare integer, and
/// numeric strings with optional zero padding. Anything else is a
/// deserialization error.
pub(crate) mod id_list {
    use serde::de::{Deserializer, Error};
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Str(String),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawIdList {
        Many(Vec<RawId>),
        One(RawId),
    }

    fn normalize<E: Error>(raw: RawId) -> Result<i64, E> {
        match raw {
            RawId::Int(id) => Ok(id),
            RawId::Str(s) => {
                let trimmed = s.trim();
                if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
                    trimmed
                        .parse::<i64>()
                        .map_err(|e| E::custom(format!("id '{trimmed}' out of range: {e}")))
                } else {
                    Err(E::custom(format!("non-numeric id '{s}'")))
                }
            }
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawIdList::deserialize(deserializer)? {
            RawIdList::Many(ids) => ids.into_iter().map(normalize).collect(),
            RawIdList::One(id) => Ok(vec![normalize(id)?]),
        }
    }

    /// Single-ID variant of the same normalization, for scalar ID fields.
    pub fn deserialize_scalar<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        normalize(RawId::deserialize(deserializer)?)
    }
}
