//! Ground-truth fact types.
//!
//! Facts are atomic statements about a simulated person, created by the
//! dataset author and read-only to the matching pipeline. Every fact carries
//! a stable integer ID that memories converge onto during matching.

use serde::{Deserialize, Serialize};

/// Number of significant digits in the ID scheme.
///
/// IDs are rendered zero-padded to this width (`1234` displays as `01234`).
pub const ID_DIGITS: usize = 5;

/// Largest value representable in the ID scheme.
pub const MAX_ID: i64 = 99_999;

/// Whether `id` fits the fixed-width ID scheme.
pub fn is_valid_id(id: i64) -> bool {
    (0..=MAX_ID).contains(&id)
}

/// Render an ID zero-padded to the scheme width.
pub fn format_id(id: i64) -> String {
    format!("{id:0width$}", width = ID_DIGITS)
}

/// A single ground-truth fact about a person.
///
/// Immutable once created. IDs are unique within a person's fact set,
/// not necessarily globally. Older dataset files stored IDs as zero-padded
/// strings; those are normalized to integers on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    #[serde(deserialize_with = "crate::memory::id_list::deserialize_scalar")]
    pub id: i64,
    pub content: String,
}

/// The full ground-truth fact list for one person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonFacts {
    pub person_id: i64,
    pub facts: Vec<Fact>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_validity_band() {
        assert!(is_valid_id(0));
        assert!(is_valid_id(1234));
        assert!(is_valid_id(MAX_ID));
        assert!(!is_valid_id(-1));
        assert!(!is_valid_id(MAX_ID + 1));
    }

    #[test]
    fn test_format_id_zero_pads() {
        assert_eq!(format_id(1234), "01234");
        assert_eq!(format_id(7), "00007");
        assert_eq!(format_id(99_999), "99999");
    }

    #[test]
    fn test_fact_deserialize() {
        let json = r#"{"id": 1, "content": "Lives in Seattle"}"#;
        let fact: Fact = serde_json::from_str(json).unwrap();
        assert_eq!(fact.id, 1);
        assert_eq!(fact.content, "Lives in Seattle");
    }

    #[test]
    fn test_fact_deserialize_zero_padded_string_id() {
        let json = r#"{"id": "02040", "content": "f"}"#;
        let fact: Fact = serde_json::from_str(json).unwrap();
        assert_eq!(fact.id, 2040);
    }

    #[test]
    fn test_person_facts_deserialize() {
        let json = r#"{"person_id": 3, "facts": [{"id": 1, "content": "a"}, {"id": 2, "content": "b"}]}"#;
        let person: PersonFacts = serde_json::from_str(json).unwrap();
        assert_eq!(person.person_id, 3);
        assert_eq!(person.facts.len(), 2);
    }
}
