//! Ground-truth fact store.
//!
//! Holds the per-person fact lists the matching engine reconciles against.
//! Facts are created once by the dataset author and read-only here; the
//! store enforces per-person ID uniqueness at construction and answers
//! lookups by person ID, never by list position.

use std::collections::{HashMap, HashSet};

use recallbench_types::error::StoreError;
use recallbench_types::fact::{Fact, PersonFacts};

/// In-memory view of the ground-truth fact set.
#[derive(Debug, Clone)]
pub struct FactStore {
    persons: Vec<PersonFacts>,
    index: HashMap<i64, usize>,
}

impl FactStore {
    /// Build a store, rejecting duplicate fact IDs within a person.
    ///
    /// IDs only have to be unique within one person's fact set, not
    /// globally.
    pub fn new(persons: Vec<PersonFacts>) -> Result<Self, StoreError> {
        for person in &persons {
            let mut seen = HashSet::with_capacity(person.facts.len());
            for fact in &person.facts {
                if !seen.insert(fact.id) {
                    return Err(StoreError::DuplicateFactId {
                        person_id: person.person_id,
                        id: fact.id,
                    });
                }
            }
        }

        let index = persons
            .iter()
            .enumerate()
            .map(|(i, p)| (p.person_id, i))
            .collect();

        Ok(Self { persons, index })
    }

    /// The fact list for one person.
    pub fn facts_for(&self, person_id: i64) -> Result<&[Fact], StoreError> {
        self.index
            .get(&person_id)
            .map(|&i| self.persons[i].facts.as_slice())
            .ok_or(StoreError::PersonNotFound(person_id))
    }

    /// Whether any person owns a fact with this ID.
    pub fn contains_id(&self, id: i64) -> bool {
        self.persons
            .iter()
            .any(|p| p.facts.iter().any(|f| f.id == id))
    }

    /// Every fact ID in the store; the seed set for the ID allocator.
    pub fn all_ids(&self) -> HashSet<i64> {
        self.persons
            .iter()
            .flat_map(|p| p.facts.iter().map(|f| f.id))
            .collect()
    }

    pub fn persons(&self) -> &[PersonFacts] {
        &self.persons
    }
}
