//! Bidirectional transform between flat and structured memory records.
//!
//! Structured extractors produce entity/profile/attribute graphs; the
//! matching engine only understands flat `{id, content}` memories. Flattening
//! embeds the profile category as a `"<category>: <content>"` prefix so the
//! restore step can verify it is writing match state into the right slot.
//!
//! Restoration walks the skeleton in flatten order and zips it against the
//! flat list, so the reconstructed dataset is the original skeleton with only
//! `mem_id` fields updated. Any divergence between a flat memory and the slot
//! it should land in means the round trip has desynchronized; conversion
//! aborts rather than dropping or duplicating data.

use serde_json::Value;

use recallbench_types::error::FormatError;
use recallbench_types::memory::{
    AttributeCategory, FlatMemory, MemoryFormat, PersonEntities, PersonMemories,
};

/// Detect the wire shape of a raw memories file.
///
/// Called exactly once at load time; the result becomes the dataset tag that
/// all downstream code branches on. Structured entries are recognized by
/// their `Description` marker field on the first person's entries.
pub fn detect_format(data: &Value) -> MemoryFormat {
    if let Some(first) = data.as_array().and_then(|persons| persons.first())
        && let Some(entries) = first.get("extracted_memories").and_then(Value::as_array)
        && entries.iter().any(|entry| entry.get("Description").is_some())
    {
        return MemoryFormat::Structured;
    }
    MemoryFormat::Flat
}

/// Flatten every `{category, item}` pair across every entity of every person
/// into one flat memory per item.
///
/// Fails if a profile key is outside the closed attribute vocabulary: an
/// unknown category would be unrecoverable at restore time, so it is rejected
/// up front instead of guessed at.
pub fn to_flat(persons: &[PersonEntities]) -> Result<Vec<PersonMemories>, FormatError> {
    persons
        .iter()
        .map(|person| {
            let mut memories = Vec::new();
            for entity in &person.extracted_memories {
                for (category, items) in &entity.profile {
                    category
                        .parse::<AttributeCategory>()
                        .map_err(|_| FormatError::UnknownCategory(category.clone()))?;
                    for item in items {
                        memories.push(FlatMemory {
                            id: item.mem_id.clone(),
                            content: format!("{category}: {}", item.content),
                        });
                    }
                }
            }
            Ok(PersonMemories {
                person_id: person.person_id,
                extracted_memories: memories,
            })
        })
        .collect()
}

/// Write flat match state back into the original structured skeleton.
///
/// The output reproduces the skeleton exactly -- descriptions, connections,
/// category keys and their order -- with only `mem_id` fields replaced by the
/// flat memories' ID lists. Every flat memory must land on the slot it was
/// flattened from, verified by category and content.
pub fn to_structured(
    flat: &[PersonMemories],
    skeleton: &[PersonEntities],
) -> Result<Vec<PersonEntities>, FormatError> {
    skeleton
        .iter()
        .map(|person| {
            let flat_person = flat
                .iter()
                .find(|p| p.person_id == person.person_id)
                .ok_or(FormatError::PersonNotInSkeleton(person.person_id))?;

            let slot_count: usize = person
                .extracted_memories
                .iter()
                .flat_map(|e| e.profile.values())
                .map(Vec::len)
                .sum();
            if slot_count != flat_person.extracted_memories.len() {
                return Err(FormatError::SlotCountMismatch {
                    person_id: person.person_id,
                    expected: slot_count,
                    actual: flat_person.extracted_memories.len(),
                });
            }

            let mut cursor = flat_person.extracted_memories.iter();
            let mut restored = person.clone();
            for entity in &mut restored.extracted_memories {
                for (category, items) in entity.profile.iter_mut() {
                    for item in items {
                        // Slot counts already matched, so the cursor cannot run dry.
                        let Some(memory) = cursor.next() else {
                            return Err(FormatError::SlotCountMismatch {
                                person_id: person.person_id,
                                expected: slot_count,
                                actual: flat_person.extracted_memories.len(),
                            });
                        };
                        verify_slot(person.person_id, category, &item.content, memory)?;
                        item.mem_id = memory.id.clone();
                    }
                }
            }
            Ok(restored)
        })
        .collect()
}

/// Check that a flat memory parses as `"<category>: <content>"` and matches
/// the skeleton slot it is about to fill.
fn verify_slot(
    person_id: i64,
    category: &str,
    content: &str,
    memory: &FlatMemory,
) -> Result<(), FormatError> {
    let (mem_category, mem_content) = memory
        .content
        .split_once(':')
        .ok_or_else(|| FormatError::MissingDelimiter(memory.content.clone()))?;

    if !mem_category.trim().eq_ignore_ascii_case(category.trim())
        || mem_content.trim() != content.trim()
    {
        return Err(FormatError::SkeletonMismatch {
            person_id,
            expected: format!("{category}: {content}"),
            actual: memory.content.clone(),
        });
    }
    Ok(())
}
