use thiserror::Error;

/// Errors from the external match classifier boundary.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The classifier answered outside its documented response grammar
    /// (not an ID, not NO_MATCH, not a parseable ID list). Never coerced
    /// silently; the engine logs and skips the offending item.
    #[error("classifier protocol violation: {0}")]
    Protocol(String),

    /// The underlying service call failed (network, rate limit). Propagated
    /// to the caller; no internal retry loop.
    #[error("transient classifier failure: {0}")]
    Transient(String),
}

/// Errors from the flat/structured format converter.
///
/// All of these indicate the flatten/restore round trip has desynchronized;
/// conversion aborts rather than silently dropping data.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("memory content '{0}' has no 'category: content' delimiter")]
    MissingDelimiter(String),

    #[error("profile category '{0}' is not in the attribute vocabulary")]
    UnknownCategory(String),

    #[error("person {0} missing from the flatten/restore pairing")]
    PersonNotInSkeleton(i64),

    #[error(
        "flatten/restore desync for person {person_id}: expected '{expected}', got '{actual}'"
    )]
    SkeletonMismatch {
        person_id: i64,
        expected: String,
        actual: String,
    },

    #[error(
        "person {person_id} has {actual} flat memories but the skeleton holds {expected} slots"
    )]
    SlotCountMismatch {
        person_id: i64,
        expected: usize,
        actual: usize,
    },
}

/// Errors from the random ID allocator.
#[derive(Debug, Error)]
pub enum AllocError {
    /// The numeric band is exhausted (or as good as). Detected via a bounded
    /// retry loop rather than spinning forever.
    #[error("id band exhausted after {0} attempts")]
    BandExhausted(usize),
}

/// Errors from embedding backends.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding failure: {0}")]
    Backend(String),
}

/// Errors from dataset loading and persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate fact id {id} within person {person_id}")]
    DuplicateFactId { person_id: i64, id: i64 },

    #[error("person {0} not found in ground truth")]
    PersonNotFound(i64),

    #[error("no memories files found in {0}")]
    NoCandidates(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_error_display() {
        let err = ClassifierError::Protocol("returned 'maybe 3?'".to_string());
        assert_eq!(
            err.to_string(),
            "classifier protocol violation: returned 'maybe 3?'"
        );
    }

    #[test]
    fn test_format_error_display() {
        let err = FormatError::SkeletonMismatch {
            person_id: 2,
            expected: "age: 25 years old".to_string(),
            actual: "job: works at a bakery".to_string(),
        };
        assert!(err.to_string().contains("person 2"));
        assert!(err.to_string().contains("age: 25 years old"));
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::DuplicateFactId { person_id: 1, id: 7 };
        assert_eq!(err.to_string(), "duplicate fact id 7 within person 1");
    }
}
