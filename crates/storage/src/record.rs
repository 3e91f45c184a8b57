use serde::{Deserialize, Serialize};

/// An exclusive claim on one entity for the duration of a transition.
///
/// At most one record exists per `(entity_id, entity_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChangeLockRecord {
    pub id: i64,
    pub entity_id: String,
    pub entity_type: String,
    pub created_by: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created: String,
}
