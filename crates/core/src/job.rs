//! The job entity and its closed set of life cycle states.
//!
//! Jobs are the entity type the built-in transition table is written for.
//! Their `state` is validated when the representation is deserialized, so an
//! unknown state name is rejected at the boundary instead of surviving as a
//! raw string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

/// Life cycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JobState {
    Created,
    Running,
    Completed,
    Cancelled,
    InternalErrorState,
    Disposed,
}

impl JobState {
    pub const ALL: [JobState; 6] = [
        JobState::Created,
        JobState::Running,
        JobState::Completed,
        JobState::Cancelled,
        JobState::InternalErrorState,
        JobState::Disposed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Created => "Created",
            JobState::Running => "Running",
            JobState::Completed => "Completed",
            JobState::Cancelled => "Cancelled",
            JobState::InternalErrorState => "InternalErrorState",
            JobState::Disposed => "Disposed",
        }
    }

    /// Disposed jobs have no outgoing transitions in the default table.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Disposed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "job state",
                value: s.to_string(),
            })
    }
}

/// A job representation as served by the job endpoint.
///
/// Only `id` and `state` are interpreted; every other member is carried
/// through unchanged in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: serde_json::Value,
    pub state: JobState,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Job {
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}
