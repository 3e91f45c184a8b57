//! Transition tables and the state machine that evaluates them.
//!
//! A transition table maps `(state, condition)` to a next state. Its external
//! form is a flat JSON object whose keys are `"{State}-{Condition}"`:
//!
//! ```json
//! { "Created-Continue": "Running", "Running-Cancel": "Cancelled" }
//! ```
//!
//! The machine itself holds no per-entity state: the caller supplies the
//! current state on every [`StateMachine::evaluate`] call.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::{ConfigurationError, TransitionNotFound};
use crate::job::JobState;

/// Separator between state and condition in a serialized transition key.
pub const KEY_SEPARATOR: char = '-';

/// Conditions used by the built-in table.
pub mod conditions {
    pub const CONTINUE: &str = "Continue";
    pub const CANCEL: &str = "Cancel";
}

const DEFAULT_TRANSITIONS: [(JobState, &str, JobState); 9] = [
    (JobState::Created, conditions::CONTINUE, JobState::Running),
    (JobState::Created, conditions::CANCEL, JobState::InternalErrorState),
    (JobState::Running, conditions::CONTINUE, JobState::Completed),
    (JobState::Running, conditions::CANCEL, JobState::Cancelled),
    (JobState::Completed, conditions::CONTINUE, JobState::Disposed),
    (JobState::Completed, conditions::CANCEL, JobState::InternalErrorState),
    (JobState::Cancelled, conditions::CONTINUE, JobState::Disposed),
    (JobState::Cancelled, conditions::CANCEL, JobState::InternalErrorState),
    (JobState::InternalErrorState, conditions::CONTINUE, JobState::Disposed),
];

// ──────────────────────────────────────────────
// TransitionKey
// ──────────────────────────────────────────────

/// The `(state, condition)` half of a table entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionKey {
    pub state: String,
    pub condition: String,
}

impl TransitionKey {
    pub fn new(state: impl Into<String>, condition: impl Into<String>) -> Self {
        TransitionKey {
            state: state.into(),
            condition: condition.into(),
        }
    }

    /// Parse a `"{State}-{Condition}"` key.
    ///
    /// The key is split at its last separator, so state names may contain
    /// `-` (`"On-Hold-Continue"` is state `On-Hold`, condition `Continue`).
    /// Both halves must be non-empty.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        match raw.rsplit_once(KEY_SEPARATOR) {
            Some((state, condition)) if !state.is_empty() && !condition.is_empty() => {
                Ok(TransitionKey::new(state, condition))
            }
            _ => Err(ConfigurationError::InvalidKey {
                key: raw.to_string(),
            }),
        }
    }
}

impl fmt::Display for TransitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.state, KEY_SEPARATOR, self.condition)
    }
}

// ──────────────────────────────────────────────
// TransitionTable
// ──────────────────────────────────────────────

/// Insertion-ordered mapping from [`TransitionKey`] to next state.
///
/// Entries are indexed by their joined `"{State}-{Condition}"` form, so a
/// lookup matches whenever the joined strings are equal, however the key
/// was split.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionTable {
    entries: Vec<(TransitionKey, String)>,
    index: HashMap<String, usize>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry. An overwritten entry keeps its position.
    pub fn insert(&mut self, key: TransitionKey, next_state: impl Into<String>) {
        let next_state = next_state.into();
        let joined = key.to_string();
        match self.index.get(&joined) {
            Some(&pos) => self.entries[pos].1 = next_state,
            None => {
                self.index.insert(joined, self.entries.len());
                self.entries.push((key, next_state));
            }
        }
    }

    pub fn get(&self, state: &str, condition: &str) -> Option<&str> {
        self.index
            .get(&format!("{}{}{}", state, KEY_SEPARATOR, condition))
            .map(|&pos| self.entries[pos].1.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TransitionKey, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Parse the flat JSON object form.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ConfigurationError::InvalidJson {
                message: e.to_string(),
            })?;
        let object = match value {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(ConfigurationError::NotAnObject {
                    found: json_kind(&other),
                })
            }
        };

        let mut table = TransitionTable::new();
        for (raw_key, next) in object {
            let key = TransitionKey::parse(&raw_key)?;
            match next {
                serde_json::Value::String(next_state) if !next_state.is_empty() => {
                    table.insert(key, next_state);
                }
                _ => return Err(ConfigurationError::InvalidNextState { key: raw_key }),
            }
        }
        Ok(table)
    }

    /// Serialize to the flat JSON object form, in insertion order.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(key, next)| (key.to_string(), serde_json::Value::String(next.clone())))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ──────────────────────────────────────────────
// StateMachine
// ──────────────────────────────────────────────

/// Holds one transition table and answers transition lookups against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachine {
    table: TransitionTable,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// A machine loaded with the built-in job life cycle.
    pub fn new() -> Self {
        let mut table = TransitionTable::new();
        for (from, condition, to) in DEFAULT_TRANSITIONS {
            table.insert(TransitionKey::new(from.as_str(), condition), to.as_str());
        }
        StateMachine { table }
    }

    /// A machine whose table is parsed from `json`.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        Ok(StateMachine {
            table: TransitionTable::from_json(json)?,
        })
    }

    /// Replace the whole table with the one parsed from `json`.
    ///
    /// Entries of the previous table are not merged in. If parsing fails the
    /// previous table stays in effect.
    pub fn setup(&mut self, json: &str) -> Result<(), ConfigurationError> {
        self.table = TransitionTable::from_json(json)?;
        Ok(())
    }

    /// The table as a compact flat JSON object.
    pub fn string_representation(&self) -> String {
        self.table.to_json().to_string()
    }

    pub fn evaluate(&self, state: &str, condition: &str) -> Result<&str, TransitionNotFound> {
        self.table
            .get(state, condition)
            .ok_or_else(|| TransitionNotFound {
                state: state.to_string(),
                condition: condition.to_string(),
            })
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Every state named in the table, as a source or as a target.
    pub fn states(&self) -> BTreeSet<&str> {
        let mut states = BTreeSet::new();
        for (key, next) in self.table.iter() {
            states.insert(key.state.as_str());
            states.insert(next);
        }
        states
    }

    /// Conditions accepted in `state`, in table order.
    pub fn conditions_for(&self, state: &str) -> Vec<&str> {
        self.table
            .iter()
            .filter(|(key, _)| key.state == state)
            .map(|(key, _)| key.condition.as_str())
            .collect()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
