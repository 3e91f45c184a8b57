/// A transition table document that could not be turned into a table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// The document is not valid JSON.
    #[error("state machine configuration is not valid JSON: {message}")]
    InvalidJson { message: String },

    /// The document parsed, but is not a flat JSON object.
    #[error("state machine configuration must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    /// A key is not of the form `{State}-{Condition}` with both parts non-empty.
    #[error("invalid transition key '{key}': expected \"{{State}}-{{Condition}}\"")]
    InvalidKey { key: String },

    /// A value is not a non-empty string.
    #[error("transition '{key}' must map to a non-empty state name")]
    InvalidNextState { key: String },
}

/// No table entry exists for the `(state, condition)` pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no transition from state '{state}' on condition '{condition}'")]
pub struct TransitionNotFound {
    pub state: String,
    pub condition: String,
}

/// An entity URI from which no entity could be identified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityUriError {
    #[error("entity uri must not be empty")]
    Empty,

    #[error("cannot derive an entity id from uri '{uri}'")]
    MissingEntityId { uri: String },
}

/// A string that does not name a known enumeration member.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
