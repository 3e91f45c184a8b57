//! Callout definitions and the payload sent to a callout endpoint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

/// When a configured callout fires relative to the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalloutType {
    Pre,
    Post,
    PreAndPost,
}

impl CalloutType {
    pub fn as_str(self) -> &'static str {
        match self {
            CalloutType::Pre => "Pre",
            CalloutType::Post => "Post",
            CalloutType::PreAndPost => "PreAndPost",
        }
    }

    /// Whether a callout of this type fires in `phase`.
    pub fn fires_in(self, phase: CalloutPhase) -> bool {
        match phase {
            CalloutPhase::Pre => matches!(self, CalloutType::Pre | CalloutType::PreAndPost),
            CalloutPhase::Post => matches!(self, CalloutType::Post | CalloutType::PreAndPost),
        }
    }
}

impl fmt::Display for CalloutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalloutType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pre" => Ok(CalloutType::Pre),
            "Post" => Ok(CalloutType::Post),
            "PreAndPost" => Ok(CalloutType::PreAndPost),
            other => Err(UnknownVariant {
                kind: "callout type",
                value: other.to_string(),
            }),
        }
    }
}

/// The point in a transition at which a callout is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalloutPhase {
    Pre,
    Post,
}

impl fmt::Display for CalloutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalloutPhase::Pre => f.write_str("pre"),
            CalloutPhase::Post => f.write_str("post"),
        }
    }
}

/// One configured callout for an entity type, optionally narrowed to a
/// single entity instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalloutDefinition {
    #[serde(default)]
    pub id: i64,
    pub callout_type: CalloutType,
    pub entity_type: String,
    /// `None` applies the callout to every instance of `entity_type`.
    #[serde(default)]
    pub entity_id: Option<String>,
    pub condition: String,
    /// Executor-specific settings, e.g. `{"callout-url": "https://..."}`.
    pub parameters: String,
    pub tenant_id: String,
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    /// ISO 8601 / RFC 3339 timestamp string.
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub modified_by: Option<String>,
    /// ISO 8601 / RFC 3339 timestamp string.
    #[serde(default)]
    pub modified: Option<String>,
}

impl CalloutDefinition {
    /// Whether this definition is attached to the given transition attempt.
    pub fn applies_to(
        &self,
        tenant_id: &str,
        entity_type: &str,
        entity_id: &str,
        condition: &str,
    ) -> bool {
        self.tenant_id == tenant_id
            && self.entity_type == entity_type
            && self.condition == condition
            && self.entity_id.as_deref().map_or(true, |id| id == entity_id)
    }
}

/// Payload posted to a callout endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalloutData {
    pub phase: CalloutPhase,
    pub entity_uri: String,
    pub entity_type: String,
    pub entity_id: String,
    pub condition: String,
    pub from_state: String,
    /// Only known once the transition has been evaluated, so only post
    /// callouts carry it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_state: Option<String>,
    pub user: String,
    pub tenant_id: String,
    /// The entity representation as fetched before the transition.
    pub entity: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(entity_id: Option<&str>) -> CalloutDefinition {
        CalloutDefinition {
            id: 1,
            callout_type: CalloutType::Pre,
            entity_type: "Job".into(),
            entity_id: entity_id.map(str::to_string),
            condition: "Continue".into(),
            parameters: r#"{"callout-url":"http://localhost/hook"}"#.into(),
            tenant_id: "tenant-a".into(),
            tid: None,
            created_by: None,
            created: None,
            modified_by: None,
            modified: None,
        }
    }

    #[test]
    fn type_fires_in_matching_phases() {
        assert!(CalloutType::Pre.fires_in(CalloutPhase::Pre));
        assert!(!CalloutType::Pre.fires_in(CalloutPhase::Post));
        assert!(!CalloutType::Post.fires_in(CalloutPhase::Pre));
        assert!(CalloutType::Post.fires_in(CalloutPhase::Post));
        assert!(CalloutType::PreAndPost.fires_in(CalloutPhase::Pre));
        assert!(CalloutType::PreAndPost.fires_in(CalloutPhase::Post));
    }

    #[test]
    fn callout_type_parse_rejects_unknown() {
        assert_eq!("PreAndPost".parse::<CalloutType>().unwrap(), CalloutType::PreAndPost);
        assert!("Before".parse::<CalloutType>().is_err());
    }

    #[test]
    fn type_wide_definition_applies_to_every_instance() {
        let def = definition(None);
        assert!(def.applies_to("tenant-a", "Job", "1", "Continue"));
        assert!(def.applies_to("tenant-a", "Job", "2", "Continue"));
        assert!(!def.applies_to("tenant-b", "Job", "1", "Continue"));
        assert!(!def.applies_to("tenant-a", "Order", "1", "Continue"));
        assert!(!def.applies_to("tenant-a", "Job", "1", "Cancel"));
    }

    #[test]
    fn instance_definition_applies_to_that_instance_only() {
        let def = definition(Some("1"));
        assert!(def.applies_to("tenant-a", "Job", "1", "Continue"));
        assert!(!def.applies_to("tenant-a", "Job", "2", "Continue"));
    }

    #[test]
    fn definition_requires_type_condition_and_tenant() {
        let missing_tenant = r#"{"callout_type":"Pre","entity_type":"Job","condition":"Continue","parameters":"{}"}"#;
        assert!(serde_json::from_str::<CalloutDefinition>(missing_tenant).is_err());

        let unknown_type = r#"{"callout_type":"Before","entity_type":"Job","condition":"Continue","parameters":"{}","tenant_id":"t"}"#;
        assert!(serde_json::from_str::<CalloutDefinition>(unknown_type).is_err());

        let minimal = r#"{"callout_type":"Post","entity_type":"Job","condition":"Continue","parameters":"{}","tenant_id":"t"}"#;
        let def: CalloutDefinition = serde_json::from_str(minimal).unwrap();
        assert_eq!(def.callout_type, CalloutType::Post);
        assert_eq!(def.entity_id, None);
    }

    #[test]
    fn pre_payload_omits_to_state() {
        let data = CalloutData {
            phase: CalloutPhase::Pre,
            entity_uri: "http://host/Jobs(1)".into(),
            entity_type: "Job".into(),
            entity_id: "1".into(),
            condition: "Continue".into(),
            from_state: "Created".into(),
            to_state: None,
            user: "alice".into(),
            tenant_id: "tenant-a".into(),
            entity: serde_json::json!({"state": "Created"}),
        };
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["phase"], "pre");
        assert!(value.get("to_state").is_none());
    }
}
