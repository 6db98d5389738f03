//! Insight template records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

/// A spending insight loaded from the backend.
///
/// `condition_type` names one of the evaluator's condition functions and
/// `parameters` carries its thresholds. The message template is returned
/// unrendered together with the data the condition produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: Uuid,
    pub name: String,
    pub condition_type: String,
    #[serde(default)]
    pub parameters: Map<String, JsonValue>,
    pub message_template: String,
    #[serde(default)]
    pub priority: i32,
    pub is_active: bool,
}

impl Insight {
    pub fn new(name: impl Into<String>, condition_type: impl Into<String>, message_template: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            condition_type: condition_type.into(),
            parameters: Map::new(),
            message_template: message_template.into(),
            priority: 0,
            is_active: true,
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Numeric parameter, accepting numbers or numeric strings
    pub fn number_param(&self, key: &str) -> Option<f64> {
        match self.parameters.get(key)? {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn string_param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key)?.as_str()
    }
}
