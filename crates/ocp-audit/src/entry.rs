use ocp_canonical::{Record, Value};
use serde::{Deserialize, Serialize};

/// The hashing-relevant view of an archive entry.
///
/// Only the projected fields are hashed; storage metadata such as row ids
/// or the stored digest itself never enters the semantic hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Projection {
    /// Top-level fields copied into the projection; absent ones become null.
    pub fields: Vec<String>,
    /// Fields that default to an empty sequence when absent.
    pub sequence_fields: Vec<String>,
    /// Fields whose string value is parsed as JSON text when possible.
    pub json_text_fields: Vec<String>,
    /// Field holding the committed digest.
    pub digest_field: String,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fields: [
                "action_type",
                "agent_id",
                "content",
                "evidence_pointers",
                "constitutional_citation",
                "timestamp",
            ]
            .iter()
            .map(|f| f.to_string())
            .collect(),
            sequence_fields: vec!["evidence_pointers".to_string()],
            json_text_fields: vec!["content".to_string()],
            digest_field: "semantic_hash".to_string(),
        }
    }
}

impl Projection {
    /// Builds the projected record for an entry.
    pub fn extract(&self, entry: &Record) -> Record {
        self.fields
            .iter()
            .map(|field| (field.clone(), self.project_field(field, entry.get(field))))
            .collect()
    }

    /// The digest committed with the entry, if it holds one as text.
    pub fn stored_digest<'e>(&self, entry: &'e Record) -> Option<&'e str> {
        entry.get(&self.digest_field).and_then(Value::as_str)
    }

    fn project_field(&self, field: &str, value: Option<&Value>) -> Value {
        match value {
            None if self.sequence_fields.iter().any(|f| f == field) => Value::Seq(Vec::new()),
            None => Value::Null,
            Some(Value::String(text)) if self.json_text_fields.iter().any(|f| f == field) => {
                serde_json::from_str::<serde_json::Value>(text)
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::String(text.clone()))
            }
            Some(value) => value.clone(),
        }
    }
}
