use chrono::Duration;
use ocp_canonical::HashAlgorithm;
use ocp_core::{FieldPath, RecordSchema};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::entry::Projection;
use crate::errors::AuditError;

/// Auditor settings. The default matches the archive's entry layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Algorithm used to reproduce semantic hashes.
    pub algorithm: HashAlgorithm,
    /// Hashing-relevant view of an entry.
    pub projection: Projection,
    /// Schema for the compliance check.
    pub compliance_schema: RecordSchema,
    /// Field holding the entry's signature.
    pub signature_field: FieldPath,
    /// Format every signature must match, verifier or not.
    pub signature_pattern: String,
    /// Field naming the signing agent.
    pub agent_field: FieldPath,
    /// Field holding the action type.
    pub action_field: FieldPath,
    /// Actions allowed to leave state unchanged.
    pub read_only_actions: Vec<String>,
    /// Field holding the digest of the state before the action.
    pub pre_state_field: FieldPath,
    /// Field holding the digest of the state after the action.
    pub post_state_field: FieldPath,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Sha256,
            projection: Projection::default(),
            compliance_schema: RecordSchema::archive_entry(),
            signature_field: "signature".into(),
            signature_pattern: r"^\S{10,}$".to_string(),
            agent_field: "agent_id".into(),
            action_field: "action_type".into(),
            read_only_actions: vec!["query".to_string(), "read".to_string()],
            pre_state_field: "pre_state_hash".into(),
            post_state_field: "post_state_hash".into(),
        }
    }
}

impl AuditConfig {
    /// True when the action may leave state unchanged.
    pub fn is_read_only(&self, action: &str) -> bool {
        self.read_only_actions.iter().any(|a| a == action)
    }
}

/// Look-back window for agent audits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditWindow {
    /// Last 7 days.
    #[serde(rename = "7d")]
    Week,
    /// Last 30 days.
    #[default]
    #[serde(rename = "30d")]
    Month,
    /// Last 90 days.
    #[serde(rename = "90d")]
    Quarter,
    /// Last 365 days.
    #[serde(rename = "1y")]
    Year,
}

impl AuditWindow {
    /// Window length.
    pub fn duration(self) -> Duration {
        Duration::days(self.days())
    }

    fn days(self) -> i64 {
        match self {
            AuditWindow::Week => 7,
            AuditWindow::Month => 30,
            AuditWindow::Quarter => 90,
            AuditWindow::Year => 365,
        }
    }

    fn name(self) -> &'static str {
        match self {
            AuditWindow::Week => "7d",
            AuditWindow::Month => "30d",
            AuditWindow::Quarter => "90d",
            AuditWindow::Year => "1y",
        }
    }
}

impl fmt::Display for AuditWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AuditWindow {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "7d" => Ok(AuditWindow::Week),
            "30d" => Ok(AuditWindow::Month),
            "90d" => Ok(AuditWindow::Quarter),
            "1y" => Ok(AuditWindow::Year),
            other => Err(AuditError::UnknownWindow(other.to_string())),
        }
    }
}
