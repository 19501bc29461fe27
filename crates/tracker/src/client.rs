//! The tracker operations the reconciler depends on.

use deck_core::FieldValue;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

/// An issue currently filed under a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIssue {
    pub key: String,
    #[serde(default)]
    pub summary: Option<String>,
}

impl RemoteIssue {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            summary: None,
        }
    }
}

/// An attachment on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub filename: String,
}

/// Issue content written on create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueFields {
    pub summary: String,
    pub description: String,
    pub applications: Vec<FieldValue>,
    pub scopes: Vec<FieldValue>,
}

/// Remote tracker operations. Every call blocks until the tracker answers.
pub trait TrackerClient {
    /// Issues filed under `parent_key`.
    fn list_issues(&self, parent_key: &str) -> Result<Vec<RemoteIssue>>;

    /// Create an issue under `parent_key` and return its new key.
    fn create_issue(&self, parent_key: &str, fields: &IssueFields) -> Result<String>;

    /// Overwrite summary, description and multi-value fields of an issue.
    fn update_issue(&self, key: &str, fields: &IssueFields) -> Result<()>;

    fn delete_issue(&self, key: &str) -> Result<()>;

    fn list_attachments(&self, key: &str) -> Result<Vec<Attachment>>;

    fn delete_attachment(&self, id: &str) -> Result<()>;

    fn upload_attachment(&self, key: &str, file_name: &str, data: Vec<u8>) -> Result<()>;
}

/// Attachment ids come back as strings, but accept bare numbers too.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
