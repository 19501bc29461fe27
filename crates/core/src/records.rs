//! Records extracted from a deck and exchanged with the tracker.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

use crate::table::{TableRecord, TableRow};

/// One row of a functionality table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Human-assigned feature number, e.g. `E69F02`.
    #[serde(rename = "Numéro")]
    pub number: String,

    /// Tracker issue key; empty until the issue exists.
    #[serde(rename = "ID Jira", default)]
    pub tracker_key: String,

    #[serde(rename = "Nom")]
    pub title: String,

    #[serde(rename = "Hypothèses de bénéfices", default)]
    pub benefit_hypotheses: String,

    #[serde(rename = "Critères d’acceptance", default)]
    pub acceptance_criteria: String,

    #[serde(rename = "Sizing SI (PI)", default)]
    pub sizing: String,
}

impl FeatureRecord {
    /// The tracker key, if one has been assigned.
    pub fn tracker_key(&self) -> Option<&str> {
        Some(self.tracker_key.as_str()).filter(|k| !k.is_empty())
    }
}

impl TableRecord for FeatureRecord {
    const COLUMNS: &'static [&'static str] = &[
        "Numéro",
        "ID Jira",
        "Nom",
        "Hypothèses de bénéfices",
        "Critères d’acceptance",
        "Sizing SI (PI)",
    ];

    fn from_row(row: TableRow, _slide: usize) -> Self {
        Self {
            number: row.get("Numéro").to_string(),
            tracker_key: row.get("ID Jira").to_string(),
            title: row.get("Nom").to_string(),
            benefit_hypotheses: row.get("Hypothèses de bénéfices").to_string(),
            acceptance_criteria: row.get("Critères d’acceptance").to_string(),
            sizing: row.get("Sizing SI (PI)").to_string(),
        }
    }
}

/// One row of a scope table. Several rows may share a feature number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRecord {
    #[serde(rename = "Numéro")]
    pub number: String,

    #[serde(rename = "Scopes", default)]
    pub scope_label: String,

    /// Raw comma-delimited application names.
    #[serde(rename = "Applications", default)]
    pub applications: String,

    #[serde(rename = "Referents", default)]
    pub referents: String,

    /// Raw two-line `Impacts: ...` / `Architectures: ...` field.
    #[serde(rename = "Impacts / Architecture", default)]
    pub impacts_architecture_text: String,

    /// Slide the row was read from.
    pub source_slide: usize,
}

impl ScopeRecord {
    /// Application names split on commas, trimmed, empties dropped.
    pub fn application_names(&self) -> Vec<String> {
        split_tokens(&self.applications)
    }
}

impl TableRecord for ScopeRecord {
    const COLUMNS: &'static [&'static str] = &[
        "Numéro",
        "Scopes",
        "Applications",
        "Referents",
        "Impacts / Architecture",
    ];

    fn from_row(row: TableRow, slide: usize) -> Self {
        Self {
            number: row.get("Numéro").to_string(),
            scope_label: row.get("Scopes").to_string(),
            applications: row.get("Applications").to_string(),
            referents: row.get("Referents").to_string(),
            impacts_architecture_text: row.get("Impacts / Architecture").to_string(),
            source_slide: slide,
        }
    }
}

/// Slides referenced by one feature, folded across all of its scope rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationRecord {
    #[serde(rename = "Numéro")]
    pub number: String,

    /// Ascending, deduplicated.
    #[serde(rename = "Impacts:")]
    pub impact_slides: Vec<usize>,

    /// Ascending, deduplicated.
    #[serde(rename = "Architectures:")]
    pub architecture_slides: Vec<usize>,
}

/// Which diagram list a slide image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactRole {
    Impact,
    Architecture,
}

impl ArtifactRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Impact => "impact",
            Self::Architecture => "architecture",
        }
    }
}

impl fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rendered slide image for one (feature, role, slide) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageArtifact {
    pub feature_number: String,
    pub role: ArtifactRole,
    pub slide: usize,
    /// Location of the PNG inside the run's scratch directory.
    pub path: PathBuf,
}

impl ImageArtifact {
    /// File name used both on disk and as the tracker attachment name.
    pub fn file_name(&self) -> String {
        artifact_file_name(&self.feature_number, self.role, self.slide)
    }
}

/// `{number}_{role}_slide{slide}.png`; downstream descriptions reference this exact name.
pub fn artifact_file_name(feature_number: &str, role: ArtifactRole, slide: usize) -> String {
    format!("{}_{}_slide{}.png", feature_number, role, slide)
}

/// A value for a multi-select tracker field: a comma-separated string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MultiValue {
    #[serde(deserialize_with = "scalar_list")]
    List(Vec<String>),
    Text(String),
    Empty,
}

impl Default for MultiValue {
    fn default() -> Self {
        Self::Empty
    }
}

impl MultiValue {
    /// Normalize into single-key value objects, keeping token order.
    pub fn to_field_values(&self) -> Vec<FieldValue> {
        let tokens = match self {
            Self::List(items) => items
                .iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
            Self::Text(text) => split_tokens(text),
            Self::Empty => Vec::new(),
        };

        tokens.into_iter().map(FieldValue::new).collect()
    }
}

/// Generated lists sometimes mix in numbers or booleans; keep them as text, drop nulls.
fn scalar_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Vec::<Value>::deserialize(deserializer)?;
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Null => None,
            Value::String(text) => Some(text),
            other => Some(other.to_string()),
        })
        .collect())
}

impl From<&str> for MultiValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<String>> for MultiValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

/// `{"value": "..."}` option object expected by multi-select custom fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: String,
}

impl FieldValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// One desired tracker issue state, as produced by the text-generation step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Existing tracker key; empty means "create".
    #[serde(rename = "jiraID", alias = "trackerKey", default)]
    pub tracker_key: String,

    /// Feature number, the join key back to image artifacts.
    #[serde(rename = "Numéro", alias = "number", default)]
    pub number: String,

    #[serde(default)]
    pub summary: String,

    /// Pre-formatted wiki markup.
    #[serde(rename = "Description", alias = "description", default)]
    pub description: String,

    #[serde(rename = "customfield_13600", alias = "applicationsRaw", default)]
    pub applications: MultiValue,

    #[serde(rename = "customfield_14506", alias = "scopesRaw", default)]
    pub scopes: MultiValue,
}

impl ChangeRecord {
    /// Issue summary as filed in the tracker: `{number} - {summary}`.
    pub fn issue_summary(&self) -> String {
        format!("{} - {}", self.number, self.summary)
    }
}

/// Aggregate counts for one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    #[serde(rename = "total_in_epic_after")]
    pub total_after: usize,
}

fn split_tokens(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(items: &[&str]) -> Vec<FieldValue> {
        items.iter().map(|v| FieldValue::new(*v)).collect()
    }

    #[test]
    fn test_multi_value_from_text_and_list() {
        let expected = values(&["Acoustic", "PF Data"]);

        assert_eq!(MultiValue::from("Acoustic, PF Data").to_field_values(), expected);
        assert_eq!(
            MultiValue::from(vec!["Acoustic".to_string(), "PF Data".to_string()]).to_field_values(),
            expected
        );
    }

    #[test]
    fn test_multi_value_drops_empty_tokens() {
        assert!(MultiValue::from("").to_field_values().is_empty());
        assert!(MultiValue::from("  ,  , ").to_field_values().is_empty());
        assert!(MultiValue::Empty.to_field_values().is_empty());
        assert_eq!(
            MultiValue::List(vec![" A ".into(), "".into(), "B".into()]).to_field_values(),
            values(&["A", "B"])
        );
    }

    #[test]
    fn test_field_value_json_shape() {
        let json = serde_json::to_value(MultiValue::from("Acoustic").to_field_values()).unwrap();
        assert_eq!(json, serde_json::json!([{ "value": "Acoustic" }]));
    }

    #[test]
    fn test_change_record_from_generated_json() {
        let json = r#"{
            "Numéro": "E69F02",
            "jiraID": "PRJ-12",
            "summary": "Noise map",
            "Description": "{panel}...{panel}",
            "customfield_13600": "Acoustic, PF Data",
            "customfield_14506": ["Scope A"]
        }"#;
        let record: ChangeRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.number, "E69F02");
        assert_eq!(record.tracker_key, "PRJ-12");
        assert_eq!(record.issue_summary(), "E69F02 - Noise map");
        assert_eq!(record.applications.to_field_values().len(), 2);
        assert_eq!(record.scopes.to_field_values(), values(&["Scope A"]));
    }

    #[test]
    fn test_change_record_with_mixed_list_items() {
        let json = r#"{ "number": "F1", "customfield_13600": ["A", 1, true, null], "customfield_14506": [2.5] }"#;
        let record: ChangeRecord = serde_json::from_str(json).unwrap();

        assert_eq!(
            record.applications,
            MultiValue::List(vec!["A".to_string(), "1".to_string(), "true".to_string()])
        );
        assert_eq!(record.applications.to_field_values(), values(&["A", "1", "true"]));
        assert_eq!(record.scopes.to_field_values(), values(&["2.5"]));
    }

    #[test]
    fn test_change_record_tolerates_missing_and_null_fields() {
        let json = r#"{ "number": "F1", "summary": "x", "customfield_13600": null }"#;
        let record: ChangeRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.tracker_key, "");
        assert_eq!(record.applications, MultiValue::Empty);
        assert_eq!(record.scopes, MultiValue::Empty);
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(
            artifact_file_name("E69F02", ArtifactRole::Impact, 10),
            "E69F02_impact_slide10.png"
        );
        assert_eq!(
            artifact_file_name("E69F02", ArtifactRole::Architecture, 3),
            "E69F02_architecture_slide3.png"
        );
    }

    #[test]
    fn test_reconciliation_result_json_keys() {
        let result = ReconciliationResult {
            created: 1,
            updated: 2,
            deleted: 0,
            total_after: 5,
        };
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "created": 1, "updated": 2, "deleted": 0, "total_in_epic_after": 5 })
        );
    }
}
