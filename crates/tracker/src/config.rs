//! Tracker connection settings and project field mapping.

use std::time::Duration;

/// Connection and field layout of the tracker project.
///
/// Defaults carry the production project's ids; the base URL and token come
/// from the environment at the entry point.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Site URL, without the `/rest/api/2` suffix.
    pub base_url: String,
    /// Bearer token.
    pub token: String,
    pub project_id: String,
    pub issue_type: String,
    /// Custom field linking a new issue to its epic.
    pub parent_link_field: String,
    /// Multi-select custom field for applications.
    pub applications_field: String,
    /// Multi-select custom field for scopes.
    pub scopes_field: String,
    /// Request timeout; `None` keeps the HTTP client's default.
    pub timeout: Option<Duration>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            project_id: "15401".to_string(),
            issue_type: "Feature".to_string(),
            parent_link_field: "customfield_10016".to_string(),
            applications_field: "customfield_13600".to_string(),
            scopes_field: "customfield_14506".to_string(),
            timeout: None,
        }
    }
}

impl TrackerConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            ..Self::default()
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    pub fn with_issue_type(mut self, issue_type: impl Into<String>) -> Self {
        self.issue_type = issue_type.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// REST root, e.g. `https://tracker.example.com/rest/api/2`.
    pub fn api_root(&self) -> String {
        format!("{}/rest/api/2", self.base_url.trim_end_matches('/'))
    }
}
