//! In-memory tracker for tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

use crate::client::{Attachment, IssueFields, RemoteIssue, TrackerClient};
use crate::error::{Result, TrackerError};

/// An issue held by [`FakeTracker`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeIssue {
    pub parent: String,
    pub fields: IssueFields,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Default)]
struct State {
    issues: BTreeMap<String, FakeIssue>,
    next_id: usize,
}

/// Tracker double with scripted failures.
///
/// Created issues get keys `FAKE-<n>`. Failures are keyed by
/// issue key (updates), by feature-number prefix of the summary (creates),
/// or by file name (uploads).
#[derive(Debug, Default)]
pub struct FakeTracker {
    state: RefCell<State>,
    failing_updates: HashSet<String>,
    failing_creates: HashSet<String>,
    failing_uploads: HashSet<String>,
    failing_listing: bool,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issue(self, parent: &str, key: &str, summary: &str) -> Self {
        self.state.borrow_mut().issues.insert(
            key.to_string(),
            FakeIssue {
                parent: parent.to_string(),
                fields: IssueFields {
                    summary: summary.to_string(),
                    ..Default::default()
                },
                attachments: Vec::new(),
            },
        );
        self
    }

    pub fn fail_update(mut self, key: &str) -> Self {
        self.failing_updates.insert(key.to_string());
        self
    }

    /// Fail creates whose summary starts with `number`.
    pub fn fail_create(mut self, number: &str) -> Self {
        self.failing_creates.insert(number.to_string());
        self
    }

    pub fn fail_upload(mut self, file_name: &str) -> Self {
        self.failing_uploads.insert(file_name.to_string());
        self
    }

    pub fn fail_listing(mut self) -> Self {
        self.failing_listing = true;
        self
    }

    pub fn issue(&self, key: &str) -> Option<FakeIssue> {
        self.state.borrow().issues.get(key).cloned()
    }

    pub fn issue_keys(&self, parent: &str) -> Vec<String> {
        self.state
            .borrow()
            .issues
            .iter()
            .filter(|(_, issue)| issue.parent == parent)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Attachment file names on an issue, sorted.
    pub fn attachment_names(&self, key: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .issue(key)
            .map(|issue| issue.attachments.into_iter().map(|a| a.filename).collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    fn rejected(what: &str) -> TrackerError {
        TrackerError::Status {
            status: 400,
            url: format!("fake://{}", what),
            body: "rejected".to_string(),
        }
    }

    fn not_found(key: &str) -> TrackerError {
        TrackerError::Status {
            status: 404,
            url: format!("fake://issue/{}", key),
            body: "Issue does not exist".to_string(),
        }
    }
}

impl TrackerClient for FakeTracker {
    fn list_issues(&self, parent_key: &str) -> Result<Vec<RemoteIssue>> {
        if self.failing_listing {
            return Err(TrackerError::Transport("connection refused".to_string()));
        }
        let state = self.state.borrow();
        Ok(state
            .issues
            .iter()
            .filter(|(_, issue)| issue.parent == parent_key)
            .map(|(key, issue)| RemoteIssue {
                key: key.clone(),
                summary: Some(issue.fields.summary.clone()),
            })
            .collect())
    }

    fn create_issue(&self, parent_key: &str, fields: &IssueFields) -> Result<String> {
        if self
            .failing_creates
            .iter()
            .any(|number| fields.summary.starts_with(number.as_str()))
        {
            return Err(Self::rejected("issue"));
        }

        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let key = format!("FAKE-{}", state.next_id);
        state.issues.insert(
            key.clone(),
            FakeIssue {
                parent: parent_key.to_string(),
                fields: fields.clone(),
                attachments: Vec::new(),
            },
        );
        Ok(key)
    }

    fn update_issue(&self, key: &str, fields: &IssueFields) -> Result<()> {
        if self.failing_updates.contains(key) {
            return Err(Self::rejected(key));
        }
        let mut state = self.state.borrow_mut();
        let issue = state.issues.get_mut(key).ok_or_else(|| Self::not_found(key))?;
        issue.fields = fields.clone();
        Ok(())
    }

    fn delete_issue(&self, key: &str) -> Result<()> {
        self.state
            .borrow_mut()
            .issues
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(key))
    }

    fn list_attachments(&self, key: &str) -> Result<Vec<Attachment>> {
        self.issue(key)
            .map(|issue| issue.attachments)
            .ok_or_else(|| Self::not_found(key))
    }

    fn delete_attachment(&self, id: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        for issue in state.issues.values_mut() {
            issue.attachments.retain(|a| a.id != id);
        }
        Ok(())
    }

    fn upload_attachment(&self, key: &str, file_name: &str, _data: Vec<u8>) -> Result<()> {
        if self.failing_uploads.contains(file_name) {
            return Err(Self::rejected(file_name));
        }
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = (10_000 + state.next_id).to_string();
        let issue = state.issues.get_mut(key).ok_or_else(|| Self::not_found(key))?;
        issue.attachments.push(Attachment {
            id,
            filename: file_name.to_string(),
        });
        Ok(())
    }
}
