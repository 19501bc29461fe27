//! Key-based reconciliation of change records against a tracker epic.
//!
//! Planning is a pure function of the remote snapshot and the change list.
//! Execution runs each intent on its own so one failing record never stops
//! the others, then syncs image attachments for the records that succeeded.

use std::collections::HashSet;
use std::fs;

use deck_core::{ChangeRecord, ImageArtifact, ReconciliationResult};

use crate::client::{IssueFields, RemoteIssue, TrackerClient};
use crate::error::Result;

/// Reconciliation policy switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// Delete issues under the parent that no change record refers to.
    /// Off by default: a stale match must never destroy tracker data.
    pub prune_stale: bool,
}

/// One remote mutation to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Delete { key: String },
    Update { key: String, change: ChangeRecord },
    Create { change: ChangeRecord },
}

/// Mutations derived from a snapshot, in execution order (deletes first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Issues under the parent when the snapshot was taken.
    pub existing: usize,
    pub intents: Vec<Intent>,
}

/// Terminal state of one intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created { key: String, number: String },
    CreateFailed { number: String, error: String },
    Updated { key: String, number: String },
    UpdateFailed { key: String, number: String, error: String },
    Deleted { key: String },
    DeleteFailed { key: String, error: String },
}

impl Outcome {
    /// Issue key and feature number of a successful create or update.
    pub fn synced_issue(&self) -> Option<(&str, &str)> {
        match self {
            Self::Created { key, number } | Self::Updated { key, number } => {
                Some((key.as_str(), number.as_str()))
            }
            _ => None,
        }
    }
}

/// Result of uploading one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentOutcome {
    pub key: String,
    pub file_name: String,
    /// Error message when the upload failed.
    pub error: Option<String>,
}

/// Everything a reconciliation run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub result: ReconciliationResult,
    pub outcomes: Vec<Outcome>,
    pub attachments: Vec<AttachmentOutcome>,
}

/// Split the change list into updates (key already under the parent) and
/// creates (empty or unknown key). Keys match by exact string equality.
pub fn plan(
    snapshot: &[RemoteIssue],
    changes: &[ChangeRecord],
    policy: ReconcilePolicy,
) -> ReconciliationPlan {
    let existing: HashSet<&str> = snapshot.iter().map(|issue| issue.key.as_str()).collect();
    let mut intents = Vec::new();

    if policy.prune_stale {
        let wanted: HashSet<&str> = changes.iter().map(|c| c.tracker_key.as_str()).collect();
        intents.extend(
            snapshot
                .iter()
                .filter(|issue| !wanted.contains(issue.key.as_str()))
                .map(|issue| Intent::Delete {
                    key: issue.key.clone(),
                }),
        );
    }

    for change in changes {
        if existing.contains(change.tracker_key.as_str()) {
            intents.push(Intent::Update {
                key: change.tracker_key.clone(),
                change: change.clone(),
            });
        } else {
            intents.push(Intent::Create {
                change: change.clone(),
            });
        }
    }

    ReconciliationPlan {
        existing: snapshot.len(),
        intents,
    }
}

/// Fold outcomes into counts. Failed intents count nowhere.
pub fn summarize(existing: usize, outcomes: &[Outcome]) -> ReconciliationResult {
    let mut result = ReconciliationResult::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Created { .. } => result.created += 1,
            Outcome::Updated { .. } => result.updated += 1,
            Outcome::Deleted { .. } => result.deleted += 1,
            _ => {}
        }
    }
    result.total_after = (existing + result.created).saturating_sub(result.deleted);
    result
}

/// Executes reconciliation plans against a tracker.
pub struct Reconciler<'a> {
    client: &'a dyn TrackerClient,
    policy: ReconcilePolicy,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a dyn TrackerClient) -> Self {
        Self {
            client,
            policy: ReconcilePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Mirror `changes` onto the issues under `parent_key` and attach the
    /// matching artifacts. Only the initial listing can fail the whole run.
    pub fn reconcile(
        &self,
        parent_key: &str,
        changes: &[ChangeRecord],
        artifacts: &[ImageArtifact],
    ) -> Result<ReconciliationReport> {
        let snapshot = self.client.list_issues(parent_key)?;
        log::debug!("{} issues under {}", snapshot.len(), parent_key);

        let plan = plan(&snapshot, changes, self.policy);
        let outcomes = self.execute(parent_key, &plan);

        let mut attachments = Vec::new();
        for (key, number) in outcomes.iter().filter_map(Outcome::synced_issue) {
            attachments.extend(self.sync_attachments(key, number, artifacts));
        }

        Ok(ReconciliationReport {
            result: summarize(plan.existing, &outcomes),
            outcomes,
            attachments,
        })
    }

    /// Run every intent, isolating failures per intent.
    pub fn execute(&self, parent_key: &str, plan: &ReconciliationPlan) -> Vec<Outcome> {
        plan.intents
            .iter()
            .map(|intent| match intent {
                Intent::Delete { key } => match self.client.delete_issue(key) {
                    Ok(()) => Outcome::Deleted { key: key.clone() },
                    Err(e) => {
                        log::warn!("Error deleting {} issue. {}", key, e);
                        Outcome::DeleteFailed {
                            key: key.clone(),
                            error: e.to_string(),
                        }
                    }
                },
                Intent::Update { key, change } => {
                    match self.client.update_issue(key, &issue_fields(change)) {
                        Ok(()) => Outcome::Updated {
                            key: key.clone(),
                            number: change.number.clone(),
                        },
                        Err(e) => {
                            log::warn!("Error updating {} issue. {}", key, e);
                            Outcome::UpdateFailed {
                                key: key.clone(),
                                number: change.number.clone(),
                                error: e.to_string(),
                            }
                        }
                    }
                }
                Intent::Create { change } => {
                    match self.client.create_issue(parent_key, &issue_fields(change)) {
                        Ok(key) => Outcome::Created {
                            key,
                            number: change.number.clone(),
                        },
                        Err(e) => {
                            log::warn!("Error creating {} issue. {}", change.number, e);
                            Outcome::CreateFailed {
                                number: change.number.clone(),
                                error: e.to_string(),
                            }
                        }
                    }
                }
            })
            .collect()
    }

    /// Upload every PNG artifact named `{number}_...` to the issue.
    ///
    /// An existing attachment with the same file name is deleted before the
    /// upload, so re-running never leaves duplicates.
    pub fn sync_attachments(
        &self,
        key: &str,
        number: &str,
        artifacts: &[ImageArtifact],
    ) -> Vec<AttachmentOutcome> {
        if number.is_empty() {
            return Vec::new();
        }

        let prefix = format!("{}_", number);
        artifacts
            .iter()
            .map(|artifact| (artifact, artifact.file_name()))
            .filter(|(_, name)| name.starts_with(&prefix) && name.to_lowercase().ends_with(".png"))
            .map(|(artifact, file_name)| {
                let error = match self.replace_attachment(key, &file_name, artifact) {
                    Ok(()) => {
                        log::info!("Uploaded attachment {} to issue {}", file_name, key);
                        None
                    }
                    Err(e) => {
                        log::warn!("Failed to upload {} to issue {}: {}", file_name, key, e);
                        Some(e.to_string())
                    }
                };
                AttachmentOutcome {
                    key: key.to_string(),
                    file_name,
                    error,
                }
            })
            .collect()
    }

    fn replace_attachment(&self, key: &str, file_name: &str, artifact: &ImageArtifact) -> Result<()> {
        let data = fs::read(&artifact.path)?;

        for existing in self.client.list_attachments(key)? {
            if existing.filename == file_name {
                self.client.delete_attachment(&existing.id)?;
                log::debug!(
                    "Deleted existing attachment '{}' (id {}) from issue {}",
                    file_name,
                    existing.id,
                    key
                );
            }
        }

        self.client.upload_attachment(key, file_name, data)
    }
}

fn issue_fields(change: &ChangeRecord) -> IssueFields {
    IssueFields {
        summary: change.issue_summary(),
        description: change.description.clone(),
        applications: change.applications.to_field_values(),
        scopes: change.scopes.to_field_values(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeTracker;
    use deck_core::{ArtifactRole, MultiValue};
    use std::path::Path;

    const EPIC: &str = "EPIC-1";

    fn change(tracker_key: &str, number: &str) -> ChangeRecord {
        ChangeRecord {
            tracker_key: tracker_key.to_string(),
            number: number.to_string(),
            summary: format!("Feature {}", number),
            description: "desc".to_string(),
            applications: MultiValue::from("Acoustic, PF Data"),
            scopes: MultiValue::List(vec!["Scope A".to_string()]),
        }
    }

    fn artifact(dir: &Path, number: &str, role: ArtifactRole, slide: usize) -> ImageArtifact {
        let mut artifact = ImageArtifact {
            feature_number: number.to_string(),
            role,
            slide,
            path: Default::default(),
        };
        artifact.path = dir.join(artifact.file_name());
        fs::write(&artifact.path, b"png").unwrap();
        artifact
    }

    #[test]
    fn test_plan_partitions_by_existing_key() {
        let snapshot = vec![RemoteIssue::new("K1"), RemoteIssue::new("K2")];
        let changes = vec![change("K1", "F1"), change("", "F2"), change("K9", "F3")];

        let plan = plan(&snapshot, &changes, ReconcilePolicy::default());
        assert_eq!(plan.existing, 2);
        assert_eq!(
            plan.intents,
            vec![
                Intent::Update {
                    key: "K1".to_string(),
                    change: changes[0].clone()
                },
                Intent::Create {
                    change: changes[1].clone()
                },
                Intent::Create {
                    change: changes[2].clone()
                },
            ]
        );
    }

    #[test]
    fn test_plan_prunes_only_when_enabled() {
        let snapshot = vec![RemoteIssue::new("K1"), RemoteIssue::new("K2")];
        let changes = vec![change("K1", "F1")];

        let kept = plan(&snapshot, &changes, ReconcilePolicy::default());
        assert!(!kept.intents.iter().any(|i| matches!(i, Intent::Delete { .. })));

        let pruned = plan(&snapshot, &changes, ReconcilePolicy { prune_stale: true });
        assert_eq!(
            pruned.intents[0],
            Intent::Delete {
                key: "K2".to_string()
            }
        );
        assert_eq!(pruned.intents.len(), 2);
    }

    #[test]
    fn test_summarize_counts() {
        let outcomes = vec![
            Outcome::Created {
                key: "K3".into(),
                number: "F3".into(),
            },
            Outcome::Updated {
                key: "K1".into(),
                number: "F1".into(),
            },
            Outcome::UpdateFailed {
                key: "K2".into(),
                number: "F2".into(),
                error: "boom".into(),
            },
            Outcome::CreateFailed {
                number: "F4".into(),
                error: "boom".into(),
            },
        ];

        assert_eq!(
            summarize(2, &outcomes),
            ReconciliationResult {
                created: 1,
                updated: 1,
                deleted: 0,
                total_after: 3
            }
        );
    }

    #[test]
    fn test_existing_key_is_updated() {
        let tracker = FakeTracker::new().with_issue(EPIC, "K1", "old");
        let report = Reconciler::new(&tracker)
            .reconcile(EPIC, &[change("K1", "F1")], &[])
            .unwrap();

        assert_eq!(report.result.updated, 1);
        assert_eq!(report.result.created, 0);
        assert_eq!(report.result.total_after, 1);

        let issue = tracker.issue("K1").unwrap();
        assert_eq!(issue.fields.summary, "F1 - Feature F1");
        assert_eq!(issue.fields.applications.len(), 2);
    }

    #[test]
    fn test_unknown_key_is_created() {
        let tracker = FakeTracker::new().with_issue(EPIC, "K1", "old");
        let report = Reconciler::new(&tracker)
            .reconcile(EPIC, &[change("K404", "F2")], &[])
            .unwrap();

        assert_eq!(report.result.created, 1);
        assert_eq!(report.result.updated, 0);
        assert_eq!(report.result.total_after, 2);
        assert_eq!(tracker.issue_keys(EPIC).len(), 2);
    }

    #[test]
    fn test_failures_do_not_stop_later_records() {
        let tracker = FakeTracker::new()
            .with_issue(EPIC, "K1", "old")
            .with_issue(EPIC, "K2", "old")
            .fail_update("K1")
            .fail_create("F3");

        let changes = vec![
            change("K1", "F1"),
            change("", "F3"),
            change("K2", "F2"),
            change("", "F4"),
        ];
        let report = Reconciler::new(&tracker).reconcile(EPIC, &changes, &[]).unwrap();

        assert_eq!(report.result.updated, 1);
        assert_eq!(report.result.created, 1);
        assert!(matches!(report.outcomes[0], Outcome::UpdateFailed { .. }));
        assert!(matches!(report.outcomes[1], Outcome::CreateFailed { .. }));
        assert!(matches!(report.outcomes[3], Outcome::Created { .. }));
    }

    #[test]
    fn test_attachments_follow_successful_records_only() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = vec![
            artifact(dir.path(), "F1", ArtifactRole::Impact, 10),
            artifact(dir.path(), "F1", ArtifactRole::Architecture, 12),
            artifact(dir.path(), "F2", ArtifactRole::Impact, 11),
        ];
        let tracker = FakeTracker::new()
            .with_issue(EPIC, "K1", "old")
            .with_issue(EPIC, "K2", "old")
            .fail_update("K2");

        let report = Reconciler::new(&tracker)
            .reconcile(EPIC, &[change("K1", "F1"), change("K2", "F2")], &artifacts)
            .unwrap();

        assert_eq!(report.attachments.len(), 2);
        assert!(report.attachments.iter().all(|a| a.error.is_none()));
        assert_eq!(
            tracker.attachment_names("K1"),
            vec!["F1_architecture_slide12.png", "F1_impact_slide10.png"]
        );
        assert!(tracker.attachment_names("K2").is_empty());
    }

    #[test]
    fn test_attachments_match_whole_feature_number() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = vec![
            artifact(dir.path(), "F1", ArtifactRole::Impact, 10),
            artifact(dir.path(), "F10", ArtifactRole::Impact, 11),
        ];
        let tracker = FakeTracker::new().with_issue(EPIC, "K1", "old");

        Reconciler::new(&tracker)
            .reconcile(EPIC, &[change("K1", "F1")], &artifacts)
            .unwrap();

        assert_eq!(tracker.attachment_names("K1"), vec!["F1_impact_slide10.png"]);
    }

    #[test]
    fn test_rerun_replaces_attachments_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = vec![artifact(dir.path(), "F1", ArtifactRole::Impact, 10)];
        let tracker = FakeTracker::new().with_issue(EPIC, "K1", "old");
        let reconciler = Reconciler::new(&tracker);

        reconciler.reconcile(EPIC, &[change("K1", "F1")], &artifacts).unwrap();
        reconciler.reconcile(EPIC, &[change("K1", "F1")], &artifacts).unwrap();

        assert_eq!(tracker.attachment_names("K1"), vec!["F1_impact_slide10.png"]);
    }

    #[test]
    fn test_attachment_failure_keeps_issue_update() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = vec![
            artifact(dir.path(), "F1", ArtifactRole::Impact, 10),
            artifact(dir.path(), "F1", ArtifactRole::Impact, 11),
        ];
        let tracker = FakeTracker::new()
            .with_issue(EPIC, "K1", "old")
            .fail_upload("F1_impact_slide10.png");

        let report = Reconciler::new(&tracker)
            .reconcile(EPIC, &[change("K1", "F1")], &artifacts)
            .unwrap();

        assert_eq!(report.result.updated, 1);
        assert!(report.attachments[0].error.is_some());
        assert!(report.attachments[1].error.is_none());
        assert_eq!(tracker.attachment_names("K1"), vec!["F1_impact_slide11.png"]);
    }

    #[test]
    fn test_prune_policy_deletes_stale_issues() {
        let tracker = FakeTracker::new()
            .with_issue(EPIC, "K1", "old")
            .with_issue(EPIC, "K2", "stale");

        let report = Reconciler::new(&tracker)
            .with_policy(ReconcilePolicy { prune_stale: true })
            .reconcile(EPIC, &[change("K1", "F1")], &[])
            .unwrap();

        assert_eq!(report.result.deleted, 1);
        assert_eq!(report.result.total_after, 1);
        assert!(tracker.issue("K2").is_none());
    }

    #[test]
    fn test_default_policy_never_deletes() {
        let tracker = FakeTracker::new()
            .with_issue(EPIC, "K1", "old")
            .with_issue(EPIC, "K2", "stale");

        let report = Reconciler::new(&tracker)
            .reconcile(EPIC, &[change("K1", "F1")], &[])
            .unwrap();

        assert_eq!(report.result.deleted, 0);
        assert!(tracker.issue("K2").is_some());
    }

    #[test]
    fn test_listing_failure_fails_the_run() {
        let tracker = FakeTracker::new().fail_listing();
        assert!(Reconciler::new(&tracker)
            .reconcile(EPIC, &[change("", "F1")], &[])
            .is_err());
    }
}
