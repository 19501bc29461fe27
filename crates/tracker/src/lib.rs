//! Issue tracker integration.
//!
//! [`TrackerClient`] is the seam to the remote tracker; [`JiraClient`] talks
//! to the REST API and [`Reconciler`] mirrors a list of change records onto
//! the issues filed under a parent epic.

pub mod client;
pub mod config;
pub mod error;
pub mod jira;
pub mod reconcile;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use client::{Attachment, IssueFields, RemoteIssue, TrackerClient};
pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
pub use jira::JiraClient;
pub use reconcile::{
    plan, summarize, AttachmentOutcome, Intent, Outcome, ReconcilePolicy, ReconciliationPlan,
    ReconciliationReport, Reconciler,
};
