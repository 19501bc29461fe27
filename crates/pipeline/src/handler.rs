//! Request envelope handling and the end-to-end sync run.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use deck_tracker::{ReconcilePolicy, ReconciliationReport, Reconciler, TrackerClient};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

use crate::describe::{parse_change_list, Describer};
use crate::error::{PipelineError, Result};
use crate::extract::{Extraction, ExtractionOrchestrator};
use crate::render::Renderer;

const DOCUMENT_NAME: &str = "presentation.pptx";

/// Status code and JSON body returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status_code: u16,
    pub body: Value,
}

impl Response {
    fn ok(report: &ReconciliationReport) -> Self {
        Self {
            status_code: 200,
            body: json!({
                "message": "Jira updated successfully",
                "details": report.result,
            }),
        }
    }

    fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "pptBase64")]
    ppt_base64: Option<String>,
    epic_key: Option<String>,
}

/// A decoded sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub document: Vec<u8>,
    pub epic_key: Option<String>,
}

impl SyncRequest {
    /// Decode the envelope, bare or wrapped as `{"body": "<json>"}`.
    pub fn parse(event: &str) -> Result<Self> {
        let invalid = || PipelineError::Input("Invalid JSON in body".to_string());

        let mut value: Value = serde_json::from_str(event).map_err(|_| invalid())?;
        if let Some(body) = value.get("body").cloned() {
            value = match body {
                Value::String(inner) => serde_json::from_str(&inner).map_err(|_| invalid())?,
                other => other,
            };
        }

        let envelope: Envelope = serde_json::from_value(value).map_err(|_| invalid())?;
        let encoded = envelope
            .ppt_base64
            .ok_or_else(|| PipelineError::Input("Missing 'pptBase64' in event".to_string()))?;
        let document = STANDARD
            .decode(encoded.trim())
            .map_err(|e| PipelineError::Input(format!("Invalid base64 in 'pptBase64': {}", e)))?;

        Ok(Self {
            document,
            epic_key: envelope.epic_key.filter(|key| !key.trim().is_empty()),
        })
    }
}

/// Wires extraction, description and reconciliation for one request.
pub struct Pipeline<'a> {
    renderer: &'a dyn Renderer,
    describer: &'a dyn Describer,
    tracker: &'a dyn TrackerClient,
    policy: ReconcilePolicy,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        renderer: &'a dyn Renderer,
        describer: &'a dyn Describer,
        tracker: &'a dyn TrackerClient,
    ) -> Self {
        Self {
            renderer,
            describer,
            tracker,
            policy: ReconcilePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Handle a raw request envelope. Never panics; every failure becomes a
    /// 400 (bad request) or 500 response.
    pub fn handle(&self, event: &str) -> Response {
        let outcome = SyncRequest::parse(event).and_then(|request| {
            let epic_key = request
                .epic_key
                .ok_or_else(|| PipelineError::Input("Missing 'epic_key' in event".to_string()))?;
            self.run(&request.document, &epic_key)
        });

        match outcome {
            Ok(report) => Response::ok(&report),
            Err(PipelineError::Input(message)) => {
                log::warn!("Rejected request: {}", message);
                Response::error(400, message)
            }
            Err(e) => {
                log::error!("Sync failed: {}", e);
                Response::error(500, e.to_string())
            }
        }
    }

    /// Extract `document`, describe it and reconcile the result under `epic_key`.
    pub fn run(&self, document: &[u8], epic_key: &str) -> Result<ReconciliationReport> {
        let scratch = scratch_dir()?;
        let extraction = extract_into(self.renderer, document, scratch.path())?;

        let text = self.describer.describe(&extraction)?;
        let changes = parse_change_list(&text);
        log::debug!("{} change records for {}", changes.len(), epic_key);

        let report = Reconciler::new(self.tracker)
            .with_policy(self.policy)
            .reconcile(epic_key, &changes, &extraction.artifacts)?;

        log::info!(
            "{}: {} created, {} updated, {} deleted, {} in epic",
            epic_key,
            report.result.created,
            report.result.updated,
            report.result.deleted,
            report.result.total_after
        );
        Ok(report)
    }
}

/// Extraction only, without describing or touching the tracker.
/// Artifact files are removed before this returns.
pub fn extract_document(renderer: &dyn Renderer, document: &[u8]) -> Result<Extraction> {
    let scratch = scratch_dir()?;
    extract_into(renderer, document, scratch.path())
}

fn extract_into(renderer: &dyn Renderer, document: &[u8], scratch: &Path) -> Result<Extraction> {
    let path = scratch.join(DOCUMENT_NAME);
    fs::write(&path, document)?;
    Ok(ExtractionOrchestrator::new(renderer).extract(&path, scratch)?)
}

fn scratch_dir() -> Result<tempfile::TempDir> {
    Ok(tempfile::Builder::new().prefix("deck-sync-").tempdir()?)
}
