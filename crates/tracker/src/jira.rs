//! Jira REST API v2 client.

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::{Attachment, IssueFields, RemoteIssue, TrackerClient};
use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};

/// Blocking Jira client authenticated with a bearer token.
pub struct JiraClient {
    http: Client,
    config: TrackerConfig,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<SearchIssue>,
}

#[derive(Debug, Deserialize)]
struct SearchIssue {
    key: String,
    #[serde(default)]
    fields: SummaryFields,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryFields {
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

#[derive(Debug, Deserialize)]
struct AttachmentResponse {
    fields: AttachmentFields,
}

#[derive(Debug, Deserialize)]
struct AttachmentFields {
    #[serde(default)]
    attachment: Vec<Attachment>,
}

impl JiraClient {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(TrackerError::Config("tracker base URL is not set".to_string()));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_root(), path)
    }

    /// Send with auth and turn non-2xx answers into [`TrackerError::Status`].
    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.bearer_auth(&self.config.token).send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().unwrap_or_default();
        Err(TrackerError::Status {
            status: status.as_u16(),
            url,
            body,
        })
    }
}

impl TrackerClient for JiraClient {
    fn list_issues(&self, parent_key: &str) -> Result<Vec<RemoteIssue>> {
        let jql = parent_jql(parent_key);
        let request = self
            .http
            .get(self.url("/search"))
            .query(&[("jql", jql.as_str()), ("fields", "summary")]);

        let found: SearchResponse = self.send(request)?.json()?;
        Ok(found
            .issues
            .into_iter()
            .map(|issue| RemoteIssue {
                key: issue.key,
                summary: issue.fields.summary,
            })
            .collect())
    }

    fn create_issue(&self, parent_key: &str, fields: &IssueFields) -> Result<String> {
        let payload = create_payload(&self.config, parent_key, fields);
        let request = self.http.post(self.url("/issue")).json(&payload);

        let created: CreatedIssue = self.send(request)?.json()?;
        log::info!("Created issue {}", created.key);
        Ok(created.key)
    }

    fn update_issue(&self, key: &str, fields: &IssueFields) -> Result<()> {
        let payload = update_payload(&self.config, fields);
        let request = self
            .http
            .put(self.url(&format!("/issue/{}", key)))
            .json(&payload);

        self.send(request)?;
        log::info!("Updated issue {}", key);
        Ok(())
    }

    fn delete_issue(&self, key: &str) -> Result<()> {
        self.send(self.http.delete(self.url(&format!("/issue/{}", key))))?;
        log::info!("Deleted issue {}", key);
        Ok(())
    }

    fn list_attachments(&self, key: &str) -> Result<Vec<Attachment>> {
        let request = self
            .http
            .get(self.url(&format!("/issue/{}", key)))
            .query(&[("fields", "attachment")]);

        let issue: AttachmentResponse = self.send(request)?.json()?;
        Ok(issue.fields.attachment)
    }

    fn delete_attachment(&self, id: &str) -> Result<()> {
        self.send(self.http.delete(self.url(&format!("/attachment/{}", id))))?;
        Ok(())
    }

    fn upload_attachment(&self, key: &str, file_name: &str, data: Vec<u8>) -> Result<()> {
        let part = Part::bytes(data).file_name(file_name.to_string());
        let request = self
            .http
            .post(self.url(&format!("/issue/{}/attachments", key)))
            .header("X-Atlassian-Token", "no-check")
            .multipart(Form::new().part("file", part));

        self.send(request)?;
        Ok(())
    }
}

/// JQL selecting every issue linked to the epic.
fn parent_jql(parent_key: &str) -> String {
    format!("\"Epic Link\" = \"{}\"", parent_key.replace('"', "\\\""))
}

fn create_payload(config: &TrackerConfig, parent_key: &str, fields: &IssueFields) -> Value {
    let mut payload = update_payload(config, fields);
    let body = &mut payload["fields"];
    body["project"] = json!({ "id": config.project_id });
    body["issuetype"] = json!({ "name": config.issue_type });
    body[config.parent_link_field.as_str()] = json!(parent_key);
    payload
}

fn update_payload(config: &TrackerConfig, fields: &IssueFields) -> Value {
    let mut body = json!({
        "summary": fields.summary,
        "description": fields.description,
    });
    body[config.applications_field.as_str()] = json!(fields.applications);
    body[config.scopes_field.as_str()] = json!(fields.scopes);
    json!({ "fields": body })
}
