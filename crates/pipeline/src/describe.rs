//! Turning an extraction into tracker change records.

use deck_core::{ArtifactRole, ChangeRecord, Error, FeatureRecord, MultiValue, Result};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::extract::Extraction;

/// Produces the change-list text for an extraction.
///
/// The returned text is a JSON array of change records, possibly wrapped in
/// a Markdown code fence; see [`parse_change_list`].
pub trait Describer {
    fn describe(&self, extraction: &Extraction) -> Result<String>;
}

/// Parse describer output into change records.
///
/// Fence lines around the JSON are dropped. A lone object becomes a
/// one-element list. Elements that do not decode are skipped, and text that
/// is not JSON at all yields an empty list.
pub fn parse_change_list(text: &str) -> Vec<ChangeRecord> {
    let body = strip_code_fence(text);

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Describer output is not valid JSON, no changes applied: {}", e);
            return Vec::new();
        }
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        other => {
            log::warn!("Describer output is neither a list nor an object: {}", other);
            return Vec::new();
        }
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| match serde_json::from_value::<ChangeRecord>(item) {
            Ok(change) => Some(change),
            Err(e) => {
                log::warn!("Skipping change record {}: {}", idx, e);
                None
            }
        })
        .collect()
}

fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if body.starts_with("```") {
        body = body.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

const PANEL_COLOR: &str = "#7768c7";

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}

/// Builds change records directly from the extracted tables.
#[derive(Debug, Clone, Default)]
pub struct TemplateDescriber;

impl TemplateDescriber {
    pub fn new() -> Self {
        Self
    }

    fn change_for(&self, extraction: &Extraction, feature: &FeatureRecord) -> ChangeRecord {
        // Deck order, first occurrence wins.
        let mut applications: Vec<String> = Vec::new();
        let mut scopes: Vec<String> = Vec::new();
        let mut referents: Vec<String> = Vec::new();
        for scope in extraction.scopes_for(&feature.number) {
            for name in scope.application_names() {
                push_unique(&mut applications, name);
            }
            if !scope.scope_label.is_empty() {
                push_unique(&mut scopes, scope.scope_label.clone());
            }
            if !scope.referents.is_empty() {
                push_unique(&mut referents, scope.referents.clone());
            }
        }

        ChangeRecord {
            tracker_key: feature.tracker_key.clone(),
            number: feature.number.clone(),
            summary: feature.title.clone(),
            description: self.description(extraction, feature, &referents),
            applications: MultiValue::List(applications),
            scopes: MultiValue::List(scopes),
        }
    }

    fn description(&self, extraction: &Extraction, feature: &FeatureRecord, referents: &[String]) -> String {
        let images = |role: ArtifactRole| -> String {
            extraction
                .artifacts
                .iter()
                .filter(|a| a.feature_number == feature.number && a.role == role)
                .map(|a| format!(" !{}|thumbnail!", a.file_name()))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let link = extraction.config.reference_link.as_deref().unwrap_or("");

        [
            panel("Objectif de la demande // Request goal", &format!(" * Besoin : {}", feature.title)),
            panel("Hypothèses de bénéfice // Profit hypothesis", &bullets(&feature.benefit_hypotheses)),
            panel("Critères d'acceptance  // Acceptance criteria", &bullets(&feature.acceptance_criteria)),
            panel("Images Architecture", &images(ArtifactRole::Architecture)),
            panel("Images Impact", &images(ArtifactRole::Impact)),
            panel("Lien vers la documentation // Link to the libraries", link),
            panel("Référents du Train // ART's Referents", &referents.join("\n")),
        ]
        .join("\n")
    }
}

impl Describer for TemplateDescriber {
    fn describe(&self, extraction: &Extraction) -> Result<String> {
        let changes: Vec<ChangeRecord> = extraction
            .functionalities
            .iter()
            .map(|feature| self.change_for(extraction, feature))
            .collect();
        Ok(serde_json::to_string_pretty(&changes)?)
    }
}

fn panel(title: &str, content: &str) -> String {
    format!(
        "{{panel:title={}|titleBGColor={}}}\n{}\n{{panel}}",
        title, PANEL_COLOR, content
    )
}

/// One ` * ` bullet per non-empty line.
fn bullets(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!(" * {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

const SYSTEM_PROMPT: &str = r#"You receive data extracted from a slide deck as JSON with four parts:

1. config: contains the documentation link under "VISA".
2. functionalities: features with the fields "Numéro", "ID Jira", "Nom", "Hypothèses de bénéfices", "Critères d’acceptance" and "Sizing SI (PI)".
3. scopes: rows with the fields "Numéro", "Scopes", "Applications", "Referents" and "Impacts / Architecture".
4. impacts_architecture_association: for each "Numéro", the slide numbers listed under "Impacts:" and "Architectures:".

For every feature produce one change record. Its Description must follow this Jira wiki template, with each placeholder replaced:

{panel:title=Objectif de la demande // Request goal|titleBGColor=#7768c7}
 * Besoin : <what the feature needs to achieve>
{panel}
{panel:title=Hypothèses de bénéfice // Profit hypothesis|titleBGColor=#7768c7}
 * <each benefit hypothesis>
{panel}
{panel:title=Critères d'acceptance  // Acceptance criteria|titleBGColor=#7768c7}
 * <each acceptance criterion>
{panel}
{panel:title=Images Architecture|titleBGColor=#7768c7}
 <for each architecture slide n: !<Numéro>_architecture_slide<n>.png|thumbnail!>
{panel}
{panel:title=Images Impact|titleBGColor=#7768c7}
 <for each impact slide n: !<Numéro>_impact_slide<n>.png|thumbnail!>
{panel}
{panel:title=Lien vers la documentation // Link to the libraries|titleBGColor=#7768c7}
<VISA link>
{panel}
{panel:title=Référents du Train // ART's Referents|titleBGColor=#7768c7}
<referents of the matching scopes>
{panel}

customfield_13600 holds the Applications and customfield_14506 the Scopes of the scopes matching the feature's Numéro.

Answer with a JSON array only, one element per feature:
{
  "Numéro": "<feature number>",
  "jiraID": "<ID Jira field>",
  "summary": "<Nom field>",
  "Description": "<filled template>",
  "customfield_13600": ["<application>", ...],
  "customfield_14506": ["<scope>", ...]
}"#;

/// Calls an OpenAI-compatible Responses endpoint.
pub struct OpenAiDescriber {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_output_tokens: u32,
}

impl OpenAiDescriber {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o";

    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| Error::DescribeError(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: Self::DEFAULT_MODEL.to_string(),
            max_output_tokens: 5112,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn request_body(&self, extraction: &Extraction) -> Result<Value> {
        let data = serde_json::to_string(extraction)?;
        Ok(json!({
            "model": self.model,
            "input": [
                {
                    "role": "system",
                    "content": [{ "type": "input_text", "text": SYSTEM_PROMPT }],
                },
                {
                    "role": "user",
                    "content": [{ "type": "input_text", "text": data }],
                },
            ],
            "text": { "format": { "type": "text" } },
            "max_output_tokens": self.max_output_tokens,
            "store": false,
        }))
    }
}

impl Describer for OpenAiDescriber {
    fn describe(&self, extraction: &Extraction) -> Result<String> {
        let url = format!("{}/v1/responses", self.endpoint.trim_end_matches('/'));
        log::debug!("Requesting descriptions from {} ({})", url, self.model);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(extraction)?)
            .send()
            .map_err(|e| Error::DescribeError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(Error::DescribeError(format!("{} answered {}: {}", url, status, text)));
        }
        let body: Value = response
            .json()
            .map_err(|e| Error::DescribeError(format!("{} sent an unreadable answer: {}", url, e)))?;

        response_text(&body)
    }
}

/// First text block of a Responses answer.
fn response_text(body: &Value) -> Result<String> {
    body.pointer("/output/0/content/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::DescribeError("response carries no output text".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::{sample_deck, StubRenderer};
    use crate::extract::ExtractionOrchestrator;
    use deck_pptx::fixture::{DeckBuilder, SlideSpec};
    use std::fs;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn sample_extraction() -> (tempfile::TempDir, Extraction) {
        let scratch = tempfile::tempdir().unwrap();
        let document = scratch.path().join("presentation.pptx");
        fs::write(&document, sample_deck()).unwrap();
        let renderer = StubRenderer { pages: 6 };
        let extraction = ExtractionOrchestrator::new(&renderer)
            .extract(&document, scratch.path())
            .unwrap();
        (scratch, extraction)
    }

    #[test]
    fn test_parse_plain_array() {
        let changes = parse_change_list(
            r#"[{"Numéro": "E1", "jiraID": "K-1", "summary": "Map", "Description": "d",
                "customfield_13600": "A, B", "customfield_14506": ["S"]}]"#,
        );

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].tracker_key, "K-1");
        assert_eq!(changes[0].applications, MultiValue::Text("A, B".to_string()));
        assert_eq!(changes[0].scopes, MultiValue::List(vec!["S".to_string()]));
    }

    #[test]
    fn test_parse_keeps_records_with_numeric_list_items() {
        let changes = parse_change_list(
            r#"[{"Numéro": "E1", "summary": "Map", "customfield_13600": ["A", 1]}]"#,
        );

        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes[0].applications,
            MultiValue::List(vec!["A".to_string(), "1".to_string()])
        );
    }

    #[test]
    fn test_parse_fenced_output() {
        let text = "```json\n[{\"Numéro\": \"E1\", \"summary\": \"Map\"}]\n```\n";
        let changes = parse_change_list(text);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].number, "E1");
        assert!(changes[0].tracker_key.is_empty());
    }

    #[test]
    fn test_parse_single_object() {
        let changes = parse_change_list(r#"{"number": "E2", "trackerKey": "K-2"}"#);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].tracker_key, "K-2");
    }

    #[test]
    fn test_parse_garbage_is_empty() {
        assert!(parse_change_list("Sorry, I cannot help with that.").is_empty());
        assert!(parse_change_list("42").is_empty());
        assert!(parse_change_list("").is_empty());
    }

    #[test]
    fn test_parse_skips_undecodable_elements() {
        let changes = parse_change_list(r#"[{"Numéro": 7}, {"Numéro": "E3"}]"#);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].number, "E3");
    }

    #[test]
    fn test_template_describer_output_round_trips_through_parser() {
        let (_scratch, extraction) = sample_extraction();

        let changes = parse_change_list(&TemplateDescriber::new().describe(&extraction).unwrap());

        assert_eq!(changes.len(), 2);
        let first = &changes[0];
        assert_eq!(first.number, "E69F01");
        assert_eq!(first.tracker_key, "PRJ-1");
        assert_eq!(first.summary, "Noise map");
        assert_eq!(
            first.applications,
            MultiValue::List(vec!["Acoustic".to_string(), "PF Data".to_string()])
        );
        assert_eq!(
            first.scopes,
            MultiValue::List(vec!["Scope A".to_string(), "Scope B".to_string()])
        );
        assert!(first.description.contains("!E69F01_impact_slide4.png|thumbnail!"));
        assert!(first.description.contains("!E69F01_architecture_slide6.png|thumbnail!"));
        assert!(!first.description.contains("slide40"));
        assert!(first.description.contains("https://docs.example.com/visa"));
        assert!(first.description.contains("Ann\nBob"));

        let second = &changes[1];
        assert!(second.tracker_key.is_empty());
        assert!(second.description.contains(" * Fresh data\n * Fewer calls"));
        assert_eq!(second.applications, MultiValue::List(Vec::new()));
    }

    #[test]
    fn test_template_describer_keeps_deck_order() {
        let feature_header = vec![
            "Numéro",
            "ID Jira",
            "Nom",
            "Hypothèses de bénéfices",
            "Critères d’acceptance",
            "Sizing SI (PI)",
        ];
        let scope_header = vec!["Numéro", "Scopes", "Applications", "Referents", "Impacts / Architecture"];
        let deck = DeckBuilder::new()
            .slide(SlideSpec::new().text("Functionalities: 2\nScopes: 3"))
            .slide(SlideSpec::new().table(vec![feature_header, vec!["E1", "", "Map", "h", "c", "1"]]))
            .slide(SlideSpec::new().table(vec![
                scope_header,
                vec!["E1", "Zeta", "PF Data, Acoustic", "Zoe", ""],
                vec!["E1", "Alpha", "Acoustic, Billing", "Al", ""],
            ]))
            .build();
        let scratch = tempfile::tempdir().unwrap();
        let document = scratch.path().join("presentation.pptx");
        fs::write(&document, deck).unwrap();
        let extraction = ExtractionOrchestrator::new(&StubRenderer { pages: 3 })
            .extract(&document, scratch.path())
            .unwrap();

        let changes = parse_change_list(&TemplateDescriber::new().describe(&extraction).unwrap());

        assert_eq!(
            changes[0].applications,
            MultiValue::List(vec!["PF Data".to_string(), "Acoustic".to_string(), "Billing".to_string()])
        );
        assert_eq!(
            changes[0].scopes,
            MultiValue::List(vec!["Zeta".to_string(), "Alpha".to_string()])
        );
        assert!(changes[0].description.contains("Zoe\nAl"));
    }

    #[test]
    fn test_panel_layout() {
        assert_eq!(
            panel("Images Impact", " !a.png|thumbnail!"),
            "{panel:title=Images Impact|titleBGColor=#7768c7}\n !a.png|thumbnail!\n{panel}"
        );
    }

    #[test]
    fn test_openai_request_body() {
        let (_scratch, extraction) = sample_extraction();
        let describer = OpenAiDescriber::new("key").unwrap().with_model("gpt-test");

        let body = describer.request_body(&extraction).unwrap();

        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["max_output_tokens"], 5112);
        assert_eq!(body["store"], false);
        let data: Value =
            serde_json::from_str(body["input"][1]["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(data["functionalities"][0]["Nom"], "Noise map");
    }

    #[test]
    fn test_response_text() {
        let body = json!({
            "output": [{ "content": [{ "type": "output_text", "text": "[]" }] }]
        });
        assert_eq!(response_text(&body).unwrap(), "[]");
        assert!(matches!(response_text(&json!({})), Err(Error::DescribeError(_))));
    }

    /// Answers one request with `status` and `body`, after draining the request.
    fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut request_body = vec![0; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            )
            .unwrap();
        });
        (endpoint, handle)
    }

    #[test]
    fn test_openai_error_status_keeps_plain_body() {
        let (_scratch, extraction) = sample_extraction();
        let (endpoint, server) = serve_once("502 Bad Gateway", "<html>upstream down</html>");
        let describer = OpenAiDescriber::new("key").unwrap().with_endpoint(endpoint);

        let err = describer.describe(&extraction).unwrap_err();
        server.join().unwrap();

        let Error::DescribeError(message) = err else {
            panic!("unexpected error: {:?}", err);
        };
        assert!(message.contains("502"), "{}", message);
        assert!(message.contains("upstream down"), "{}", message);
    }

    #[test]
    fn test_openai_success_returns_output_text() {
        let (_scratch, extraction) = sample_extraction();
        let (endpoint, server) = serve_once(
            "200 OK",
            r#"{"output": [{"content": [{"type": "output_text", "text": "[]"}]}]}"#,
        );
        let describer = OpenAiDescriber::new("key").unwrap().with_endpoint(endpoint);

        let text = describer.describe(&extraction).unwrap();
        server.join().unwrap();

        assert_eq!(text, "[]");
    }
}
