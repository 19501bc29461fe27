//! CLI tool for syncing slide-deck feature tables into Jira.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use deck_pipeline::{
    extract_document, Describer, LibreOfficeRenderer, OpenAiDescriber, Pipeline, SyncRequest,
    TemplateDescriber,
};
use deck_tracker::{JiraClient, ReconcilePolicy, TrackerConfig};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DescriberKind {
    /// Fill the description template from the deck tables
    Template,
    /// Ask an OpenAI-compatible model to write the descriptions
    Openai,
}

/// Read a request envelope and mirror the deck's features into a Jira epic.
#[derive(Parser, Debug)]
#[command(name = "deck-sync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Request envelope (JSON with pptBase64 and epic_key), or - for stdin
    #[arg(default_value = "-")]
    event: PathBuf,

    /// Jira base URL
    #[arg(long, env = "JIRA_BASE_URL")]
    jira_url: Option<String>,

    /// Jira personal access token
    #[arg(long, env = "JIRA_TOKEN", hide_env_values = true)]
    jira_token: Option<String>,

    /// Jira project id for created issues
    #[arg(long)]
    project_id: Option<String>,

    /// Issue type for created issues
    #[arg(long)]
    issue_type: Option<String>,

    /// How issue descriptions are produced
    #[arg(long, value_enum, default_value = "template")]
    describer: DescriberKind,

    /// API key for the openai describer
    #[arg(long, env = "OPENAI_API", hide_env_values = true)]
    openai_key: Option<String>,

    /// Model for the openai describer
    #[arg(long, default_value = OpenAiDescriber::DEFAULT_MODEL)]
    model: String,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, default_value = OpenAiDescriber::DEFAULT_ENDPOINT)]
    openai_endpoint: String,

    /// LibreOffice executable used to convert the deck to PDF
    #[arg(long, default_value = "libreoffice")]
    libreoffice: PathBuf,

    /// pdftoppm executable used to turn the PDF into page images
    #[arg(long, default_value = "pdftoppm")]
    pdftoppm: PathBuf,

    /// Delete issues in the epic that no change record refers to
    #[arg(long)]
    prune_stale: bool,

    /// Print the extracted tables as JSON and stop
    #[arg(long)]
    extract_only: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the run succeeded.
fn run(args: &Args) -> Result<bool> {
    let event = read_event(&args.event)?;
    let renderer = LibreOfficeRenderer::new()
        .with_libreoffice(&args.libreoffice)
        .with_pdftoppm(&args.pdftoppm);

    if args.extract_only {
        return extract_only(&event, &renderer);
    }

    let describer = build_describer(args)?;
    let tracker = JiraClient::new(tracker_config(args)?).context("Failed to set up the Jira client")?;

    let pipeline = Pipeline::new(&renderer, describer.as_ref(), &tracker).with_policy(ReconcilePolicy {
        prune_stale: args.prune_stale,
    });

    let response = pipeline.handle(&event);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(response.is_success())
}

fn extract_only(event: &str, renderer: &LibreOfficeRenderer) -> Result<bool> {
    let request = SyncRequest::parse(event)?;
    let extraction = extract_document(renderer, &request.document)?;
    log::info!(
        "{} slides, {} features, {} scope rows, {} skipped",
        extraction.slide_count,
        extraction.functionalities.len(),
        extraction.scopes.len(),
        extraction.skipped.len()
    );
    println!("{}", serde_json::to_string_pretty(&extraction)?);
    Ok(true)
}

fn tracker_config(args: &Args) -> Result<TrackerConfig> {
    let mut config = TrackerConfig::new(
        args.jira_url.clone().context("Jira URL missing (--jira-url or JIRA_BASE_URL)")?,
        args.jira_token.clone().context("Jira token missing (--jira-token or JIRA_TOKEN)")?,
    )
    .with_timeout(Duration::from_secs(60));
    if let Some(project_id) = &args.project_id {
        config = config.with_project_id(project_id.clone());
    }
    if let Some(issue_type) = &args.issue_type {
        config = config.with_issue_type(issue_type.clone());
    }
    Ok(config)
}

fn build_describer(args: &Args) -> Result<Box<dyn Describer>> {
    Ok(match args.describer {
        DescriberKind::Template => Box::new(TemplateDescriber::new()),
        DescriberKind::Openai => {
            let key = args
                .openai_key
                .clone()
                .context("OpenAI key missing (--openai-key or OPENAI_API)")?;
            Box::new(
                OpenAiDescriber::new(key)?
                    .with_endpoint(args.openai_endpoint.clone())
                    .with_model(args.model.clone()),
            )
        }
    })
}

fn read_event(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut event = String::new();
        std::io::stdin()
            .read_to_string(&mut event)
            .context("Failed to read the request from stdin")?;
        return Ok(event);
    }

    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
