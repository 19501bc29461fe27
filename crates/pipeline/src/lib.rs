//! End-to-end pipeline: deck extraction, page rendering, description
//! generation and reconciliation against the tracker, plus the request
//! envelope handling around it.

pub mod describe;
pub mod error;
pub mod extract;
pub mod handler;
pub mod render;

pub use describe::{parse_change_list, Describer, OpenAiDescriber, TemplateDescriber};
pub use error::{PipelineError, Result};
pub use extract::{Extraction, ExtractionOrchestrator};
pub use handler::{extract_document, Pipeline, Response, SyncRequest};
pub use render::{LibreOfficeRenderer, Renderer};
