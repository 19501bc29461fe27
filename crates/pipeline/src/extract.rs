//! Sequencing of the extraction phases over one deck.

use deck_core::{
    associate, AssociationRecord, ConfigMap, ConfigResolver, FeatureRecord, ImageArtifact,
    PageImageExporter, Parsed, Presentation, Result, ScopeRecord, Skip, SlideTableParser,
    TableRecord,
};
use deck_pptx::PptxParser;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::render::Renderer;

/// Everything extracted from one deck.
///
/// Serializes to the shape handed to the text-generation step: config,
/// functionalities, scopes and the impact/architecture association table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Extraction {
    pub config: ConfigMap,
    pub functionalities: Vec<FeatureRecord>,
    pub scopes: Vec<ScopeRecord>,
    #[serde(rename = "impacts_architecture_association")]
    pub associations: Vec<AssociationRecord>,
    #[serde(skip)]
    pub artifacts: Vec<ImageArtifact>,
    #[serde(skip)]
    pub skipped: Vec<Skip>,
    #[serde(skip)]
    pub slide_count: usize,
}

impl Extraction {
    /// Scope rows that belong to `number`.
    pub fn scopes_for<'a>(&'a self, number: &'a str) -> impl Iterator<Item = &'a ScopeRecord> + 'a {
        self.scopes.iter().filter(move |s| s.number == number)
    }

    pub fn association_for(&self, number: &str) -> Option<&AssociationRecord> {
        self.associations.iter().find(|a| a.number == number)
    }
}

/// Runs configuration, table parsing, association and image export.
pub struct ExtractionOrchestrator<'a> {
    renderer: &'a dyn Renderer,
    parser: PptxParser,
    resolver: ConfigResolver,
    tables: SlideTableParser,
}

impl<'a> ExtractionOrchestrator<'a> {
    pub fn new(renderer: &'a dyn Renderer) -> Self {
        Self {
            renderer,
            parser: PptxParser::new(),
            resolver: ConfigResolver::new(),
            tables: SlideTableParser::new(),
        }
    }

    /// Extract `document`, writing rendered pages and artifacts under `scratch`.
    ///
    /// Bad slide indices, malformed rows and rendering failures are recorded
    /// in [`Extraction::skipped`]; only an unreadable deck is an error.
    pub fn extract(&self, document: &Path, scratch: &Path) -> Result<Extraction> {
        let filename = document
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("presentation.pptx");
        let presentation = self.parser.parse_bytes(&fs::read(document)?, filename)?;
        log::debug!("Parsed {} slides from {}", presentation.slide_count(), filename);

        let mut skipped = Vec::new();

        let pages = match self.renderer.render(document, &scratch.join("pages")) {
            Ok(pages) => pages,
            Err(e) => {
                push_skip(&mut skipped, Skip::RenderUnavailable { reason: e.to_string() });
                Vec::new()
            }
        };

        let config_text = presentation.slides.first().map(|s| s.text()).unwrap_or_default();
        let config = self.resolver.resolve(&config_text);

        let functionalities: Parsed<FeatureRecord> =
            self.parse_slides(&presentation, config.functionality_slides());
        let scopes: Parsed<ScopeRecord> = self.parse_slides(&presentation, config.scope_slides());
        skipped.extend(functionalities.skipped);
        skipped.extend(scopes.skipped);

        let associations = associate(&functionalities.records, &scopes.records);

        let exporter = PageImageExporter::new(scratch.join("output"));
        let artifacts = exporter.export(&pages, &associations)?;
        skipped.extend(artifacts.skipped);

        Ok(Extraction {
            config,
            functionalities: functionalities.records,
            scopes: scopes.records,
            associations,
            artifacts: artifacts.records,
            skipped,
            slide_count: presentation.slide_count(),
        })
    }

    /// Parse the tables of every listed slide, in list order.
    fn parse_slides<T: TableRecord>(&self, presentation: &Presentation, slides: &[usize]) -> Parsed<T> {
        let mut parsed = Parsed::new();
        for &number in slides {
            match presentation.slide(number) {
                Some(slide) => parsed.append(self.tables.parse(slide)),
                None => parsed.skip(Skip::SlideOutOfRange {
                    slide: number,
                    slide_count: presentation.slide_count(),
                }),
            }
        }
        parsed
    }
}

fn push_skip(skipped: &mut Vec<Skip>, reason: Skip) {
    log::warn!("Skipping: {}", reason);
    skipped.push(reason);
}
