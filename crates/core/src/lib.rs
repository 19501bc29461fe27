//! Core domain types for turning a feature deck into tracker change records:
//! slide model, tolerant table parsing, configuration slide resolution,
//! impact/architecture association and page image export.

pub mod config;
pub mod error;
pub mod export;
pub mod impacts;
pub mod records;
pub mod table;
pub mod types;

pub use config::{ConfigMap, ConfigResolver};
pub use error::{Error, Result};
pub use export::{PageImage, PageImageExporter};
pub use impacts::{associate, parse_impacts_architecture};
pub use records::{
    ArtifactRole, AssociationRecord, ChangeRecord, FeatureRecord, FieldValue, ImageArtifact,
    MultiValue, ReconciliationResult, ScopeRecord,
};
pub use table::{Parsed, Skip, SlideTableParser, TableRecord, TableRow};
pub use types::{ExtractedSlide, Presentation, SlideTable, SlideText};
