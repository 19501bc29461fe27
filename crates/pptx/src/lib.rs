//! PPTX (Office Open XML) backend for feature deck extraction.
//!
//! Parses .pptx files, which are ZIP archives containing XML documents,
//! into the [`deck_core::Presentation`] slide model.

pub mod parser;

#[cfg(any(test, feature = "test-support"))]
pub mod fixture;

pub use parser::PptxParser;
