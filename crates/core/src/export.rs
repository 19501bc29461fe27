//! Projection of rendered pages into named per-feature image artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::records::{ArtifactRole, AssociationRecord, ImageArtifact};
use crate::table::{Parsed, Skip};

/// A rendered page image on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-based page number.
    pub number: usize,
    pub path: PathBuf,
}

impl PageImage {
    pub fn new(number: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            number,
            path: path.into(),
        }
    }
}

/// Writes one PNG per (feature, role, slide) into an output directory.
#[derive(Debug, Clone)]
pub struct PageImageExporter {
    out_dir: PathBuf,
}

impl PageImageExporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Export the pages referenced by each association.
    ///
    /// `pages` is addressed 1-based by position. Slide numbers outside
    /// `1..=pages.len()` are skipped. The page files are never modified.
    pub fn export(
        &self,
        pages: &[PageImage],
        associations: &[AssociationRecord],
    ) -> Result<Parsed<ImageArtifact>> {
        fs::create_dir_all(&self.out_dir)?;
        let mut parsed = Parsed::new();

        for association in associations {
            let roles = [
                (ArtifactRole::Impact, &association.impact_slides),
                (ArtifactRole::Architecture, &association.architecture_slides),
            ];

            for (role, slides) in roles {
                for &slide in slides {
                    let Some(page) = slide.checked_sub(1).and_then(|idx| pages.get(idx)) else {
                        parsed.skip(Skip::PageOutOfRange {
                            feature: association.number.clone(),
                            role,
                            slide,
                            page_count: pages.len(),
                        });
                        continue;
                    };

                    let export_failed = |reason: String| Skip::ExportFailed {
                        feature: association.number.clone(),
                        role,
                        slide,
                        reason,
                    };

                    if !is_plain_file_stem(&association.number) {
                        parsed.skip(export_failed("feature number is not a plain file name".to_string()));
                        continue;
                    }

                    let mut artifact = ImageArtifact {
                        feature_number: association.number.clone(),
                        role,
                        slide,
                        path: PathBuf::new(),
                    };
                    artifact.path = self.out_dir.join(artifact.file_name());

                    if let Err(e) = fs::copy(&page.path, &artifact.path) {
                        parsed.skip(export_failed(e.to_string()));
                        continue;
                    }
                    log::debug!("Saved {} PNG: {}", role, artifact.path.display());
                    parsed.records.push(artifact);
                }
            }
        }

        Ok(parsed)
    }
}

/// Feature numbers come from deck cells and end up in file names; anything
/// that could leave the output directory is refused.
fn is_plain_file_stem(number: &str) -> bool {
    !number.is_empty()
        && !number.contains(['/', '\\', ':', '\0'])
        && !number.contains("..")
}
