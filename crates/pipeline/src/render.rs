//! Rendering a deck into page images.

use deck_core::{Error, PageImage, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

/// Page files written by pdftoppm: `<stem>-<page>.png`, page possibly zero-padded.
static PAGE_FILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<stem>.+)-(?P<page>\d+)\.png$").unwrap());

/// Turns a document into an ordered sequence of page images.
pub trait Renderer {
    /// Render `document` into `out_dir`, returning pages in document order.
    fn render(&self, document: &Path, out_dir: &Path) -> Result<Vec<PageImage>>;
}

/// Renders through LibreOffice (deck to PDF) and pdftoppm (PDF to PNG pages).
#[derive(Debug, Clone)]
pub struct LibreOfficeRenderer {
    libreoffice: PathBuf,
    pdftoppm: PathBuf,
}

impl Default for LibreOfficeRenderer {
    fn default() -> Self {
        Self {
            libreoffice: PathBuf::from("libreoffice"),
            pdftoppm: PathBuf::from("pdftoppm"),
        }
    }
}

impl LibreOfficeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_libreoffice(mut self, program: impl Into<PathBuf>) -> Self {
        self.libreoffice = program.into();
        self
    }

    pub fn with_pdftoppm(mut self, program: impl Into<PathBuf>) -> Self {
        self.pdftoppm = program.into();
        self
    }

    fn run(&self, command: &mut Command) -> Result<()> {
        log::debug!("Running {:?}", command);
        let status = command
            .status()
            .map_err(|e| Error::RenderError(format!("Failed to start {:?}: {}", command.get_program(), e)))?;
        if !status.success() {
            return Err(Error::RenderError(format!(
                "{:?} exited with {}",
                command.get_program(),
                status
            )));
        }
        Ok(())
    }
}

impl Renderer for LibreOfficeRenderer {
    fn render(&self, document: &Path, out_dir: &Path) -> Result<Vec<PageImage>> {
        fs::create_dir_all(out_dir)?;
        let stem = document
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::RenderError(format!("No file name in {}", document.display())))?;

        self.run(
            Command::new(&self.libreoffice)
                .args(["--headless", "--convert-to", "pdf"])
                .arg(document)
                .arg("--outdir")
                .arg(out_dir),
        )?;

        let pdf = out_dir.join(format!("{}.pdf", stem));
        if !pdf.exists() {
            return Err(Error::RenderError(format!("No PDF produced at {}", pdf.display())));
        }

        self.run(
            Command::new(&self.pdftoppm)
                .arg(&pdf)
                .arg(out_dir.join(stem))
                .arg("-png"),
        )?;

        collect_pages(out_dir, stem)
    }
}

/// List `<stem>-<n>.png` files in `dir`, ordered by page number.
pub fn collect_pages(dir: &Path, stem: &str) -> Result<Vec<PageImage>> {
    let mut numbered: Vec<(usize, PathBuf)> = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(caps) = PAGE_FILE_REGEX.captures(name) else {
            continue;
        };
        if &caps["stem"] != stem {
            continue;
        }
        if let Ok(page) = caps["page"].parse::<usize>() {
            numbered.push((page, path.clone()));
        }
    }

    numbered.sort_by_key(|(page, _)| *page);

    Ok(numbered
        .into_iter()
        .enumerate()
        .map(|(idx, (_, path))| PageImage::new(idx + 1, path))
        .collect())
}
