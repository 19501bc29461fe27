//! PPTX file parser implementation.

use deck_core::{Error, ExtractedSlide, Presentation, Result, SlideTable};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use zip::ZipArchive;

const PRESENTATION_PATH: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PATH: &str = "ppt/_rels/presentation.xml.rels";

/// Parser for PPTX (Office Open XML) files.
pub struct PptxParser;

impl PptxParser {
    /// Create a new PPTX parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse a PPTX file held in memory.
    pub fn parse_bytes(&self, data: &[u8], filename: &str) -> Result<Presentation> {
        self.parse(Cursor::new(data), filename)
    }

    /// Parse a PPTX file from a reader.
    pub fn parse<R: Read + Seek>(&self, reader: R, filename: &str) -> Result<Presentation> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let mut presentation = Presentation::new(filename);

        let slide_order = self.get_slide_order(&mut archive)?;
        log::debug!("Found {} slides in {}", slide_order.len(), filename);

        for (idx, slide_path) in slide_order.iter().enumerate() {
            let slide = self.parse_slide(&mut archive, slide_path, idx + 1)?;
            presentation.add_slide(slide);
        }

        Ok(presentation)
    }

    /// Get the ordered list of slide part paths.
    ///
    /// Order comes from `sldIdLst` in presentation.xml; when that is missing
    /// the relationships are ordered by the number in their id or target.
    fn get_slide_order<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
        let rels_content = self.read_file_from_archive(archive, PRESENTATION_RELS_PATH)?;
        let slide_rels = parse_slide_relationships(&rels_content)?;

        let listed = match self.read_file_from_archive(archive, PRESENTATION_PATH) {
            Ok(content) => parse_slide_id_list(&content)?,
            Err(e) => {
                log::warn!("Falling back to relationship order: {}", e);
                Vec::new()
            }
        };

        if !listed.is_empty() {
            let by_id: HashMap<&str, &str> = slide_rels
                .iter()
                .map(|r| (r.id.as_str(), r.path.as_str()))
                .collect();
            let ordered: Vec<String> = listed
                .iter()
                .filter_map(|rid| by_id.get(rid.as_str()).map(|p| p.to_string()))
                .collect();
            if !ordered.is_empty() {
                return Ok(ordered);
            }
        }

        let mut slides: Vec<(String, Option<usize>)> = slide_rels
            .into_iter()
            .map(|r| {
                let order_num = extract_slide_number(&r.id).or_else(|| extract_slide_number(&r.path));
                (r.path, order_num)
            })
            .collect();

        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });

        Ok(slides.into_iter().map(|(path, _)| path).collect())
    }

    /// Parse a single slide from the archive.
    fn parse_slide<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
        slide_number: usize,
    ) -> Result<ExtractedSlide> {
        let content = self.read_file_from_archive(archive, slide_path)?;
        let mut slide = parse_slide_xml(&content, slide_number)?;

        // Sort by position (top-to-bottom, left-to-right)
        slide.sort_by_position();

        Ok(slide)
    }

    /// Read a file from the ZIP archive.
    fn read_file_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<String> {
        let mut file = archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(content)
    }
}

impl Default for PptxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// A slide relationship from presentation.xml.rels.
#[derive(Debug)]
struct SlideRel {
    id: String,
    path: String,
}

fn parse_slide_relationships(content: &str) -> Result<Vec<SlideRel>> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);
    let mut rels = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if local_name(e.name().as_ref()) == b"Relationship" => {
                let rel_type = attribute(e, b"Type").unwrap_or_default();
                let target = attribute(e, b"Target").unwrap_or_default();
                let id = attribute(e, b"Id").unwrap_or_default();

                if rel_type.ends_with("/slide") {
                    let path = match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("ppt/{}", target),
                    };
                    rels.push(SlideRel { id, path });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(rels)
}

/// Relationship ids of `p:sldId` entries, in presentation order.
fn parse_slide_id_list(content: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);
    let mut ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if local_name(e.name().as_ref()) == b"sldId" => {
                if let Some(rid) = attribute(e, b"r:id") {
                    ids.push(rid);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing presentation.xml: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(ids)
}

/// Walk slide XML collecting text shapes and DrawingML tables.
///
/// Paragraphs and line breaks become `\n`. Cell text is trimmed.
fn parse_slide_xml(xml_content: &str, slide_number: usize) -> Result<ExtractedSlide> {
    let mut slide = ExtractedSlide::new(slide_number);
    let mut reader = Reader::from_str(xml_content);
    // Whitespace inside runs is significant.
    reader.trim_text(false);

    let mut state = WalkState::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"sp" if state.table.is_none() => {
                    state.shape = Some(ShapeInfo::default());
                }
                b"off" => state.set_offset(e),
                b"tbl" => state.table = Some(TableBuilder::default()),
                b"tr" => {
                    if let Some(table) = state.table.as_mut() {
                        table.row = Some(Vec::new());
                    }
                }
                b"tc" => {
                    if let Some(table) = state.table.as_mut() {
                        table.cell = Some(TextBuffer::default());
                    }
                }
                b"p" => state.start_paragraph(),
                b"t" => state.in_text = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match local_name(e.name().as_ref()) {
                b"off" => state.set_offset(e),
                b"br" => state.push_text("\n"),
                b"p" => state.start_paragraph(),
                b"tc" => {
                    if let Some(row) = state.table.as_mut().and_then(|t| t.row.as_mut()) {
                        row.push(String::new());
                    }
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if state.in_text {
                    let text = e.unescape().unwrap_or_default();
                    state.push_text(&text);
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"t" => state.in_text = false,
                b"tc" => {
                    if let Some(table) = state.table.as_mut() {
                        let cell = table.cell.take().unwrap_or_default();
                        if let Some(row) = table.row.as_mut() {
                            row.push(cell.text.trim().to_string());
                        }
                    }
                }
                b"tr" => {
                    if let Some(table) = state.table.as_mut() {
                        if let Some(row) = table.row.take() {
                            table.rows.push(row);
                        }
                    }
                }
                b"tbl" => {
                    if let Some(table) = state.table.take() {
                        slide.add_table(SlideTable::new(table.rows));
                    }
                }
                b"sp" if state.table.is_none() => {
                    if let Some(shape) = state.shape.take() {
                        let text = shape.text.text.trim();
                        if !text.is_empty() {
                            slide.add_line_with_position(text, shape.y, shape.x);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing slide {}: {}",
                    slide_number, e
                )));
            }
            _ => {}
        }
    }

    Ok(slide)
}

#[derive(Debug, Default)]
struct WalkState {
    shape: Option<ShapeInfo>,
    table: Option<TableBuilder>,
    in_text: bool,
}

impl WalkState {
    /// The buffer receiving text right now: the open table cell, else the open shape.
    fn buffer(&mut self) -> Option<&mut TextBuffer> {
        if let Some(table) = self.table.as_mut() {
            return table.cell.as_mut();
        }
        self.shape.as_mut().map(|s| &mut s.text)
    }

    fn start_paragraph(&mut self) {
        if let Some(buffer) = self.buffer() {
            if buffer.paragraphs > 0 {
                buffer.text.push('\n');
            }
            buffer.paragraphs += 1;
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(buffer) = self.buffer() {
            buffer.text.push_str(text);
        }
    }

    fn set_offset(&mut self, e: &BytesStart<'_>) {
        if self.table.is_some() {
            return;
        }
        if let Some(ref mut shape) = self.shape {
            if let Some(x) = attribute(e, b"x").and_then(|v| v.parse::<f64>().ok()) {
                shape.x = x;
            }
            if let Some(y) = attribute(e, b"y").and_then(|v| v.parse::<f64>().ok()) {
                shape.y = y;
            }
        }
    }
}

#[derive(Debug, Default)]
struct TextBuffer {
    text: String,
    paragraphs: usize,
}

/// Information about a text shape extracted from XML.
#[derive(Debug, Default)]
struct ShapeInfo {
    text: TextBuffer,
    x: f64,
    y: f64,
}

#[derive(Debug, Default)]
struct TableBuilder {
    rows: Vec<Vec<String>>,
    row: Option<Vec<String>>,
    cell: Option<TextBuffer>,
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}
