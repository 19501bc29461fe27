//! Builds minimal .pptx packages in memory for tests.

use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

/// Content of one fixture slide: free text shapes and tables.
#[derive(Debug, Clone, Default)]
pub struct SlideSpec {
    texts: Vec<String>,
    tables: Vec<Vec<Vec<String>>>,
}

impl SlideSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text shape. `\n` starts a new paragraph.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.texts.push(text.into());
        self
    }

    /// Add a table; the first row is the header. `\n` in a cell starts a new paragraph.
    pub fn table<R, C>(mut self, rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        self.tables.push(
            rows.into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        );
        self
    }

    fn to_xml(&self) -> String {
        let mut shapes = String::new();

        for (idx, text) in self.texts.iter().enumerate() {
            shapes.push_str(&format!(
                r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Text {id}"/></p:nvSpPr><p:spPr><a:xfrm><a:off x="0" y="{y}"/></a:xfrm></p:spPr><p:txBody>{paras}</p:txBody></p:sp>"#,
                id = idx + 2,
                y = idx * 1000,
                paras = paragraphs(text),
            ));
        }

        for (idx, rows) in self.tables.iter().enumerate() {
            let mut body = String::new();
            for row in rows {
                body.push_str("<a:tr h=\"1\">");
                for cell in row {
                    body.push_str(&format!("<a:tc><a:txBody>{}</a:txBody></a:tc>", paragraphs(cell)));
                }
                body.push_str("</a:tr>");
            }
            shapes.push_str(&format!(
                r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{id}" name="Table {id}"/></p:nvGraphicFramePr><p:xfrm><a:off x="0" y="0"/></p:xfrm><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl>{body}</a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#,
                id = idx + 100,
                body = body,
            ));
        }

        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree>{}</p:spTree></p:cSld></p:sld>"#,
            shapes
        )
    }
}

/// Assembles slides into a .pptx byte buffer.
#[derive(Debug, Clone, Default)]
pub struct DeckBuilder {
    slides: Vec<SlideSpec>,
}

impl DeckBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slide(mut self, slide: SlideSpec) -> Self {
        self.slides.push(slide);
        self
    }

    /// Write the package. Slide parts are numbered in reverse so that
    /// presentation order only holds if `sldIdLst` is honoured.
    pub fn build(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        let count = self.slides.len();

        let mut overrides = String::new();
        let mut rels = String::new();
        let mut ids = String::new();

        for (idx, slide) in self.slides.iter().enumerate() {
            let part = count - idx;
            overrides.push_str(&format!(
                r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#,
                part
            ));
            rels.push_str(&format!(
                r#"<Relationship Id="rId{rid}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{part}.xml"/>"#,
                rid = part + 1,
                part = part
            ));
            ids.push_str(&format!(
                r#"<p:sldId id="{}" r:id="rId{}"/>"#,
                256 + idx,
                part + 1
            ));

            zip.start_file(format!("ppt/slides/slide{}.xml", part), options)
                .expect("start slide part");
            zip.write_all(slide.to_xml().as_bytes()).expect("write slide part");
        }

        let files = [
            (
                "[Content_Types].xml".to_string(),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/>{}</Types>"#,
                    overrides
                ),
            ),
            (
                "ppt/_rels/presentation.xml.rels".to_string(),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>{}</Relationships>"#,
                    rels
                ),
            ),
            (
                "ppt/presentation.xml".to_string(),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><p:presentation xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:sldIdLst>{}</p:sldIdLst></p:presentation>"#,
                    ids
                ),
            ),
        ];

        for (name, content) in files {
            zip.start_file(name, options).expect("start package part");
            zip.write_all(content.as_bytes()).expect("write package part");
        }

        zip.finish().expect("finish package").into_inner()
    }
}

fn paragraphs(text: &str) -> String {
    text.split('\n')
        .map(|line| format!("<a:p><a:r><a:t>{}</a:t></a:r></a:p>", escape(line)))
        .collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
