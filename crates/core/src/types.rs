//! Slide model shared by format backends and the extraction phases.

use serde::{Deserialize, Serialize};

/// An entire presentation with its extracted content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Presentation {
    /// Original filename (without path).
    pub filename: String,

    /// Slides in presentation order.
    pub slides: Vec<ExtractedSlide>,
}

impl Presentation {
    /// Create a new, empty presentation with the given filename.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            slides: Vec::new(),
        }
    }

    /// Add a slide to the presentation.
    pub fn add_slide(&mut self, slide: ExtractedSlide) {
        self.slides.push(slide);
    }

    /// Number of slides.
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Look up a slide by its 1-based number.
    pub fn slide(&self, number: usize) -> Option<&ExtractedSlide> {
        number.checked_sub(1).and_then(|idx| self.slides.get(idx))
    }
}

/// A single extracted slide.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedSlide {
    /// 1-based slide number.
    pub number: usize,

    /// Text shapes on this slide, in reading order.
    pub lines: Vec<SlideText>,

    /// Tables on this slide, in document order.
    pub tables: Vec<SlideTable>,
}

impl ExtractedSlide {
    /// Create a new slide with the given number.
    pub fn new(number: usize) -> Self {
        Self {
            number,
            lines: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Add a text shape to this slide.
    pub fn add_line(&mut self, text: impl Into<String>) {
        self.lines.push(SlideText::new(text));
    }

    /// Add a text shape with position information.
    pub fn add_line_with_position(&mut self, text: impl Into<String>, y: f64, x: f64) {
        self.lines.push(SlideText::with_position(text, y, x));
    }

    /// Add a table to this slide.
    pub fn add_table(&mut self, table: SlideTable) {
        self.tables.push(table);
    }

    /// Sort text shapes by position (top-to-bottom, then left-to-right).
    pub fn sort_by_position(&mut self) {
        self.lines.sort_by(|a, b| {
            let y_cmp = a
                .y_position
                .partial_cmp(&b.y_position)
                .unwrap_or(std::cmp::Ordering::Equal);
            if y_cmp == std::cmp::Ordering::Equal {
                a.x_position
                    .partial_cmp(&b.x_position)
                    .unwrap_or(std::cmp::Ordering::Equal)
            } else {
                y_cmp
            }
        });
    }

    /// All text shapes joined with newlines.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Text content from a shape or text frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideText {
    /// The actual text content.
    pub text: String,

    /// Y position for ordering (top-to-bottom). None if unknown.
    pub y_position: Option<f64>,

    /// X position for ordering (left-to-right). None if unknown.
    pub x_position: Option<f64>,
}

impl SlideText {
    /// Create new slide text without position info.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            y_position: None,
            x_position: None,
        }
    }

    /// Create new slide text with position info.
    pub fn with_position(text: impl Into<String>, y: f64, x: f64) -> Self {
        Self {
            text: text.into(),
            y_position: Some(y),
            x_position: Some(x),
        }
    }
}

/// A table shape: rows of cell texts. Row 0 is conventionally the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideTable {
    pub rows: Vec<Vec<String>>,
}

impl SlideTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Build a table from string slices, handy for tests and fixtures.
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slide_lookup_is_one_based() {
        let mut presentation = Presentation::new("deck.pptx");
        presentation.add_slide(ExtractedSlide::new(1));
        presentation.add_slide(ExtractedSlide::new(2));

        assert!(presentation.slide(0).is_none());
        assert_eq!(presentation.slide(2).map(|s| s.number), Some(2));
        assert!(presentation.slide(3).is_none());
    }

    #[test]
    fn test_sort_by_position_and_text() {
        let mut slide = ExtractedSlide::new(1);
        slide.add_line_with_position("bottom", 200.0, 0.0);
        slide.add_line_with_position("top right", 10.0, 50.0);
        slide.add_line_with_position("top left", 10.0, 5.0);
        slide.sort_by_position();

        assert_eq!(slide.text(), "top left\ntop right\nbottom");
    }
}
