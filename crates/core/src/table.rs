//! Tolerant extraction of typed rows from slide tables.
//!
//! Slide tables are authored by hand, so nothing here fails: rows that do not
//! match the expected column count are dropped and reported as [`Skip`]s.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::records::ArtifactRole;
use crate::types::ExtractedSlide;

/// A record that can be built from one table row.
pub trait TableRecord: Sized {
    /// Expected column names, in table order.
    const COLUMNS: &'static [&'static str];

    /// Build the record from a row zipped against [`Self::COLUMNS`].
    fn from_row(row: TableRow, slide: usize) -> Self;
}

/// One data row keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    fields: BTreeMap<&'static str, String>,
}

impl TableRow {
    /// Zip cells against a schema. Returns `None` when the widths differ.
    pub fn zip(schema: &[&'static str], cells: &[String]) -> Option<Self> {
        if schema.len() != cells.len() {
            return None;
        }
        let fields = schema
            .iter()
            .zip(cells)
            .map(|(name, value)| (*name, value.trim().to_string()))
            .collect();
        Some(Self { fields })
    }

    /// Value of a column, or an empty string if the schema lacks it.
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }
}

/// Why part of the input was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Skip {
    /// A table row had the wrong number of cells.
    RowWidth {
        slide: usize,
        table: usize,
        row: usize,
        expected: usize,
        found: usize,
    },
    /// A configured slide has no qualifying table rows.
    NoTableData { slide: usize },
    /// A configured slide number is not in the deck.
    SlideOutOfRange { slide: usize, slide_count: usize },
    /// An impact/architecture slide number is not among the rendered pages.
    PageOutOfRange {
        feature: String,
        role: ArtifactRole,
        slide: usize,
        page_count: usize,
    },
    /// Page rendering failed, so no images could be produced.
    RenderUnavailable { reason: String },
    /// One artifact could not be written.
    ExportFailed {
        feature: String,
        role: ArtifactRole,
        slide: usize,
        reason: String,
    },
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowWidth {
                slide,
                table,
                row,
                expected,
                found,
            } => write!(
                f,
                "slide {} table {} row {}: expected {} cells, found {}",
                slide, table, row, expected, found
            ),
            Self::NoTableData { slide } => write!(f, "no table data found on slide {}", slide),
            Self::SlideOutOfRange { slide, slide_count } => write!(
                f,
                "slide {} not found in the presentation ({} slides)",
                slide, slide_count
            ),
            Self::PageOutOfRange {
                feature,
                role,
                slide,
                page_count,
            } => write!(
                f,
                "{} {} slide {} outside rendered pages 1..={}",
                feature, role, slide, page_count
            ),
            Self::RenderUnavailable { reason } => write!(f, "pages not rendered: {}", reason),
            Self::ExportFailed {
                feature,
                role,
                slide,
                reason,
            } => write!(f, "{} {} slide {} not exported: {}", feature, role, slide, reason),
        }
    }
}

/// Records that were parsed plus everything that was skipped on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub skipped: Vec<Skip>,
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> Parsed<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append another result, keeping record order.
    pub fn append(&mut self, other: Parsed<T>) {
        self.records.extend(other.records);
        self.skipped.extend(other.skipped);
    }

    pub fn skip(&mut self, reason: Skip) {
        log::warn!("Skipping: {}", reason);
        self.skipped.push(reason);
    }
}

/// Reads typed records out of every table on a slide.
#[derive(Debug, Clone, Default)]
pub struct SlideTableParser;

impl SlideTableParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse all tables on `slide` as rows of `T`.
    ///
    /// Row 0 of each table is a header and is discarded. Data rows from
    /// several tables are concatenated in table order, then row order.
    pub fn parse<T: TableRecord>(&self, slide: &ExtractedSlide) -> Parsed<T> {
        let mut parsed = Parsed::new();

        for (table_idx, table) in slide.tables.iter().enumerate() {
            for (row_idx, cells) in table.rows.iter().enumerate().skip(1) {
                match TableRow::zip(T::COLUMNS, cells) {
                    Some(row) => parsed.records.push(T::from_row(row, slide.number)),
                    None => parsed.skip(Skip::RowWidth {
                        slide: slide.number,
                        table: table_idx + 1,
                        row: row_idx,
                        expected: T::COLUMNS.len(),
                        found: cells.len(),
                    }),
                }
            }
        }

        if parsed.records.is_empty() {
            parsed.skip(Skip::NoTableData {
                slide: slide.number,
            });
        }

        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{FeatureRecord, ScopeRecord};
    use crate::types::SlideTable;

    fn feature_slide() -> ExtractedSlide {
        let mut slide = ExtractedSlide::new(7);
        slide.add_line("Functionalities");
        slide.add_table(SlideTable::from_rows(vec![
            vec!["Numéro", "ID Jira", "Nom", "Hyp", "Crit", "Sizing"],
            vec!["E69F01", "PRJ-1", "Noise map", "Less noise", "Map shown", "2"],
            vec!["E69F02", "", "Data feed", "Fresh data", "Feed live", "3"],
            vec!["broken", "row"],
        ]));
        slide
    }

    #[test]
    fn test_header_skipped_and_malformed_row_dropped() {
        let parsed: Parsed<FeatureRecord> = SlideTableParser::new().parse(&feature_slide());

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].number, "E69F01");
        assert_eq!(parsed.records[0].tracker_key(), Some("PRJ-1"));
        assert_eq!(parsed.records[1].tracker_key(), None);
        assert_eq!(
            parsed.skipped,
            vec![Skip::RowWidth {
                slide: 7,
                table: 1,
                row: 3,
                expected: 6,
                found: 2
            }]
        );
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parser = SlideTableParser::new();
        let slide = feature_slide();

        let first: Parsed<FeatureRecord> = parser.parse(&slide);
        let second: Parsed<FeatureRecord> = parser.parse(&slide);
        assert_eq!(first, second);
    }

    #[test]
    fn test_multiple_tables_are_concatenated_in_order() {
        let mut slide = ExtractedSlide::new(10);
        slide.add_table(SlideTable::from_rows(vec![
            vec!["h"; 5],
            vec!["F1", "Scope A", "App1, App2", "Ann", "Impacts: 3"],
        ]));
        slide.add_table(SlideTable::from_rows(vec![
            vec!["h"; 5],
            vec!["F2", "Scope B", "App3", "Bob", "Architectures: 4"],
            vec!["F1", "Scope C", "", "", ""],
        ]));

        let parsed: Parsed<ScopeRecord> = SlideTableParser::new().parse(&slide);
        let numbers: Vec<&str> = parsed.records.iter().map(|r| r.number.as_str()).collect();

        assert_eq!(numbers, vec!["F1", "F2", "F1"]);
        assert!(parsed.records.iter().all(|r| r.source_slide == 10));
        assert_eq!(parsed.records[0].application_names(), vec!["App1", "App2"]);
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_header_only_table_reports_no_data() {
        let mut slide = ExtractedSlide::new(3);
        slide.add_table(SlideTable::from_rows(vec![vec!["h"; 6]]));

        let parsed: Parsed<FeatureRecord> = SlideTableParser::new().parse(&slide);
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.skipped, vec![Skip::NoTableData { slide: 3 }]);
    }

    #[test]
    fn test_row_zip() {
        let cells = vec![" a ".to_string(), "b".to_string()];
        let row = TableRow::zip(&["x", "y"], &cells).unwrap();

        assert_eq!(row.get("x"), "a");
        assert_eq!(row.get("missing"), "");
        assert!(TableRow::zip(&["x"], &cells).is_none());
    }
}
