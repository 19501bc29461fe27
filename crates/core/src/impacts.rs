//! Association of features with the diagram slides their scopes reference.

use std::collections::{BTreeSet, HashMap};

use crate::config::parse_number_tokens;
use crate::records::{AssociationRecord, FeatureRecord, ScopeRecord};

/// Label of the impact slide list inside a scope's "Impacts / Architecture" cell.
pub const IMPACTS_LABEL: &str = "Impacts:";
/// Label of the architecture slide list.
pub const ARCHITECTURES_LABEL: &str = "Architectures:";

/// Parse a cell of the form:
///
/// ```text
/// Impacts: 10, 11
/// Architectures: 12, 13
/// ```
///
/// into `(impacts, architectures)`, in the order written. A missing or empty
/// label line gives an empty list; other lines are ignored.
pub fn parse_impacts_architecture(text: &str) -> (Vec<usize>, Vec<usize>) {
    let mut impacts = Vec::new();
    let mut architectures = Vec::new();

    for line in text.lines() {
        let line = line.trim_start();
        if let Some(raw) = line.strip_prefix(IMPACTS_LABEL) {
            impacts = parse_number_tokens(raw);
        } else if let Some(raw) = line.strip_prefix(ARCHITECTURES_LABEL) {
            architectures = parse_number_tokens(raw);
        }
    }

    (impacts, architectures)
}

/// Build one association per feature by folding every scope row that shares
/// its number. Features without scopes still get a record, with empty lists.
pub fn associate(features: &[FeatureRecord], scopes: &[ScopeRecord]) -> Vec<AssociationRecord> {
    let mut by_number: HashMap<&str, Vec<&ScopeRecord>> = HashMap::new();
    for scope in scopes {
        by_number.entry(scope.number.as_str()).or_default().push(scope);
    }

    features
        .iter()
        .map(|feature| {
            let mut impacts = BTreeSet::new();
            let mut architectures = BTreeSet::new();

            for scope in by_number.get(feature.number.as_str()).into_iter().flatten() {
                let (i, a) = parse_impacts_architecture(&scope.impacts_architecture_text);
                impacts.extend(i);
                architectures.extend(a);
            }

            AssociationRecord {
                number: feature.number.clone(),
                impact_slides: impacts.into_iter().collect(),
                architecture_slides: architectures.into_iter().collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(number: &str) -> FeatureRecord {
        FeatureRecord {
            number: number.to_string(),
            title: format!("Feature {}", number),
            ..Default::default()
        }
    }

    fn scope(number: &str, text: &str) -> ScopeRecord {
        ScopeRecord {
            number: number.to_string(),
            impacts_architecture_text: text.to_string(),
            source_slide: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_both_lines() {
        let (impacts, architectures) =
            parse_impacts_architecture("Impacts: 10, 11\nArchitectures: 12, 13");
        assert_eq!(impacts, vec![10, 11]);
        assert_eq!(architectures, vec![12, 13]);
    }

    #[test]
    fn test_parse_missing_labels() {
        assert_eq!(parse_impacts_architecture(""), (vec![], vec![]));
        assert_eq!(parse_impacts_architecture("Impacts: 4"), (vec![4], vec![]));
        assert_eq!(
            parse_impacts_architecture("notes\nArchitectures:"),
            (vec![], vec![])
        );
    }

    #[test]
    fn test_parse_keeps_written_order_and_drops_junk() {
        let (impacts, _) = parse_impacts_architecture("Impacts: 11, tbd, 10,10");
        assert_eq!(impacts, vec![11, 10, 10]);
    }

    #[test]
    fn test_associate_dedups_and_sorts() {
        let features = vec![feature("F1")];
        let scopes = vec![
            scope("F1", "Impacts: 11,10,10"),
            scope("F1", "Impacts: 9\nArchitectures: 5, 4"),
            scope("F2", "Impacts: 99"),
        ];

        let associations = associate(&features, &scopes);
        assert_eq!(
            associations,
            vec![AssociationRecord {
                number: "F1".to_string(),
                impact_slides: vec![9, 10, 11],
                architecture_slides: vec![4, 5],
            }]
        );
    }

    #[test]
    fn test_feature_without_scopes_is_kept() {
        let associations = associate(&[feature("F1"), feature("F3")], &[scope("F1", "Impacts: 2")]);

        assert_eq!(associations.len(), 2);
        assert_eq!(associations[1].number, "F3");
        assert!(associations[1].impact_slides.is_empty());
        assert!(associations[1].architecture_slides.is_empty());
    }
}
