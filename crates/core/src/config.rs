//! Configuration slide resolution.
//!
//! The first slide of a deck carries free text such as:
//!
//! ```text
//! Functionalities: 7, 8, 9
//! Scopes: 10, 11, 12
//! VISA: https://example.com/visa_link
//! ```
//!
//! which tells the extractor where the functionality and scope tables live
//! and which documentation link to carry into the generated descriptions.

use serde::{Deserialize, Serialize};

/// Key listing the slides that hold functionality tables.
pub const FUNCTIONALITIES_KEY: &str = "Functionalities";
/// Key listing the slides that hold scope tables.
pub const SCOPES_KEY: &str = "Scopes";
/// Key holding the documentation link.
pub const REFERENCE_LINK_KEY: &str = "VISA";

/// Settings read from the configuration slide. Immutable once resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMap {
    /// 1-based slide numbers of functionality tables, ascending.
    #[serde(rename = "Functionalities", skip_serializing_if = "Option::is_none", default)]
    pub functionality_slides: Option<Vec<usize>>,

    /// 1-based slide numbers of scope tables, ascending.
    #[serde(rename = "Scopes", skip_serializing_if = "Option::is_none", default)]
    pub scope_slides: Option<Vec<usize>>,

    /// Opaque documentation link, stored verbatim.
    #[serde(rename = "VISA", skip_serializing_if = "Option::is_none", default)]
    pub reference_link: Option<String>,
}

impl ConfigMap {
    /// Functionality slide numbers, empty when the key was absent.
    pub fn functionality_slides(&self) -> &[usize] {
        self.functionality_slides.as_deref().unwrap_or_default()
    }

    /// Scope slide numbers, empty when the key was absent.
    pub fn scope_slides(&self) -> &[usize] {
        self.scope_slides.as_deref().unwrap_or_default()
    }
}

/// Reads `key: value` lines from the configuration slide text.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver;

impl ConfigResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the configuration from newline-joined slide text.
    ///
    /// Lines without a colon or with an unknown key are ignored. Slide lists
    /// keep only positive integer tokens; everything else is dropped silently.
    /// A repeated key replaces the earlier value.
    pub fn resolve(&self, text: &str) -> ConfigMap {
        let mut config = ConfigMap::default();

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim() {
                FUNCTIONALITIES_KEY => config.functionality_slides = Some(parse_slide_list(value)),
                SCOPES_KEY => config.scope_slides = Some(parse_slide_list(value)),
                REFERENCE_LINK_KEY => config.reference_link = Some(value.to_string()),
                other => log::trace!("Ignoring configuration line with key '{}'", other),
            }
        }

        config
    }
}

/// Parse a comma-separated list of slide numbers into a sorted, deduplicated list.
pub(crate) fn parse_slide_list(value: &str) -> Vec<usize> {
    let mut numbers: Vec<usize> = parse_number_tokens(value)
        .into_iter()
        .filter(|&n| n > 0)
        .collect();
    numbers.sort_unstable();
    numbers.dedup();
    numbers
}

/// Parse comma-separated integer tokens in order, dropping anything non-numeric.
pub(crate) fn parse_number_tokens(value: &str) -> Vec<usize> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|token| token.parse().ok())
        .collect()
}
