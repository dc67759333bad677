//! Listing page extraction
//!
//! A listing page holds zero or more rows; each row yields one candidate
//! identifier plus the raw category labels shown next to it. A row that does
//! not match the expected markup is skipped without affecting the rest of the
//! page, and a page with no rows at all marks the end of pagination.

use crate::config::{compile_pattern, compile_selector, ListingRules};
use crate::ConfigError;
use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Selector};

/// One row of a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCandidate {
    pub identifier: String,
    pub type_labels: Vec<String>,
}

/// Everything extracted from one listing page
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub candidates: Vec<ListingCandidate>,
    /// Rows matched by the item selector, well-formed or not
    pub rows: usize,
    /// Rows that did not yield an identifier
    pub skipped: usize,
}

impl ListingPage {
    /// True if the page had no listing rows at all
    pub fn is_end(&self) -> bool {
        self.rows == 0
    }
}

/// Listing extractor compiled from [`ListingRules`]
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    item: Selector,
    link: Selector,
    link_attribute: String,
    pattern: Regex,
    template: String,
    type_label: Selector,
}

impl ListingExtractor {
    pub fn from_rules(rules: &ListingRules) -> Result<Self, ConfigError> {
        Ok(Self {
            item: compile_selector(&rules.item_selector)?,
            link: compile_selector(&rules.link_selector)?,
            link_attribute: rules.link_attribute.clone(),
            pattern: compile_pattern(&rules.identifier_pattern)?,
            template: rules.identifier_template.clone(),
            type_label: compile_selector(&rules.type_selector)?,
        })
    }

    /// Extracts the candidates of one page
    pub fn extract(&self, html: &str) -> Vec<ListingCandidate> {
        self.extract_page(html).candidates
    }

    /// Extracts the candidates of one page along with row accounting
    pub fn extract_page(&self, html: &str) -> ListingPage {
        let document = Html::parse_document(html);
        let mut page = ListingPage::default();

        for row in document.select(&self.item) {
            page.rows += 1;
            match self.extract_row(row) {
                Some(candidate) => page.candidates.push(candidate),
                None => page.skipped += 1,
            }
        }

        page
    }

    fn extract_row(&self, row: ElementRef) -> Option<ListingCandidate> {
        let Some(handler) = row
            .select(&self.link)
            .find_map(|link| link.value().attr(&self.link_attribute))
        else {
            tracing::debug!("listing: row without link handler, skipping");
            return None;
        };

        let Some(captures) = self.pattern.captures(handler) else {
            tracing::debug!("listing: handler {:?} does not match, skipping", handler);
            return None;
        };

        let type_labels = row
            .select(&self.type_label)
            .map(|label| label.text().collect::<String>().trim().to_string())
            .filter(|label| !label.is_empty())
            .collect();

        Some(ListingCandidate {
            identifier: self.fill_template(&captures),
            type_labels,
        })
    }

    /// Substitutes `{1}`, `{2}`... with the matching capture groups
    fn fill_template(&self, captures: &Captures) -> String {
        (1..captures.len()).fold(self.template.clone(), |acc, i| {
            let value = captures.get(i).map_or("", |m| m.as_str());
            acc.replace(&format!("{{{}}}", i), value)
        })
    }
}
