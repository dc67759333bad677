//! Detail page extraction
//!
//! Each field is extracted independently and best-effort: a field whose markup
//! is missing or unexpected is left absent while the others are still
//! collected. Only a missing root content container fails the whole page, in
//! which case every field is absent and the image list is empty.

use crate::config::{compile_pattern, compile_selector, DetailRules};
use crate::storage::RecordFields;
use crate::ConfigError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::ser::{Serialize, SerializeMap, Serializer};
use url::Url;

/// First run of digits and phone separators
const PHONE_RUN_PATTERN: &str = r"[\d\- /]+";

/// Everything extracted from one detail page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailResult {
    pub fields: RecordFields,
    /// Adult price, if the price table carried one
    pub price: Option<i64>,
    /// Absolute image URLs, unique within the page
    pub images: Vec<String>,
}

impl DetailResult {
    /// True if nothing at all was extracted
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.price.is_none() && self.images.is_empty()
    }
}

/// Program schedule: ordered days, each an ordered list of time slots
///
/// Serializes as a compact JSON object that keeps source order, e.g.
/// `{"Day1":{"09:00":"meditation"}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    days: Vec<ScheduleDay>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleDay {
    pub label: String,
    pub slots: Vec<(String, String)>,
}

impl Schedule {
    #[cfg(test)]
    pub(crate) fn days(&self) -> &[ScheduleDay] {
        &self.days
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Returns the index of the day bucket named `label`, creating it if new
    fn day_index(&mut self, label: String) -> usize {
        match self.days.iter().position(|day| day.label == label) {
            Some(index) => index,
            None => {
                self.days.push(ScheduleDay {
                    label,
                    slots: Vec::new(),
                });
                self.days.len() - 1
            }
        }
    }

    /// Compact JSON, or `None` for an empty schedule
    pub fn to_json(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        serde_json::to_string(self).ok()
    }
}

impl ScheduleDay {
    /// Sets the activity for a time slot; a repeated time replaces the earlier
    /// activity but keeps its position
    fn set(&mut self, time: String, activity: String) {
        match self.slots.iter_mut().find(|(t, _)| *t == time) {
            Some(slot) => slot.1 = activity,
            None => self.slots.push((time, activity)),
        }
    }
}

impl Serialize for Schedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.days.len()))?;
        for day in &self.days {
            map.serialize_entry(&day.label, day)?;
        }
        map.end()
    }
}

impl Serialize for ScheduleDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for (time, activity) in &self.slots {
            map.serialize_entry(time, activity)?;
        }
        map.end()
    }
}

/// Parent name, address and phone from the composite info block
#[derive(Debug, Default)]
struct InfoBlock {
    parent_name: Option<String>,
    address: Option<String>,
    phone: Option<String>,
}

/// Detail extractor compiled from [`DetailRules`]
#[derive(Debug, Clone)]
pub struct DetailExtractor {
    root: Selector,
    name: Selector,
    info_item: Selector,
    address_label: String,
    phone_label: String,
    delimiter: String,
    phone_hint: Regex,
    phone_run: Regex,
    section: Selector,
    heading: Selector,
    intro_heading: String,
    intro_body: Selector,
    schedule_heading: String,
    schedule_table: Selector,
    price_table: Selector,
    price_label: String,
    currency_suffix: String,
    gallery: Selector,
    content_image_pattern: String,
    paragraph: Selector,
    row: Selector,
    cell: Selector,
    header_cell: Selector,
    image: Selector,
    origin: Url,
}

impl DetailExtractor {
    /// Compiles the rules; relative image paths resolve against `site_origin`
    pub fn from_rules(rules: &DetailRules, site_origin: &str) -> Result<Self, ConfigError> {
        let origin = Url::parse(site_origin)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid site_origin: {}", e)))?;

        Ok(Self {
            root: compile_selector(&rules.root_selector)?,
            name: compile_selector(&rules.name_selector)?,
            info_item: compile_selector(&rules.info_item_selector)?,
            address_label: rules.address_label.clone(),
            phone_label: rules.phone_label.clone(),
            delimiter: rules.composite_delimiter.clone(),
            phone_hint: compile_pattern(&rules.phone_hint_pattern)?,
            phone_run: compile_pattern(PHONE_RUN_PATTERN)?,
            section: compile_selector(&rules.section_selector)?,
            heading: compile_selector(&rules.heading_selector)?,
            intro_heading: rules.intro_heading.clone(),
            intro_body: compile_selector(&rules.intro_body_selector)?,
            schedule_heading: rules.schedule_heading.clone(),
            schedule_table: compile_selector(&rules.schedule_table_selector)?,
            price_table: compile_selector(&rules.price_table_selector)?,
            price_label: rules.price_label.clone(),
            currency_suffix: rules.currency_suffix.clone(),
            gallery: compile_selector(&rules.gallery_selector)?,
            content_image_pattern: rules.content_image_pattern.clone(),
            paragraph: compile_selector("p")?,
            row: compile_selector("tr")?,
            cell: compile_selector("td")?,
            header_cell: compile_selector("th")?,
            image: compile_selector("img")?,
            origin,
        })
    }

    /// Extracts every field of one detail page
    pub fn extract(&self, html: &str) -> DetailResult {
        let document = Html::parse_document(html);

        let Some(root) = document.select(&self.root).next() else {
            tracing::debug!("detail: root container not found");
            return DetailResult::default();
        };

        let info = self.extract_info(root);
        let fields = RecordFields {
            display_name: root
                .select(&self.name)
                .next()
                .and_then(|name| non_empty(&element_text(name))),
            parent_name: info.parent_name,
            address: info.address,
            phone: info.phone,
            description: self.extract_intro(&document),
            schedule: self.extract_schedule(&document).and_then(|s| s.to_json()),
        };

        DetailResult {
            fields,
            price: self.extract_price(&document),
            images: self.extract_images(&document),
        }
    }

    fn extract_info(&self, root: ElementRef) -> InfoBlock {
        let mut info = InfoBlock::default();

        for item in root.select(&self.info_item) {
            let label = item
                .select(&self.image)
                .next()
                .and_then(|img| img.value().attr("alt"))
                .unwrap_or("");

            // Only the item's own text nodes; the label lives in child elements
            let value: String = item
                .children()
                .filter_map(|node| node.value().as_text())
                .map(|text| text.trim())
                .filter(|text| !text.is_empty())
                .collect();

            if label.contains(&self.address_label) {
                match value.split_once(self.delimiter.as_str()) {
                    Some((parent, address)) => {
                        info.parent_name = non_empty(parent);
                        info.address = non_empty(address);
                    }
                    None => info.address = non_empty(&value),
                }
            } else if label.contains(&self.phone_label) || self.phone_hint.is_match(&value) {
                if let Some(phone) = self.normalize_phone(&value) {
                    info.phone = Some(phone);
                }
            }
        }

        info
    }

    /// First digit-and-separator run; of slash-separated alternatives, the last
    pub fn normalize_phone(&self, text: &str) -> Option<String> {
        let run = self
            .phone_run
            .find_iter(text)
            .map(|m| m.as_str().trim())
            .find(|run| run.chars().any(|c| c.is_ascii_digit()))?;

        let phone = match run.rsplit_once('/') {
            Some((_, last)) => last.trim(),
            None => run,
        };
        non_empty(phone)
    }

    fn heading_matches(&self, section: ElementRef, label: &str) -> bool {
        section
            .select(&self.heading)
            .next()
            .map_or(false, |heading| element_text(heading).contains(label))
    }

    fn intro_body_in<'a>(&self, container: ElementRef<'a>) -> Option<ElementRef<'a>> {
        container
            .select(&self.intro_body)
            .find(|body| body.select(&self.paragraph).next().is_some())
    }

    fn extract_intro(&self, document: &Html) -> Option<String> {
        let mut bodies: Vec<ElementRef> = document
            .select(&self.section)
            .filter(|section| self.heading_matches(*section, &self.intro_heading))
            .filter_map(|section| self.intro_body_in(section))
            .collect();

        // Some pages render the heading as an image instead of text
        if bodies.is_empty() {
            for img in document.select(&self.image) {
                if img.value().attr("alt").map(str::trim) != Some(self.intro_heading.as_str()) {
                    continue;
                }
                // The body sits beside the heading's wrapper, inside the same block
                let body = img
                    .parent()
                    .and_then(|wrapper| wrapper.parent())
                    .and_then(ElementRef::wrap)
                    .and_then(|block| self.intro_body_in(block));
                if let Some(body) = body {
                    if !bodies.iter().any(|b| b.id() == body.id()) {
                        bodies.push(body);
                    }
                }
            }
        }

        let paragraphs: Vec<String> = bodies
            .iter()
            .flat_map(|body| body.select(&self.paragraph))
            .map(|p| collapse_lines(&p.text().collect::<String>()))
            .filter(|text| !text.is_empty())
            .collect();

        if paragraphs.is_empty() {
            None
        } else {
            Some(paragraphs.join("\n\n"))
        }
    }

    fn extract_schedule(&self, document: &Html) -> Option<Schedule> {
        let section = document
            .select(&self.section)
            .find(|section| self.heading_matches(*section, &self.schedule_heading))?;
        let table = section.select(&self.schedule_table).next()?;

        let schedule = self.parse_schedule_table(table);
        if schedule.is_empty() {
            None
        } else {
            Some(schedule)
        }
    }

    /// Walks the rows top to bottom
    ///
    /// A three-cell row with a day label opens (or reopens) that day; rows
    /// without a day label append to the current day. Rows before the first
    /// day label and rows of any other shape are ignored.
    pub fn parse_schedule_table(&self, table: ElementRef) -> Schedule {
        let mut schedule = Schedule::default();
        let mut current: Option<usize> = None;

        for row in table.select(&self.row) {
            let cells: Vec<String> = row.select(&self.cell).map(element_text).collect();

            let (time, activity) = match cells.as_slice() {
                [day, time, activity] => {
                    let day: String = day.chars().filter(|c| !c.is_whitespace()).collect();
                    if !day.is_empty() {
                        current = Some(schedule.day_index(day));
                    }
                    (time, activity)
                }
                [time, activity] => (time, activity),
                _ => continue,
            };

            if let Some(index) = current {
                schedule.days[index].set(time.clone(), activity.clone());
            }
        }

        schedule
    }

    /// Adult price from the first table that carries the price label
    fn extract_price(&self, document: &Html) -> Option<i64> {
        document
            .select(&self.price_table)
            .find_map(|table| self.price_in_table(table))
    }

    /// The header row containing the label; the value is in the next row
    fn price_in_table(&self, table: ElementRef) -> Option<i64> {
        let rows: Vec<ElementRef> = table.select(&self.row).collect();

        let header = rows.iter().position(|row| {
            row.select(&self.header_cell)
                .next()
                .map_or(false, |th| element_text(th).contains(&self.price_label))
        })?;

        let cell = rows.get(header + 1)?.select(&self.cell).next()?;
        parse_price(&element_text(cell), &self.currency_suffix)
    }

    fn extract_images(&self, document: &Html) -> Vec<String> {
        let gallery = document
            .select(&self.gallery)
            .filter_map(|img| img.value().attr("src"));
        let content = document
            .select(&self.image)
            .filter_map(|img| img.value().attr("src"))
            .filter(|src| src.contains(&self.content_image_pattern));

        let mut images: Vec<String> = Vec::new();
        for src in gallery.chain(content) {
            let Some(url) = self.resolve_image(src) else {
                tracing::debug!("detail: unresolvable image src {:?}", src);
                continue;
            };
            if !images.contains(&url) {
                images.push(url);
            }
        }
        images
    }

    fn resolve_image(&self, src: &str) -> Option<String> {
        let src = src.trim();
        if src.is_empty() {
            return None;
        }
        self.origin.join(src).ok().map(|url| url.to_string())
    }
}

/// Parses a price cell such as `70,000원`
pub fn parse_price(text: &str, currency_suffix: &str) -> Option<i64> {
    let stripped = if currency_suffix.is_empty() {
        text.to_string()
    } else {
        text.replace(currency_suffix, "")
    };
    let digits: String = stripped
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    digits.parse::<i64>().ok().filter(|price| *price >= 0)
}

/// Text of an element with every text node trimmed
fn element_text(element: ElementRef) -> String {
    element.text().map(str::trim).collect()
}

/// Trims each line and drops blank ones
fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
