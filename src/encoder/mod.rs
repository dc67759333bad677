//! Bitmask encoding of categorical attributes
//!
//! Every categorical dimension (stay type, activity, region, amenity) has its own
//! vocabulary mapping a text label to a bit value. Encoding is pure: the same
//! text always yields the same integer and labels outside the vocabulary
//! contribute nothing.

mod naming;

pub use naming::{normalize_name, NamingIndex};

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Separator used by multi-label cells
pub const LABEL_SEPARATOR: char = ',';

/// The four independently encoded filter dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Type,
    Activity,
    Region,
    Amenity,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Type,
        Dimension::Activity,
        Dimension::Region,
        Dimension::Amenity,
    ];
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Type => "type",
            Self::Activity => "activity",
            Self::Region => "region",
            Self::Amenity => "amenity",
        };
        f.write_str(name)
    }
}

/// A label -> bit value mapping for one dimension
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Vocabulary {
    entries: BTreeMap<String, u32>,
}

impl Vocabulary {
    /// Builds a vocabulary from `(label, bit)` pairs
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self {
            entries: pairs.into_iter().map(|(l, b)| (l.into(), b)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Looks up a single label (exact match after trimming)
    pub fn bit(&self, label: &str) -> Option<u32> {
        self.entries.get(label.trim()).copied()
    }

    /// OR of every bit value in the vocabulary
    ///
    /// No encoding produced from this vocabulary can set a bit outside this mask.
    #[cfg(test)]
    pub(crate) fn mask(&self) -> u32 {
        self.entries.values().fold(0, |acc, bit| acc | bit)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(l, b)| (l.as_str(), *b))
    }

    /// Encodes a sequence of individual labels
    pub fn encode_labels<'a, I>(&self, labels: I) -> u32
    where
        I: IntoIterator<Item = &'a str>,
    {
        labels
            .into_iter()
            .filter_map(|label| self.bit(label))
            .fold(0, |acc, bit| acc | bit)
    }

    /// Encodes free text by substring containment of every known label
    pub fn encode_contains(&self, text: &str) -> u32 {
        self.iter()
            .filter(|(label, _)| !label.is_empty() && text.contains(label))
            .fold(0, |acc, (_, bit)| acc | bit)
    }

    /// Encodes an address by matching region names in its first token only
    ///
    /// Later tokens are ignored so a sub-address mentioning another region
    /// cannot set a second region bit.
    pub fn encode_region(&self, address: &str) -> u32 {
        match address.split_whitespace().next() {
            Some(first) => self.encode_contains(first),
            None => 0,
        }
    }
}

/// Encodes a comma-separated multi-label cell
///
/// Unknown labels are ignored silently.
///
/// # Example
///
/// ```
/// use jeolloga_sync::encoder::{encode, Vocabulary};
///
/// let vocab = Vocabulary::from_pairs([("A", 1), ("B", 2), ("C", 4)]);
/// assert_eq!(encode(&vocab, "A, C, unknown"), 5);
/// ```
pub fn encode(vocabulary: &Vocabulary, text: &str) -> u32 {
    vocabulary.encode_labels(text.split(LABEL_SEPARATOR).map(str::trim))
}

/// The complete set of vocabularies, one per dimension
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Vocabularies {
    #[serde(rename = "type")]
    pub stay_type: Vocabulary,
    pub activity: Vocabulary,
    pub region: Vocabulary,
    pub amenity: Vocabulary,
}

impl Vocabularies {
    pub fn get(&self, dimension: Dimension) -> &Vocabulary {
        match dimension {
            Dimension::Type => &self.stay_type,
            Dimension::Activity => &self.activity,
            Dimension::Region => &self.region,
            Dimension::Amenity => &self.amenity,
        }
    }
}
