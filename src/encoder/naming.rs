//! Name normalisation and the name -> records index

use std::collections::HashMap;

/// Normalizes a display name for joining against external name lists
///
/// Strips all whitespace (including no-break spaces) and folds fullwidth
/// parentheses to their ASCII forms.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '（' => '(',
            '）' => ')',
            other => other,
        })
        .collect()
}

/// Maps a normalized name to every record id carrying that name
///
/// Names are not unique: one parent organisation may run several stays.
/// The index is rebuilt from the store for each bulk merge and never persisted.
#[derive(Debug, Default, Clone)]
pub struct NamingIndex {
    by_name: HashMap<String, Vec<i64>>,
}

impl NamingIndex {
    /// Builds the index from `(record_id, raw_name)` pairs
    pub fn from_rows<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (i64, S)>,
        S: AsRef<str>,
    {
        let mut by_name: HashMap<String, Vec<i64>> = HashMap::new();
        for (id, name) in rows {
            let key = normalize_name(name.as_ref());
            if key.is_empty() {
                continue;
            }
            by_name.entry(key).or_default().push(id);
        }
        Self { by_name }
    }

    /// Record ids for a name (normalized before lookup)
    pub fn ids_for(&self, name: &str) -> &[i64] {
        self.by_name
            .get(&normalize_name(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
