// Category filter for the dashboard

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::record::SalesRecord;

/// Categories currently selected in the dashboard
///
/// An empty selection selects nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSelection(BTreeSet<String>);

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select every category that appears in `dataset`
    pub fn all_of(dataset: &[SalesRecord]) -> Self {
        categories_of(dataset).into_iter().collect()
    }

    pub fn contains(&self, category: &str) -> bool {
        self.0.contains(category)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for FilterSelection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Keep records whose category is selected, preserving order
pub fn filter_records(dataset: &[SalesRecord], selection: &FilterSelection) -> Vec<SalesRecord> {
    dataset
        .iter()
        .filter(|record| selection.contains(&record.category))
        .cloned()
        .collect()
}

/// Distinct categories present in `dataset`, sorted
pub fn categories_of(dataset: &[SalesRecord]) -> Vec<String> {
    dataset
        .iter()
        .map(|record| record.category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
