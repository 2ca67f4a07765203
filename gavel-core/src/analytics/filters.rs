//! Facet derivation and filter application.
//!
//! Facets are always derived from the *full* grouped sequence so the filter
//! controls stay stable while playback scrubs. Filtering operates on the flat
//! event sequence: each event inherits the facet values of its owning
//! exchange, so a prompt event with no violation data is still kept when a
//! sibling verdict's category is selected.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::exchange::{group_exchanges, Exchange};
use crate::types::TimelineEvent;

/// Distinct facet values observed across the full grouped sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facets {
    /// Sorted distinct response categories (includes "Uncategorized")
    pub categories: Vec<String>,
    /// Sorted distinct verdict violation categories
    pub violation_categories: Vec<String>,
}

impl Facets {
    pub fn derive(exchanges: &[Exchange]) -> Self {
        let mut categories: BTreeSet<String> = BTreeSet::new();
        let mut violations: BTreeSet<String> = BTreeSet::new();

        for exchange in exchanges {
            categories.insert(exchange.category());
            violations.extend(exchange.violation_categories());
        }

        Self {
            categories: categories.into_iter().collect(),
            violation_categories: violations.into_iter().collect(),
        }
    }
}

/// Active filter selections. Empty selection on a facet means "no filter."
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    categories: BTreeSet<String>,
    violations: BTreeSet<String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_category(&mut self, value: &str) {
        if !self.categories.remove(value) {
            self.categories.insert(value.to_string());
        }
    }

    pub fn toggle_violation(&mut self, value: &str) {
        if !self.violations.remove(value) {
            self.violations.insert(value.to_string());
        }
    }

    pub fn clear(&mut self) {
        self.categories.clear();
        self.violations.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.violations.is_empty()
    }

    pub fn selected_categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    pub fn selected_violations(&self) -> &BTreeSet<String> {
        &self.violations
    }

    /// Intersection semantics: both active facets must match.
    pub fn passes(&self, exchange: &Exchange) -> bool {
        let category_ok =
            self.categories.is_empty() || self.categories.contains(&exchange.category());
        let violation_ok = self.violations.is_empty()
            || exchange
                .violation_categories()
                .iter()
                .any(|c| self.violations.contains(c));
        category_ok && violation_ok
    }
}

/// Keep only events whose owning exchange passes the filter.
pub fn filter_events(events: &[TimelineEvent], filters: &FilterSet) -> Vec<TimelineEvent> {
    if filters.is_empty() {
        return events.to_vec();
    }

    let exchanges = group_exchanges(events);
    let passing: HashSet<&str> = exchanges
        .iter()
        .filter(|x| filters.passes(x))
        .map(|x| x.id.as_str())
        .collect();

    events
        .iter()
        .filter(|e| passing.contains(e.exchange_id.as_str()))
        .cloned()
        .collect()
}

/// Map each exchange id to whether it passes, for render layers that dim
/// rather than drop.
pub fn pass_map<'a>(exchanges: &'a [Exchange], filters: &FilterSet) -> HashMap<&'a str, bool> {
    exchanges
        .iter()
        .map(|x| (x.id.as_str(), filters.passes(x)))
        .collect()
}
