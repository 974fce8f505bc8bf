//! Classify a legacy snapshot against an SDK baseline.
//!
//! Every authored property lands in exactly one of *defaulted*, *not
//! defaulted* or *changed*.  Every item of a type the legacy project uses lands
//! in exactly one of *defaulted*, *not defaulted*, *changed* or, for baseline
//! items, *introduced*.

use std::collections::{BTreeSet, HashSet};

use crate::snapshot::{Item, ProjectSnapshot, Property};

// ═══════════════════════════════════════════════════════════════════════════════
//  Item identity
// ═══════════════════════════════════════════════════════════════════════════════

/// Identity strategy shared by the differ and the rule engine.
pub trait ItemComparer {
    /// Same item type and include, ignoring ASCII case.
    fn same_include(&self, a: &Item, b: &Item) -> bool {
        a.item_type.eq_ignore_ascii_case(&b.item_type)
            && a.evaluated_include.eq_ignore_ascii_case(&b.evaluated_include)
    }

    /// Whether `a` and `b` are the same item under this strategy.
    fn same_identity(&self, a: &Item, b: &Item) -> bool;
}

/// Identity is `(item_type, include)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeOnly;

impl ItemComparer for IncludeOnly {
    fn same_identity(&self, a: &Item, b: &Item) -> bool {
        self.same_include(a, b)
    }
}

/// Identity is `(item_type, include)` plus the metadata as an ordered
/// sequence.  Metadata names ignore ASCII case; values are compared exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeAndMetadata;

impl ItemComparer for IncludeAndMetadata {
    fn same_identity(&self, a: &Item, b: &Item) -> bool {
        self.same_include(a, b)
            && a.metadata.len() == b.metadata.len()
            && a.metadata
                .iter()
                .zip(&b.metadata)
                .all(|((ka, va), (kb, vb))| ka.eq_ignore_ascii_case(kb) && va == vb)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Diff results
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertiesDiff {
    /// Authored with the value the baseline already has.
    pub defaulted: Vec<Property>,
    /// Authored, and unknown to the baseline.
    pub not_defaulted: Vec<Property>,
    /// Authored with a value different from the baseline's: `(original, baseline)`.
    pub changed: Vec<(Property, Property)>,
}

impl PropertiesDiff {
    pub fn is_defaulted(&self, name: &str) -> bool {
        self.defaulted.iter().any(|p| p.is_named(name))
    }

    pub fn is_empty(&self) -> bool {
        self.defaulted.is_empty() && self.not_defaulted.is_empty() && self.changed.is_empty()
    }
}

/// Classification of one item type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemsDiff {
    pub item_type: String,
    pub defaulted: Vec<Item>,
    pub not_defaulted: Vec<Item>,
    pub introduced: Vec<Item>,
    /// `(original, baseline)` pairs with the same include and different metadata.
    pub changed: Vec<(Item, Item)>,
}

impl ItemsDiff {
    pub fn is_empty(&self) -> bool {
        self.defaulted.is_empty()
            && self.not_defaulted.is_empty()
            && self.introduced.is_empty()
            && self.changed.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectDiff {
    pub properties: PropertiesDiff,
    pub items: Vec<ItemsDiff>,
}

impl ProjectDiff {
    pub fn items_of_type(&self, item_type: &str) -> Option<&ItemsDiff> {
        self.items.iter().find(|d| d.item_type.eq_ignore_ascii_case(item_type))
    }

    /// Whether `item` was classified defaulted under `comparer`.
    pub fn is_defaulted_item(&self, item: &Item, comparer: &dyn ItemComparer) -> bool {
        self.items_of_type(&item.item_type)
            .is_some_and(|d| d.defaulted.iter().any(|x| comparer.same_identity(x, item)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Differ
// ═══════════════════════════════════════════════════════════════════════════════

/// Diff `original` against `baseline`.
///
/// Only properties named in `authored` (ASCII case-insensitive) are
/// classified.  Items are grouped by the item types present in `original`.
pub fn diff(
    original: &ProjectSnapshot,
    authored: &BTreeSet<String>,
    baseline: &ProjectSnapshot,
    comparer: &dyn ItemComparer,
) -> ProjectDiff {
    ProjectDiff {
        properties: diff_properties(original, authored, baseline),
        items: original
            .item_types()
            .into_iter()
            .map(|item_type| diff_items(item_type, original, baseline, comparer))
            .collect(),
    }
}

pub fn diff_properties(
    original: &ProjectSnapshot,
    authored: &BTreeSet<String>,
    baseline: &ProjectSnapshot,
) -> PropertiesDiff {
    let authored: HashSet<String> = authored.iter().map(|n| n.to_ascii_lowercase()).collect();
    let mut seen = HashSet::new();
    let mut result = PropertiesDiff::default();

    for property in &original.properties {
        let key = property.name.to_ascii_lowercase();
        if !authored.contains(&key) || !seen.insert(key) {
            continue;
        }

        match baseline.property(&property.name) {
            Some(base) if base.evaluated_value == property.evaluated_value => {
                result.defaulted.push(property.clone());
            }
            Some(base) => result.changed.push((property.clone(), base.clone())),
            None => result.not_defaulted.push(property.clone()),
        }
    }

    tracing::debug!(
        defaulted = result.defaulted.len(),
        not_defaulted = result.not_defaulted.len(),
        changed = result.changed.len(),
        "classified properties"
    );

    result
}

pub fn diff_items(
    item_type: &str,
    original: &ProjectSnapshot,
    baseline: &ProjectSnapshot,
    comparer: &dyn ItemComparer,
) -> ItemsDiff {
    let originals: Vec<&Item> = original.items_of_type(item_type).collect();
    let baselines: Vec<&Item> = baseline.items_of_type(item_type).collect();
    let mut result = ItemsDiff { item_type: item_type.to_string(), ..Default::default() };

    for item in &originals {
        if baselines.iter().any(|b| comparer.same_identity(item, b)) {
            result.defaulted.push((*item).clone());
        } else if let Some(base) = baselines.iter().find(|b| comparer.same_include(item, b)) {
            result.changed.push(((*item).clone(), (*base).clone()));
        } else {
            result.not_defaulted.push((*item).clone());
        }
    }

    for base in &baselines {
        if !originals.iter().any(|o| comparer.same_include(o, base)) {
            result.introduced.push((*base).clone());
        }
    }

    tracing::debug!(
        item_type,
        defaulted = result.defaulted.len(),
        not_defaulted = result.not_defaulted.len(),
        introduced = result.introduced.len(),
        changed = result.changed.len(),
        "classified items"
    );

    result
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
