//! Flat, evaluated view of a project: properties and items.
//!
//! Condition-scoped groups are collapsed before a snapshot is built, so a
//! snapshot is unconditional; [`ConfigurationScope`] carries what a
//! converted project keeps per configuration.  The differ and the rule engine only
//! ever read a snapshot through `&ProjectSnapshot`; rule passes work on an
//! owned copy.

use std::collections::BTreeSet;

use indexmap::IndexMap;

// ═══════════════════════════════════════════════════════════════════════════════
//  Property
// ═══════════════════════════════════════════════════════════════════════════════

/// A single evaluated property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub evaluated_value: String,
    /// `true` when the property is written in the project file itself,
    /// `false` when it is only visible after evaluation (global properties,
    /// SDK defaults, …).
    pub is_authored: bool,
}

impl Property {
    /// A property written in the project file.
    pub fn authored(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), evaluated_value: value.into(), is_authored: true }
    }

    /// A property that only exists after evaluation.
    pub fn evaluated(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), evaluated_value: value.into(), is_authored: false }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Item
// ═══════════════════════════════════════════════════════════════════════════════

/// A single evaluated item, e.g. `<Compile Include="a.cs" />`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Category tag (`Compile`, `Reference`, `PackageReference`, …).
    pub item_type: String,
    pub evaluated_include: String,
    /// Metadata in document order.
    pub metadata: IndexMap<String, String>,
}

impl Item {
    pub fn new(item_type: impl Into<String>, include: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
            evaluated_include: include.into(),
            metadata: IndexMap::new(),
        }
    }

    /// Builder-style metadata insertion.
    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }

    pub fn is_type(&self, item_type: &str) -> bool {
        self.item_type.eq_ignore_ascii_case(item_type)
    }

    /// The assembly simple name of a `Reference` include:
    /// `System.ValueTuple, Version=4.0.3.0, …` → `System.ValueTuple`.
    /// Other item types return the include unchanged.
    pub fn reference_name(&self) -> &str {
        if !self.is_type("Reference") {
            return &self.evaluated_include;
        }
        self.evaluated_include
            .split(',')
            .next()
            .unwrap_or(&self.evaluated_include)
            .trim()
    }

    /// Case-insensitive metadata lookup.
    pub fn metadata_value(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `Name=Value;Name=Value` in metadata order, used by reports.
    pub fn metadata_summary(&self) -> String {
        self.metadata
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(";")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  DimensionVector
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordered configuration dimensions, e.g. `Configuration=Debug, Platform=AnyCPU`.
///
/// Keys are unique and insertion order is significant: it decides the order
/// of the `$(Key)` tokens when the vector is turned back into a condition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionVector(IndexMap<String, String>);

impl DimensionVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a dimension.  Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DimensionVector {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  ProjectSnapshot
// ═══════════════════════════════════════════════════════════════════════════════

/// Flat evaluated project state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectSnapshot {
    pub properties: Vec<Property>,
    pub items: Vec<Item>,
}

impl ProjectSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: append an authored property.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push(Property::authored(name, value));
        self
    }

    /// Builder-style: append an item.
    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    /// Case-insensitive property lookup.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.is_named(name))
    }

    pub fn property_value(&self, name: &str) -> Option<&str> {
        self.property(name).map(|p| p.evaluated_value.as_str())
    }

    /// Set `name` to `value` in place, or append it as an authored property.
    pub fn set_property(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.properties.iter_mut().find(|p| p.is_named(name)) {
            Some(existing) => {
                existing.evaluated_value = value;
                existing.is_authored = true;
            }
            None => self.properties.push(Property::authored(name, value)),
        }
    }

    /// Names of the properties written in the file.
    pub fn authored_property_names(&self) -> BTreeSet<String> {
        self.properties
            .iter()
            .filter(|p| p.is_authored)
            .map(|p| p.name.clone())
            .collect()
    }

    pub fn items_of_type<'a>(&'a self, item_type: &'a str) -> impl Iterator<Item = &'a Item> + 'a {
        self.items.iter().filter(move |i| i.is_type(item_type))
    }

    /// Distinct item types in first-appearance order.
    pub fn item_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = Vec::new();
        for item in &self.items {
            if !types.iter().any(|t| t.eq_ignore_ascii_case(&item.item_type)) {
                types.push(&item.item_type);
            }
        }
        types
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  ConfigurationScope
// ═══════════════════════════════════════════════════════════════════════════════

/// Properties that only hold under one configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationScope {
    pub dimensions: DimensionVector,
    pub properties: Vec<Property>,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
