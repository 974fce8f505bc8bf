//! Render a [`ProjectDiff`] as plain text diff lines.
//!
//! ```text
//! Properties:
//! - AssemblyName = Contoso.App
//! + LangVersion = 7.3
//!
//! Compile items:
//! - Legacy.cs
//! = Program.cs
//! ```

use crate::diff::{ItemsDiff, ProjectDiff, PropertiesDiff};
use crate::facts::Facts;
use crate::snapshot::{DimensionVector, Item, Property};

const PROPERTIES_HEADER: &str = "Properties:";

pub struct ReportFormatter<'a> {
    facts: &'a Facts,
}

impl<'a> ReportFormatter<'a> {
    pub fn new(facts: &'a Facts) -> Self {
        Self { facts }
    }

    /// The whole report, optionally prefixed with the configuration it was
    /// computed for.
    pub fn format(&self, diff: &ProjectDiff, configuration: Option<&DimensionVector>) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(configuration) = configuration.filter(|c| !c.is_empty()) {
            lines.push(format!(
                "Configuration: {}",
                crate::condition::dimension_vector_to_label(configuration)
            ));
            lines.push(String::new());
        }

        lines.extend(self.property_lines(&diff.properties));
        for items in &diff.items {
            lines.extend(self.item_lines(items));
        }
        lines
    }

    /// Lines for the property section, empty when nothing was classified.
    pub fn property_lines(&self, diff: &PropertiesDiff) -> Vec<String> {
        if diff.is_empty() {
            return Vec::new();
        }

        let line = |marker: char, p: &Property| format!("{marker} {} = {}", p.name, p.evaluated_value);

        let mut lines = vec![PROPERTIES_HEADER.to_string()];
        lines.extend(diff.defaulted.iter().map(|p| line('-', p)));
        lines.extend(diff.not_defaulted.iter().map(|p| line('+', p)));
        for (original, baseline) in &diff.changed {
            lines.push(line('-', original));
            lines.push(line('+', baseline));
        }
        lines.push(String::new());
        lines
    }

    /// Lines for one item type, empty for private or empty item types.
    pub fn item_lines(&self, diff: &ItemsDiff) -> Vec<String> {
        if diff.is_empty() || self.facts.is_private_item_type(&diff.item_type) {
            return Vec::new();
        }

        let plain = |marker: char, item: &Item| format!("{marker} {}", item.evaluated_include);
        let detailed = |marker: char, item: &Item| {
            if item.metadata.is_empty() {
                plain(marker, item)
            } else {
                format!("{marker} {} ({})", item.evaluated_include, item.metadata_summary())
            }
        };

        let mut body: Vec<String> = Vec::new();
        body.extend(diff.defaulted.iter().map(|i| plain('=', i)));
        body.extend(diff.not_defaulted.iter().map(|i| plain('-', i)));
        body.extend(diff.introduced.iter().map(|i| plain('+', i)));
        for (original, baseline) in &diff.changed {
            body.push(detailed('-', original));
            body.push(detailed('+', baseline));
        }
        body.sort_by(|a, b| sort_key(a).cmp(sort_key(b)));

        let mut lines = Vec::with_capacity(body.len() + 2);
        lines.push(format!("{} items:", diff.item_type));
        lines.extend(body);
        lines.push(String::new());
        lines
    }
}

fn sort_key(line: &str) -> &str {
    line.trim_start_matches(['+', '-', '=', ' '])
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn items_diff(item_type: &str) -> ItemsDiff {
        ItemsDiff { item_type: item_type.to_string(), ..Default::default() }
    }

    #[test]
    fn property_section() {
        let diff = PropertiesDiff {
            defaulted: vec![Property::authored("AssemblyName", "App")],
            not_defaulted: vec![Property::authored("LangVersion", "7.3")],
            changed: vec![(Property::authored("OutputType", "Exe"), Property::authored("OutputType", "Library"))],
        };
        let lines = ReportFormatter::new(&Facts::default()).property_lines(&diff);
        assert_eq!(
            lines,
            [
                "Properties:",
                "- AssemblyName = App",
                "+ LangVersion = 7.3",
                "- OutputType = Exe",
                "+ OutputType = Library",
                "",
            ]
        );
    }

    #[test]
    fn empty_property_section_is_omitted() {
        let lines = ReportFormatter::new(&Facts::default()).property_lines(&PropertiesDiff::default());
        assert!(lines.is_empty());
    }

    #[test]
    fn item_lines_interleave_by_include() {
        let mut diff = items_diff("Compile");
        diff.defaulted = vec![Item::new("Compile", "b.cs")];
        diff.not_defaulted = vec![Item::new("Compile", "c.cs")];
        diff.introduced = vec![Item::new("Compile", "a.cs")];
        diff.changed = vec![(
            Item::new("Compile", "b.designer.cs").with_metadata("DependentUpon", "b.cs"),
            Item::new("Compile", "b.designer.cs"),
        )];

        let lines = ReportFormatter::new(&Facts::default()).item_lines(&diff);
        assert_eq!(
            lines,
            [
                "Compile items:",
                "+ a.cs",
                "= b.cs",
                "+ b.designer.cs",
                "- b.designer.cs (DependentUpon=b.cs)",
                "- c.cs",
                "",
            ]
        );
    }

    #[test]
    fn private_item_types_are_hidden() {
        let mut diff = items_diff("_Internal");
        diff.not_defaulted = vec![Item::new("_Internal", "x")];
        assert!(ReportFormatter::new(&Facts::default()).item_lines(&diff).is_empty());
    }

    #[test]
    fn full_report_with_configuration_label() {
        let mut items = items_diff("None");
        items.not_defaulted = vec![Item::new("None", "App.config")];
        let diff = ProjectDiff { properties: PropertiesDiff::default(), items: vec![items] };
        let configuration = DimensionVector::new().with("Configuration", "Debug").with("Platform", "AnyCPU");

        let lines = ReportFormatter::new(&Facts::default()).format(&diff, Some(&configuration));
        assert_eq!(lines, ["Configuration: Debug|AnyCPU", "", "None items:", "- App.config", ""]);
    }
}
