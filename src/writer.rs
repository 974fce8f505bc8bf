//! Serialise a converted snapshot as an SDK-style project file.

use std::fmt::Write as _;

use crate::condition::{is_encodable, to_condition};
use crate::snapshot::{ConfigurationScope, Item, ProjectSnapshot, Property};

const INDENT: &str = "  ";

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attribute(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

/// Metadata written as an attribute rather than a child element.
fn is_attribute_metadata(item: &Item, name: &str) -> bool {
    item.is_type("PackageReference") && name.eq_ignore_ascii_case("Version")
}

fn write_item(out: &mut String, item: &Item) {
    let _ = write!(
        out,
        "{INDENT}{INDENT}<{} Include=\"{}\"",
        item.item_type,
        escape_attribute(&item.evaluated_include)
    );
    for (name, value) in item.metadata.iter().filter(|(n, _)| is_attribute_metadata(item, n)) {
        let _ = write!(out, " {name}=\"{}\"", escape_attribute(value));
    }

    let children: Vec<_> = item
        .metadata
        .iter()
        .filter(|(n, _)| !is_attribute_metadata(item, n))
        .collect();
    if children.is_empty() {
        out.push_str(" />\n");
        return;
    }

    out.push_str(">\n");
    for (name, value) in children {
        let _ = writeln!(out, "{INDENT}{INDENT}{INDENT}<{name}>{}</{name}>", escape_text(value));
    }
    let _ = writeln!(out, "{INDENT}{INDENT}</{}>", item.item_type);
}

fn write_property_group(out: &mut String, condition: &str, properties: &[Property]) {
    let properties: Vec<_> = properties.iter().filter(|p| p.is_authored).collect();
    if properties.is_empty() {
        return;
    }

    out.push('\n');
    if condition.is_empty() {
        let _ = writeln!(out, "{INDENT}<PropertyGroup>");
    } else {
        let _ = writeln!(out, "{INDENT}<PropertyGroup Condition=\"{}\">", escape_attribute(condition));
    }
    for property in properties {
        let _ = writeln!(
            out,
            "{INDENT}{INDENT}<{name}>{}</{name}>",
            escape_text(&property.evaluated_value),
            name = property.name
        );
    }
    let _ = writeln!(out, "{INDENT}</PropertyGroup>");
}

/// Render `snapshot` as a project file using `sdk`.
///
/// The snapshot's authored properties go into an unconditional
/// `PropertyGroup`, followed by one conditioned group per scope.  Items are
/// grouped by type in first-appearance order.
pub fn write_project(snapshot: &ProjectSnapshot, scopes: &[ConfigurationScope], sdk: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<Project Sdk=\"{}\">", escape_attribute(sdk));

    write_property_group(&mut out, "", &snapshot.properties);
    for scope in scopes {
        if scope.dimensions.is_empty() || !is_encodable(&scope.dimensions) {
            tracing::warn!(dimensions = ?scope.dimensions, "configuration cannot be written as a condition, skipping");
            continue;
        }
        write_property_group(&mut out, &to_condition(&scope.dimensions), &scope.properties);
    }

    for item_type in snapshot.item_types() {
        out.push('\n');
        let _ = writeln!(out, "{INDENT}<ItemGroup>");
        for item in snapshot.items_of_type(item_type) {
            write_item(&mut out, item);
        }
        let _ = writeln!(out, "{INDENT}</ItemGroup>");
    }

    out.push_str("\n</Project>\n");
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use crate::snapshot::DimensionVector;

    #[test]
    fn write_minimal_project() {
        let mut snapshot = ProjectSnapshot::new()
            .with_property("OutputType", "Exe")
            .with_property("TargetFramework", "net472")
            .with_item(Item::new("PackageReference", "Newtonsoft.Json").with_metadata("Version", "12.0.3"))
            .with_item(Item::new("Compile", "Form1.Designer.cs").with_metadata("DependentUpon", "Form1.cs"))
            .with_item(Item::new("PackageReference", "Serilog").with_metadata("Version", "2.10.0"));
        snapshot.properties.push(Property::evaluated("Configuration", "Debug"));

        let expected = r#"<Project Sdk="Microsoft.NET.Sdk">

  <PropertyGroup>
    <OutputType>Exe</OutputType>
    <TargetFramework>net472</TargetFramework>
  </PropertyGroup>

  <ItemGroup>
    <PackageReference Include="Newtonsoft.Json" Version="12.0.3" />
    <PackageReference Include="Serilog" Version="2.10.0" />
  </ItemGroup>

  <ItemGroup>
    <Compile Include="Form1.Designer.cs">
      <DependentUpon>Form1.cs</DependentUpon>
    </Compile>
  </ItemGroup>

</Project>
"#;
        assert_eq!(write_project(&snapshot, &[], "Microsoft.NET.Sdk"), expected);
    }

    #[test]
    fn empty_snapshot() {
        assert_eq!(
            write_project(&ProjectSnapshot::new(), &[], "Microsoft.NET.Sdk"),
            "<Project Sdk=\"Microsoft.NET.Sdk\">\n\n</Project>\n"
        );
    }

    #[test]
    fn escaping_survives_reload() {
        let snapshot = ProjectSnapshot::new()
            .with_property("DefineConstants", "A<B & \"C\"")
            .with_item(Item::new("None", "a&b.txt").with_metadata("Link", "x<y>.txt"));

        let project = Project::parse(&write_project(&snapshot, &[], "Microsoft.NET.Sdk")).unwrap();
        assert!(project.is_sdk_style());
        let reloaded = project.evaluate(&DimensionVector::new());
        assert_eq!(reloaded.property_value("DefineConstants"), Some("A<B & \"C\""));
        assert_eq!(reloaded.items, snapshot.items);
    }

    #[test]
    fn scopes_become_conditioned_groups() {
        let snapshot = ProjectSnapshot::new().with_property("TargetFramework", "net48");
        let release = DimensionVector::new().with("Configuration", "Release").with("Platform", "AnyCPU");
        let scopes = [
            ConfigurationScope {
                dimensions: release.clone(),
                properties: vec![Property::authored("OutputPath", "bin\\Release\\")],
            },
            ConfigurationScope {
                dimensions: DimensionVector::new().with("Configuration", "a|b"),
                properties: vec![Property::authored("Optimize", "true")],
            },
        ];

        let xml = write_project(&snapshot, &scopes, "Microsoft.NET.Sdk");
        assert!(xml.contains(
            "  <PropertyGroup Condition=\"'$(Configuration)|$(Platform)'=='Release|AnyCPU'\">\n    <OutputPath>bin\\Release\\</OutputPath>\n"
        ));
        assert!(!xml.contains("Optimize"));

        let project = Project::parse(&xml).unwrap();
        assert_eq!(project.configurations(), [release.clone()]);
        let reloaded = project.evaluate(&release);
        assert_eq!(reloaded.property_value("OutputPath"), Some("bin\\Release\\"));
        assert_eq!(reloaded.property_value("TargetFramework"), Some("net48"));
        let debug = project.evaluate(&DimensionVector::new().with("Configuration", "Debug").with("Platform", "AnyCPU"));
        assert_eq!(debug.property_value("OutputPath"), None);
    }
}
