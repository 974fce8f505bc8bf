//! Flat loader for MSBuild project files.
//!
//! This is deliberately not an MSBuild evaluator: there are no imports, no
//! property functions and no globbing.  It understands exactly what a
//! legacy project writes by hand (conditioned `PropertyGroup`/`ItemGroup`
//! elements, per-element conditions and `$(Var)` references) and collapses
//! it into a [`ProjectSnapshot`] for one configuration.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use indexmap::IndexMap;

use crate::condition;
use crate::error::ProjectError;
use crate::snapshot::{DimensionVector, Item, Property, ProjectSnapshot};

/// Attributes on an item element that are directives, not metadata.
const RESERVED_ITEM_ATTRIBUTES: [&str; 8] = [
    "Include",
    "Exclude",
    "Remove",
    "Update",
    "Condition",
    "KeepMetadata",
    "RemoveMetadata",
    "KeepDuplicates",
];

// ═══════════════════════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Expand `$(Var)` references using a map keyed by lower-cased name.
/// Unknown variables expand to the empty string.
fn expand_vars(s: &str, vars: &HashMap<String, String>) -> String {
    condition::expand(&condition::split_fragments(s), vars)
}

/// Whether an optional `Condition` attribute holds under `vars`.
///
/// A condition the grammar cannot parse is treated as false: the construct
/// it guards is left out rather than guessed at.
fn condition_holds(condition: Option<&str>, vars: &HashMap<String, String>) -> bool {
    let Some(condition) = condition.filter(|c| !c.trim().is_empty()) else {
        return true;
    };
    match condition::parse_condition(condition) {
        Ok(expr) => condition::evaluate(&expr, vars),
        Err(message) => {
            tracing::warn!(condition, %message, "unsupported condition, treating as false");
            false
        }
    }
}

/// Split a `;`-separated include list, dropping empty entries.
fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(';').map(str::trim).filter(|s| !s.is_empty())
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Project – top-level handle
// ═══════════════════════════════════════════════════════════════════════════════

/// A parsed project file.
#[derive(Debug, Clone, Default)]
pub struct Project {
    /// File stem, exposed to the file as `$(MSBuildProjectName)`.
    name: Option<String>,
    pub sdk: Option<String>,
    pub imports: Vec<Import>,
    pub property_groups: Vec<PropertyGroup>,
    pub item_groups: Vec<ItemGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub project: String,
    pub sdk: Option<String>,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyGroup {
    pub condition: Option<String>,
    pub properties: Vec<PropertyElement>,
}

/// A single `<Name>value</Name>` inside a `PropertyGroup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyElement {
    pub name: String,
    /// Raw, unexpanded text.
    pub value: String,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemGroup {
    pub condition: Option<String>,
    pub items: Vec<ItemElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemElement {
    pub item_type: String,
    /// Raw `Include`, possibly a `;`-separated list.
    pub include: String,
    pub exclude: Option<String>,
    pub condition: Option<String>,
    /// Raw metadata, attributes first, then child elements.
    pub metadata: IndexMap<String, String>,
}

impl Project {
    /// Parse a project from its XML source.
    pub fn parse(source: &str) -> Result<Self, ProjectError> {
        let doc = roxmltree::Document::parse(source)?;
        let root = doc.root_element();
        if root.tag_name().name() != "Project" {
            return Err(ProjectError::NotAProject { found: root.tag_name().name().to_string() });
        }

        let mut project = Self {
            sdk: root.attribute("Sdk").map(String::from),
            ..Default::default()
        };

        for child in root.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "PropertyGroup" => project.property_groups.push(PropertyGroup::parse(&child)),
                "ItemGroup" => project.item_groups.push(ItemGroup::parse(&child)),
                "Import" => project.imports.push(Import {
                    project: child.attribute("Project").unwrap_or("").to_string(),
                    sdk: child.attribute("Sdk").map(String::from),
                    condition: child.attribute("Condition").map(String::from),
                }),
                "Sdk" => {
                    if project.sdk.is_none() {
                        project.sdk = child.attribute("Name").map(String::from);
                    }
                }
                other => tracing::debug!(element = other, "ignoring top-level element"),
            }
        }

        Ok(project)
    }

    /// Load a project from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|source| ProjectError::Io { path: path.to_path_buf(), source })?;
        let mut project = Self::parse(&source)?;
        project.name = path.file_stem().map(|s| s.to_string_lossy().into_owned());
        Ok(project)
    }

    /// `true` for projects that declare an SDK, either on the root element,
    /// through an `<Sdk>` element or on an `<Import>`.
    pub fn is_sdk_style(&self) -> bool {
        self.sdk.is_some() || self.imports.iter().any(|i| i.sdk.is_some())
    }

    fn conditions(&self) -> impl Iterator<Item = &str> {
        let groups = self.property_groups.iter().flat_map(|g| {
            std::iter::once(g.condition.as_deref()).chain(g.properties.iter().map(|p| p.condition.as_deref()))
        });
        let items = self.item_groups.iter().flat_map(|g| {
            std::iter::once(g.condition.as_deref()).chain(g.items.iter().map(|i| i.condition.as_deref()))
        });
        groups.chain(items).flatten()
    }

    /// Every configuration the file scopes settings to, in document order.
    ///
    /// Only conditions of the `'$(A)|$(B)'=='x|y'` shape count; a dimension
    /// compared against the empty string is a default guard, not a
    /// configuration.
    pub fn configurations(&self) -> Vec<DimensionVector> {
        let mut configurations: Vec<DimensionVector> = Vec::new();
        for dims in self.conditions().filter_map(condition::from_condition) {
            if dims.is_empty() || dims.values().any(|v| v.trim().is_empty()) {
                continue;
            }
            if !configurations.contains(&dims) {
                configurations.push(dims);
            }
        }
        configurations
    }

    /// `Configuration` and `Platform` as the file defaults them when no
    /// global properties are given.
    pub fn default_configuration(&self) -> DimensionVector {
        let snapshot = self.evaluate(&DimensionVector::new());
        ["Configuration", "Platform"]
            .into_iter()
            .filter_map(|name| {
                snapshot
                    .property_value(name)
                    .filter(|v| !v.is_empty())
                    .map(|v| (name, v.to_string()))
            })
            .collect()
    }

    /// Names of every property element in the file, whatever its condition.
    pub fn authored_property_names(&self) -> BTreeSet<String> {
        self.property_groups
            .iter()
            .flat_map(|g| &g.properties)
            .map(|p| p.name.clone())
            .collect()
    }

    /// Collapse the file into a flat snapshot for one configuration.
    ///
    /// `dimensions` act as global properties: they are visible to every
    /// condition, cannot be overridden by the file and appear in the
    /// snapshot as non-authored properties.
    pub fn evaluate(&self, dimensions: &DimensionVector) -> ProjectSnapshot {
        let mut vars: HashMap<String, String> = HashMap::new();
        let mut snapshot = ProjectSnapshot::new();

        if let Some(name) = &self.name {
            vars.insert("msbuildprojectname".to_string(), name.clone());
        }
        for (name, value) in dimensions.iter() {
            vars.insert(name.to_ascii_lowercase(), value.to_string());
            snapshot.properties.push(Property::evaluated(name, value));
        }
        let is_global = |name: &str| dimensions.names().any(|d| d.eq_ignore_ascii_case(name));

        for group in &self.property_groups {
            if !condition_holds(group.condition.as_deref(), &vars) {
                continue;
            }
            for property in &group.properties {
                if is_global(&property.name) || !condition_holds(property.condition.as_deref(), &vars) {
                    continue;
                }
                let value = expand_vars(&property.value, &vars);
                vars.insert(property.name.to_ascii_lowercase(), value.clone());
                snapshot.set_property(&property.name, value);
            }
        }

        for group in &self.item_groups {
            if !condition_holds(group.condition.as_deref(), &vars) {
                continue;
            }
            for element in &group.items {
                if condition_holds(element.condition.as_deref(), &vars) {
                    snapshot.items.extend(element.evaluate(&vars));
                }
            }
        }

        tracing::debug!(
            configuration = %condition::dimension_vector_to_label(dimensions),
            properties = snapshot.properties.len(),
            items = snapshot.items.len(),
            "evaluated project"
        );

        snapshot
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Parsing – roxmltree → owned types
// ═══════════════════════════════════════════════════════════════════════════════

impl PropertyGroup {
    fn parse(node: &roxmltree::Node) -> Self {
        Self {
            condition: node.attribute("Condition").map(String::from),
            properties: node
                .children()
                .filter(|n| n.is_element())
                .map(|child| PropertyElement {
                    name: child.tag_name().name().to_string(),
                    value: child.text().unwrap_or("").trim().to_string(),
                    condition: child.attribute("Condition").map(String::from),
                })
                .collect(),
        }
    }
}

impl ItemGroup {
    fn parse(node: &roxmltree::Node) -> Self {
        let mut group = Self {
            condition: node.attribute("Condition").map(String::from),
            ..Default::default()
        };

        for child in node.children().filter(|n| n.is_element()) {
            let item_type = child.tag_name().name();
            let Some(include) = child.attribute("Include") else {
                // Update/Remove operate on items from imports we never see.
                tracing::debug!(item_type, "skipping item without Include");
                continue;
            };

            let mut metadata = IndexMap::new();
            for attribute in child.attributes() {
                if !RESERVED_ITEM_ATTRIBUTES.contains(&attribute.name()) {
                    metadata.insert(attribute.name().to_string(), attribute.value().to_string());
                }
            }
            for meta in child.children().filter(|n| n.is_element()) {
                metadata.insert(
                    meta.tag_name().name().to_string(),
                    meta.text().unwrap_or("").trim().to_string(),
                );
            }

            group.items.push(ItemElement {
                item_type: item_type.to_string(),
                include: include.to_string(),
                exclude: child.attribute("Exclude").map(String::from),
                condition: child.attribute("Condition").map(String::from),
                metadata,
            });
        }

        group
    }
}

impl ItemElement {
    /// One [`Item`] per entry of the expanded include list.
    fn evaluate(&self, vars: &HashMap<String, String>) -> Vec<Item> {
        let include = expand_vars(&self.include, vars);
        let exclude = self.exclude.as_deref().map(|e| expand_vars(e, vars)).unwrap_or_default();
        let excluded: Vec<&str> = split_list(&exclude).collect();

        let metadata: IndexMap<String, String> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), expand_vars(v, vars)))
            .collect();

        split_list(&include)
            .filter(|entry| !excluded.iter().any(|x| x.eq_ignore_ascii_case(entry)))
            .map(|entry| Item {
                item_type: self.item_type.clone(),
                evaluated_include: entry.to_string(),
                metadata: metadata.clone(),
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="15.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <Import Project="$(MSBuildExtensionsPath)\$(MSBuildToolsVersion)\Microsoft.Common.props" Condition="Exists('$(MSBuildExtensionsPath)\$(MSBuildToolsVersion)\Microsoft.Common.props')" />
  <PropertyGroup>
    <Configuration Condition=" '$(Configuration)' == '' ">Debug</Configuration>
    <Platform Condition=" '$(Platform)' == '' ">AnyCPU</Platform>
    <OutputType>Exe</OutputType>
    <RootNamespace>Contoso.App</RootNamespace>
    <AssemblyName>$(RootNamespace)</AssemblyName>
    <TargetFrameworkVersion>v4.6.1</TargetFrameworkVersion>
  </PropertyGroup>
  <PropertyGroup Condition=" '$(Configuration)|$(Platform)' == 'Debug|AnyCPU' ">
    <DebugSymbols>true</DebugSymbols>
    <OutputPath>bin\Debug\</OutputPath>
  </PropertyGroup>
  <PropertyGroup Condition=" '$(Configuration)|$(Platform)' == 'Release|AnyCPU' ">
    <Optimize>true</Optimize>
    <OutputPath>bin\Release\</OutputPath>
  </PropertyGroup>
  <ItemGroup>
    <Reference Include="System" />
    <Reference Include="Newtonsoft.Json, Version=12.0.0.0">
      <HintPath>..\packages\Newtonsoft.Json.12.0.3\lib\net45\Newtonsoft.Json.dll</HintPath>
    </Reference>
  </ItemGroup>
  <ItemGroup>
    <Compile Include="Program.cs;Util.cs" />
    <Compile Include="Debug.cs" Condition=" '$(Configuration)' == 'Debug' " />
    <Compile Update="Generated.cs" />
    <None Include="App.config" Link="Config\App.config" />
  </ItemGroup>
  <Import Project="$(MSBuildToolsPath)\Microsoft.CSharp.targets" />
</Project>"#;

    fn debug_any_cpu() -> DimensionVector {
        DimensionVector::new().with("Configuration", "Debug").with("Platform", "AnyCPU")
    }

    #[test]
    fn parse_structure() {
        let project = Project::parse(LEGACY).unwrap();
        assert!(!project.is_sdk_style());
        assert_eq!(project.imports.len(), 2);
        assert_eq!(project.property_groups.len(), 3);
        assert_eq!(project.item_groups[1].items.len(), 3);
    }

    #[test]
    fn not_a_project() {
        let result = Project::parse("<packages />");
        assert!(matches!(result, Err(ProjectError::NotAProject { found }) if found == "packages"));
    }

    #[test]
    fn sdk_style_detection() {
        assert!(Project::parse(r#"<Project Sdk="Microsoft.NET.Sdk" />"#).unwrap().is_sdk_style());
        assert!(Project::parse(r#"<Project><Sdk Name="Microsoft.NET.Sdk" /></Project>"#).unwrap().is_sdk_style());
        assert!(
            Project::parse(r#"<Project><Import Project="Sdk.props" Sdk="Microsoft.NET.Sdk" /></Project>"#)
                .unwrap()
                .is_sdk_style()
        );
    }

    #[test]
    fn configurations_in_document_order() {
        let project = Project::parse(LEGACY).unwrap();
        let labels: Vec<_> = project
            .configurations()
            .iter()
            .map(condition::dimension_vector_to_label)
            .collect();
        // `'$(Configuration)' == 'Debug'` on the Compile item is a
        // configuration too, of a single dimension.
        assert_eq!(labels, ["Debug|AnyCPU", "Release|AnyCPU", "Debug"]);
    }

    #[test]
    fn default_configuration_from_guards() {
        let project = Project::parse(LEGACY).unwrap();
        assert_eq!(project.default_configuration(), debug_any_cpu());
    }

    #[test]
    fn evaluate_debug() {
        let project = Project::parse(LEGACY).unwrap();
        let snapshot = project.evaluate(&debug_any_cpu());

        assert_eq!(snapshot.property("Configuration"), Some(&Property::evaluated("Configuration", "Debug")));
        assert_eq!(snapshot.property_value("AssemblyName"), Some("Contoso.App"));
        assert_eq!(snapshot.property_value("OutputPath"), Some("bin\\Debug\\"));
        assert!(snapshot.property("Optimize").is_none());

        let includes: Vec<_> = snapshot.items.iter().map(|i| i.evaluated_include.as_str()).collect();
        assert_eq!(
            includes,
            [
                "System",
                "Newtonsoft.Json, Version=12.0.0.0",
                "Program.cs",
                "Util.cs",
                "Debug.cs",
                "App.config",
            ]
        );
        assert_eq!(snapshot.items[5].metadata_value("Link"), Some("Config\\App.config"));
        assert!(snapshot.items[1].metadata_value("HintPath").is_some());
    }

    #[test]
    fn evaluate_release() {
        let project = Project::parse(LEGACY).unwrap();
        let snapshot = project.evaluate(&DimensionVector::new().with("Configuration", "Release").with("Platform", "AnyCPU"));
        assert_eq!(snapshot.property_value("Optimize"), Some("true"));
        assert!(snapshot.property("DebugSymbols").is_none());
        assert!(!snapshot.items.iter().any(|i| i.evaluated_include == "Debug.cs"));
    }

    #[test]
    fn globals_are_not_overridden() {
        let project = Project::parse(
            r#"<Project><PropertyGroup><Configuration>Debug</Configuration></PropertyGroup></Project>"#,
        )
        .unwrap();
        let snapshot = project.evaluate(&DimensionVector::new().with("Configuration", "Release"));
        assert_eq!(snapshot.properties, [Property::evaluated("Configuration", "Release")]);
    }

    #[test]
    fn authored_names_include_conditional_properties() {
        let project = Project::parse(LEGACY).unwrap();
        let names = project.authored_property_names();
        assert!(names.contains("Optimize"));
        assert!(names.contains("Configuration"));
        assert!(!names.contains("MSBuildProjectName"));
    }

    #[test]
    fn unparseable_condition_is_false() {
        let project = Project::parse(
            r#"<Project>
                 <PropertyGroup Condition="$(Configuration.StartsWith('Debug'))"><A>1</A></PropertyGroup>
                 <PropertyGroup><B>2</B></PropertyGroup>
               </Project>"#,
        )
        .unwrap();
        let snapshot = project.evaluate(&DimensionVector::new());
        assert!(snapshot.property("A").is_none());
        assert_eq!(snapshot.property_value("B"), Some("2"));
    }

    #[test]
    fn exclude_and_expansion() {
        let project = Project::parse(
            r#"<Project>
                 <PropertyGroup><Skip>b.cs</Skip></PropertyGroup>
                 <ItemGroup><Compile Include="a.cs; b.cs ;c.cs" Exclude="$(Skip)" /></ItemGroup>
               </Project>"#,
        )
        .unwrap();
        let snapshot = project.evaluate(&DimensionVector::new());
        let includes: Vec<_> = snapshot.items.iter().map(|i| i.evaluated_include.as_str()).collect();
        assert_eq!(includes, ["a.cs", "c.cs"]);
    }

    #[test]
    fn expand_vars_is_case_insensitive() {
        let vars = HashMap::from([("rootnamespace".to_string(), "App".to_string())]);
        assert_eq!(expand_vars("$(RootNamespace).Tests", &vars), "App.Tests");
        assert_eq!(expand_vars("$(Missing)x", &vars), "x");
    }
}
