//! Static fact tables consulted by the differ, the rule engine and the report.
//!
//! [`Facts::default`] carries the built-in tables.  A TOML file can override
//! any subset of them; tables it does not name keep their defaults:
//!
//! ```toml
//! value-tuple-minimum = "4.7.2"
//! wpf-references = ["PresentationCore", "PresentationFramework", "WindowsBase"]
//!
//! [pcl-profiles]
//! Profile7 = "1.1"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FactsError;

/// How strictly the desktop-framework detection matches known reference sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DesktopMatch {
    /// The project references every known reference, possibly more.
    #[default]
    Subset,
    /// The project references exactly the known set, nothing else.
    Exact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultProperty {
    pub name: String,
    pub value: String,
}

/// An `(item type, include)` pair the SDK supplies implicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DefaultItem {
    pub item_type: String,
    pub include: String,
}

/// A plain assembly reference that has a NuGet package equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEquivalent {
    pub reference: String,
    pub package: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Facts {
    /// SDK written on converted projects.
    pub sdk: String,
    /// SDK written when WPF or WinForms was detected.
    pub desktop_sdk: String,
    /// Project-system bookkeeping that never survives conversion.
    pub unnecessary_properties: Vec<String>,
    /// Properties the strip passes never remove.
    pub preserved_properties: Vec<String>,
    /// Values the SDK already uses; an authored property with exactly this
    /// value is redundant.
    pub default_properties: Vec<DefaultProperty>,
    pub default_items: Vec<DefaultItem>,
    /// Item types the SDK globs implicitly, with the wildcard it uses.
    pub globbed_items: Vec<DefaultItem>,
    pub wpf_references: Vec<String>,
    pub winforms_references: Vec<String>,
    pub desktop_match: DesktopMatch,
    /// PCL profile name → netstandard version.
    pub pcl_profiles: BTreeMap<String, String>,
    pub package_equivalents: Vec<PackageEquivalent>,
    /// Lowest .NET Framework version that ships `System.ValueTuple` in-box.
    pub value_tuple_minimum: String,
    /// Item types starting with this prefix are implementation-private.
    pub private_item_prefix: String,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn items(item_type: &str, includes: &[&str]) -> Vec<DefaultItem> {
    includes
        .iter()
        .map(|include| DefaultItem { item_type: item_type.to_string(), include: include.to_string() })
        .collect()
}

impl Default for Facts {
    fn default() -> Self {
        let default_properties = [
            ("OutputType", "Library"),
            ("AppDesignerFolder", "Properties"),
            ("FileAlignment", "512"),
            ("WarningLevel", "4"),
            ("ErrorReport", "prompt"),
            ("AutoGenerateBindingRedirects", "true"),
            ("Deterministic", "true"),
            ("Prefer32Bit", "false"),
        ]
        .into_iter()
        .map(|(name, value)| DefaultProperty { name: name.to_string(), value: value.to_string() })
        .collect();

        let pcl_profiles = [
            ("Profile7", "1.1"),
            ("Profile31", "1.0"),
            ("Profile32", "1.2"),
            ("Profile44", "1.2"),
            ("Profile49", "1.0"),
            ("Profile78", "1.0"),
            ("Profile84", "1.0"),
            ("Profile111", "1.1"),
            ("Profile151", "1.2"),
            ("Profile157", "1.0"),
            ("Profile259", "1.0"),
        ]
        .into_iter()
        .map(|(profile, version)| (profile.to_string(), version.to_string()))
        .collect();

        let package_equivalents = [
            ("System.ComponentModel.Composition", "System.ComponentModel.Composition", "4.7.0"),
            ("System.Configuration", "System.Configuration.ConfigurationManager", "4.7.0"),
            ("System.Data.DataSetExtensions", "System.Data.DataSetExtensions", "4.5.0"),
            ("System.ServiceModel", "System.ServiceModel.Primitives", "4.7.0"),
            ("System.Runtime.Caching", "System.Runtime.Caching", "4.7.0"),
        ]
        .into_iter()
        .map(|(reference, package, version)| PackageEquivalent {
            reference: reference.to_string(),
            package: package.to_string(),
            version: version.to_string(),
        })
        .collect();

        Self {
            sdk: "Microsoft.NET.Sdk".to_string(),
            desktop_sdk: "Microsoft.NET.Sdk.WindowsDesktop".to_string(),
            unnecessary_properties: strings(&[
                "ProjectGuid",
                "ProjectTypeGuids",
                "TargetFrameworkIdentifier",
                "TargetFrameworkVersion",
                "TargetFrameworkProfile",
                "SchemaVersion",
                "ProductVersion",
                "OldToolsVersion",
                "FileUpgradeFlags",
                "UpgradeBackupLocation",
                "MinimumVisualStudioVersion",
                "NuGetPackageImportStamp",
                "RestorePackages",
                "SolutionDir",
                "ExpressionBlendVersion",
            ]),
            preserved_properties: strings(&[
                "TargetFramework",
                "TargetFrameworks",
                "UseWPF",
                "UseWindowsForms",
            ]),
            default_properties,
            default_items: items(
                "Reference",
                &[
                    "System",
                    "System.Core",
                    "System.Data",
                    "System.Drawing",
                    "System.IO.Compression.FileSystem",
                    "System.Numerics",
                    "System.Runtime.Serialization",
                    "System.Xml",
                    "System.Xml.Linq",
                    "Microsoft.CSharp",
                    "System.Net.Http",
                ],
            ),
            globbed_items: [
                ("Compile", "**/*.cs"),
                ("Compile", "**/*.vb"),
                ("EmbeddedResource", "**/*.resx"),
                ("None", "**/*"),
                ("Page", "**/*.xaml"),
            ]
            .into_iter()
            .map(|(item_type, include)| DefaultItem {
                item_type: item_type.to_string(),
                include: include.to_string(),
            })
            .collect(),
            wpf_references: strings(&[
                "System.Xaml",
                "PresentationCore",
                "PresentationFramework",
                "WindowsBase",
            ]),
            winforms_references: strings(&["System.Windows.Forms", "System.Deployment"]),
            desktop_match: DesktopMatch::Subset,
            pcl_profiles,
            package_equivalents,
            value_tuple_minimum: "4.7".to_string(),
            private_item_prefix: "_".to_string(),
        }
    }
}

impl Facts {
    /// Parse a TOML override; tables the document omits keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, FactsError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FactsError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|source| FactsError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&source)
    }

    pub fn is_unnecessary_property(&self, name: &str) -> bool {
        contains_ignore_case(&self.unnecessary_properties, name)
    }

    pub fn is_preserved_property(&self, name: &str) -> bool {
        contains_ignore_case(&self.preserved_properties, name)
    }

    /// `true` when `value` is what the SDK already uses for `name`.
    pub fn is_default_property_value(&self, name: &str, value: &str) -> bool {
        self.default_properties
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(name) && p.value == value)
    }

    pub fn is_default_item(&self, item_type: &str, include: &str) -> bool {
        self.default_items.iter().any(|d| {
            d.item_type.eq_ignore_ascii_case(item_type) && d.include.eq_ignore_ascii_case(include)
        })
    }

    /// `true` when `include` is the wildcard the SDK already globs for
    /// `item_type`.  Path separators are normalised before comparing.
    pub fn is_globbed_item(&self, item_type: &str, include: &str) -> bool {
        let include = include.replace('\\', "/");
        self.globbed_items.iter().any(|g| {
            g.item_type.eq_ignore_ascii_case(item_type) && g.include.eq_ignore_ascii_case(&include)
        })
    }

    /// `true` when the SDK's default wildcard for `item_type` would pick up
    /// the concrete path `include`.  Only `**/*suffix` patterns are
    /// understood; paths leaving the project directory never match.
    pub fn matches_default_glob(&self, item_type: &str, include: &str) -> bool {
        let include = include.replace('\\', "/").to_ascii_lowercase();
        if include.starts_with('/')
            || include.starts_with("../")
            || include.contains("/../")
            || include.contains(':')
            || include.contains('*')
        {
            return false;
        }

        self.globbed_items
            .iter()
            .filter(|g| g.item_type.eq_ignore_ascii_case(item_type))
            .filter_map(|g| g.include.replace('\\', "/").strip_prefix("**/*").map(str::to_ascii_lowercase))
            .any(|suffix| include.ends_with(&suffix))
    }

    /// Case-insensitive PCL profile lookup.
    pub fn netstandard_for_profile(&self, profile: &str) -> Option<&str> {
        self.pcl_profiles
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(profile))
            .map(|(_, version)| version.as_str())
    }

    pub fn package_equivalent(&self, reference: &str) -> Option<&PackageEquivalent> {
        self.package_equivalents
            .iter()
            .find(|p| p.reference.eq_ignore_ascii_case(reference))
    }

    pub fn is_private_item_type(&self, item_type: &str) -> bool {
        !self.private_item_prefix.is_empty() && item_type.starts_with(&self.private_item_prefix)
    }
}

pub(crate) fn contains_ignore_case(list: &[String], value: &str) -> bool {
    list.iter().any(|s| s.eq_ignore_ascii_case(value))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
