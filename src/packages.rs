//! `packages.config` manifests.
//!
//! ```xml
//! <packages>
//!   <package id="Newtonsoft.Json" version="12.0.3" targetFramework="net461" />
//! </packages>
//! ```
//!
//! Each entry becomes a `PackageReference` during conversion.

use std::path::Path;

use crate::error::ManifestError;
use crate::version::SemanticVersion;

#[derive(Debug, Clone, PartialEq)]
pub struct PackageEntry {
    pub id: String,
    pub version: SemanticVersion,
    pub target_framework: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackagesConfig {
    /// Entries in document order; ids are unique (ASCII case-insensitive).
    pub packages: Vec<PackageEntry>,
}

impl PackagesConfig {
    /// Parse a manifest from its XML source.
    ///
    /// When an id is listed more than once the highest version wins and keeps
    /// the position of the first occurrence.
    pub fn parse(source: &str) -> Result<Self, ManifestError> {
        let doc = roxmltree::Document::parse(source)?;
        let root = doc.root_element();
        if root.tag_name().name() != "packages" {
            return Err(ManifestError::NoPackagesRoot);
        }

        let mut config = Self::default();
        let nodes = root
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "package");

        for (index, node) in nodes.enumerate() {
            let entry = PackageEntry::parse(&node, index)?;
            match config.packages.iter_mut().find(|p| p.id.eq_ignore_ascii_case(&entry.id)) {
                Some(existing) => {
                    tracing::warn!(
                        id = %entry.id,
                        first = %existing.version,
                        second = %entry.version,
                        "package listed twice, keeping the higher version"
                    );
                    if entry.version.compare(&existing.version).is_gt() {
                        *existing = entry;
                    }
                }
                None => config.packages.push(entry),
            }
        }

        Ok(config)
    }

    /// Load a manifest from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|source| ManifestError::Io { path: path.to_path_buf(), source })?;
        Self::parse(&source)
    }

    pub fn get(&self, id: &str) -> Option<&PackageEntry> {
        self.packages.iter().find(|p| p.id.eq_ignore_ascii_case(id))
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl PackageEntry {
    fn parse(node: &roxmltree::Node, index: usize) -> Result<Self, ManifestError> {
        let invalid = |reason: String| ManifestError::InvalidPackageNode { index, reason };

        let id = node
            .attribute("id")
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| invalid("missing id".to_string()))?;

        let raw_version = node
            .attribute("version")
            .map(str::trim)
            .ok_or_else(|| invalid(format!("package '{id}' has no version")))?;

        let version = SemanticVersion::parse(raw_version)
            .ok_or_else(|| invalid(format!("package '{id}' has invalid version '{raw_version}'")))?;

        Ok(Self {
            id: id.to_string(),
            version,
            target_framework: node.attribute("targetFramework").map(String::from),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_entries_in_order() {
        let config = PackagesConfig::parse(
            r#"<?xml version="1.0" encoding="utf-8"?>
            <packages>
              <package id="Newtonsoft.Json" version="12.0.3" targetFramework="net461" />
              <package id="System.ValueTuple" version="4.5.0" targetFramework="net461" />
            </packages>"#,
        )
        .unwrap();

        let ids: Vec<_> = config.packages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["Newtonsoft.Json", "System.ValueTuple"]);
        assert_eq!(config.packages[0].version.original_text(), "12.0.3");
        assert_eq!(config.packages[0].target_framework.as_deref(), Some("net461"));
        assert!(config.get("newtonsoft.json").is_some());
    }

    #[test]
    fn missing_packages_root() {
        let result = PackagesConfig::parse("<Project><package id=\"A\" version=\"1.0\" /></Project>");
        assert!(matches!(result, Err(ManifestError::NoPackagesRoot)));
    }

    #[test]
    fn package_without_id() {
        let result = PackagesConfig::parse(
            r#"<packages><package id="A" version="1.0" /><package version="1.0" /></packages>"#,
        );
        assert!(matches!(result, Err(ManifestError::InvalidPackageNode { index: 1, .. })));
    }

    #[test]
    fn package_with_invalid_version() {
        let result = PackagesConfig::parse(r#"<packages><package id="A" version="latest" /></packages>"#);
        match result {
            Err(ManifestError::InvalidPackageNode { index: 0, reason }) => {
                assert!(reason.contains("latest"), "{reason}");
            }
            other => panic!("expected InvalidPackageNode, got {other:?}"),
        }
    }

    #[test]
    fn package_without_version() {
        let result = PackagesConfig::parse(r#"<packages><package id="A" /></packages>"#);
        assert!(matches!(result, Err(ManifestError::InvalidPackageNode { index: 0, .. })));
    }

    #[test]
    fn malformed_xml() {
        let result = PackagesConfig::parse("<packages>");
        assert!(matches!(result, Err(ManifestError::Xml(_))));
    }

    #[test]
    fn duplicate_ids_keep_highest_version() {
        let config = PackagesConfig::parse(
            r#"<packages>
                 <package id="A" version="1.2.0" />
                 <package id="B" version="1.0" />
                 <package id="a" version="1.10.0" />
                 <package id="A" version="1.3.0-beta" />
               </packages>"#,
        )
        .unwrap();

        assert_eq!(config.packages.len(), 2);
        assert_eq!(config.packages[0].version.original_text(), "1.10.0");
        assert_eq!(config.packages[1].id, "B");
    }

    #[test]
    fn empty_manifest() {
        let config = PackagesConfig::parse("<packages />").unwrap();
        assert!(config.is_empty());
    }
}
