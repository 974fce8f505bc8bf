//! Error types, one enum per failure domain.
//!
//! Failures local to a single property, item or condition are never errors:
//! the engine absorbs them and leaves the construct untouched.  Only problems
//! that invalidate a whole conversion surface here.

use std::path::PathBuf;

/// Loading a project file into a [`crate::project::Project`].
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document root is not a `<Project>` element.
    #[error("expected a <Project> root element, found <{found}>")]
    NotAProject { found: String },
}

/// Fatal failures of a single project conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// `TargetFrameworkIdentifier` is not one the engine knows how to map.
    #[error("cannot map target framework identifier '{identifier}' (version '{version}')")]
    UnknownFrameworkIdentifier { identifier: String, version: String },

    /// Neither `TargetFramework` nor `TargetFrameworkVersion` is set.
    #[error("project declares neither TargetFramework nor TargetFrameworkVersion")]
    MissingTargetFrameworkVersion,

    /// A `.NETPortable` project without `TargetFrameworkProfile`.
    #[error("portable project has no TargetFrameworkProfile")]
    MissingPortableProfile,

    /// A `.NETPortable` profile absent from the PCL → netstandard table.
    #[error("portable profile '{profile}' has no netstandard equivalent")]
    UnmappedPortableProfile { profile: String },
}

/// Malformed `packages.config` manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The document root is not `<packages>`.
    #[error("packages manifest has no <packages> root element")]
    NoPackagesRoot,

    /// A `<package>` node with a missing or invalid `id`/`version`.
    #[error("invalid <package> node #{index}: {reason}")]
    InvalidPackageNode { index: usize, reason: String },
}

/// Loading a [`crate::facts::Facts`] override file.
#[derive(Debug, thiserror::Error)]
pub enum FactsError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid facts file: {0}")]
    Toml(#[from] toml::de::Error),
}
