//! Convert legacy MSBuild projects into minimal SDK-style projects.
//!
//! The pipeline is: [`Project`] flattens a project file into a
//! [`ProjectSnapshot`], [`diff::diff`] classifies it against an SDK baseline,
//! then either [`ReportFormatter`] renders the diff or [`RuleEngine`] turns
//! every configuration into its SDK-style equivalent for
//! [`writer::write_project`].

pub mod condition;
pub mod diff;
pub mod error;
pub mod facts;
pub mod packages;
pub mod project;
pub mod report;
pub mod rules;
pub mod snapshot;
pub mod version;
pub mod writer;

pub use diff::{IncludeAndMetadata, IncludeOnly, ItemComparer, ProjectDiff};
pub use error::{ConvertError, FactsError, ManifestError, ProjectError};
pub use facts::Facts;
pub use packages::PackagesConfig;
pub use project::Project;
pub use report::ReportFormatter;
pub use rules::{Conversion, ProjectConversion, RuleEngine};
pub use snapshot::{ConfigurationScope, DimensionVector, Item, ProjectSnapshot, Property};
pub use version::SemanticVersion;
