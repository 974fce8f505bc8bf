//! Heuristic passes that turn a legacy snapshot into an SDK-style one.
//!
//! Each pass is a pure function from a working snapshot to a new snapshot.
//! The target framework is resolved once, from the untouched legacy
//! snapshot, before any pass runs; passes that need it read it from the
//! [`PassContext`].  A pass that does not recognise something leaves it
//! alone.  Only target framework resolution can fail.
//!
//! [`RuleEngine::convert_project`] runs the passes once per configuration
//! and splits the results into shared and configuration-scoped properties.

use std::collections::BTreeSet;

use crate::condition::dimension_vector_to_label;
use crate::diff::{self, IncludeOnly, ItemComparer, ProjectDiff};
use crate::error::ConvertError;
use crate::facts::{DesktopMatch, Facts, contains_ignore_case};
use crate::packages::PackagesConfig;
use crate::project::Project;
use crate::snapshot::{ConfigurationScope, DimensionVector, Item, ProjectSnapshot, Property};
use crate::version::SemanticVersion;

const TARGET_FRAMEWORK: &str = "TargetFramework";
const TARGET_FRAMEWORKS: &str = "TargetFrameworks";
const LEGACY_FRAMEWORK_PROPERTIES: [&str; 3] = [
    "TargetFrameworkIdentifier",
    "TargetFrameworkVersion",
    "TargetFrameworkProfile",
];
const VALUE_TUPLE: &str = "System.ValueTuple";

// ═══════════════════════════════════════════════════════════════════════════════
//  Target framework resolution
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolve the target framework moniker of a snapshot.
///
/// An explicit `TargetFramework` is returned verbatim; for a multi-targeting
/// `TargetFrameworks` the first entry is used.  Otherwise the moniker is
/// computed from the legacy identifier/version/profile triple.  A missing
/// `TargetFrameworkIdentifier` means `.NETFramework`.
pub fn resolve_target_framework(snapshot: &ProjectSnapshot, facts: &Facts) -> Result<String, ConvertError> {
    if let Some(tfm) = snapshot.property_value(TARGET_FRAMEWORK).filter(|v| !v.trim().is_empty()) {
        return Ok(tfm.trim().to_string());
    }

    if let Some(first) = snapshot
        .property_value(TARGET_FRAMEWORKS)
        .and_then(|v| v.split(';').map(str::trim).find(|t| !t.is_empty()))
    {
        return Ok(first.to_string());
    }

    let identifier = snapshot
        .property_value("TargetFrameworkIdentifier")
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(".NETFramework");
    let version = snapshot
        .property_value("TargetFrameworkVersion")
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConvertError::MissingTargetFrameworkVersion)?;
    let profile = snapshot
        .property_value("TargetFrameworkProfile")
        .filter(|v| !v.trim().is_empty());

    target_framework_from_parts(identifier, version, profile, facts)
}

/// Map a legacy `(identifier, version, profile)` triple to a moniker.
///
/// ```
/// # use sdk_convert::{facts::Facts, rules::target_framework_from_parts};
/// let facts = Facts::default();
/// assert_eq!(target_framework_from_parts(".NETFramework", "v4.6.1", None, &facts).unwrap(), "net461");
/// assert_eq!(target_framework_from_parts(".NETPortable", "v5.0", Some("Profile7"), &facts).unwrap(), "netstandard1.1");
/// ```
pub fn target_framework_from_parts(
    identifier: &str,
    version: &str,
    profile: Option<&str>,
    facts: &Facts,
) -> Result<String, ConvertError> {
    let identifier = identifier.trim();
    let bare = version.trim().trim_start_matches(['v', 'V']);

    if identifier.eq_ignore_ascii_case(".NETFramework") {
        Ok(format!("net{}", bare.replace('.', "")))
    } else if identifier.eq_ignore_ascii_case(".NETCoreApp") {
        Ok(format!("netcoreapp{bare}"))
    } else if identifier.eq_ignore_ascii_case(".NETStandard") {
        Ok(format!("netstandard{bare}"))
    } else if identifier.eq_ignore_ascii_case(".NETPortable") {
        let profile = profile.map(str::trim).ok_or(ConvertError::MissingPortableProfile)?;
        let mapped = facts
            .netstandard_for_profile(profile)
            .ok_or_else(|| ConvertError::UnmappedPortableProfile { profile: profile.to_string() })?;
        Ok(format!("netstandard{mapped}"))
    } else {
        Err(ConvertError::UnknownFrameworkIdentifier {
            identifier: identifier.to_string(),
            version: version.to_string(),
        })
    }
}

/// The framework version a `net…` moniker denotes, e.g. `net461` → `4.6.1`,
/// `net6.0-windows` → `6.0`.  `None` for `netcoreapp`/`netstandard` and
/// anything that is not a .NET Framework-style moniker.
fn net_framework_version(tfm: &str) -> Option<SemanticVersion> {
    let tfm = tfm.trim().to_ascii_lowercase();
    if tfm.starts_with("netcoreapp") || tfm.starts_with("netstandard") {
        return None;
    }
    let digits = tfm.strip_prefix("net")?;
    let digits = digits.split('-').next().unwrap_or(digits);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }

    let dotted = if digits.contains('.') {
        digits.to_string()
    } else {
        digits.chars().map(String::from).collect::<Vec<_>>().join(".")
    };
    SemanticVersion::parse(&dotted)
}

/// Whether `tfm` is a `net…` framework at or above `minimum`, i.e. one that
/// already ships `System.ValueTuple`.
pub fn is_value_tuple_built_in(tfm: &str, minimum: &str) -> bool {
    let (Some(version), Some(minimum)) = (net_framework_version(tfm), SemanticVersion::parse(minimum)) else {
        return false;
    };
    // Compare the numeric core only; the original text is irrelevant here.
    (version.major, version.minor, version.patch) >= (minimum.major, minimum.minor, minimum.patch)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Passes
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything a pass may consult besides the working snapshot.
pub struct PassContext<'a> {
    pub diff: &'a ProjectDiff,
    pub facts: &'a Facts,
    pub target_framework: &'a str,
    pub packages: Option<&'a PackagesConfig>,
    pub comparer: &'a dyn ItemComparer,
}

pub type Pass = fn(ProjectSnapshot, &PassContext<'_>) -> ProjectSnapshot;

/// The pass sequence, in the order the engine applies it.
pub const PASSES: &[(&str, Pass)] = &[
    ("drop-evaluation-only-properties", drop_evaluation_only_properties as Pass),
    ("set-target-framework", set_target_framework as Pass),
    ("strip-defaulted-properties", strip_defaulted_properties as Pass),
    ("strip-defaulted-items", strip_defaulted_items as Pass),
    ("detect-desktop-framework", detect_desktop_framework as Pass),
    ("rewrite-package-equivalents", rewrite_package_equivalents as Pass),
    ("merge-package-manifest", merge_package_manifest as Pass),
    ("value-tuple", remove_builtin_value_tuple as Pass),
];

/// Properties only visible after evaluation were never in the file.
pub fn drop_evaluation_only_properties(mut snapshot: ProjectSnapshot, _ctx: &PassContext<'_>) -> ProjectSnapshot {
    snapshot.properties.retain(|p| p.is_authored);
    snapshot
}

/// Replace the legacy identifier/version/profile triple with a single
/// `TargetFramework`, written where the triple used to start.
pub fn set_target_framework(mut snapshot: ProjectSnapshot, ctx: &PassContext<'_>) -> ProjectSnapshot {
    let is_legacy = |name: &str| LEGACY_FRAMEWORK_PROPERTIES.iter().any(|l| l.eq_ignore_ascii_case(name));

    if snapshot.property(TARGET_FRAMEWORKS).is_none() {
        if snapshot.property(TARGET_FRAMEWORK).is_some() {
            snapshot.set_property(TARGET_FRAMEWORK, ctx.target_framework);
        } else if let Some(position) = snapshot.properties.iter().position(|p| is_legacy(&p.name)) {
            snapshot
                .properties
                .insert(position, Property::authored(TARGET_FRAMEWORK, ctx.target_framework));
        } else {
            snapshot.set_property(TARGET_FRAMEWORK, ctx.target_framework);
        }
    }

    snapshot.properties.retain(|p| !is_legacy(&p.name));
    snapshot
}

pub fn strip_defaulted_properties(mut snapshot: ProjectSnapshot, ctx: &PassContext<'_>) -> ProjectSnapshot {
    snapshot.properties.retain(|p| {
        if ctx.facts.is_preserved_property(&p.name) {
            return true;
        }
        let redundant = ctx.diff.properties.is_defaulted(&p.name)
            || ctx.facts.is_unnecessary_property(&p.name)
            || ctx.facts.is_default_property_value(&p.name, &p.evaluated_value);
        if redundant {
            tracing::debug!(name = %p.name, value = %p.evaluated_value, "dropping defaulted property");
        }
        !redundant
    });
    snapshot
}

pub fn strip_defaulted_items(mut snapshot: ProjectSnapshot, ctx: &PassContext<'_>) -> ProjectSnapshot {
    snapshot.items.retain(|item| {
        let redundant = ctx.diff.is_defaulted_item(item, ctx.comparer)
            || ctx.facts.is_default_item(&item.item_type, item.reference_name())
            || ctx.facts.is_globbed_item(&item.item_type, &item.evaluated_include);
        if redundant {
            tracing::debug!(item_type = %item.item_type, include = %item.evaluated_include, "dropping defaulted item");
        }
        !redundant
    });
    snapshot
}

/// Whether the project's `Reference` includes match a known desktop
/// reference set under the configured strictness.
pub fn matches_reference_set(references: &[&str], known: &[String], strictness: DesktopMatch) -> bool {
    if known.is_empty() {
        return false;
    }
    let has_all = known.iter().all(|k| references.iter().any(|r| r.eq_ignore_ascii_case(k)));
    match strictness {
        DesktopMatch::Subset => has_all,
        DesktopMatch::Exact => has_all && references.iter().all(|r| contains_ignore_case(known, r)),
    }
}

/// WPF and WinForms references become implicit under the desktop SDK; swap
/// them for `UseWPF` / `UseWindowsForms`.
pub fn detect_desktop_framework(mut snapshot: ProjectSnapshot, ctx: &PassContext<'_>) -> ProjectSnapshot {
    if ctx.target_framework.to_ascii_lowercase().starts_with("netstandard") {
        return snapshot;
    }

    let detections = [
        (&ctx.facts.wpf_references, "UseWPF"),
        (&ctx.facts.winforms_references, "UseWindowsForms"),
    ];

    for (known, flag) in detections {
        let references: Vec<&str> = snapshot
            .items_of_type("Reference")
            .map(Item::reference_name)
            .collect();
        if !matches_reference_set(&references, known, ctx.facts.desktop_match) {
            continue;
        }

        tracing::info!(flag, "desktop framework detected");
        snapshot
            .items
            .retain(|i| !(i.is_type("Reference") && contains_ignore_case(known, i.reference_name())));
        snapshot.set_property(flag, "true");
    }

    snapshot
}

/// Plain references with a NuGet equivalent become package references.
pub fn rewrite_package_equivalents(snapshot: ProjectSnapshot, ctx: &PassContext<'_>) -> ProjectSnapshot {
    let ProjectSnapshot { properties, items } = snapshot;
    let mut packages: Vec<String> = items
        .iter()
        .filter(|i| i.is_type("PackageReference"))
        .map(|i| i.evaluated_include.clone())
        .collect();
    let mut rewritten: Vec<Item> = Vec::with_capacity(items.len());

    for item in items {
        let equivalent = item
            .is_type("Reference")
            .then(|| ctx.facts.package_equivalent(item.reference_name()))
            .flatten();

        let Some(equivalent) = equivalent else {
            rewritten.push(item);
            continue;
        };

        if !contains_ignore_case(&packages, &equivalent.package) {
            packages.push(equivalent.package.clone());
            tracing::debug!(reference = %item.evaluated_include, package = %equivalent.package, "rewriting reference");
            rewritten.push(
                Item::new("PackageReference", equivalent.package.clone())
                    .with_metadata("Version", equivalent.version.clone()),
            );
        }
    }

    ProjectSnapshot { properties, items: rewritten }
}

/// The `<id>.<version>` folder a reference's `HintPath` names right below a
/// NuGet `packages` folder.
fn hint_path_package_folder(item: &Item) -> Option<String> {
    let path = item.metadata_value("HintPath")?.replace('\\', "/");
    let mut segments = path.split('/');
    segments.find(|segment| segment.eq_ignore_ascii_case("packages"))?;
    segments.next().filter(|folder| !folder.is_empty()).map(String::from)
}

/// Whether a `Reference` is one of the manifest's packages, by simple name or
/// by its `HintPath` folder.
fn is_manifest_reference(item: &Item, packages: &PackagesConfig) -> bool {
    if !item.is_type("Reference") {
        return false;
    }
    if packages.get(item.reference_name()).is_some() {
        return true;
    }
    hint_path_package_folder(item).is_some_and(|folder| {
        packages
            .packages
            .iter()
            .any(|p| folder.eq_ignore_ascii_case(&format!("{}.{}", p.id, p.version.original_text())))
    })
}

fn is_packages_config(item: &Item) -> bool {
    let name = item.evaluated_include.replace('\\', "/");
    name.rsplit('/')
        .next()
        .is_some_and(|file| file.eq_ignore_ascii_case("packages.config"))
}

/// Fold a `packages.config` manifest into `PackageReference` items and drop
/// the references and the manifest item it made redundant.  References that
/// match no manifest entry stay, wherever their `HintPath` points.
pub fn merge_package_manifest(mut snapshot: ProjectSnapshot, ctx: &PassContext<'_>) -> ProjectSnapshot {
    let Some(packages) = ctx.packages else {
        return snapshot;
    };

    snapshot.items.retain(|i| {
        let keep = !is_manifest_reference(i, packages) && !is_packages_config(i);
        if !keep {
            tracing::debug!(include = %i.evaluated_include, "dropping item superseded by package references");
        }
        keep
    });

    for package in &packages.packages {
        let exists = snapshot
            .items_of_type("PackageReference")
            .any(|i| i.evaluated_include.eq_ignore_ascii_case(&package.id));
        if !exists {
            snapshot.items.push(
                Item::new("PackageReference", package.id.clone())
                    .with_metadata("Version", package.version.original_text()),
            );
        }
    }

    snapshot
}

/// Drop `System.ValueTuple` references when the target framework already
/// ships the type.
pub fn remove_builtin_value_tuple(mut snapshot: ProjectSnapshot, ctx: &PassContext<'_>) -> ProjectSnapshot {
    if is_value_tuple_built_in(ctx.target_framework, &ctx.facts.value_tuple_minimum) {
        snapshot.items.retain(|i| {
            !((i.is_type("Reference") || i.is_type("PackageReference"))
                && i.reference_name().eq_ignore_ascii_case(VALUE_TUPLE))
        });
    }
    snapshot
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Engine
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub snapshot: ProjectSnapshot,
    pub target_framework: String,
    /// SDK the converted project should declare.
    pub sdk: String,
}

/// Every configuration of a project, converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConversion {
    /// The primary configuration's conversion, keeping only the properties
    /// every configuration agrees on.
    pub conversion: Conversion,
    /// Per-configuration properties, in configuration order.  Configurations
    /// with nothing of their own are left out.
    pub scopes: Vec<ConfigurationScope>,
}

/// Runs [`PASSES`] over a legacy snapshot.
pub struct RuleEngine<'a> {
    facts: &'a Facts,
    comparer: &'a dyn ItemComparer,
}

impl<'a> RuleEngine<'a> {
    /// An engine using include-only item identity.
    pub fn new(facts: &'a Facts) -> Self {
        Self { facts, comparer: &IncludeOnly }
    }

    /// Use `comparer` for item identity.  Pass the same comparer that
    /// produced the diff.
    pub fn with_comparer(mut self, comparer: &'a dyn ItemComparer) -> Self {
        self.comparer = comparer;
        self
    }

    pub fn facts(&self) -> &Facts {
        self.facts
    }

    /// Convert `legacy` using a diff computed beforehand.
    pub fn convert(
        &self,
        legacy: &ProjectSnapshot,
        diff: &ProjectDiff,
        packages: Option<&PackagesConfig>,
    ) -> Result<Conversion, ConvertError> {
        let target_framework = resolve_target_framework(legacy, self.facts)?;
        tracing::info!(target_framework = %target_framework, "resolved target framework");

        let ctx = PassContext {
            diff,
            facts: self.facts,
            target_framework: &target_framework,
            packages,
            comparer: self.comparer,
        };

        let mut snapshot = legacy.clone();
        for (name, pass) in PASSES {
            let before = (snapshot.properties.len(), snapshot.items.len());
            snapshot = pass(snapshot, &ctx);
            tracing::debug!(
                pass = name,
                properties_before = before.0,
                properties_after = snapshot.properties.len(),
                items_before = before.1,
                items_after = snapshot.items.len(),
                "applied pass"
            );
        }

        let desktop = ["UseWPF", "UseWindowsForms"]
            .iter()
            .any(|flag| snapshot.property_value(flag).is_some_and(|v| v.eq_ignore_ascii_case("true")));
        let sdk = if desktop { &self.facts.desktop_sdk } else { &self.facts.sdk };

        Ok(Conversion { sdk: sdk.clone(), snapshot, target_framework })
    }

    /// Diff `legacy` against `baseline` with this engine's comparer, then
    /// convert.
    pub fn convert_against(
        &self,
        legacy: &ProjectSnapshot,
        authored: &BTreeSet<String>,
        baseline: &ProjectSnapshot,
        packages: Option<&PackagesConfig>,
    ) -> Result<Conversion, ConvertError> {
        let diff = diff::diff(legacy, authored, baseline, self.comparer);
        self.convert(legacy, &diff, packages)
    }

    /// Convert every configuration `legacy` declares against the matching
    /// evaluation of `baseline`.
    ///
    /// Items, the target framework and the SDK come from `primary`; a
    /// property moves into a [`ConfigurationScope`] as soon as one
    /// configuration disagrees on its value.  An empty `primary` means the
    /// first declared configuration.
    pub fn convert_project(
        &self,
        legacy: &Project,
        baseline: &Project,
        primary: &DimensionVector,
        packages: Option<&PackagesConfig>,
    ) -> Result<ProjectConversion, ConvertError> {
        let mut configurations = legacy.configurations();
        let primary = match configurations.first() {
            Some(first) if primary.is_empty() => first.clone(),
            _ => primary.clone(),
        };
        if !configurations.contains(&primary) {
            configurations.insert(0, primary.clone());
        }

        let authored = legacy.authored_property_names();
        let mut converted = Vec::with_capacity(configurations.len());
        for dimensions in configurations {
            tracing::debug!(configuration = %dimension_vector_to_label(&dimensions), "converting configuration");
            let snapshot = legacy.evaluate(&dimensions);
            let mut base = baseline.evaluate(&dimensions);
            complete_baseline(&mut base, &snapshot, self.facts);
            let conversion = self.convert_against(&snapshot, &authored, &base, packages)?;
            converted.push((dimensions, conversion));
        }

        Ok(split_configurations(&primary, &converted))
    }
}

/// Separate the properties every configuration shares from the ones that
/// differ somewhere.
fn split_configurations(primary: &DimensionVector, converted: &[(DimensionVector, Conversion)]) -> ProjectConversion {
    let shared = |property: &Property| {
        converted.iter().all(|(_, c)| {
            c.snapshot.property_value(&property.name) == Some(property.evaluated_value.as_str())
        })
    };

    let scopes: Vec<ConfigurationScope> = converted
        .iter()
        .filter_map(|(dimensions, c)| {
            let properties: Vec<Property> =
                c.snapshot.properties.iter().filter(|p| !shared(p)).cloned().collect();
            (!properties.is_empty()).then(|| ConfigurationScope { dimensions: dimensions.clone(), properties })
        })
        .collect();

    let index = converted.iter().position(|(d, _)| d == primary).unwrap_or(0);
    let mut conversion = converted[index].1.clone();
    conversion.snapshot.properties.retain(|p| shared(p));

    tracing::debug!(configurations = converted.len(), scopes = scopes.len(), "split configurations");
    ProjectConversion { conversion, scopes }
}

/// Complete a baseline loaded from a file with the items the SDK's globs
/// would add for `legacy`.
pub fn complete_baseline(baseline: &mut ProjectSnapshot, legacy: &ProjectSnapshot, facts: &Facts) {
    for item in implicit_glob_items(legacy, facts) {
        if !baseline.items.iter().any(|b| IncludeOnly.same_include(b, &item)) {
            baseline.items.push(item);
        }
    }
}

/// Concrete items the SDK's default globs would produce for `legacy`'s
/// explicitly listed files, without metadata.  Used to complete a baseline
/// loaded from a file, which carries no glob results of its own.
pub fn implicit_glob_items(legacy: &ProjectSnapshot, facts: &Facts) -> Vec<Item> {
    legacy
        .items
        .iter()
        .filter(|i| facts.matches_default_glob(&i.item_type, &i.evaluated_include))
        .map(|i| Item::new(i.item_type.clone(), i.evaluated_include.clone()))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
