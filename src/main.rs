use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sdk_convert::condition::dimension_vector_to_label;
use sdk_convert::rules::complete_baseline;
use sdk_convert::writer::write_project;
use sdk_convert::{
    DimensionVector, Facts, IncludeAndMetadata, IncludeOnly, ItemComparer, PackagesConfig, Project, ReportFormatter,
    RuleEngine, diff,
};

/// Convert legacy MSBuild projects into SDK-style projects.
#[derive(Parser)]
#[command(name = "sdk-convert", version, about = "Convert legacy MSBuild projects into SDK-style projects")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the configurations a project scopes settings to
    Configurations {
        /// Path to the legacy project file
        project: PathBuf,
    },

    /// Print how a project differs from an SDK baseline
    Diff(CompareArgs),

    /// Write the SDK-style equivalent of a project
    Convert {
        #[command(flatten)]
        compare: CompareArgs,
        /// packages.config to fold into PackageReference items
        /// (default: packages.config next to the project, when present)
        #[arg(long)]
        packages: Option<PathBuf>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CompareArgs {
    /// Path to the legacy project file
    project: PathBuf,
    /// SDK-style baseline project to compare against
    #[arg(long)]
    baseline: PathBuf,
    /// Configuration to evaluate; for `convert`, the one whose items are kept
    /// (default: the project's own default)
    #[arg(long)]
    configuration: Option<String>,
    /// Platform to evaluate (default: the project's own default)
    #[arg(long)]
    platform: Option<String>,
    /// Compare items by include only, ignoring metadata
    #[arg(long)]
    include_only: bool,
    /// TOML file overriding the built-in fact tables
    #[arg(long)]
    facts: Option<PathBuf>,
}

/// Everything `diff` and `convert` share.
struct Inputs {
    facts: Facts,
    configuration: DimensionVector,
    project: Project,
    baseline: Project,
}

impl CompareArgs {
    fn comparer(&self) -> &'static dyn ItemComparer {
        if self.include_only { &IncludeOnly } else { &IncludeAndMetadata }
    }

    fn load(&self) -> Result<Inputs> {
        let facts = match &self.facts {
            Some(path) => Facts::from_file(path).with_context(|| format!("loading facts {}", path.display()))?,
            None => Facts::default(),
        };

        let project = Project::from_file(&self.project)
            .with_context(|| format!("loading project {}", self.project.display()))?;
        if project.is_sdk_style() {
            tracing::warn!(project = %self.project.display(), "project is already SDK-style");
        }

        let mut configuration = project.default_configuration();
        if let Some(value) = &self.configuration {
            configuration.insert("Configuration", value.as_str());
        }
        if let Some(value) = &self.platform {
            configuration.insert("Platform", value.as_str());
        }

        let baseline = Project::from_file(&self.baseline)
            .with_context(|| format!("loading baseline {}", self.baseline.display()))?;

        Ok(Inputs { facts, configuration, project, baseline })
    }
}

fn configurations(project: &Path) -> Result<()> {
    let project =
        Project::from_file(project).with_context(|| format!("loading project {}", project.display()))?;
    for configuration in project.configurations() {
        println!("{}", dimension_vector_to_label(&configuration));
    }
    Ok(())
}

fn report(args: &CompareArgs) -> Result<()> {
    let inputs = args.load()?;
    tracing::info!(configuration = %dimension_vector_to_label(&inputs.configuration), "evaluating");

    let legacy = inputs.project.evaluate(&inputs.configuration);
    let mut baseline = inputs.baseline.evaluate(&inputs.configuration);
    complete_baseline(&mut baseline, &legacy, &inputs.facts);

    let diff = diff::diff(&legacy, &legacy.authored_property_names(), &baseline, args.comparer());
    for line in ReportFormatter::new(&inputs.facts).format(&diff, Some(&inputs.configuration)) {
        println!("{line}");
    }
    Ok(())
}

fn convert(args: &CompareArgs, packages: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let inputs = args.load()?;

    let sibling = args.project.with_file_name("packages.config");
    let manifest_path = packages.map(Path::to_path_buf).or_else(|| sibling.is_file().then_some(sibling));
    let manifest = manifest_path
        .map(|path| {
            PackagesConfig::from_file(&path).with_context(|| format!("loading packages {}", path.display()))
        })
        .transpose()?;

    let engine = RuleEngine::new(&inputs.facts).with_comparer(args.comparer());
    let converted = engine
        .convert_project(&inputs.project, &inputs.baseline, &inputs.configuration, manifest.as_ref())
        .with_context(|| format!("converting {}", args.project.display()))?;
    let conversion = &converted.conversion;

    let xml = write_project(&conversion.snapshot, &converted.scopes, &conversion.sdk);
    match output {
        Some(path) => {
            std::fs::write(path, xml).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(
                output = %path.display(),
                target_framework = %conversion.target_framework,
                configurations = converted.scopes.len(),
                "converted"
            );
        }
        None => print!("{xml}"),
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "sdk_convert=info",
        1 => "sdk_convert=debug",
        _ => "sdk_convert=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Commands::Configurations { project } => configurations(project),
        Commands::Diff(args) => report(args),
        Commands::Convert { compare, packages, output } => {
            convert(compare, packages.as_deref(), output.as_deref())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
