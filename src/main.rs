use anyhow::{Context, Result, bail};
use clap::Parser;
use log::warn;
use nrserial::cleanup;
use nrserial::config::LoaderConfig;
use nrserial::inspect;
use nrserial::loader::{
    AttemptError, Candidate, DEFAULT_LIBRARY, LoadReport, LoadSource, Loader, candidate_chain,
};
use nrserial::native::DynamicLoader;
use nrserial::platform::PlatformTag;
use nrserial::resource::{self, ResourceBundle};
use nrserial::runtime::{RealRuntime, Runtime};
use std::io::Read;
use std::path::{Path, PathBuf};

/// nrserial - native serial driver loader
///
/// Finds the prebuilt serial driver for this platform in a resource bundle,
/// extracts it into a per-user staging slot and loads it, falling back to the
/// system library path when no bundled build works.
///
/// Examples:
///   nrserial platform                    # Show how this machine is classified
///   nrserial --bundle app.jar locate     # Check the bundle for a matching driver
///   nrserial --bundle app.jar load       # Run the full load sequence
#[derive(Parser, Debug)]
#[command(author, version = env!("NRSERIAL_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Resource bundle: a directory, .zip or .jar containing native/... (also via NRSERIAL_BUNDLE)
    #[arg(long, env = "NRSERIAL_BUNDLE", value_name = "PATH", global = true)]
    pub bundle: Option<PathBuf>,

    /// Parent directory of the staging slots (also via NRSERIAL_TMPDIR)
    #[arg(long, env = "NRSERIAL_TMPDIR", value_name = "PATH", global = true)]
    pub tmpdir: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Show the platform tag, resource directory and library extension
    Platform(PlatformArgs),

    /// Show where the bundled library is expected and whether the bundle has it
    Locate(NameArgs),

    /// Extract the bundled library into a staging slot without loading it
    Stage(NameArgs),

    /// Describe a native binary: format, architecture and bitness
    Inspect(InspectArgs),

    /// Run the full load sequence and report which strategy succeeded
    Load(LoadArgs),
}

#[derive(clap::Args, Debug)]
pub struct PlatformArgs {
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct NameArgs {
    /// Library base name
    #[arg(value_name = "NAME", default_value = DEFAULT_LIBRARY)]
    pub name: String,
}

#[derive(clap::Args, Debug)]
pub struct InspectArgs {
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct LoadArgs {
    /// Library base name
    #[arg(value_name = "NAME", default_value = DEFAULT_LIBRARY)]
    pub name: String,

    /// Skip the bundle: "sys" for the system library path, or an absolute library path
    #[arg(long, value_name = "sys|PATH")]
    pub userlib: Option<String>,

    /// Print the load report as JSON
    #[arg(long)]
    pub json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let result = run(cli);
    cleanup::run_exit_cleanup();
    result
}

fn run(cli: Cli) -> Result<()> {
    let runtime = RealRuntime;
    let mut config = LoaderConfig::from_runtime(&runtime);
    if let Some(dir) = cli.tmpdir {
        config.temp_dir = dir;
    }
    if let Some(bundle) = cli.bundle {
        config.bundle = Some(bundle);
    }

    match cli.command {
        Commands::Platform(args) => show_platform(&runtime, args.json),
        Commands::Locate(args) => locate(&runtime, &config, &args.name),
        Commands::Stage(args) => stage(&runtime, &config, &args.name),
        Commands::Inspect(args) => inspect_binary(&runtime, &args.path),
        Commands::Load(args) => load(&runtime, config, args),
    }
}

fn open_bundle(config: &LoaderConfig) -> Result<Box<dyn ResourceBundle>> {
    match &config.bundle {
        Some(path) => resource::open_bundle(path)
            .with_context(|| format!("Failed to open resource bundle {:?}", path)),
        None => Ok(resource::default_bundle(config)),
    }
}

fn show_platform(runtime: &RealRuntime, json: bool) -> Result<()> {
    let tag = PlatformTag::detect(runtime);
    if json {
        let value = serde_json::json!({
            "tag": tag,
            "subpath": tag.subpath(),
            "extension": tag.extension(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Platform:  {}", tag);
    println!("Family:    {:?}", tag.family);
    println!("Arch:      {:?}", tag.arch);
    println!("Extension: {}", tag.extension());
    Ok(())
}

fn locate(runtime: &RealRuntime, config: &LoaderConfig, name: &str) -> Result<()> {
    let bundle = open_bundle(config)?;
    let tag = PlatformTag::detect(runtime);

    let mut found = false;
    for candidate in candidate_chain(name, &tag) {
        let Candidate::Bundled(variant) = candidate else {
            continue;
        };
        let Some(path) = resource::resource_path(&variant, &tag) else {
            println!("{}: no prebuilt libraries for platform {}", variant, tag);
            continue;
        };
        let present = bundle.open(&path)?.is_some();
        found |= present;
        println!("{} {}", if present { "found  " } else { "missing" }, path);
    }

    if !found {
        bail!(
            "No bundled {} for platform {} in {}",
            name,
            tag,
            bundle.describe()
        );
    }
    Ok(())
}

fn stage(runtime: &RealRuntime, config: &LoaderConfig, name: &str) -> Result<()> {
    let bundle = open_bundle(config)?;
    let loader = Loader::new(runtime, bundle.as_ref(), &DynamicLoader, config);

    for candidate in candidate_chain(name, loader.platform()) {
        let Candidate::Bundled(variant) = candidate else {
            continue;
        };
        match loader.stage(&variant) {
            Ok(staged) => {
                println!("{}", staged.file_path.display());
                return Ok(());
            }
            Err(AttemptError::Candidate(failure)) => {
                warn!("{}: {}", failure.candidate, failure.reason)
            }
            Err(AttemptError::Deploy(e)) => return Err(e.into()),
        }
    }

    bail!(
        "Nothing to stage for {} on platform {}",
        name,
        loader.platform()
    )
}

fn inspect_binary(runtime: &RealRuntime, path: &Path) -> Result<()> {
    let mut bytes = Vec::new();
    runtime
        .open(path)?
        .read_to_end(&mut bytes)
        .with_context(|| format!("Failed to read {:?}", path))?;
    let info =
        inspect::describe(&bytes).with_context(|| format!("Failed to inspect {:?}", path))?;
    println!("{}: {}", path.display(), info);
    Ok(())
}

fn load(runtime: &RealRuntime, mut config: LoaderConfig, args: LoadArgs) -> Result<()> {
    if let Some(userlib) = args.userlib {
        config.userlib = Some(userlib);
    }
    let bundle = open_bundle(&config)?;
    let loader = Loader::new(runtime, bundle.as_ref(), &DynamicLoader, &config);
    let loaded = loader.load(&args.name)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&loaded.report)?);
    } else {
        print_report(&loaded.report);
    }
    Ok(())
}

fn print_report(report: &LoadReport) {
    println!("Loaded {} for platform {}", report.library, report.platform);
    match &report.source {
        LoadSource::Chain { candidate } => println!("  via {}", candidate),
        LoadSource::Override { value } => println!("  via userlib override {}", value),
    }
    println!("  from {}", report.origin);
    for attempt in &report.failed {
        println!("  skipped {}: {}", attempt.candidate, attempt.reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_platform_parsing() {
        let cli = Cli::try_parse_from(&["nrserial", "platform", "--json"]).unwrap();
        match cli.command {
            Commands::Platform(args) => assert!(args.json),
            _ => panic!("Expected Platform command"),
        }
    }

    #[test]
    fn test_cli_default_library_name() {
        let cli = Cli::try_parse_from(&["nrserial", "locate"]).unwrap();
        match cli.command {
            Commands::Locate(args) => assert_eq!(args.name, DEFAULT_LIBRARY),
            _ => panic!("Expected Locate command"),
        }
    }

    #[test]
    fn test_cli_load_parsing() {
        let cli =
            Cli::try_parse_from(&["nrserial", "load", "libFoo", "--userlib", "sys"]).unwrap();
        match cli.command {
            Commands::Load(args) => {
                assert_eq!(args.name, "libFoo");
                assert_eq!(args.userlib.as_deref(), Some("sys"));
                assert!(!args.json);
            }
            _ => panic!("Expected Load command"),
        }
    }

    #[test]
    fn test_cli_global_options_parsing() {
        let cli = Cli::try_parse_from(&[
            "nrserial",
            "stage",
            "--bundle",
            "/opt/app/app.jar",
            "--tmpdir",
            "/scratch",
        ])
        .unwrap();
        assert_eq!(cli.bundle, Some(PathBuf::from("/opt/app/app.jar")));
        assert_eq!(cli.tmpdir, Some(PathBuf::from("/scratch")));
    }

    #[test]
    fn test_cli_inspect_requires_path() {
        assert!(Cli::try_parse_from(&["nrserial", "inspect"]).is_err());
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        let result = Cli::try_parse_from(&["nrserial"]);
        assert!(result.is_err());
    }
}
