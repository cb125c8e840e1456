#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::missing_errors_doc)]

mod logging;

use clap::Parser;
use hoister_core::{Error, InstallContext, NoHoistRule};
use logging::LogLevel;
use miette::{miette, IntoDiagnostic, Result};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "hoister")]
#[command(
    author,
    version,
    about = "Installs and hoists dependencies for monorepo local modules",
    long_about = None
)]
struct Cli {
    /// Name of the folder holding the local modules
    #[arg(value_name = "MODULES_FOLDER", default_value = "modules")]
    modules_folder: String,

    /// Do not satisfy dependencies by linking sibling local modules
    #[arg(long)]
    no_link: bool,

    /// Only repair symlinks; skip planning and installation
    #[arg(long, conflicts_with = "dependency_check_only")]
    link_only: bool,

    /// Remove every module's private node_modules before installing
    #[arg(long)]
    cleanup: bool,

    /// Only coalesce dependencies and report diagnostics, then exit
    #[arg(long)]
    dependency_check_only: bool,

    /// Assume local modules satisfy non-semver dependency ranges
    #[arg(
        long,
        alias = "assume-local-modules-satisfy-non-semver-dependency-versions"
    )]
    trust_local_modules: bool,

    /// Exclude matching dependencies from hoisting; name may be a glob
    #[arg(long = "no-hoist", value_name = "NAME[@RANGE]")]
    no_hoist: Vec<String>,

    /// Log verbosity
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    loglevel: LogLevel,

    /// Override the working directory
    #[arg(long, value_name = "PATH")]
    cwd: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.loglevel);

    let cwd = match &cli.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir().into_diagnostic()?,
    };
    let project_root = cwd.canonicalize().into_diagnostic()?;

    let mut rules = Vec::with_capacity(cli.no_hoist.len());
    for raw in &cli.no_hoist {
        rules.push(NoHoistRule::parse(raw).map_err(|msg| miette!("{msg}"))?);
    }

    let production = std::env::var("NODE_ENV").is_ok_and(|v| v == "production");

    let mut ctx = InstallContext::new(project_root)
        .with_modules_folder(&cli.modules_folder)
        .with_link_local_modules(!cli.no_link)
        .with_trust_local_non_semver(cli.trust_local_modules)
        .with_no_hoist(rules)
        .with_production(production);
    ctx.link_only = cli.link_only;
    ctx.cleanup = cli.cleanup;
    ctx.dependency_check_only = cli.dependency_check_only;

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    match runtime.block_on(hoister_core::pipeline::run(&ctx)) {
        Ok(()) => Ok(()),
        Err(Error::Uncritical(msg)) => {
            info!("{msg}");
            Ok(())
        }
        Err(err) => {
            if let Error::Installer { stderr, .. } = &err {
                if !stderr.is_empty() {
                    error!("{stderr}");
                }
            }
            error!("{err}");
            std::process::exit(1);
        }
    }
}
