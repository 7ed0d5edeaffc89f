//! ProdChain CLI Entry Point
//!
//! # Usage
//!
//! ```bash
//! # Plan the simulation chain described in prod.ini
//! prodchain production
//!
//! # Select the process section and preview without registering anything
//! prodchain production ChainNew --ini myprod.ini --dryrun
//!
//! # Override single options
//! prodchain production --set tag=e+_1MeV --set evtmax=500
//!
//! # Show the documented example configuration
//! prodchain reconstruction --example
//! ```

use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use log::{error, info};

use prodchain::backend::LocalRegistry;
use prodchain::catalog::LocalCatalog;
use prodchain::config::Overrides;
use prodchain::production::{Identity, RunReport, StepOutcome};
use prodchain::{Config, Profile, ProductionChain, APP_NAME, VERSION};

/// Compile production configurations into grid transformations
#[derive(Parser)]
#[command(name = "prodchain")]
#[command(about = "prodchain - compile production configurations into grid transformations", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging and error source chains
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Simulation chain: detsim, elecsim, calib, rec
    Production(CommonArgs),

    /// Reconstruction chain over existing simulation output
    Reconstruction(CommonArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// Process section to use (defaults to the `process` option)
    process: Option<String>,

    /// Configuration file (default: prod.ini or rec.ini)
    #[arg(short, long, value_name = "FILE")]
    ini: Option<PathBuf>,

    /// Only parse the configuration, do not submit transformations
    #[arg(short = 'r', long)]
    dryrun: bool,

    /// Display an example configuration file
    #[arg(short, long)]
    example: bool,

    /// Override a configuration option
    #[arg(short, long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    set: Vec<(String, String)>,

    /// Directory of the local metadata catalog
    #[arg(long, value_name = "DIR", default_value = ".prodchain/catalog")]
    catalog_dir: PathBuf,

    /// File of the local transformation registry
    #[arg(long, value_name = "FILE", default_value = ".prodchain/transformations.json")]
    registry: PathBuf,

    /// Submitting user name (falls back to $USER)
    #[arg(long, env = "PRODCHAIN_USER")]
    user: Option<String>,

    /// Submitting group
    #[arg(long, env = "PRODCHAIN_GROUP", default_value = "juno_user")]
    group: String,

    /// Virtual organisation
    #[arg(long, env = "PRODCHAIN_VO", default_value = "juno")]
    vo: String,
}

impl CommonArgs {
    /// Command-line options in the form the configuration merge expects.
    fn overrides(&self) -> Overrides {
        let mut overrides: Overrides = self.set.iter().cloned().collect();
        if let Some(process) = &self.process {
            overrides.insert("process".to_string(), process.clone());
        }
        if self.dryrun {
            overrides.insert("dryrun".to_string(), "true".to_string());
        }
        overrides
    }

    fn identity(&self) -> Result<Identity, String> {
        let username = match &self.user {
            Some(user) => user.clone(),
            None => env::var("USER")
                .map_err(|_| "no user given, use --user or PRODCHAIN_USER".to_string())?,
        };
        Ok(Identity::new(username, self.group.clone(), self.vo.clone()))
    }
}

/// Parses a single `KEY=VALUE` pair.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{}`", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{}`", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner(profile: Profile) {
    println!();
    println!("{} v{} ({})", APP_NAME.bold(), VERSION, profile);
    println!();
}

/// Prints one line per planned transformation and the totals.
fn print_report(report: &RunReport) {
    println!();
    for entry in report.entries() {
        let outcome = entry.outcome.to_string();
        let outcome = match entry.outcome {
            StepOutcome::Created(_) => outcome.green(),
            StepOutcome::DryRun => outcome.cyan(),
            StepOutcome::AlreadyExists(_) => outcome.yellow(),
            StepOutcome::PredecessorMissing(_) => outcome.red(),
        };
        println!("  {:<20} {:<14} {}", entry.tag, entry.label(), outcome);
    }
    for (tag, reason) in report.skipped_tags() {
        println!("  {:<20} {}", tag, format!("skipped: {}", reason).red());
    }

    println!();
    println!(
        "{} created, {} dry-run, {} existing, {} missing input, {} skipped tag(s)",
        report.created().to_string().green().bold(),
        report.dry_run(),
        report.already_exists(),
        report.predecessor_missing(),
        report.skipped_tags().len()
    );
}

fn run(profile: Profile, args: &CommonArgs) -> Result<(), Box<dyn Error>> {
    if args.example {
        print!("{}", profile.example());
        return Ok(());
    }

    print_banner(profile);

    let ini = args
        .ini
        .clone()
        .unwrap_or_else(|| PathBuf::from(profile.default_config_file()));
    info!("Loading configuration: {}", ini.display());
    let config = Config::load(&ini, &args.overrides(), profile)?;

    let identity = args.identity()?;
    let catalog = LocalCatalog::open(&args.catalog_dir)?;
    let registry = LocalRegistry::open(&args.registry)?;
    info!("Catalog: {}", catalog.base().display());
    info!("Registry: {}", registry.path().display());

    let chain = ProductionChain::new(&config, &identity, &catalog, &registry)?;
    let report = chain.run()?;

    print_report(&report);
    Ok(())
}

/// Logs an error followed by its sources.
fn report_error(err: &dyn Error, verbose: bool) {
    error!("{}", err);
    if !verbose {
        return;
    }
    let mut source = err.source();
    while let Some(cause) = source {
        error!("  caused by: {}", cause);
        source = cause.source();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let (profile, args) = match &cli.command {
        Command::Production(args) => (Profile::Production, args),
        Command::Reconstruction(args) => (Profile::Reconstruction, args),
    };

    match run(profile, args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&*e, cli.verbose);
            ExitCode::FAILURE
        }
    }
}
