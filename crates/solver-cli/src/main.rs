//! Demonstration front-end for the solve orchestration engine. Reads a
//! JSON scenario file (prefix records, a candidate index, and the specs to
//! add/remove) and prints the resulting unlink/link plan. Grounded on
//! `rattler-bin::main`'s clap + tracing-subscriber wiring and
//! `rattler-bin::commands::create`'s "load inputs, invoke the solve, print
//! a plan" shape — trimmed to a single subcommand since channel fetching,
//! on-disk linking, and every other `rattler` subcommand are out of scope
//! here.

mod scenario;

use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::Verbosity;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use scenario::ScenarioFile;

/// Command line options for the `solver-cli` binary.
#[derive(Debug, Parser)]
#[clap(author, version, about = "Demonstration CLI for the solve orchestration engine", long_about = None)]
struct Opt {
    #[clap(subcommand)]
    command: Command,

    #[clap(flatten)]
    verbosity: Verbosity,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Solve a scenario file and print the resulting unlink/link plan.
    Solve {
        /// Path to a JSON scenario file.
        scenario: PathBuf,
    },
}

/// Maps clap-verbosity-flag's `log` level onto a `tracing_subscriber`
/// filter, since the two crates' level types don't share a conversion.
fn tracing_level_filter(level: Option<log::Level>) -> LevelFilter {
    match level {
        None => LevelFilter::OFF,
        Some(log::Level::Error) => LevelFilter::ERROR,
        Some(log::Level::Warn) => LevelFilter::WARN,
        Some(log::Level::Info) => LevelFilter::INFO,
        Some(log::Level::Debug) => LevelFilter::DEBUG,
        Some(log::Level::Trace) => LevelFilter::TRACE,
    }
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();

    let default_filter = tracing_level_filter(opt.verbosity.log_level());
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_filter.into())
        .from_env()?;
    tracing_subscriber::fmt().with_env_filter(env_filter).without_time().init();

    match opt.command {
        Command::Solve { scenario } => solve(scenario),
    }
}

fn solve(path: PathBuf) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(&path)
        .map_err(|err| anyhow::anyhow!("reading {}: {err}", path.display()))?;
    let scenario: ScenarioFile = serde_json::from_str(&contents)
        .map_err(|err| anyhow::anyhow!("parsing {}: {err}", path.display()))?;

    let (setup, report) = scenario.solve()?;

    let output = serde_json::json!({
        "prefix": setup.prefix,
        "unlink": setup.unlink_precs.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
        "link": setup.link_precs.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
        "neutered_specs": setup.neutered_specs.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        "constricting": report.constricting.iter().map(|(spec, holders)| {
            serde_json::json!({ "spec": spec.to_string(), "held_back_by": holders })
        }).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
