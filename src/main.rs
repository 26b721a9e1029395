use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gilt::compare::Verdict;
use gilt::config::{CONFIG_FILE, Overrides};
use gilt::generate::Generated;
use gilt::{Harness, HarnessConfig, HarnessError, Stage};

/// Golden-output regression harness for the compiler pipeline
#[derive(Parser, Debug)]
#[command(name = "gilt", version)]
struct Cli {
    /// Config file; relative paths inside it are resolved against its directory
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Compiler executable (overrides the config file)
    #[arg(long)]
    compiler: Option<PathBuf>,

    /// IR interpreter executable (overrides the config file)
    #[arg(long)]
    interpreter: Option<PathBuf>,

    /// More logging; repeat for debug output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create baselines that do not exist yet
    Generate {
        /// Limit to a stage (parse, semantic, emission); repeatable
        #[arg(short, long = "stage")]
        stages: Vec<Stage>,
    },
    /// Compare stage output against the baselines
    Check {
        /// Limit to a stage (parse, semantic, emission); repeatable
        #[arg(short, long = "stage")]
        stages: Vec<Stage>,
        /// Only check these test cases
        cases: Vec<String>,
    },
    /// Show discovered test cases and their baselines
    List,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "gilt=warn",
        1 => "gilt=info",
        _ => "gilt=debug",
    };
    let filter = EnvFilter::try_from_env("GILT_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn stages_or_all(stages: Vec<Stage>) -> Vec<Stage> {
    if stages.is_empty() {
        Stage::ALL.to_vec()
    } else {
        stages
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let overrides = Overrides {
        compiler: cli.compiler,
        interpreter: cli.interpreter,
    };
    let harness = match HarnessConfig::load_or_default(&cli.config, &overrides)
        .map_err(HarnessError::from)
        .and_then(Harness::from_config)
    {
        Ok(harness) => harness,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    let result = match cli.command {
        Command::Generate { stages } => generate(&harness, &stages_or_all(stages)),
        Command::Check { stages, cases } => check(&harness, &stages_or_all(stages), &cases),
        Command::List => list(&harness),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(if e.is_environment() { 2 } else { 1 })
        }
    }
}

fn generate(harness: &Harness, stages: &[Stage]) -> Result<ExitCode, HarnessError> {
    let report = harness.generate(stages)?;
    for entry in &report.entries {
        if entry.status != Generated::Existing {
            println!("{}.{}: {}", entry.case, entry.kind.extension(), entry.status);
        }
    }
    for path in &report.swept {
        println!("{}: pruned (empty file)", path.display());
    }

    println!(
        "{} created, {} pruned, {} skipped, {} errors, {} existing",
        report.created(),
        report.count(|s| *s == Generated::Pruned) + report.swept.len(),
        report.count(|s| matches!(s, Generated::Skipped { .. })),
        report.errored(),
        report.count(|s| *s == Generated::Existing),
    );
    Ok(if report.errored() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn check(harness: &Harness, stages: &[Stage], cases: &[String]) -> Result<ExitCode, HarnessError> {
    let registrations = harness.registrations(stages, cases)?;
    let summary = harness.check(registrations);

    for result in &summary.results {
        let label = match &result.verdict {
            Ok(Verdict::Pass) => "ok",
            Ok(Verdict::Fail(_)) => "FAILED",
            Err(_) => "ERROR",
        };
        println!(
            "{} {} ... {}",
            result.registration.kind, result.registration.case, label
        );
    }

    for result in summary.results.iter().filter(|r| !r.passed()) {
        println!();
        println!("---- {} {} ----", result.registration.kind, result.registration.case);
        match &result.verdict {
            Ok(Verdict::Fail(failure)) => print!("{}", failure),
            Err(e) => println!("{}", e),
            Ok(Verdict::Pass) => {}
        }
    }

    println!();
    println!(
        "result: {}. {} passed; {} failed; {} errors",
        if summary.all_passed() { "ok" } else { "FAILED" },
        summary.passed(),
        summary.failed(),
        summary.errors(),
    );

    Ok(if summary.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn list(harness: &Harness) -> Result<ExitCode, HarnessError> {
    for listing in harness.list()? {
        let kinds: Vec<&str> = listing.kinds.iter().map(|k| k.as_str()).collect();
        if kinds.is_empty() {
            println!("{}: (no baselines)", listing.case);
        } else {
            println!("{}: {}", listing.case, kinds.join(", "));
        }
    }
    Ok(ExitCode::SUCCESS)
}
