use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use p4tv_driver::Outcome;

/// Checks two packet-processing programs for semantic equivalence by
/// translating each into a symbolic term per pipeline and asking an SMT
/// solver whether any input makes them disagree.
#[derive(Parser, Debug)]
#[command(name = "p4tv", version, about)]
struct Cli {
    /// The two IR fixtures to compare, in order.
    #[arg(long = "progs", num_args = 2, value_names = ["A", "B"])]
    progs: Vec<PathBuf>,

    /// Treat a violation that only occurs through an uninitialized value
    /// as equivalent, rather than as a mismatch.
    #[arg(short = 'u', long = "allow-undefined")]
    allow_undefined: bool,

    /// Copy the offending fixtures here when a pipeline is found to differ.
    #[arg(long = "fail-dir", value_name = "DIR")]
    fail_dir: Option<PathBuf>,

    /// Aborts a single pipeline's solver check after this many milliseconds.
    #[arg(long = "solver-timeout-ms", default_value_t = 10_000)]
    solver_timeout_ms: u32,

    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::from(3)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_directive = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn run(cli: &Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if cli.progs.len() != 2 {
        return Err("--progs requires exactly two paths".into());
    }
    let path_a = &cli.progs[0];
    let path_b = &cli.progs[1];

    tracing::info!(?path_a, ?path_b, "loading IR packages");
    let pkg_a = p4tv_ir::load_package(path_a)?;
    let pkg_b = p4tv_ir::load_package(path_b)?;

    let cfg = z3::Config::new();
    let ctx = z3::Context::new(&cfg);

    let name_a = path_a.to_string_lossy().into_owned();
    let name_b = path_b.to_string_lossy().into_owned();
    let results = p4tv_driver::check_equivalence(
        &ctx,
        (&name_a, &pkg_a),
        (&name_b, &pkg_b),
        cli.allow_undefined,
        cli.solver_timeout_ms,
    )?;

    let mut worst = 0;
    for (pipeline, outcome) in &results {
        report(pipeline, outcome);
        worst = worst.max(outcome.exit_code());
        if outcome.is_violation() {
            if let Some(fail_dir) = &cli.fail_dir {
                p4tv_driver::copy_failing_programs(fail_dir, &[path_a.as_path(), path_b.as_path()])?;
            }
        }
    }

    Ok(ExitCode::from(worst as u8))
}

fn report(pipeline: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Equivalent => println!("{pipeline}: equivalent"),
        Outcome::Violation { model, .. } => println!("{pipeline}: VIOLATION\n{model}"),
        Outcome::Skipped { reason } => println!("{pipeline}: skipped ({reason})"),
        Outcome::Unsupported { construct } => println!("{pipeline}: unsupported ({construct})"),
        Outcome::Failure { reason } => println!("{pipeline}: failure ({reason})"),
    }
}
