///
/// sqltester CLI - Run SQL test scripts against SQLite
///
/// Usage:
/// - sqltester <script|dir>...: run scripts; directories are searched for
///   `*.test` files
/// - -v / --verbose: more logging (repeatable, up to 3)
/// - --keep-going: continue after a script aborts with a fatal error
/// - --internals: dump the command table, engine version and configuration
/// - --config <file>: load run settings from TOML
///

use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

use sqltester::{RunConfig, Runner, load_config};

#[derive(Parser)]
#[command(name = "sqltester")]
#[command(author, version, about = "Interpreter for SQL test scripts", long_about = None)]
struct Cli {
    /// Test scripts, or directories containing `*.test` scripts
    #[arg(required = true)]
    scripts: Vec<PathBuf>,

    /// Increase verbosity (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Keep running after a script fails
    #[arg(long)]
    keep_going: bool,

    /// Print the command table, engine version and configuration
    #[arg(long)]
    internals: bool,

    /// Run configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => RunConfig::default(),
    };
    let verbosity = config.verbosity.max(cli.verbose);
    let keep_going = config.keep_going || cli.keep_going;
    let config = config.with_verbosity(verbosity).with_keep_going(keep_going);

    init_tracing(config.verbosity);

    let mut runner = Runner::new(config, Box::new(std::io::stdout()));
    for path in &cli.scripts {
        if path.is_dir() {
            for script in collect_scripts(path) {
                runner.add_script(script);
            }
        } else {
            runner.add_script(path);
        }
    }

    let outcome = runner.run();
    if let Err(e) = runner.write_summary() {
        eprintln!("Error: {}", e);
    }
    if cli.internals {
        if let Err(e) = runner.write_internals() {
            eprintln!("Error: {}", e);
        }
    }

    if let Err(e) = outcome {
        eprintln!("Run terminated: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(level)
        .init();
}

fn collect_scripts(dir: &Path) -> Vec<PathBuf> {
    let mut scripts: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.extension().map(|e| e == "test").unwrap_or(false))
        .collect();
    scripts.sort();
    scripts
}
