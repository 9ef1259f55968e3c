//! envx CLI Entry Point
//!
//! Runs a command inside a conda-family environment, creating the
//! environment first if needed and removing it afterwards unless it was
//! given a name to keep.
//!
//! # Usage
//!
//! ```bash
//! # One-shot: ephemeral environment, removed after the command exits
//! envx conda -d python=3.11 -d numpy -- python -c 'import numpy'
//!
//! # Named environment, reused across runs and left in place
//! envx mamba -n analysis -d samtools=1.17 samtools --version
//!
//! # Install whatever is missing from an existing environment
//! envx conda -n analysis -d bcftools -m bcftools --help
//! ```

use std::env;
use std::process::ExitCode;

use colored::Colorize;
use log::info;

use envx::environment::{CondaEnv, Environment, Manager};
use envx::errors::{EnvError, ExecError};
use envx::{APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    manager: Manager,
    name: Option<String>,
    dependencies: Vec<String>,
    channels: Vec<String>,
    install_missing: bool,
    keep: bool,
    verbose: bool,
    command: Vec<String>,
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

/// Prints usage information.
fn print_usage() {
    println!("Usage: envx [OPTIONS] <MANAGER> [--] <COMMAND>...");
    println!();
    println!("Arguments:");
    println!("  <MANAGER>     Environment manager: conda, mamba, micromamba");
    println!("  <COMMAND>...  Command to run inside the environment");
    println!();
    println!("Options:");
    println!("  -n, --name NAME         Environment name (kept after exit; omit for an");
    println!("                          ephemeral environment that is removed)");
    println!("  -d, --dependency SPEC   Dependency spec, repeatable (e.g. numpy, python=3.11)");
    println!("  -c, --channel CHANNEL   Channel for create/install, repeatable");
    println!("  -m, --install-missing   Install missing dependencies instead of failing");
    println!("  -k, --keep              Keep the environment even without a name");
    println!("  -v, --verbose           Debug logging; stream child output unbuffered");
    println!("  -h, --help              Show this help message");
    println!("  -V, --version           Show version information");
    println!();
    println!("Examples:");
    println!("  envx conda -d python=3.11 -- python --version");
    println!("  envx mamba -n analysis -d samtools -m samtools --version");
}

/// Parses command-line arguments into a Config struct.
///
/// Everything after the first non-option argument following the manager is
/// taken verbatim as the command to run, so the wrapped command's own flags
/// pass through untouched.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut manager: Option<Manager> = None;
    let mut name = None;
    let mut dependencies = Vec::new();
    let mut channels = Vec::new();
    let mut install_missing = false;
    let mut keep = false;
    let mut verbose = false;
    let mut command = Vec::new();

    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--install-missing" | "-m" => {
                install_missing = true;
            }
            "--keep" | "-k" => {
                keep = true;
            }
            "--verbose" | "-v" => {
                verbose = true;
            }
            "--name" | "-n" => {
                i += 1;
                if i >= args.len() {
                    return Err("--name requires a value".to_string());
                }
                name = Some(args[i].clone());
            }
            "--dependency" | "-d" => {
                i += 1;
                if i >= args.len() {
                    return Err("--dependency requires a spec".to_string());
                }
                dependencies.push(args[i].clone());
            }
            "--channel" | "-c" => {
                i += 1;
                if i >= args.len() {
                    return Err("--channel requires a value".to_string());
                }
                channels.push(args[i].clone());
            }
            "--" => {
                command.extend(args[i + 1..].iter().cloned());
                break;
            }
            arg if arg.starts_with('-') && manager.is_none() => {
                return Err(format!("Unknown option: {arg}"));
            }
            _ if manager.is_none() => {
                manager = Some(
                    Manager::from_name(arg)
                        .ok_or_else(|| format!("Unknown manager: {arg} (expected conda, mamba, or micromamba)"))?,
                );
            }
            _ => {
                // First command word; the rest passes through verbatim
                command.extend(args[i..].iter().cloned());
                break;
            }
        }
        i += 1;
    }

    let Some(manager) = manager else {
        return Err("Missing manager argument".to_string());
    };

    if command.is_empty() {
        return Err("Missing command to execute".to_string());
    }

    Ok(Config {
        manager,
        name,
        dependencies,
        channels,
        install_missing,
        keep,
        verbose,
        command,
    })
}

/// Builds the environment handle described by the CLI configuration.
fn build_environment(config: &Config) -> Result<CondaEnv, EnvError> {
    let mut env = match &config.name {
        Some(name) => CondaEnv::new(name.clone()),
        None => CondaEnv::with_random_name(),
    };

    env = env
        .with_manager(config.manager)
        .with_capture_output(!config.verbose);

    for spec in &config.dependencies {
        env = env.with_dependency(spec)?;
    }
    for channel in &config.channels {
        env = env.with_channel(channel.clone());
    }

    Ok(env)
}

/// Main application entry point.
///
/// Returns the wrapped command's exit code.
fn run() -> Result<i32, EnvError> {
    let args: Vec<String> = env::args().collect();

    let config = match parse_arguments(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            eprintln!();
            print_usage();
            return Ok(2);
        }
    };

    setup_logging(config.verbose);

    let command = config.command.join(" ");
    let capture = !config.verbose;

    let env = build_environment(&config)?;
    info!(
        "Using {} environment '{}'",
        env.manager().command_name(),
        env.name()
    );

    let mut scope = env.scope().install_missing(config.install_missing);
    if config.keep {
        scope = scope.ephemeral(false);
    }

    let output = scope.with(|active| active.exec(&command, capture))?;

    if let Some(stdout) = output.stdout {
        print!("{stdout}");
    }
    if let Some(stderr) = output.stderr {
        eprint!("{stderr}");
    }

    Ok(output.code)
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);

            // A failing wrapped command propagates its own exit code
            match e {
                EnvError::Exec(ExecError { code: Some(code), .. }) => {
                    ExitCode::from(code.clamp(1, 255) as u8)
                }
                _ => ExitCode::FAILURE,
            }
        }
    }
}
