use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use luarray::{Config, ScriptLoader, ScriptRunner};

#[derive(Parser)]
#[command(
    name = "luarray",
    about = "Sandboxed Lua script host with a native fixed-size numeric array type",
    version
)]
struct Cli {
    /// Configuration file path.
    #[arg(short, long, default_value = "luarray.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a Lua script file.
    Run {
        /// Path to the script file.
        file: PathBuf,
    },
    /// Evaluate Lua code given on the command line.
    Eval {
        /// Lua source code.
        code: String,
    },
    /// List scripts in the configured scripts directory.
    List {
        /// Emit the listing as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = load_config(&cli.config);

    if let Err(e) = luarray::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        luarray::logging::init_console_only(&config.logging.level);
    }

    match run_command(cli.command, &config) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Load the configuration file. A missing file at the default path falls
/// back to defaults silently; any other failure is reported first.
fn load_config(path: &PathBuf) -> Config {
    if !path.exists() && path.as_os_str() == "luarray.toml" {
        return Config::default();
    }

    match Config::load(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", path.display());
            eprintln!("Using default configuration.");
            Config::default()
        }
    }
}

fn run_command(command: Command, config: &Config) -> luarray::Result<ExitCode> {
    match command {
        Command::Run { file } => {
            let runner = ScriptRunner::new(config);
            let source = std::fs::read_to_string(&file)?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "script".to_string());
            let outcome = runner.run_source_with(&name, &source, |line| println!("{line}"))?;
            Ok(report_outcome(outcome))
        }
        Command::Eval { code } => {
            let runner = ScriptRunner::new(config);
            let outcome = runner.run_source_with("eval", &code, |line| println!("{line}"))?;
            Ok(report_outcome(outcome))
        }
        Command::List { json } => {
            let loader = ScriptLoader::new(&config.scripts.dir);
            let scripts = loader.list()?;

            if json {
                let rendered = serde_json::to_string_pretty(&scripts)
                    .map_err(|e| luarray::LuarrayError::Config(format!("JSON error: {e}")))?;
                println!("{rendered}");
            } else if scripts.is_empty() {
                println!("No scripts found in '{}'", config.scripts.dir);
            } else {
                for script in &scripts {
                    match &script.description {
                        Some(desc) => println!("{}\t{}\t{desc}", script.path, script.name),
                        None => println!("{}\t{}", script.path, script.name),
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Log the run result and map it to the process exit code. Output was
/// already streamed to stdout while the script ran.
fn report_outcome(outcome: luarray::RunOutcome) -> ExitCode {
    if outcome.success {
        info!(
            instructions = outcome.instructions,
            duration = ?outcome.duration,
            "script finished"
        );
        ExitCode::SUCCESS
    } else {
        error!(
            "script failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
        ExitCode::FAILURE
    }
}
