use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use atlas::actuators::{Actuators, Recorder};
use atlas::config::{self as cfg, Settings};
use atlas::dsl;
use atlas::executor::Executor;
use atlas::locator::{Locator, ScreenSource, StaticScreen, TemplateLibrary, XcapScreen};

const DEFAULT_CONFIG: &str = "atlas.json";

/// Atlas CLI
#[derive(Debug, Parser)]
#[command(
    name = atlas::PKG_NAME,
    version = atlas::PKG_VERSION,
    about = "Run Atlas UI automation scripts against the desktop"
)]
struct Args {
    /// Path to the JSON settings file (optional when left at the default)
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG, global = true)]
    config: PathBuf,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level", global = true)]
    log_level: Option<String>,

    /// Print the JSON Schema for the settings file and exit
    #[arg(long = "print-schema")]
    print_schema: bool,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Parse and execute a script
    Run {
        script: PathBuf,

        /// Record actions instead of simulating input; waits do not block
        #[arg(long = "dry-run")]
        dry_run: bool,

        /// Set a script variable (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,
    },
    /// Print the parsed script as JSON
    Parse { script: PathBuf },
    /// Report template clicks whose reference image cannot be found
    Check { script: PathBuf },
    /// Locate one reference image on screen (or in a saved screenshot)
    Locate {
        reference: PathBuf,

        /// Search this screenshot instead of the live screen
        #[arg(long)]
        screen: Option<PathBuf>,

        /// Logical width of the screenshot (defaults to its pixel width)
        #[arg(long = "logical-width", requires = "screen")]
        logical_width: Option<u32>,
    },
}

fn parse_var(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    if name.trim().is_empty() {
        return Err(format!("empty variable name in '{s}'"));
    }
    Ok((name.trim().to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // --log-level wins over RUST_LOG.
    match args.log_level.as_deref().and_then(atlas::parse_level) {
        Some(level) => atlas::init_tracing_with(level),
        None => atlas::init_tracing(),
    }

    if args.print_schema {
        let schema = cfg::generate_schema();
        let json = serde_json::to_string_pretty(&schema)?;
        println!("{json}");
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = args.command else {
        bail!("No command given; try `{} --help`", atlas::PKG_NAME);
    };

    let settings = load_settings(&args.config).await?;
    debug!(target: "atlas", "Settings loaded");

    match command {
        Cmd::Run {
            script,
            dry_run,
            vars,
        } => run(&script, settings, dry_run, vars).await,
        Cmd::Parse { script } => {
            let parsed = dsl::parse_file(&script)?;
            println!("{}", serde_json::to_string_pretty(&parsed)?);
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Check { script } => {
            let parsed = dsl::parse_file(&script)?;
            let problems = dsl::validate(&parsed, &TemplateLibrary::new(&settings.templates_dir));
            if problems.is_empty() {
                println!(
                    "{}: {} command(s), all templates resolved",
                    script.display(),
                    parsed.command_count()
                );
                return Ok(ExitCode::SUCCESS);
            }
            for problem in &problems {
                println!("{problem}");
            }
            Ok(ExitCode::FAILURE)
        }
        Cmd::Locate {
            reference,
            screen,
            logical_width,
        } => {
            let policy = settings.locator;
            let found = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
                let source: Box<dyn ScreenSource> = match screen {
                    Some(path) => Box::new(StaticScreen::from_file(path, logical_width)?),
                    None => Box::new(XcapScreen::primary()?),
                };
                let mut locator = Locator::new(source, &policy)?;
                Ok(locator.locate(&reference, policy.confidence_threshold, policy.timeout())?)
            })
            .await
            .context("Locator task failed")??;
            println!("{}", serde_json::to_string_pretty(&found)?);
            Ok(if found.found {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

/// A missing file at the default path means defaults; an explicit path must exist.
async fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    if path == Path::new(DEFAULT_CONFIG) && !path.exists() {
        debug!(target: "atlas", "No {DEFAULT_CONFIG} found; using default settings");
        return Ok(Settings::default());
    }
    cfg::load_from_path_async(path).await
}

async fn run(
    path: &Path,
    settings: Settings,
    dry_run: bool,
    vars: Vec<(String, String)>,
) -> anyhow::Result<ExitCode> {
    let script = dsl::parse_file(path)?;
    info!(
        target: "atlas",
        version = atlas::PKG_VERSION,
        script = %path.display(),
        title = %script.title,
        dry_run,
        "Starting Atlas"
    );

    // Enigo and xcap handles stay on the blocking thread that created them.
    let task = tokio::task::spawn_blocking(move || {
        let locator = match XcapScreen::primary()
            .map_err(|e| e.to_string())
            .and_then(|screen| {
                Locator::new(Box::new(screen), &settings.locator).map_err(|e| e.to_string())
            })
        {
            Ok(locator) => Some(locator),
            Err(err) => {
                warn!(
                    target: "atlas",
                    error = %err,
                    "Screen capture unavailable; template clicks will fail"
                );
                None
            }
        };
        let actuators = if dry_run {
            Actuators::recording(&Recorder::new())
        } else {
            Actuators::system(&settings)
        };
        let mut executor = Executor::new(settings, actuators).dry_run(dry_run);
        if let Some(locator) = locator {
            executor = executor.with_locator(locator);
        }
        executor.execute_with_vars(&script, vars)
    });

    tokio::select! {
        joined = task => {
            let result = joined.context("Executor task failed")?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if result.success {
                info!(
                    target: "atlas",
                    elapsed_ms = result.elapsed.as_millis() as u64,
                    "Script finished"
                );
                Ok(ExitCode::SUCCESS)
            } else {
                warn!(target: "atlas", message = %result.message, "Script failed");
                Ok(ExitCode::FAILURE)
            }
        }
        _ = tokio::signal::ctrl_c() => {
            warn!(target: "atlas", "Received Ctrl+C, exiting");
            // The blocking executor thread cannot be cancelled mid-command.
            std::process::exit(130);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_flags_split_on_first_equals() {
        assert_eq!(
            parse_var("url=https://x?a=b").unwrap(),
            ("url".to_string(), "https://x?a=b".to_string())
        );
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
