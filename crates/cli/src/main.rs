use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use lifecycle_core::StateMachine;
use lifecycle_engine::{load_state_machine, CalloutContext, EngineConfig, LifeCycleError};
use lifecycle_storage::InMemoryLockStore;
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Life cycle engine operator CLI.
#[derive(Parser)]
#[command(name = "lifecycle", version, about = "Life cycle engine operator CLI")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log engine activity to stderr (overrides RUST_LOG)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a transition table file and print it normalized
    Validate {
        /// Path to a flat JSON transition table
        file: PathBuf,
    },

    /// Print the effective transition table for an entity type
    Show {
        #[arg(long)]
        entity_type: String,
        /// Engine configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Look up the next state for a state and condition
    Evaluate {
        #[arg(long)]
        entity_type: String,
        #[arg(long)]
        state: String,
        #[arg(long)]
        condition: String,
        /// Engine configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Apply a condition to an entity through the configured collaborators
    ChangeState {
        /// URI the entity is served at
        uri: String,
        /// Condition to apply, e.g. Continue
        condition: String,
        #[arg(long)]
        entity_type: String,
        /// Recorded as the lock holder and sent with callouts
        #[arg(long)]
        user: String,
        /// Tenant whose callout definitions apply
        #[arg(long)]
        tenant: String,
        /// Engine configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Validate { file } => cmd_validate(&file, cli.output, cli.quiet),
        Commands::Show {
            entity_type,
            config,
        } => cmd_show(&entity_type, config.as_deref(), cli.output, cli.quiet),
        Commands::Evaluate {
            entity_type,
            state,
            condition,
            config,
        } => cmd_evaluate(
            &entity_type,
            &state,
            &condition,
            config.as_deref(),
            cli.output,
            cli.quiet,
        ),
        Commands::ChangeState {
            uri,
            condition,
            entity_type,
            user,
            tenant,
            config,
        } => cmd_change_state(
            ChangeStateArgs {
                uri: &uri,
                condition: &condition,
                entity_type: &entity_type,
                context: CalloutContext::new(user, tenant),
                config: config.as_deref(),
            },
            cli.output,
            cli.quiet,
        ),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ──────────────────────────────────────────────
// validate
// ──────────────────────────────────────────────

fn cmd_validate(file: &Path, output: OutputFormat, quiet: bool) {
    let content = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", file.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let machine = match StateMachine::from_json(&content) {
        Ok(m) => m,
        Err(e) => {
            let msg = format!("invalid transition table '{}': {}", file.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => {
            println!("valid ({} transitions)", machine.table().len());
            print_table(&machine);
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "valid": true,
                "transitions": machine.table().len(),
                "table": machine.table().to_json(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
}

// ──────────────────────────────────────────────
// show / evaluate
// ──────────────────────────────────────────────

fn cmd_show(entity_type: &str, config: Option<&Path>, output: OutputFormat, quiet: bool) {
    let machine = effective_state_machine(entity_type, config, output, quiet);
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => print_table(&machine),
        OutputFormat::Json => {
            let json = serde_json::json!({
                "entity_type": entity_type,
                "table": machine.table().to_json(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
}

fn cmd_evaluate(
    entity_type: &str,
    state: &str,
    condition: &str,
    config: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) {
    let machine = effective_state_machine(entity_type, config, output, quiet);
    let next_state = match machine.evaluate(state, condition) {
        Ok(next) => next,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => println!("{}", next_state),
        OutputFormat::Json => {
            let json = serde_json::json!({
                "entity_type": entity_type,
                "state": state,
                "condition": condition,
                "next_state": next_state,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
}

fn effective_state_machine(
    entity_type: &str,
    config: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) -> StateMachine {
    let engine_config = load_config(config, output, quiet);
    let loader = engine_config.build_config_loader();
    let runtime = new_runtime(output, quiet);
    match runtime.block_on(load_state_machine(loader.as_ref(), entity_type)) {
        Ok(machine) => machine,
        Err(e) => {
            report_error(&describe(&e), output, quiet);
            process::exit(1);
        }
    }
}

// ──────────────────────────────────────────────
// change-state
// ──────────────────────────────────────────────

struct ChangeStateArgs<'a> {
    uri: &'a str,
    condition: &'a str,
    entity_type: &'a str,
    context: CalloutContext,
    config: Option<&'a Path>,
}

fn cmd_change_state(args: ChangeStateArgs<'_>, output: OutputFormat, quiet: bool) {
    let engine_config = load_config(args.config, output, quiet);
    // Locks only exclude other attempts inside this process.
    let factory = match engine_config.build_factory(Arc::new(InMemoryLockStore::new())) {
        Ok(f) => f,
        Err(e) => {
            report_error(&describe(&e), output, quiet);
            process::exit(1);
        }
    };

    let runtime = new_runtime(output, quiet);
    let result = runtime.block_on(async {
        let manager = factory.create(args.entity_type, args.context).await?;
        manager.change_state(args.uri, args.condition).await
    });

    match result {
        Ok(outcome) => {
            if quiet {
                return;
            }
            match output {
                OutputFormat::Text => {
                    println!("{} -> {}", outcome.from_state, outcome.to_state)
                }
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome).unwrap_or_default()
                ),
            }
        }
        Err(e) => {
            report_change_state_error(&e, output, quiet);
            process::exit(1);
        }
    }
}

fn report_change_state_error(error: &LifeCycleError, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => {
            eprintln!("{}", describe(error));
            if let Some(state) = error.committed_state() {
                eprintln!("note: the transition to '{}' was committed", state);
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "error": describe(error),
                "retryable": error.is_retryable(),
                "committed_state": error.committed_state(),
            });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
}

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn load_config(path: Option<&Path>, output: OutputFormat, quiet: bool) -> EngineConfig {
    match path {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                report_error(&describe(&e), output, quiet);
                process::exit(1);
            }
        },
        None => EngineConfig::default(),
    }
}

fn new_runtime(output: OutputFormat, quiet: bool) -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(
                &format!("failed to create tokio runtime: {}", e),
                output,
                quiet,
            );
            process::exit(1);
        }
    }
}

fn print_table(machine: &StateMachine) {
    for (key, next_state) in machine.table().iter() {
        println!("{} -> {}", key, next_state);
    }
}

/// An error followed by its chain of sources, joined with ": ".
fn describe(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
