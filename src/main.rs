use clap::Parser;
use std::io::{self, IsTerminal};
use ultimate_portfolio::cli::commands;
use ultimate_portfolio::cli::{Cli, Commands};
use ultimate_portfolio::config;
use ultimate_portfolio::logging::init_logging;
use ultimate_portfolio::{StructuredError, TrackerError};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let overrides = build_cli_overrides(&cli);
    let json = cli.json;

    let result = match &cli.command {
        Commands::Init { force } => commands::init::execute(*force, json, None),
        Commands::Create(args) => commands::create::execute(args, json, &overrides),
        Commands::List(args) => commands::list::execute(args, json, &overrides),
        Commands::Show { ids } => commands::show::execute(ids, json, &overrides),
        Commands::Update(args) => commands::update::execute(args, json, &overrides),
        Commands::Delete(args) => commands::delete::execute(args, json, &overrides),
        Commands::DeleteAll(args) => commands::delete_all::execute(args, json, &overrides),
        Commands::Tag { command } => commands::tag::execute(command, json, &overrides),
        Commands::Select(args) => commands::select::execute(args, json, &overrides),
        Commands::Sample => commands::sample::execute(json, &overrides),
        Commands::Changes(args) => commands::changes::execute(args, json, &overrides),
    };

    if let Err(e) = result {
        handle_error(&describe_error(&e, &overrides), json);
    }
}

/// Build the structured error, suggesting close tag names for unknown tags.
fn describe_error(err: &TrackerError, overrides: &config::CliOverrides) -> StructuredError {
    let TrackerError::TagNotFound { id } = err else {
        return StructuredError::from_error(err);
    };
    let names: Vec<String> = config::discover_workspace(None)
        .and_then(|dir| config::open_controller(&dir, overrides))
        .and_then(|ctx| ctx.controller.all_tags())
        .map(|tags| tags.into_iter().map(|tag| tag.name).collect())
        .unwrap_or_default();
    StructuredError::tag_not_found(id, &names)
}

/// Report an error and exit.
///
/// JSON goes to stderr when --json is set or stdout is not a TTY.
fn handle_error(structured: &StructuredError, json_mode: bool) -> ! {
    let exit_code = structured.code.exit_code();

    if json_mode || !io::stdout().is_terminal() {
        let json = structured.to_json();
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
        );
    } else {
        eprintln!("{}", structured.to_human(io::stderr().is_terminal()));
    }

    std::process::exit(exit_code);
}

fn build_cli_overrides(cli: &Cli) -> config::CliOverrides {
    config::CliOverrides {
        db: cli.db.clone(),
        actor: cli.actor.clone(),
        lock_timeout: cli.lock_timeout,
        recent_days: cli.recent_days,
    }
}
