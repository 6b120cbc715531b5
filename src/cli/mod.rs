//! CLI definitions and entry point.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Issue and tag tracker with filters (`SQLite`)
#[derive(Parser, Debug)]
#[command(name = "upt", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (defaults to .portfolio/portfolio.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Actor name recorded in logs
    #[arg(long, global = true)]
    pub actor: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// `SQLite` busy timeout in ms
    #[arg(long, global = true)]
    pub lock_timeout: Option<u64>,

    /// Width of the recent-issues window in days
    #[arg(long, global = true)]
    pub recent_days: Option<i64>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also write JSON log lines to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a portfolio workspace in the current directory
    Init {
        /// Recreate the database if it already exists
        #[arg(long)]
        force: bool,
    },

    /// Create a new issue
    Create(CreateArgs),

    /// List issues matching a filter
    List(ListArgs),

    /// Show issue details
    Show {
        /// Issue IDs (full or unique prefix)
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Update an issue
    Update(UpdateArgs),

    /// Delete an issue
    Delete(DeleteArgs),

    /// Delete every tag and every issue
    DeleteAll(DeleteAllArgs),

    /// Manage tags
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },

    /// Show or change the selected filter and issue
    Select(SelectArgs),

    /// Populate the store with sample data
    Sample,

    /// Show the change log
    Changes(ChangesArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Issue title (defaults to "New issue")
    pub title: Option<String>,

    /// Issue body
    #[arg(long, short = 'd', visible_alias = "description")]
    pub content: Option<String>,

    /// Priority (low, medium, high or 0-2)
    #[arg(long, short = 'p')]
    pub priority: Option<String>,

    /// Tags to attach (name or id)
    #[arg(long = "tag", short = 't', value_delimiter = ',')]
    pub tags: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Filter: all, recent, or tag:<name> (defaults to the selected filter)
    #[arg(long, short = 'f')]
    pub filter: Option<String>,

    /// Only completed issues
    #[arg(long, conflicts_with = "open")]
    pub completed: bool,

    /// Only open issues
    #[arg(long)]
    pub open: bool,

    /// Only issues modified after this time (RFC3339, 2025-01-15, -3d, yesterday)
    #[arg(long, allow_hyphen_values = true)]
    pub since: Option<String>,

    /// Maximum number of issues to show
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct UpdateArgs {
    /// Issue ID (full or unique prefix)
    pub id: String,

    /// New title
    #[arg(long)]
    pub title: Option<String>,

    /// New body
    #[arg(long, short = 'd', visible_alias = "description")]
    pub content: Option<String>,

    /// New priority (low, medium, high or 0-2)
    #[arg(long, short = 'p')]
    pub priority: Option<String>,

    /// Mark completed
    #[arg(long, conflicts_with = "reopen")]
    pub complete: bool,

    /// Mark not completed
    #[arg(long)]
    pub reopen: bool,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Issue IDs (full or unique prefix)
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DeleteAllArgs {
    /// Confirm the deletion
    #[arg(long)]
    pub yes: bool,
}

#[derive(Subcommand, Debug)]
pub enum TagCommands {
    /// Create a tag
    Create {
        /// Tag name
        name: String,
    },
    /// Delete a tag (its issues are kept)
    Delete {
        /// Tag name or id
        tag: String,
    },
    /// Attach a tag to an issue
    Add {
        /// Issue ID
        issue: String,
        /// Tag name or id
        tag: String,
    },
    /// Detach a tag from an issue
    Remove {
        /// Issue ID
        issue: String,
        /// Tag name or id
        tag: String,
    },
    /// List all tags with issue counts
    List,
    /// List tags not yet attached to an issue
    Missing {
        /// Issue ID
        issue: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct SelectArgs {
    /// Filter to select: all, recent, or tag:<name>
    #[arg(long, short = 'f')]
    pub filter: Option<String>,

    /// Issue to select
    #[arg(long, short = 'i', conflicts_with = "clear_issue")]
    pub issue: Option<String>,

    /// Clear the selected issue
    #[arg(long)]
    pub clear_issue: bool,
}

#[derive(Args, Debug, Default)]
pub struct ChangesArgs {
    /// Show changes after this sequence number
    #[arg(long, default_value_t = 0)]
    pub since: i64,

    /// Maximum number of changes to show
    #[arg(long)]
    pub limit: Option<usize>,

    /// Keep polling for changes from other sessions
    #[arg(long)]
    pub watch: bool,

    /// Poll interval for --watch, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_tag_subcommand() {
        let cli = Cli::parse_from(["upt", "tag", "add", "abcd1234", "Work"]);
        match cli.command {
            Commands::Tag {
                command: TagCommands::Add { issue, tag },
            } => {
                assert_eq!(issue, "abcd1234");
                assert_eq!(tag, "Work");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["upt", "list", "--json", "-vv", "--filter", "recent"]);
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::List(args) => assert_eq!(args.filter.as_deref(), Some("recent")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn list_since_accepts_relative_offsets() {
        let cli = Cli::parse_from(["upt", "list", "--since", "-3d"]);
        match cli.command {
            Commands::List(args) => assert_eq!(args.since.as_deref(), Some("-3d")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn log_file_is_a_global_flag() {
        let cli = Cli::parse_from(["upt", "sample", "--log-file", "upt.log"]);
        assert_eq!(cli.log_file, Some(PathBuf::from("upt.log")));
    }

    #[test]
    fn create_accepts_comma_separated_tags() {
        let cli = Cli::parse_from(["upt", "create", "Title", "-t", "a,b"]);
        match cli.command {
            Commands::Create(args) => assert_eq!(args.tags, vec!["a", "b"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
