use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tick", about = concat!("tick v", env!("CARGO_PKG_VERSION"), " - a task outline in one text file"), version)]
pub struct Cli {
    /// With no subcommand, shows the default view
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run as if started in this directory
    #[arg(short = 'C', long = "dir", global = true)]
    pub dir: Option<String>,

    /// Task file to use instead of the one named in tick.toml
    #[arg(long, global = true)]
    pub file: Option<String>,

    /// Current time as "YYYY-MM-DD HH:MM[:SS]" (default: local clock)
    #[arg(long, global = true)]
    pub now: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create tick.toml and an empty task file in the current directory
    Init(InitArgs),
    /// Show tasks grouped by due date, priority or area
    View(ViewArgs),
    /// Show one task with its notes and subtasks
    Show(IdArg),
    /// Check or uncheck a task
    Toggle(IdArg),
    /// Move a recurring task to its next due date
    Advance(IdArg),
    /// Add a task to an area (created if missing)
    Add(AddArgs),
    /// Add a subtask
    Sub(SubArgs),
    /// Rewrite a task's description and fields
    Edit(EditArgs),
    /// Delete a task with its notes and subtasks
    Delete(IdArg),
    /// List lines the parser could not make sense of
    Check,
    /// Show or change configuration
    Config(ConfigCmd),
    /// Show the recovery log
    Recovery(RecoveryArgs),
}

// ---------------------------------------------------------------------------
// Args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Task file name (default: tasks.txt)
    #[arg(long)]
    pub file: Option<String>,
    /// Overwrite an existing tick.toml
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ViewArgs {
    /// Primary grouping: due, priority or area (default from config)
    #[arg(long)]
    pub by: Option<String>,
}

#[derive(Args)]
pub struct IdArg {
    /// Task ID
    pub id: String,
}

/// Fields settable from flags. Values here win over the same key written
/// inline in the task text.
#[derive(Args, Default)]
pub struct FieldArgs {
    /// Priority letter A-F
    #[arg(long)]
    pub priority: Option<String>,
    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,
    /// Put on hold until a date, or with a reason
    #[arg(long)]
    pub onhold: Option<String>,
    /// Follow up on a date, or with a reason
    #[arg(long)]
    pub followup: Option<String>,
    /// Recurrence: daily, weekly:Mon, monthly:15, yearly:03-14, custom:10d
    #[arg(long)]
    pub every: Option<String>,
    /// Progress percentage (e.g. 40%)
    #[arg(long)]
    pub progress: Option<String>,
    /// Note line (repeatable)
    #[arg(long, action = clap::ArgAction::Append)]
    pub note: Vec<String>,
}

#[derive(Args)]
pub struct AddArgs {
    /// Area name
    pub area: String,
    /// Task text; may include +project, @context and (key:value) groups
    pub text: String,
    #[command(flatten)]
    pub fields: FieldArgs,
}

#[derive(Args)]
pub struct SubArgs {
    /// Parent task ID
    pub parent: String,
    /// Subtask text
    pub text: String,
    #[command(flatten)]
    pub fields: FieldArgs,
}

#[derive(Args)]
pub struct EditArgs {
    /// Task ID
    pub id: String,
    /// New task text
    pub text: String,
    #[command(flatten)]
    pub fields: FieldArgs,
    /// Drop the task's existing notes
    #[arg(long, conflicts_with = "note")]
    pub clear_notes: bool,
}

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Set a value, e.g. `tick config set view.default_mode priority`
    Set(ConfigSetArgs),
}

#[derive(Args)]
pub struct ConfigSetArgs {
    /// Key as section.name
    pub key: String,
    pub value: String,
}

#[derive(Args)]
pub struct RecoveryArgs {
    /// Only the N most recent entries
    #[arg(long)]
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_with_flags() {
        let cli = Cli::try_parse_from([
            "tick", "add", "Work", "Ship it +release", "--due", "2025-07-01", "--note", "a", "--note", "b",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Add(args)) => {
                assert_eq!(args.area, "Work");
                assert_eq!(args.fields.due.as_deref(), Some("2025-07-01"));
                assert_eq!(args.fields.note, vec!["a", "b"]);
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tick", "view", "--by", "area", "--json", "--now", "2025-07-01 09:00"])
            .unwrap();
        assert!(cli.json);
        assert_eq!(cli.now.as_deref(), Some("2025-07-01 09:00"));
    }

    #[test]
    fn test_edit_rejects_note_with_clear_notes() {
        assert!(Cli::try_parse_from(["tick", "edit", "abc", "x", "--note", "n", "--clear-notes"]).is_err());
    }
}
