mod init;
pub use init::cmd_init;

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io::{self, ConfigError};
use crate::io::recovery::read_recovery_entries;
use crate::io::store::{FileStore, TaskStore};
use crate::logging::init_logging;
use crate::model::config::{Config, ViewMode};
use crate::model::task::{DateValue, Priority, Progress, Recurrence, TaskFields, parse_iso_date};
use crate::ops::task_ops::{self, OpContext};
use crate::parse::metadata::fields_from_text;
use crate::parse::outline_parser::parse_lines;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Everything a command needs once the task file has been located
struct Session {
    store: FileStore,
    config: Config,
    /// `None` when running with `--file`
    config_path: Option<PathBuf>,
    ctx: OpContext,
    json: bool,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let dir = base_dir(cli.dir.as_deref())?;

    let command = match cli.command {
        Some(Commands::Init(args)) => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"))?;
            return cmd_init(args, &dir);
        }
        other => other,
    };

    let (config, config_path) = match cli.file {
        Some(_) => (Config::default(), None),
        None => {
            let path = config_io::discover_config(&dir)?;
            (config_io::load_config(&path)?, Some(path))
        }
    };
    init_logging(cli.log_level.as_deref().unwrap_or(&config.log.level))?;

    let store = match (&cli.file, &config_path) {
        (Some(file), _) => FileStore::new(dir.join(file)),
        (None, Some(path)) => {
            let config_dir = path.parent().unwrap_or(Path::new("."));
            FileStore::new(config_io::task_file_path(path, &config)).with_recovery_dir(config_dir)
        }
        (None, None) => return Err(ConfigError::NotConfigured.into()),
    };
    log::debug!("task file: {}", store.path().display());

    let now = match cli.now.as_deref() {
        Some(raw) => parse_now(raw)?,
        None => chrono::Local::now().naive_local(),
    };
    let session = Session {
        store,
        ctx: OpContext::new(now, &config),
        config,
        config_path,
        json: cli.json,
    };

    match command {
        None => cmd_view(&session, ViewArgs { by: None }),
        Some(cmd) => match cmd {
            // Handled above, before config discovery
            Commands::Init(_) => Ok(()),

            // Read commands
            Commands::View(args) => cmd_view(&session, args),
            Commands::Show(args) => cmd_show(&session, args),
            Commands::Check => cmd_check(&session),
            Commands::Recovery(args) => cmd_recovery(&session, args),

            // Write commands
            Commands::Toggle(args) => cmd_toggle(&session, args),
            Commands::Advance(args) => cmd_advance(&session, args),
            Commands::Add(args) => cmd_add(&session, args),
            Commands::Sub(args) => cmd_sub(&session, args),
            Commands::Edit(args) => cmd_edit(&session, args),
            Commands::Delete(args) => cmd_delete(&session, args),

            Commands::Config(args) => cmd_config(&session, args),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn base_dir(dir: Option<&str>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match dir {
        Some(d) => std::fs::canonicalize(d).map_err(|e| format!("cannot resolve -C path '{}': {}", d, e).into()),
        None => Ok(std::env::current_dir()?),
    }
}

/// `YYYY-MM-DD HH:MM[:SS]`, also accepting a `T` separator
fn parse_now(raw: &str) -> Result<NaiveDateTime, String> {
    let raw = raw.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| format!("invalid --now '{}' (expected \"YYYY-MM-DD HH:MM[:SS]\")", raw))
}

/// Build task fields from the text argument, then apply flags on top
fn build_fields(text: &str, args: FieldArgs) -> Result<TaskFields, String> {
    let (mut fields, problems) = fields_from_text(text);
    if let Some(problem) = problems.first() {
        return Err(problem.to_string());
    }

    if let Some(p) = args.priority {
        fields.priority =
            Some(Priority::from_letter(p.trim()).ok_or_else(|| format!("invalid priority '{}' (expected A-F)", p))?);
    }
    if let Some(d) = args.due {
        fields.due = Some(parse_iso_date(&d).ok_or_else(|| format!("invalid due date '{}' (expected YYYY-MM-DD)", d))?);
    }
    if let Some(v) = args.onhold {
        fields.onhold = Some(DateValue::parse(&v));
    }
    if let Some(v) = args.followup {
        fields.followup = Some(DateValue::parse(&v));
    }
    if let Some(r) = args.every {
        fields.every = Some(r.parse::<Recurrence>()?);
    }
    if let Some(p) = args.progress {
        fields.progress = Some(p.parse::<Progress>()?);
    }
    fields.notes.extend(args.note);
    Ok(fields)
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_view(s: &Session, args: ViewArgs) -> CmdResult {
    let mode = match args.by {
        Some(by) => by.parse::<ViewMode>()?,
        None => s.config.view.default_mode,
    };
    let view = task_ops::load_view(&s.store, mode, &s.ctx)?;
    if s.json {
        println!("{}", serde_json::to_string_pretty(&view_to_json(&view))?);
    } else {
        print_lines(&format_view(&view));
    }
    Ok(())
}

fn cmd_show(s: &Session, args: IdArg) -> CmdResult {
    let parsed = task_ops::load_outline(&s.store)?;
    let task = parsed
        .outline
        .find_task(&args.id)
        .ok_or_else(|| format!("task not found: {}", args.id))?;
    let today = s.ctx.today();
    if s.json {
        println!("{}", serde_json::to_string_pretty(&task_to_json(task, today))?);
    } else {
        print_lines(&format_task_detail(task, today));
    }
    Ok(())
}

fn cmd_check(s: &Session) -> CmdResult {
    let src = s.store.load()?;
    let parsed = parse_lines(&src.lines);
    let file = s.store.describe();

    if s.json {
        let report = CheckJson {
            file,
            tasks: parsed.outline.task_count(),
            diagnostics: &parsed.diagnostics,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for diagnostic in &parsed.diagnostics {
        println!("{}", diagnostic);
    }
    if parsed.diagnostics.is_empty() {
        println!("✓ {}: {} tasks, no problems", file, parsed.outline.task_count());
    } else {
        println!(
            "{}: {} tasks, {} problem(s)",
            file,
            parsed.outline.task_count(),
            parsed.diagnostics.len()
        );
    }
    Ok(())
}

fn cmd_recovery(s: &Session, args: RecoveryArgs) -> CmdResult {
    let Some(dir) = s.store.recovery_dir() else {
        return Ok(());
    };
    let entries = read_recovery_entries(dir, args.limit);
    if s.json {
        let values: Vec<serde_json::Value> = entries.iter().map(|e| e.to_json()).collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
    } else if entries.is_empty() {
        println!("recovery log is empty");
    } else {
        print!("{}", format_recovery_entries(&entries));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn print_written(s: &Session, id: &str) -> CmdResult {
    if s.json {
        let out = WriteJson {
            id: id.to_string(),
            removed: Vec::new(),
        };
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!("{}", id);
    }
    Ok(())
}

fn cmd_toggle(s: &Session, args: IdArg) -> CmdResult {
    let outcome = task_ops::toggle_task(&s.store, &args.id, &s.ctx)?;
    if s.json {
        let out = ToggleJson { id: args.id, outcome };
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!("{}", format_toggled(&args.id, &outcome));
    }
    Ok(())
}

fn cmd_advance(s: &Session, args: IdArg) -> CmdResult {
    let next_due = task_ops::advance_task(&s.store, &args.id, &s.ctx)?;
    if s.json {
        let out = AdvanceJson { id: args.id, next_due };
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!("{} next due {}", args.id, next_due);
    }
    Ok(())
}

fn cmd_add(s: &Session, args: AddArgs) -> CmdResult {
    let fields = build_fields(&args.text, args.fields)?;
    let id = task_ops::create_task(&s.store, &args.area, &fields, &s.ctx)?;
    print_written(s, &id)
}

fn cmd_sub(s: &Session, args: SubArgs) -> CmdResult {
    let fields = build_fields(&args.text, args.fields)?;
    let id = task_ops::add_subtask(&s.store, &args.parent, &fields, &s.ctx)?;
    print_written(s, &id)
}

fn cmd_edit(s: &Session, args: EditArgs) -> CmdResult {
    let keep_notes = args.fields.note.is_empty() && !args.clear_notes;
    let fields = build_fields(&args.text, args.fields)?;
    let id = task_ops::edit_task(&s.store, &args.id, &fields, keep_notes)?;
    print_written(s, &id)
}

fn cmd_delete(s: &Session, args: IdArg) -> CmdResult {
    let removed = task_ops::delete_task(&s.store, &args.id)?;
    if s.json {
        let out = WriteJson { id: args.id, removed };
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!("deleted {} ({} line(s) saved to recovery log)", args.id, removed.len());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config(s: &Session, args: ConfigCmd) -> CmdResult {
    match args.action {
        ConfigAction::Show => {
            if s.json {
                println!("{}", serde_json::to_string_pretty(&s.config)?);
            } else {
                if let Some(path) = &s.config_path {
                    println!("# {}", path.display());
                }
                print!("{}", toml::to_string_pretty(&s.config)?);
            }
            Ok(())
        }
        ConfigAction::Set(set) => {
            let path = s.config_path.as_ref().ok_or(ConfigError::NotConfigured)?;
            let (_, mut doc) = config_io::read_config(path)?;
            config_io::set_value(&mut doc, &set.key, &set.value)?;
            config_io::write_config(path, &doc)?;
            log::info!("set {} in {}", set.key, path.display());
            println!("{} = {}", set.key, set.value.trim());
            Ok(())
        }
    }
}
