use std::fs;
use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::config_io::{self, CONFIG_FILE};

const DEFAULT_TASK_FILE: &str = "tasks.txt";

const TASKS_TEMPLATE: &str = "\
# Tasks, grouped by area. A line ending in ':' starts an area.
# Lines starting with '#' are comments.

Inbox:
";

/// Validate the task file name written into tick.toml.
fn validate_task_file(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("task file name cannot be empty".to_string());
    }
    if name.contains(['"', '\\', '\n', '\r']) {
        return Err(format!(
            "invalid task file name \"{}\" (no quotes, backslashes or line breaks)",
            name
        ));
    }
    Ok(())
}

pub fn cmd_init(args: InitArgs, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = dir.join(CONFIG_FILE);
    if config_path.is_file() && !args.force {
        return Err(format!("{} already exists (use --force to overwrite)", config_path.display()).into());
    }

    // Note an enclosing config that this one will shadow
    if let Some(parent) = dir.parent()
        && let Ok(outer) = config_io::discover_config(parent)
    {
        eprintln!("Note: {} will be shadowed by the new config", outer.display());
    }

    let task_file = args.file.as_deref().unwrap_or(DEFAULT_TASK_FILE).trim().to_string();
    validate_task_file(&task_file)?;

    fs::write(&config_path, config_io::config_template(&task_file))?;
    log::info!("wrote {}", config_path.display());

    let task_path = dir.join(&task_file);
    if task_path.exists() {
        println!("Initialized tick in {} (keeping existing {})", dir.display(), task_file);
    } else {
        if let Some(parent) = task_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&task_path, TASKS_TEMPLATE)?;
        println!("Initialized tick in {} (tasks in {})", dir.display(), task_file);
    }
    Ok(())
}
