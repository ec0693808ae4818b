use chrono::{NaiveDate, NaiveDateTime};

use crate::model::config::{Config, ViewMode};
use crate::model::task::{Metadata, TaskFields};
use crate::io::recovery::log_task_deletion;
use crate::io::store::{StoreError, TaskStore};
use crate::ops::mutate::{self, TaskError, Toggled};
use crate::ops::status::adjusted_today;
use crate::ops::view::{View, build_view};
use crate::parse::identity::unique_token;
use crate::parse::outline_parser::{ParsedOutline, parse_lines};
use crate::parse::scan::scan;
use crate::parse::source::SourceText;

/// Error type for load-modify-save operations
#[derive(Debug, thiserror::Error)]
pub enum OpError {
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OpError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, OpError::Task(TaskError::NotFound(_)))
    }
}

/// The clock and settings an operation runs under
#[derive(Debug, Clone)]
pub struct OpContext {
    /// Authoritative "now"
    pub now: NaiveDateTime,
    pub day_boundary_hour: u32,
    pub persist_ids: bool,
}

impl OpContext {
    pub fn new(now: NaiveDateTime, config: &Config) -> Self {
        OpContext {
            now,
            day_boundary_hour: config.time.day_boundary_hour,
            persist_ids: config.ids.persist,
        }
    }

    pub fn today(&self) -> NaiveDate {
        adjusted_today(self.now, self.day_boundary_hour)
    }
}

// ---------------------------------------------------------------------------
// Read path
// ---------------------------------------------------------------------------

/// Load and parse the task file, logging every diagnostic
pub fn load_outline(store: &dyn TaskStore) -> Result<ParsedOutline, OpError> {
    let src = store.load()?;
    let parsed = parse_lines(&src.lines);
    for diagnostic in &parsed.diagnostics {
        log::warn!("{}: {}", store.describe(), diagnostic);
    }
    Ok(parsed)
}

pub fn load_view(store: &dyn TaskStore, mode: ViewMode, ctx: &OpContext) -> Result<View, OpError> {
    let parsed = load_outline(store)?;
    Ok(build_view(&parsed.outline, mode, ctx.today()))
}

// ---------------------------------------------------------------------------
// Write path: each call is one load -> patch -> save transaction
// ---------------------------------------------------------------------------

pub fn toggle_task(store: &dyn TaskStore, id: &str, ctx: &OpContext) -> Result<Toggled, OpError> {
    let mut src = store.load()?;
    let target = parse_lines(&src.lines)
        .outline
        .find_task(id)
        .map(|t| t.task_ref())
        .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
    let outcome = mutate::toggle(&mut src, &target, ctx.today())?;
    store.save(&src)?;
    log::info!("toggled {}: {:?}", id, outcome);
    Ok(outcome)
}

/// Move a recurring task to its next occurrence. Returns the new due date.
pub fn advance_task(store: &dyn TaskStore, id: &str, ctx: &OpContext) -> Result<NaiveDate, OpError> {
    let mut src = store.load()?;
    let next_due = mutate::advance(&mut src, id, ctx.today())?;
    store.save(&src)?;
    log::info!("advanced {} to {}", id, next_due);
    Ok(next_due)
}

/// Create a task under `area`. Returns the new task's id.
pub fn create_task(
    store: &dyn TaskStore,
    area: &str,
    fields: &TaskFields,
    ctx: &OpContext,
) -> Result<String, OpError> {
    let mut src = store.load()?;
    let extra = token_for(&src, Some(area.trim()), fields, ctx);
    let at = mutate::create_task(&mut src, area, fields, &extra)?;
    store.save(&src)?;
    let id = id_at(&src, at);
    log::info!("created {} in {}", id, area.trim());
    Ok(id)
}

/// Add a subtask under `parent_id`. Returns the new subtask's id.
pub fn add_subtask(
    store: &dyn TaskStore,
    parent_id: &str,
    fields: &TaskFields,
    ctx: &OpContext,
) -> Result<String, OpError> {
    let mut src = store.load()?;
    let area = scan(&src.lines)
        .iter()
        .find(|sl| sl.task().is_some_and(|t| t.id == parent_id))
        .and_then(|sl| sl.area.map(|a| a.to_string()));
    let extra = token_for(&src, area.as_deref(), fields, ctx);
    let at = mutate::add_subtask(&mut src, parent_id, fields, &extra)?;
    store.save(&src)?;
    let id = id_at(&src, at);
    log::info!("added subtask {} under {}", id, parent_id);
    Ok(id)
}

/// Rewrite a task. With `keep_notes` the note lines are left byte for byte
/// and `fields.notes` is ignored. Returns the id afterwards, which changes
/// for an untokened task whose description changed.
pub fn edit_task(store: &dyn TaskStore, id: &str, fields: &TaskFields, keep_notes: bool) -> Result<String, OpError> {
    let mut src = store.load()?;
    let at = mutate::locate_by_id(&src.lines, id).ok_or_else(|| TaskError::NotFound(id.to_string()))?;
    if keep_notes {
        mutate::edit_task_line(&mut src, id, fields)?;
    } else {
        mutate::edit_task(&mut src, id, fields)?;
    }
    store.save(&src)?;
    let new_id = id_at(&src, at);
    log::info!("edited {} (now {})", id, new_id);
    Ok(new_id)
}

/// Delete a task and its block. The removed lines go to the recovery log.
pub fn delete_task(store: &dyn TaskStore, id: &str) -> Result<Vec<String>, OpError> {
    let mut src = store.load()?;
    let removed = mutate::delete_task(&mut src, id)?;
    store.save(&src)?;
    if let Some(dir) = store.recovery_dir() {
        log_task_deletion(dir, id, std::path::Path::new(&store.describe()), &removed);
    }
    log::info!("deleted {} ({} lines)", id, removed.len());
    Ok(removed)
}

fn token_for(src: &SourceText, area: Option<&str>, fields: &TaskFields, ctx: &OpContext) -> Vec<Metadata> {
    if !ctx.persist_ids {
        return Vec::new();
    }
    let scanned = scan(&src.lines);
    let taken: Vec<&str> = scanned.iter().filter_map(|sl| sl.task()).map(|t| t.id.as_str()).collect();
    vec![Metadata::Id(unique_token(area, fields.description.trim(), ctx.now, &taken))]
}

fn id_at(src: &SourceText, line: usize) -> String {
    scan(&src.lines)
        .get(line)
        .and_then(|sl| sl.task())
        .map(|t| t.id.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::MemoryStore;
    use crate::model::task::Status;
    use crate::ops::status::task_status;
    use pretty_assertions::assert_eq;

    fn ctx(now: &str, persist_ids: bool) -> OpContext {
        OpContext {
            now: NaiveDateTime::parse_from_str(now, "%Y-%m-%d %H:%M").unwrap(),
            day_boundary_hour: 3,
            persist_ids,
        }
    }

    fn first_id(store: &MemoryStore) -> String {
        load_outline(store).unwrap().outline.all_tasks()[0].id.clone()
    }

    #[test]
    fn test_toggle_scenario() {
        let store = MemoryStore::new("Work:\n    - [ ] Buy milk (due:2025-07-01)\n");
        let id = first_id(&store);

        let view = load_view(&store, ViewMode::Due, &ctx("2025-07-01 10:00", false)).unwrap();
        assert_eq!(view.groups[0].name, "2025-07-01");
        assert_eq!(view.groups[0].tasks[0].status, Status::Incomplete);

        let c = ctx("2025-07-02 10:00", false);
        toggle_task(&store, &id, &c).unwrap();
        assert_eq!(store.text(), "Work:\n    - [x] Buy milk (due:2025-07-01 done:2025-07-02)\n");

        let parsed = load_outline(&store).unwrap();
        assert_eq!(task_status(parsed.outline.all_tasks()[0], c.today()), Status::Done);
    }

    #[test]
    fn test_day_boundary_applies_to_done_stamp() {
        let store = MemoryStore::new("Work:\n    - [ ] Late night\n");
        let id = first_id(&store);
        toggle_task(&store, &id, &ctx("2025-07-02 01:30", false)).unwrap();
        assert_eq!(store.text(), "Work:\n    - [x] Late night (done:2025-07-01)\n");
    }

    #[test]
    fn test_advance_uses_adjusted_today() {
        let store = MemoryStore::new("Home:\n    - [ ] Water (due:2025-07-01 every:daily)\n");
        let id = first_id(&store);
        let next = advance_task(&store, &id, &ctx("2025-07-03 02:00", false)).unwrap();
        assert_eq!(next, NaiveDate::from_ymd_opt(2025, 7, 3).unwrap());
        assert_eq!(
            store.text(),
            "Home:\n    - [ ] Water (due:2025-07-03 every:daily rec:2025-07-02)\n"
        );
        // Same line, same id
        assert_eq!(first_id(&store), id);
    }

    #[test]
    fn test_not_found_writes_nothing() {
        let store = MemoryStore::new("Work:\n    - [ ] A\n");
        let err = toggle_task(&store, "missing", &ctx("2025-07-02 10:00", false)).unwrap_err();
        assert!(err.is_not_found());
        assert!(delete_task(&store, "missing").unwrap_err().is_not_found());
        assert!(edit_task(&store, "missing", &TaskFields::new("B"), false).unwrap_err().is_not_found());
        assert_eq!(store.text(), "Work:\n    - [ ] A\n");
    }

    #[test]
    fn test_create_with_persisted_token() {
        let store = MemoryStore::new("Work:\n    - [ ] A\n");
        let c = ctx("2025-07-02 10:00", true);
        let id = create_task(&store, "Work", &TaskFields::new("B"), &c).unwrap();
        assert_eq!(id.len(), 8);
        assert_eq!(store.text(), format!("Work:\n    - [ ] A\n    - [ ] B (id:{})\n", id));

        // Identity survives an insertion above
        create_task(&store, "Inbox", &TaskFields::new("C"), &c).unwrap();
        let text = format!("Top:\n    - [ ] Z\n{}", store.text());
        let store = MemoryStore::new(text);
        let parsed = load_outline(&store).unwrap();
        assert!(parsed.outline.find_task(&id).is_some());
    }

    #[test]
    fn test_create_without_token_returns_derived_id() {
        let store = MemoryStore::new("Work:\n");
        let id = create_task(&store, "Work", &TaskFields::new("B"), &ctx("2025-07-02 10:00", false)).unwrap();
        assert_eq!(id.len(), 12);
        assert_eq!(first_id(&store), id);
    }

    #[test]
    fn test_add_subtask_and_edit() {
        let store = MemoryStore::new("Work:\n    - [ ] Parent (priority:B)\n");
        let parent = first_id(&store);
        let c = ctx("2025-07-02 10:00", false);
        let child = add_subtask(&store, &parent, &TaskFields::new("Child"), &c).unwrap();

        let parsed = load_outline(&store).unwrap();
        let task = parsed.outline.find_task(&child).unwrap();
        assert_eq!(task.depth, 2);
        assert_eq!(task.priority(), Some(crate::model::task::Priority::B));

        let new_id = edit_task(&store, &child, &TaskFields::new("Renamed child"), false).unwrap();
        assert_ne!(new_id, child);
        assert_eq!(store.text(), "Work:\n    - [ ] Parent (priority:B)\n        - [ ] Renamed child\n");
    }

    #[test]
    fn test_delete_returns_removed_lines() {
        let store = MemoryStore::new("Work:\n    - [ ] A\n        - [ ] A1\n    - [ ] B\n");
        let id = first_id(&store);
        let removed = delete_task(&store, &id).unwrap();
        assert_eq!(removed, vec!["    - [ ] A", "        - [ ] A1"]);
        assert_eq!(store.text(), "Work:\n    - [ ] B\n");
    }
}
