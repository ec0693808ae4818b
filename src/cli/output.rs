use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;

use crate::io::recovery::RecoveryEntry;
use crate::model::config::ViewMode;
use crate::model::task::{Metadata, Status, Task};
use crate::ops::mutate::Toggled;
use crate::ops::status::task_status;
use crate::ops::view::{GroupKind, View};
use crate::parse::outline_parser::Diagnostic;
use crate::util::unicode::{pad_to_width, truncate_to_width};

/// Widest id (a derived id); persisted tokens are shorter
const ID_WIDTH: usize = 12;

/// Descriptions longer than this are cut in list output
const MAX_DESCRIPTION_WIDTH: usize = 72;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskJson {
    pub id: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    pub depth: usize,
    pub status: Status,
    pub line: usize,
    /// Own entries, canonical key -> raw value
    pub metadata: IndexMap<String, String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub inherited: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    /// Ancestor copy showing only the subtasks that put it in its group
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct ViewJson {
    pub mode: ViewMode,
    pub today: NaiveDate,
    pub groups: Vec<GroupJson>,
}

#[derive(Serialize)]
pub struct GroupJson {
    pub name: String,
    pub kind: GroupKind,
    pub tasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct CheckJson<'a> {
    pub file: String,
    pub tasks: usize,
    pub diagnostics: &'a [Diagnostic],
}

#[derive(Serialize)]
pub struct ToggleJson {
    pub id: String,
    #[serde(flatten)]
    pub outcome: Toggled,
}

#[derive(Serialize)]
pub struct AdvanceJson {
    pub id: String,
    pub next_due: NaiveDate,
}

#[derive(Serialize)]
pub struct WriteJson {
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

fn metadata_map(entries: &[Metadata]) -> IndexMap<String, String> {
    entries
        .iter()
        .map(|m| (m.key().to_string(), m.value_text()))
        .collect()
}

pub fn task_to_json(task: &Task, today: NaiveDate) -> TaskJson {
    TaskJson {
        id: task.id.clone(),
        description: task.description.clone(),
        area: task.area.clone(),
        depth: task.depth,
        status: task_status(task, today),
        line: task.line,
        metadata: metadata_map(&task.metadata),
        inherited: metadata_map(&task.inherited),
        projects: task.projects.clone(),
        contexts: task.contexts.clone(),
        notes: task.notes.clone(),
        partial: false,
        subtasks: task.subtasks.iter().map(|t| task_to_json(t, today)).collect(),
    }
}

pub fn view_to_json(view: &View) -> ViewJson {
    ViewJson {
        mode: view.mode,
        today: view.today,
        groups: view
            .groups
            .iter()
            .map(|g| GroupJson {
                name: g.name.clone(),
                kind: g.kind,
                tasks: g
                    .tasks
                    .iter()
                    .map(|vt| TaskJson {
                        partial: vt.partial,
                        ..task_to_json(&vt.task, view.today)
                    })
                    .collect(),
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn status_char(status: Status) -> char {
    match status {
        Status::Incomplete => ' ',
        Status::Done => 'x',
        Status::OnHold => '-',
        Status::FollowUp => '%',
    }
}

/// One-line summary: `[x] <id>  description (key:value ...) +project @context`
pub fn format_task_line(task: &Task, status: Status) -> String {
    let mut out = format!(
        "[{}] {}  {}",
        status_char(status),
        pad_to_width(&task.id, ID_WIDTH),
        truncate_to_width(&task.description, MAX_DESCRIPTION_WIDTH)
    );
    let shown: Vec<String> = task
        .metadata
        .iter()
        .filter(|m| !matches!(m, Metadata::Id(_)))
        .map(|m| m.to_string())
        .collect();
    if !shown.is_empty() {
        out.push_str(&format!(" ({})", shown.join(" ")));
    }
    for p in &task.projects {
        out.push_str(&format!(" +{}", p));
    }
    for c in &task.contexts {
        out.push_str(&format!(" @{}", c));
    }
    out
}

/// A task and its subtasks, two spaces per level
pub fn format_task_tree(task: &Task, today: NaiveDate, indent: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "{}{}",
        "  ".repeat(indent),
        format_task_line(task, task_status(task, today))
    )];
    for sub in &task.subtasks {
        lines.extend(format_task_tree(sub, today, indent + 1));
    }
    lines
}

pub fn format_view(view: &View) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, group) in view.groups.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.push(format!("{} ({})", group.name, group.tasks.len()));
        for vt in &group.tasks {
            let mut tree = format_task_tree(&vt.task, view.today, 1);
            if vt.partial {
                tree[0].push_str(" …");
            }
            lines.extend(tree);
        }
    }
    lines
}

/// Detailed view of one task
pub fn format_task_detail(task: &Task, today: NaiveDate) -> Vec<String> {
    let status = task_status(task, today);
    let mut lines = vec![format!("[{}] {}", status_char(status), task.description)];

    let mut fields: Vec<(&str, String)> = vec![
        ("id", task.id.clone()),
        ("area", task.area.clone().unwrap_or_else(|| "(none)".into())),
        ("status", status.to_string()),
        ("line", (task.line + 1).to_string()),
    ];
    for m in &task.metadata {
        if !matches!(m, Metadata::Id(_)) {
            fields.push((m.key(), m.value_text()));
        }
    }
    for m in &task.inherited {
        fields.push((m.key(), format!("{} (inherited)", m.value_text())));
    }
    if !task.projects.is_empty() {
        fields.push(("projects", task.projects.iter().map(|p| format!("+{}", p)).collect::<Vec<_>>().join(" ")));
    }
    if !task.contexts.is_empty() {
        fields.push(("contexts", task.contexts.iter().map(|c| format!("@{}", c)).collect::<Vec<_>>().join(" ")));
    }

    let width = fields.iter().map(|(k, _)| k.len()).max().unwrap_or(0) + 1;
    for (key, value) in fields {
        lines.push(format!("{} {}", pad_to_width(&format!("{}:", key), width), value));
    }

    if !task.notes.is_empty() {
        lines.push(String::new());
        lines.push("notes:".to_string());
        for note in &task.notes {
            lines.push(format!("  {}", note));
        }
    }

    if !task.subtasks.is_empty() {
        lines.push(String::new());
        lines.push("subtasks:".to_string());
        for sub in &task.subtasks {
            lines.extend(format_task_tree(sub, today, 1));
        }
    }
    lines
}

pub fn format_toggled(id: &str, outcome: &Toggled) -> String {
    match outcome {
        Toggled::Checked { done } => format!("{} done ({})", id, done),
        Toggled::Unchecked => format!("{} reopened", id),
        Toggled::Converted => format!("{} follow-up mark cleared", id),
    }
}

pub fn format_recovery_entries(entries: &[RecoveryEntry]) -> String {
    entries
        .iter()
        .map(|e| e.to_markdown())
        .collect::<Vec<_>>()
        .join("\n")
}
