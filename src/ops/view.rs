use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;

use crate::model::config::ViewMode;
use crate::model::outline::Outline;
use crate::model::task::{DateValue, Priority, Status, Task, parse_iso_date};
use crate::ops::status::task_status;

pub const NO_DUE_DATE: &str = "No Due Date";
pub const NO_PRIORITY: &str = "No Priority";
pub const NO_AREA: &str = "No Area";
pub const ON_HOLD: &str = "On Hold";
pub const FOLLOW_UP: &str = "Follow-up Required";
pub const DONE: &str = "Done";

static EMBEDDED_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("valid date regex"));

/// Which part of the view a group belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Primary,
    OnHold,
    FollowUp,
    Done,
}

/// A task placed in a group
#[derive(Debug, Clone, Serialize)]
pub struct ViewTask {
    pub status: Status,
    /// True for an ancestor shown only for the sake of matching descendants
    pub partial: bool,
    pub task: Task,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewGroup {
    pub name: String,
    pub kind: GroupKind,
    pub tasks: Vec<ViewTask>,
}

#[derive(Debug, Clone, Serialize)]
pub struct View {
    pub mode: ViewMode,
    pub today: NaiveDate,
    pub groups: Vec<ViewGroup>,
}

impl View {
    pub fn group(&self, name: &str) -> Option<&ViewGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }
}

/// Group and sort the outline's tasks. Read-only: the outline is untouched
/// and every task in the view is a copy.
pub fn build_view(outline: &Outline, mode: ViewMode, today: NaiveDate) -> View {
    let status = |t: &Task| task_status(t, today);
    let is_onhold = |t: &Task| status(t) == Status::OnHold;

    let mut primary: Vec<ViewTask> = Vec::new();
    let mut on_hold: Vec<ViewTask> = Vec::new();
    let mut follow_up: Vec<ViewTask> = Vec::new();
    let mut done: Vec<ViewTask> = Vec::new();

    for task in outline.top_level_tasks() {
        let own = status(task);
        let whole = || ViewTask {
            status: own,
            partial: false,
            task: task.clone(),
        };
        match own {
            Status::OnHold => on_hold.push(whole()),
            Status::FollowUp => follow_up.push(whole()),
            Status::Done => done.push(whole()),
            Status::Incomplete => {
                let copy = primary_copy(task, mode, &status, &mut primary);
                primary.push(ViewTask {
                    status: own,
                    partial: false,
                    task: copy,
                });
                for sub in &task.subtasks {
                    collect_followups(sub, &status, &mut follow_up);
                }
                if let Some(copy) = prune_children(task, &|t| status(t) == Status::Done) {
                    done.push(partial(own, copy));
                }
            }
        }
        // Any ancestor not on hold itself brings its on-hold descendants along
        if own != Status::OnHold
            && let Some(copy) = prune_children(task, &is_onhold)
        {
            on_hold.push(partial(own, copy));
        }
    }

    let mut groups = match mode {
        ViewMode::Due => by_due(primary),
        ViewMode::Priority => by_priority(primary),
        ViewMode::Area => by_area(primary),
    };

    on_hold.sort_by(|a, b| {
        onhold_key(a, today)
            .cmp(&onhold_key(b, today))
            .then_with(|| secondary(&a.task, &b.task))
    });
    follow_up.sort_by(|a, b| {
        followup_key(&a.task, today)
            .cmp(&followup_key(&b.task, today))
            .then_with(|| secondary(&a.task, &b.task))
    });
    done.sort_by(|a, b| {
        done_key(a)
            .cmp(&done_key(b))
            .then_with(|| secondary(&a.task, &b.task))
    });

    groups.push(group(ON_HOLD, GroupKind::OnHold, on_hold));
    groups.push(group(FOLLOW_UP, GroupKind::FollowUp, follow_up));
    groups.push(group(DONE, GroupKind::Done, done));

    View { mode, today, groups }
}

// ---------------------------------------------------------------------------
// Primary grouping
// ---------------------------------------------------------------------------

fn by_due(tasks: Vec<ViewTask>) -> Vec<ViewGroup> {
    let mut dated: BTreeMap<NaiveDate, Vec<ViewTask>> = BTreeMap::new();
    let mut undated = Vec::new();
    for vt in tasks {
        match vt.task.due() {
            Some(d) => dated.entry(d).or_default().push(vt),
            None => undated.push(vt),
        }
    }
    let mut groups: Vec<ViewGroup> = dated
        .into_iter()
        .map(|(d, tasks)| primary_group(d.format("%Y-%m-%d").to_string(), tasks))
        .collect();
    if !undated.is_empty() {
        groups.push(primary_group(NO_DUE_DATE.to_string(), undated));
    }
    groups
}

fn by_priority(tasks: Vec<ViewTask>) -> Vec<ViewGroup> {
    let mut ranked: BTreeMap<Priority, Vec<ViewTask>> = BTreeMap::new();
    let mut unranked = Vec::new();
    for vt in tasks {
        match vt.task.priority() {
            Some(p) => ranked.entry(p).or_default().push(vt),
            None => unranked.push(vt),
        }
    }
    let mut groups: Vec<ViewGroup> = ranked
        .into_iter()
        .map(|(p, tasks)| primary_group(format!("Priority {}", p), tasks))
        .collect();
    if !unranked.is_empty() {
        groups.push(primary_group(NO_PRIORITY.to_string(), unranked));
    }
    groups
}

fn by_area(tasks: Vec<ViewTask>) -> Vec<ViewGroup> {
    // Tasks arrive in file order, and loose tasks precede every header
    let mut areas: IndexMap<Option<String>, Vec<ViewTask>> = IndexMap::new();
    for vt in tasks {
        areas.entry(vt.task.area.clone()).or_default().push(vt);
    }
    areas
        .into_iter()
        .map(|(area, tasks)| primary_group(area.unwrap_or_else(|| NO_AREA.to_string()), tasks))
        .collect()
}

fn primary_group(name: String, mut tasks: Vec<ViewTask>) -> ViewGroup {
    tasks.sort_by(|a, b| secondary(&a.task, &b.task));
    ViewGroup {
        name,
        kind: GroupKind::Primary,
        tasks,
    }
}

fn group(name: &str, kind: GroupKind, tasks: Vec<ViewTask>) -> ViewGroup {
    ViewGroup {
        name: name.to_string(),
        kind,
        tasks,
    }
}

// ---------------------------------------------------------------------------
// Subtree filtering
// ---------------------------------------------------------------------------

/// Copy of `task` keeping only the subtasks (recursively) that satisfy `keep`
pub fn retain(task: &Task, keep: &dyn Fn(&Task) -> bool) -> Task {
    let subtasks = task
        .subtasks
        .iter()
        .filter(|&s| keep(s))
        .map(|s| retain(s, keep))
        .collect();
    with_subtasks(task, subtasks)
}

/// Copy of `task` reduced to the paths leading to descendants that satisfy
/// `keep`. A matching task is kept whole. `None` when nothing matches.
pub fn prune(task: &Task, keep: &dyn Fn(&Task) -> bool) -> Option<Task> {
    if keep(task) {
        return Some(task.clone());
    }
    prune_children(task, keep)
}

/// Like `prune`, but `task` itself is never a match
fn prune_children(task: &Task, keep: &dyn Fn(&Task) -> bool) -> Option<Task> {
    let subtasks: Vec<Task> = task.subtasks.iter().filter_map(|s| prune(s, keep)).collect();
    if subtasks.is_empty() {
        None
    } else {
        Some(with_subtasks(task, subtasks))
    }
}

fn with_subtasks(task: &Task, subtasks: Vec<Task>) -> Task {
    Task {
        id: task.id.clone(),
        description: task.description.clone(),
        area: task.area.clone(),
        depth: task.depth,
        mark: task.mark,
        metadata: task.metadata.clone(),
        inherited: task.inherited.clone(),
        projects: task.projects.clone(),
        contexts: task.contexts.clone(),
        notes: task.notes.clone(),
        subtasks,
        line: task.line,
    }
}

/// Copy of an incomplete task with its incomplete subtree. A subtask whose
/// own due date or priority puts it in another bucket than its parent is
/// pushed to `out` as an entry of its own instead.
fn primary_copy(task: &Task, mode: ViewMode, status: &dyn Fn(&Task) -> Status, out: &mut Vec<ViewTask>) -> Task {
    let mut kept = Vec::new();
    for sub in task.subtasks.iter().filter(|s| status(s) == Status::Incomplete) {
        let copy = primary_copy(sub, mode, status, out);
        if same_bucket(task, sub, mode) {
            kept.push(copy);
        } else {
            out.push(ViewTask {
                status: Status::Incomplete,
                partial: false,
                task: copy,
            });
        }
    }
    with_subtasks(task, kept)
}

fn same_bucket(parent: &Task, child: &Task, mode: ViewMode) -> bool {
    match mode {
        ViewMode::Due => parent.due() == child.due(),
        ViewMode::Priority => parent.priority() == child.priority(),
        ViewMode::Area => true,
    }
}

fn partial(status: Status, task: Task) -> ViewTask {
    ViewTask {
        status,
        partial: true,
        task,
    }
}

/// Pull follow-up subtasks out as entries of their own
fn collect_followups(task: &Task, status: &dyn Fn(&Task) -> Status, out: &mut Vec<ViewTask>) {
    let own = status(task);
    if own == Status::FollowUp {
        out.push(ViewTask {
            status: own,
            partial: false,
            task: task.clone(),
        });
        return;
    }
    if own == Status::Incomplete {
        for sub in &task.subtasks {
            collect_followups(sub, status, out);
        }
    }
}

// ---------------------------------------------------------------------------
// Sort keys
// ---------------------------------------------------------------------------

/// Priority rank (unset last), then description
fn secondary(a: &Task, b: &Task) -> Ordering {
    let rank = |t: &Task| t.priority().map_or(u8::MAX, |p| p.rank());
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.description.cmp(&b.description))
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum HoldKey {
    Upcoming(NaiveDate),
    /// Text mentioning a date; most recent first
    Mentions(Reverse<NaiveDate>),
    Text(String),
}

fn hold_key(value: &DateValue) -> HoldKey {
    match value {
        DateValue::Date(d) => HoldKey::Upcoming(*d),
        DateValue::Text(t) => match EMBEDDED_DATE.find_iter(t).find_map(|m| parse_iso_date(m.as_str())) {
            Some(d) => HoldKey::Mentions(Reverse(d)),
            None => HoldKey::Text(t.clone()),
        },
    }
}

/// An on-hold task sorts by its own value, an ancestor copy by the
/// earliest key in its subtree
fn onhold_key(vt: &ViewTask, today: NaiveDate) -> Option<HoldKey> {
    if !vt.partial {
        return vt.task.onhold().map(hold_key);
    }
    let mut best: Option<HoldKey> = None;
    vt.task.walk(&mut |t| {
        if task_status(t, today) == Status::OnHold
            && let Some(v) = t.onhold()
        {
            let key = hold_key(v);
            if best.as_ref().is_none_or(|b| key < *b) {
                best = Some(key);
            }
        }
    });
    best
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum FollowKey {
    Upcoming(NaiveDate),
    Past(Reverse<NaiveDate>),
    Undated,
}

fn followup_key(task: &Task, today: NaiveDate) -> FollowKey {
    match task.followup().and_then(|v| v.as_date()) {
        Some(d) if d >= today => FollowKey::Upcoming(d),
        Some(d) => FollowKey::Past(Reverse(d)),
        None => FollowKey::Undated,
    }
}

/// Done date ascending, undated last. A finished task sorts by its own
/// date, an ancestor copy by the latest completion in its subtree.
fn done_key(vt: &ViewTask) -> (bool, i32) {
    let latest = if vt.partial {
        let mut latest: Option<NaiveDate> = None;
        vt.task.walk(&mut |t| {
            if t.is_completed()
                && let Some(d) = t.done_date()
            {
                latest = Some(latest.map_or(d, |l| l.max(d)));
            }
        });
        latest
    } else {
        vt.task.done_date()
    };
    match latest {
        Some(d) => (false, d.num_days_from_ce()),
        None => (true, 0),
    }
}
