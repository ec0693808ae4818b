use serde::Serialize;

use super::task::Task;

/// A named grouping of tasks, opened by an `Name:` header line
#[derive(Debug, Clone, Serialize)]
pub struct Area {
    pub name: String,
    /// Ordinal among the areas in the file
    pub position: usize,
    /// Header line (0-indexed)
    pub line: usize,
    pub tasks: Vec<Task>,
}

/// A top-level entry: an area, or a task that precedes every header
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entry {
    Area(Area),
    Task(Task),
}

/// A parsed task file
#[derive(Debug, Clone, Default, Serialize)]
pub struct Outline {
    pub entries: Vec<Entry>,
}

impl Outline {
    pub fn areas(&self) -> impl Iterator<Item = &Area> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Area(a) => Some(a),
            Entry::Task(_) => None,
        })
    }

    /// First area with the given name
    pub fn area(&self, name: &str) -> Option<&Area> {
        self.areas().find(|a| a.name == name)
    }

    /// Tasks attached directly to an area or to the root, in file order
    pub fn top_level_tasks(&self) -> Vec<&Task> {
        let mut out = Vec::new();
        for entry in &self.entries {
            match entry {
                Entry::Task(t) => out.push(t),
                Entry::Area(a) => out.extend(a.tasks.iter()),
            }
        }
        out
    }

    /// Every task including subtasks, depth-first in file order
    pub fn all_tasks(&self) -> Vec<&Task> {
        let mut out = Vec::new();
        for task in self.top_level_tasks() {
            task.walk(&mut |t| out.push(t));
        }
        out
    }

    pub fn find_task(&self, id: &str) -> Option<&Task> {
        self.all_tasks().into_iter().find(|t| t.id == id)
    }

    pub fn task_count(&self) -> usize {
        self.all_tasks().len()
    }
}
