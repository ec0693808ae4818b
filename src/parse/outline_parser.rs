use std::fmt;

use serde::Serialize;

use crate::model::outline::{Area, Entry, Outline};
use crate::model::task::{DateValue, Metadata, Task};
use crate::parse::metadata::MetadataProblem;
use crate::parse::scan::{ScanKind, ScannedLine, ScannedTask, scan};
use crate::parse::source::SourceText;

/// An advisory problem found while parsing. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// 0-indexed source line
    pub line: usize,
    /// The raw line text
    pub text: String,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Non-indented text that is not a header, task or comment
    UnrecognizedLine,
    /// Task with empty or `?` content; the line is skipped
    EmptyTask,
    BadDate { key: String },
    BadValue { key: String, reason: String },
    UnknownKey { key: String },
    /// Subtask indented more than one level below its parent
    SkippedLevel,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match &self.kind {
            DiagnosticKind::UnrecognizedLine => "unrecognized line".to_string(),
            DiagnosticKind::EmptyTask => "empty task skipped".to_string(),
            DiagnosticKind::BadDate { key } => format!("'{}' is not a YYYY-MM-DD date", key),
            DiagnosticKind::BadValue { key, reason } => format!("bad '{}' value: {}", key, reason),
            DiagnosticKind::UnknownKey { key } => format!("unknown metadata key '{}'", key),
            DiagnosticKind::SkippedLevel => "subtask skips an indentation level".to_string(),
        };
        write!(f, "line {}: {}: {}", self.line + 1, what, self.text.trim())
    }
}

/// Parse output: the tree plus everything worth warning about
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedOutline {
    pub outline: Outline,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse file content into an outline
pub fn parse_outline(text: &str) -> ParsedOutline {
    parse_lines(&SourceText::parse(text).lines)
}

/// Parse already-split lines into an outline
pub fn parse_lines(lines: &[String]) -> ParsedOutline {
    let mut builder = Builder::default();
    for scanned in scan(lines) {
        builder.line(&scanned);
    }
    builder.finish()
}

#[derive(Default)]
struct Builder {
    entries: Vec<Entry>,
    area: Option<Area>,
    area_count: usize,
    /// Open tasks, outermost first. Every element above the bottom is a
    /// subtask of the one below it.
    stack: Vec<Task>,
    diagnostics: Vec<Diagnostic>,
}

impl Builder {
    fn line(&mut self, scanned: &ScannedLine<'_>) {
        match &scanned.kind {
            ScanKind::Blank | ScanKind::Comment => {}
            ScanKind::Malformed => self.diagnose(scanned, DiagnosticKind::UnrecognizedLine),
            ScanKind::Area { name } => {
                self.flush_stack();
                if let Some(area) = self.area.take() {
                    self.entries.push(Entry::Area(area));
                }
                self.area = Some(Area {
                    name: name.to_string(),
                    position: self.area_count,
                    line: scanned.index,
                    tasks: Vec::new(),
                });
                self.area_count += 1;
            }
            ScanKind::Note { text, .. } => match self.stack.last_mut() {
                Some(task) => task.notes.push(text.to_string()),
                None => log::debug!("line {}: orphan note ignored", scanned.index + 1),
            },
            ScanKind::Task(task) => self.task(scanned, task),
        }
    }

    fn task(&mut self, scanned: &ScannedLine<'_>, st: &ScannedTask<'_>) {
        if st.is_placeholder() {
            self.diagnose(scanned, DiagnosticKind::EmptyTask);
            return;
        }
        for problem in &st.extracted.problems {
            let kind = match problem {
                MetadataProblem::BadDate { key, .. } => DiagnosticKind::BadDate { key: key.clone() },
                MetadataProblem::BadValue { key, reason, .. } => DiagnosticKind::BadValue {
                    key: key.clone(),
                    reason: reason.clone(),
                },
                MetadataProblem::UnknownKey { key } => DiagnosticKind::UnknownKey { key: key.clone() },
            };
            self.diagnose(scanned, kind);
        }

        let depth = st.line.depth;
        while self.stack.last().is_some_and(|top| top.depth >= depth) {
            self.pop();
        }

        let mut task = Task {
            id: st.id.clone(),
            description: st.extracted.description.clone(),
            area: scanned.area.map(|a| a.to_string()),
            depth,
            mark: st.line.mark,
            metadata: st.extracted.metadata.clone(),
            inherited: Vec::new(),
            projects: st.extracted.projects.clone(),
            contexts: st.extracted.contexts.clone(),
            notes: Vec::new(),
            subtasks: Vec::new(),
            line: scanned.index,
        };

        let skipped = match self.stack.last() {
            Some(parent) if depth > 1 => {
                task.inherited = inherit_from(parent, &task);
                depth > parent.depth + 1
            }
            // Top-level: nothing below can reach the open tasks any more
            _ => {
                self.flush_stack();
                false
            }
        };
        if skipped {
            self.diagnose(scanned, DiagnosticKind::SkippedLevel);
        }
        self.stack.push(task);
    }

    /// Close the innermost open task, attaching it to its parent or container
    fn pop(&mut self) {
        let Some(task) = self.stack.pop() else {
            return;
        };
        match self.stack.last_mut() {
            Some(parent) => parent.subtasks.push(task),
            None => match self.area.as_mut() {
                Some(area) => area.tasks.push(task),
                None => self.entries.push(Entry::Task(task)),
            },
        }
    }

    fn flush_stack(&mut self) {
        while !self.stack.is_empty() {
            self.pop();
        }
    }

    fn diagnose(&mut self, scanned: &ScannedLine<'_>, kind: DiagnosticKind) {
        self.diagnostics.push(Diagnostic {
            line: scanned.index,
            text: scanned.raw.to_string(),
            kind,
        });
    }

    fn finish(mut self) -> ParsedOutline {
        self.flush_stack();
        if let Some(area) = self.area.take() {
            self.entries.push(Entry::Area(area));
        }
        ParsedOutline {
            outline: Outline {
                entries: self.entries,
            },
            diagnostics: self.diagnostics,
        }
    }
}

/// Priority and due values a child takes from its parent's effective values.
/// A key the child sets itself, even to a malformed value, is not inherited.
fn inherit_from(parent: &Task, child: &Task) -> Vec<Metadata> {
    let has_own = |key: &str| child.metadata.iter().any(|m| m.key() == key);
    let mut inherited = Vec::new();
    if !has_own("priority")
        && let Some(p) = parent.priority()
    {
        inherited.push(Metadata::Priority(p));
    }
    if !has_own("due")
        && let Some(d) = parent.due()
    {
        inherited.push(Metadata::Due(DateValue::Date(d)));
    }
    inherited
}
