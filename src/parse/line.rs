use crate::model::task::Mark;

/// Columns per nesting level
pub const INDENT_UNIT: usize = 4;

/// Columns a tab counts for when measuring indentation
const TAB_WIDTH: usize = 4;

/// What a single raw line is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    /// Non-indented `#` line
    Comment,
    /// `Name:` header
    Area { name: &'a str },
    Task(TaskLine<'a>),
    /// Indented free text that is not a task
    Note { width: usize, text: &'a str },
    /// Non-indented text matching nothing else
    Malformed,
}

/// The pieces of a `<indent>- [m] content` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskLine<'a> {
    /// Exact indentation prefix, reused verbatim on rewrite
    pub prefix: &'a str,
    /// Indentation width in columns
    pub width: usize,
    pub depth: usize,
    pub mark: Mark,
    /// Byte offset of the mark character within the line
    pub mark_offset: usize,
    /// Everything after `- [m] `
    pub content: &'a str,
}

struct LineRule {
    name: &'static str,
    apply: for<'a> fn(&'a str) -> Option<LineKind<'a>>,
}

/// Evaluated in order; the first match wins and no match means malformed.
/// Task precedes area so `- [ ] ends with colon:` stays a task, and comment
/// precedes area so `# Someday:` stays a comment.
const RULES: &[LineRule] = &[
    LineRule {
        name: "blank",
        apply: blank_rule,
    },
    LineRule {
        name: "comment",
        apply: comment_rule,
    },
    LineRule {
        name: "task",
        apply: task_rule,
    },
    LineRule {
        name: "area",
        apply: area_rule,
    },
    LineRule {
        name: "note",
        apply: note_rule,
    },
];

/// Classify one raw line
pub fn classify(line: &str) -> LineKind<'_> {
    for rule in RULES {
        if let Some(kind) = (rule.apply)(line) {
            log::trace!("line matched rule '{}'", rule.name);
            return kind;
        }
    }
    LineKind::Malformed
}

/// Byte length of the leading whitespace and its width in columns
pub fn indentation(line: &str) -> (usize, usize) {
    let mut bytes = 0;
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += TAB_WIDTH,
            _ => break,
        }
        bytes += 1;
    }
    (bytes, width)
}

/// Indentation width in columns
pub fn indent_width(line: &str) -> usize {
    indentation(line).1
}

fn blank_rule(line: &str) -> Option<LineKind<'_>> {
    line.trim().is_empty().then_some(LineKind::Blank)
}

fn comment_rule(line: &str) -> Option<LineKind<'_>> {
    line.starts_with('#').then_some(LineKind::Comment)
}

fn task_rule(line: &str) -> Option<LineKind<'_>> {
    let (prefix_len, width) = indentation(line);
    let rest = line[prefix_len..].strip_prefix("- [")?;
    let mark_char = rest.chars().next()?;
    let mark = Mark::from_checkbox_char(mark_char)?;
    let after_mark = rest[mark_char.len_utf8()..].strip_prefix(']')?;
    let content = if after_mark.is_empty() {
        after_mark
    } else {
        after_mark.strip_prefix(' ')?
    };
    Some(LineKind::Task(TaskLine {
        prefix: &line[..prefix_len],
        width,
        depth: width / INDENT_UNIT,
        mark,
        mark_offset: prefix_len + 3,
        content,
    }))
}

fn area_rule(line: &str) -> Option<LineKind<'_>> {
    if indent_width(line) > 0 {
        return None;
    }
    let name = line.trim_end().strip_suffix(':')?.trim();
    (!name.is_empty()).then_some(LineKind::Area { name })
}

fn note_rule(line: &str) -> Option<LineKind<'_>> {
    let width = indent_width(line);
    (width > 0).then(|| LineKind::Note {
        width,
        text: line.trim(),
    })
}
