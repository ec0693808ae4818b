use std::fmt;
use std::ops::Range;

use crate::model::task::{DateValue, Metadata, Priority, Progress, Recurrence, TaskFields};

/// One `key:value` entry inside a metadata group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry<'a> {
    pub key: &'a str,
    pub value: &'a str,
    /// Byte range of `key:value` within the content
    pub span: Range<usize>,
}

/// A parenthesized metadata group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group<'a> {
    /// Byte range including both parentheses
    pub span: Range<usize>,
    pub entries: Vec<RawEntry<'a>>,
}

/// Something wrong with a metadata value. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataProblem {
    BadDate { key: String, value: String },
    BadValue { key: String, value: String, reason: String },
    UnknownKey { key: String },
}

impl fmt::Display for MetadataProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataProblem::BadDate { key, value } => {
                write!(f, "'{}' is not a YYYY-MM-DD date: {}", key, value)
            }
            MetadataProblem::BadValue { key, value, reason } => {
                write!(f, "bad '{}' value '{}': {}", key, value, reason)
            }
            MetadataProblem::UnknownKey { key } => write!(f, "unknown metadata key '{}'", key),
        }
    }
}

/// The result of pulling metadata and tags out of a task's content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub description: String,
    pub metadata: Vec<Metadata>,
    pub projects: Vec<String>,
    pub contexts: Vec<String>,
    pub problems: Vec<MetadataProblem>,
}

/// Split task content into clean description, typed metadata and tags.
pub fn extract(content: &str) -> Extracted {
    let groups = find_groups(content);
    let mut out = Extracted::default();

    for group in &groups {
        for entry in &group.entries {
            let (meta, problem) = typed_entry(entry.key, entry.value);
            out.metadata.push(meta);
            if let Some(p) = problem {
                out.problems.push(p);
            }
        }
    }

    let mut removed: Vec<Range<usize>> = groups.iter().map(|g| g.span.clone()).collect();
    for (span, sigil, name) in tag_tokens(content, &groups) {
        match sigil {
            '+' => out.projects.push(name.to_string()),
            _ => out.contexts.push(name.to_string()),
        }
        removed.push(span);
    }
    removed.sort_by_key(|r| r.start);

    let mut kept = String::with_capacity(content.len());
    let mut pos = 0;
    for range in &removed {
        if range.start > pos {
            kept.push_str(&content[pos..range.start]);
        }
        kept.push(' ');
        pos = pos.max(range.end);
    }
    if pos < content.len() {
        kept.push_str(&content[pos..]);
    }
    out.description = kept.split_whitespace().collect::<Vec<_>>().join(" ");
    out
}

/// Find every parenthesized metadata group in `content`. A group counts as
/// metadata only if its first token is `key:`.
pub fn find_groups(content: &str) -> Vec<Group<'_>> {
    let bytes = content.as_bytes();
    let mut groups = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'(' {
            i += 1;
            continue;
        }
        let close = bytes[i + 1..]
            .iter()
            .position(|&b| b == b'(' || b == b')')
            .map(|off| i + 1 + off);
        match close {
            Some(j) if bytes[j] == b')' => {
                let inner_start = i + 1;
                let entries = parse_group_entries(&content[inner_start..j], inner_start);
                if !entries.is_empty() {
                    groups.push(Group {
                        span: i..j + 1,
                        entries,
                    });
                }
                i = j + 1;
            }
            // Nested or unbalanced: retry from the inner `(`
            Some(j) => i = j,
            None => break,
        }
    }

    groups
}

/// Parse the inside of a group. Returns no entries if it is not metadata.
fn parse_group_entries(inner: &str, offset: usize) -> Vec<RawEntry<'_>> {
    let starts = key_starts(inner);
    let first_token = inner.len() - inner.trim_start().len();
    match starts.first() {
        Some(&(start, _)) if start == first_token => {}
        _ => return Vec::new(),
    }

    let mut entries = Vec::with_capacity(starts.len());
    for (n, &(key_start, colon)) in starts.iter().enumerate() {
        let value_start = colon + 1;
        let value_limit = starts.get(n + 1).map_or(inner.len(), |&(next, _)| next);
        let raw_value = &inner[value_start..value_limit];
        let value = raw_value.trim();
        let value_end = value_start + raw_value.trim_end().len();
        entries.push(RawEntry {
            key: &inner[key_start..colon],
            value,
            span: offset + key_start..offset + value_end,
        });
    }
    entries
}

/// Positions of `key:` tokens: start of key and index of its colon.
/// A key starts the text or follows whitespace.
fn key_starts(inner: &str) -> Vec<(usize, usize)> {
    let bytes = inner.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let at_boundary = i == 0 || bytes[i - 1].is_ascii_whitespace();
        if at_boundary && (bytes[i].is_ascii_alphabetic() || bytes[i] == b'_') {
            let mut j = i + 1;
            while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
                j += 1;
            }
            if j < bytes.len() && bytes[j] == b':' {
                out.push((i, j));
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }
    out
}

/// `+tag` / `@tag` tokens outside metadata groups: (span, sigil, name)
fn tag_tokens<'a>(content: &'a str, groups: &[Group<'_>]) -> Vec<(Range<usize>, char, &'a str)> {
    let mut out = Vec::new();
    for span in whitespace_tokens(content) {
        if groups
            .iter()
            .any(|g| span.start < g.span.end && g.span.start < span.end)
        {
            continue;
        }
        let token = &content[span.clone()];
        let mut chars = token.chars();
        let sigil = match chars.next() {
            Some(c @ ('+' | '@')) => c,
            _ => continue,
        };
        let name = chars.as_str();
        if name.is_empty() || name.contains(['(', ')', '+', '@']) {
            continue;
        }
        out.push((span, sigil, name));
    }
    out
}

fn whitespace_tokens(content: &str) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in content.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                out.push(s..i);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push(s..content.len());
    }
    out
}

/// Byte offset of the first tag token outside metadata groups
pub fn first_tag_offset(content: &str) -> Option<usize> {
    let groups = find_groups(content);
    tag_tokens(content, &groups).first().map(|(span, _, _)| span.start)
}

/// Build editable fields from text like `Call mom (due:2025-07-02) +family`.
/// Entries that can't be set this way are reported as problems.
pub fn fields_from_text(text: &str) -> (TaskFields, Vec<MetadataProblem>) {
    let ex = extract(text);
    let mut problems = ex.problems;
    let mut fields = TaskFields::new(ex.description);
    fields.projects = ex.projects;
    fields.contexts = ex.contexts;

    for meta in ex.metadata {
        match meta {
            Metadata::Priority(p) => fields.priority = Some(p),
            Metadata::Due(DateValue::Date(d)) => fields.due = Some(d),
            Metadata::OnHold(v) => fields.onhold = Some(v),
            Metadata::FollowUp(v) => fields.followup = Some(v),
            Metadata::Every(r) => fields.every = Some(r),
            Metadata::Progress(p) => fields.progress = Some(p),
            Metadata::Done(_) | Metadata::Rec(_) | Metadata::Id(_) => {
                problems.push(MetadataProblem::BadValue {
                    key: meta.key().to_string(),
                    value: meta.value_text(),
                    reason: "managed by tick, cannot be set directly".into(),
                });
            }
            // Already reported by extract
            Metadata::Due(DateValue::Text(_)) | Metadata::Other { .. } => {}
        }
    }
    (fields, problems)
}

/// Convert one raw entry into its typed form
pub fn typed_entry(key: &str, value: &str) -> (Metadata, Option<MetadataProblem>) {
    let other = || Metadata::Other {
        key: key.to_string(),
        value: value.to_string(),
    };
    let bad_value = |reason: String| MetadataProblem::BadValue {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    };
    let date_problem = |v: &DateValue, strict: bool| match v {
        DateValue::Text(t) if strict || looks_like_date(t) => Some(MetadataProblem::BadDate {
            key: key.to_string(),
            value: value.to_string(),
        }),
        _ => None,
    };

    match key {
        "priority" => match Priority::from_letter(value) {
            Some(p) => (Metadata::Priority(p), None),
            None => (other(), Some(bad_value("expected a letter A-F".into()))),
        },
        "due" => {
            let v = DateValue::parse(value);
            let problem = date_problem(&v, true);
            (Metadata::Due(v), problem)
        }
        "done" => {
            let v = DateValue::parse(value);
            let problem = date_problem(&v, true);
            (Metadata::Done(v), problem)
        }
        "followup" | "followup_date" => {
            let v = DateValue::parse(value);
            let problem = date_problem(&v, false);
            (Metadata::FollowUp(v), problem)
        }
        "onhold" => {
            let v = DateValue::parse(value);
            let problem = date_problem(&v, false);
            (Metadata::OnHold(v), problem)
        }
        "rec" => {
            let v = DateValue::parse(value);
            let problem = date_problem(&v, false);
            (Metadata::Rec(v), problem)
        }
        "every" => match value.parse::<Recurrence>() {
            Ok(r) => (Metadata::Every(r), None),
            Err(reason) => (other(), Some(bad_value(reason))),
        },
        "progress" => match value.parse::<Progress>() {
            Ok(p) => (Metadata::Progress(p), None),
            Err(reason) => (other(), Some(bad_value(reason))),
        },
        "id" if !value.is_empty() => (Metadata::Id(value.to_string()), None),
        "id" => (other(), Some(bad_value("empty id".into()))),
        _ => (
            other(),
            Some(MetadataProblem::UnknownKey {
                key: key.to_string(),
            }),
        ),
    }
}

/// Free text that was probably meant as a date (`2025-7-1`, `2025/07/01`)
fn looks_like_date(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_digit())
}
