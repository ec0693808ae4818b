use chrono::NaiveDate;
use serde::Serialize;

use crate::model::task::{DateValue, Mark, Metadata, Recurrence, TaskFields, TaskRef};
use crate::parse::line::{LineKind, classify};
use crate::parse::metadata::{extract, find_groups, first_tag_offset};
use crate::parse::scan::{ScanKind, ScannedLine, ScannedTask, scan};
use crate::parse::source::SourceText;
use crate::parse::task_serializer::{child_prefix, render_notes, render_task_line};

/// Error type for task operations
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("invalid task: {0}")]
    InvalidFields(String),
}

/// What a toggle did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Toggled {
    Checked { done: NaiveDate },
    Unchecked,
    /// Legacy `[%]` mark cleared
    Converted,
}

/// Indentation for tasks created directly under an area
const AREA_TASK_PREFIX: &str = "    ";

/// Keys `edit_task` replaces; anything else on the line is carried over
const EDITABLE_KEYS: &[&str] = &[
    "priority", "due", "onhold", "followup", "every", "progress",
];

// ---------------------------------------------------------------------------
// Target resolution
// ---------------------------------------------------------------------------

/// Line of the first task matching area, description and depth
pub fn locate_by_ref(lines: &[String], target: &TaskRef) -> Option<usize> {
    scan(lines).iter().find_map(|sl| {
        let task = sl.task()?;
        (!task.is_placeholder()
            && sl.area == target.area.as_deref()
            && task.extracted.description == target.description
            && task.line.depth == target.depth)
            .then_some(sl.index)
    })
}

/// Line of the task with this identity
pub fn locate_by_id(lines: &[String], id: &str) -> Option<usize> {
    position_of(&scan(lines), id)
}

fn position_of(scanned: &[ScannedLine<'_>], id: &str) -> Option<usize> {
    scanned.iter().find_map(|sl| {
        let task = sl.task()?;
        (!task.is_placeholder() && task.id == id).then_some(sl.index)
    })
}

fn scanned_task<'s, 'a>(scanned: &'s [ScannedLine<'a>], id: &str) -> Result<(usize, &'s ScannedTask<'a>), TaskError> {
    position_of(scanned, id)
        .and_then(|idx| scanned[idx].task().map(|t| (idx, t)))
        .ok_or_else(|| TaskError::NotFound(id.to_string()))
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Flip a task's completion. Only the checkbox and metadata change.
pub fn toggle(src: &mut SourceText, target: &TaskRef, today: NaiveDate) -> Result<Toggled, TaskError> {
    let idx = locate_by_ref(&src.lines, target).ok_or_else(|| TaskError::NotFound(target.id.clone()))?;
    let line = src.lines[idx].as_str();
    let LineKind::Task(task_line) = classify(line) else {
        return Err(TaskError::NotFound(target.id.clone()));
    };
    let metadata = extract(task_line.content).metadata;

    let (new_line, outcome) = match task_line.mark {
        Mark::LegacyFollowUp => (set_mark(line, Mark::Unchecked), Toggled::Converted),
        Mark::Checked => {
            let unchecked = set_mark(line, Mark::Unchecked);
            (remove_entries(&unchecked, &["done"]), Toggled::Unchecked)
        }
        Mark::Unchecked => {
            let checked = remove_entries(&set_mark(line, Mark::Checked), &["followup"]);
            let has_done = metadata.iter().any(|m| matches!(m, Metadata::Done(_)));
            let stamped = if has_done {
                checked
            } else {
                append_entry(&checked, &Metadata::Done(DateValue::Date(today)).to_string())
            };
            (stamped, Toggled::Checked { done: today })
        }
    };

    log::debug!("toggle line {}: {:?}", idx + 1, outcome);
    src.lines[idx] = new_line;
    Ok(outcome)
}

/// Move a recurring task to its next occurrence: `due` advances past
/// max(due, today), `rec:` records today and the task is reopened.
/// Returns the new due date.
pub fn advance(src: &mut SourceText, id: &str, today: NaiveDate) -> Result<NaiveDate, TaskError> {
    let scanned = scan(&src.lines);
    let (idx, task) = scanned_task(&scanned, id)?;
    let Some((rule, due)) = recurring_due(&task.extracted.metadata) else {
        return Err(TaskError::InvalidFields(format!(
            "task {} needs both every: and a due date to advance",
            id
        )));
    };
    let line = src.lines[idx].as_str();

    let next_due = rule.next_after(due.max(today));
    let moved = set_entry(line, "due", &Metadata::Due(DateValue::Date(next_due)).to_string());
    let stamped = set_entry(&moved, "rec", &Metadata::Rec(DateValue::Date(today)).to_string());
    let new_line = match task.line.mark {
        Mark::Unchecked => stamped,
        Mark::Checked | Mark::LegacyFollowUp => remove_entries(&set_mark(&stamped, Mark::Unchecked), &["done"]),
    };

    log::debug!("advance line {}: next due {}", idx + 1, next_due);
    src.lines[idx] = new_line;
    Ok(next_due)
}

/// Rewrite a task line and its notes from `fields`. The mark, indentation
/// and non-editable metadata (done, rec, id, unknown keys) are kept.
pub fn edit_task(src: &mut SourceText, id: &str, fields: &TaskFields) -> Result<(), TaskError> {
    rewrite_task(src, id, fields, true)
}

/// Like `edit_task`, but the note lines stay exactly as they are and
/// `fields.notes` is ignored.
pub fn edit_task_line(src: &mut SourceText, id: &str, fields: &TaskFields) -> Result<(), TaskError> {
    rewrite_task(src, id, fields, false)
}

fn rewrite_task(src: &mut SourceText, id: &str, fields: &TaskFields, with_notes: bool) -> Result<(), TaskError> {
    validate_fields(fields)?;
    let scanned = scan(&src.lines);
    let (idx, task) = scanned_task(&scanned, id)?;

    let carried: Vec<Metadata> = task
        .extracted
        .metadata
        .iter()
        .filter(|m| !EDITABLE_KEYS.contains(&canonical_key(m.key())))
        .cloned()
        .collect();
    let mut replacement = vec![render_task_line(task.line.prefix, task.line.mark, fields, &carried)];
    let end = if with_notes {
        replacement.extend(render_notes(task.line.prefix, &fields.notes));
        notes_end(&scanned, idx)
    } else {
        idx + 1
    };

    log::debug!("edit line {}: replacing {} line(s)", idx + 1, end - idx);
    src.lines.splice(idx..end, replacement);
    Ok(())
}

/// Remove a task with its subtasks and notes. Returns the removed lines.
pub fn delete_task(src: &mut SourceText, id: &str) -> Result<Vec<String>, TaskError> {
    let scanned = scan(&src.lines);
    let (idx, task) = scanned_task(&scanned, id)?;
    let end = extent_end(&scanned, idx, task.line.depth, task.line.width);

    log::debug!("delete lines {}..={}", idx + 1, end);
    Ok(src.lines.drain(idx..end).collect())
}

/// Insert a new task at the end of `area`, appending the area if it does
/// not exist. Returns the line index of the new task.
pub fn create_task(
    src: &mut SourceText,
    area: &str,
    fields: &TaskFields,
    extra: &[Metadata],
) -> Result<usize, TaskError> {
    validate_fields(fields)?;
    let area = area.trim();
    let header = format!("{}:", area);
    if area.contains(['\n', '\r']) || !matches!(classify(&header), LineKind::Area { name } if name == area) {
        return Err(TaskError::InvalidFields(format!("invalid area name '{}'", area)));
    }

    let mut block = vec![render_task_line(AREA_TASK_PREFIX, Mark::Unchecked, fields, extra)];
    block.extend(render_notes(AREA_TASK_PREFIX, &fields.notes));

    let existing = {
        let scanned = scan(&src.lines);
        scanned
            .iter()
            .position(|sl| matches!(sl.kind, ScanKind::Area { name } if name == area))
            .map(|h| {
                let block_end = scanned[h + 1..]
                    .iter()
                    .position(|sl| matches!(sl.kind, ScanKind::Area { .. }))
                    .map_or(scanned.len(), |off| h + 1 + off);
                (h + 1..block_end)
                    .rev()
                    .find(|&i| !matches!(scanned[i].kind, ScanKind::Blank))
                    .map_or(h + 1, |i| i + 1)
            })
    };

    let at = match existing {
        Some(at) => at,
        None => {
            log::info!("creating area '{}'", area);
            if src.lines.last().is_some_and(|l| !l.trim().is_empty()) {
                src.lines.push(String::new());
            }
            src.lines.push(header);
            src.lines.len()
        }
    };

    log::debug!("insert task at line {}", at + 1);
    src.lines.splice(at..at, block);
    Ok(at)
}

/// Insert a subtask after the parent's existing subtasks and notes.
/// Returns the line index of the new subtask.
pub fn add_subtask(
    src: &mut SourceText,
    parent_id: &str,
    fields: &TaskFields,
    extra: &[Metadata],
) -> Result<usize, TaskError> {
    validate_fields(fields)?;
    let scanned = scan(&src.lines);
    let (idx, parent) = scanned_task(&scanned, parent_id)?;
    let at = extent_end(&scanned, idx, parent.line.depth, parent.line.width);

    let prefix = child_prefix(parent.line.prefix);
    let mut block = vec![render_task_line(&prefix, Mark::Unchecked, fields, extra)];
    block.extend(render_notes(&prefix, &fields.notes));

    log::debug!("insert subtask at line {}", at + 1);
    src.lines.splice(at..at, block);
    Ok(at)
}

/// Reject fields that would not read back as the same task
pub fn validate_fields(fields: &TaskFields) -> Result<(), TaskError> {
    let invalid = |msg: String| Err(TaskError::InvalidFields(msg));
    let description = fields.description.trim();

    if description.is_empty() || description == "?" {
        return invalid("description is empty".into());
    }
    if description.contains(['\n', '\r']) {
        return invalid("description contains a line break".into());
    }
    let ex = extract(description);
    let collapsed = description.split_whitespace().collect::<Vec<_>>().join(" ");
    if ex.description != collapsed {
        return invalid("description contains metadata or tags".into());
    }
    for tag in fields.projects.iter().chain(&fields.contexts) {
        if tag.is_empty() || tag.contains(|c: char| c.is_whitespace() || "()+@".contains(c)) {
            return invalid(format!("invalid tag '{}'", tag));
        }
    }
    for meta in fields.metadata() {
        let value = meta.value_text();
        if value.contains(['(', ')', '\n', '\r']) {
            return invalid(format!("'{}' value cannot contain parentheses or line breaks", meta.key()));
        }
        if extract(&format!("x ({})", meta)).metadata.len() != 1 {
            return invalid(format!("'{}' value '{}' reads back as more than one entry", meta.key(), value));
        }
    }
    for note in &fields.notes {
        if note.contains(['\n', '\r']) {
            return invalid("note contains a line break".into());
        }
        if matches!(classify(&format!("{}{}", AREA_TASK_PREFIX, note.trim())), LineKind::Task(_)) {
            return invalid(format!("note would read as a task: '{}'", note.trim()));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Line extents
// ---------------------------------------------------------------------------

/// End (exclusive) of a task's block: nested tasks, deeper notes and blank
/// lines that lead to more of them. Trailing blanks are not included. Depth
/// 0 and 1 are both top level, so a depth-1 task never nests under depth 0.
fn extent_end(scanned: &[ScannedLine<'_>], idx: usize, depth: usize, width: usize) -> usize {
    let mut end = idx + 1;
    let mut j = idx + 1;
    while j < scanned.len() {
        match &scanned[j].kind {
            ScanKind::Blank => {
                j += 1;
                continue;
            }
            ScanKind::Task(t) if t.line.depth > depth.max(1) => {}
            ScanKind::Note { width: w, .. } if *w > width => {}
            _ => break,
        }
        j += 1;
        end = j;
    }
    end
}

/// End (exclusive) of the note lines directly after a task
fn notes_end(scanned: &[ScannedLine<'_>], idx: usize) -> usize {
    let mut end = idx + 1;
    for sl in &scanned[idx + 1..] {
        match sl.kind {
            ScanKind::Note { .. } => end = sl.index + 1,
            ScanKind::Blank => {}
            _ => break,
        }
    }
    end
}

// ---------------------------------------------------------------------------
// Single-line edits
// ---------------------------------------------------------------------------

fn canonical_key(key: &str) -> &str {
    match key {
        "followup_date" => "followup",
        other => other,
    }
}

fn recurring_due(metadata: &[Metadata]) -> Option<(Recurrence, NaiveDate)> {
    let rule = metadata.iter().find_map(|m| match m {
        Metadata::Every(r) => Some(*r),
        _ => None,
    })?;
    let due = metadata.iter().find_map(|m| match m {
        Metadata::Due(v) => v.as_date(),
        _ => None,
    })?;
    Some((rule, due))
}

/// Split a task line into `<indent>- [m] ` and its content
fn split_task(line: &str) -> Option<(&str, &str)> {
    match classify(line) {
        LineKind::Task(t) => Some(line.split_at(line.len() - t.content.len())),
        _ => None,
    }
}

fn set_mark(line: &str, mark: Mark) -> String {
    let LineKind::Task(t) = classify(line) else {
        return line.to_string();
    };
    // Every mark character is a single byte
    let mut out = String::with_capacity(line.len());
    out.push_str(&line[..t.mark_offset]);
    out.push(mark.checkbox_char());
    out.push_str(&line[t.mark_offset + 1..]);
    out
}

/// Drop entries with the given keys. Touched groups are rewritten with
/// single spaces; an emptied group goes away with one adjacent space.
fn remove_entries(line: &str, keys: &[&str]) -> String {
    let Some((head, content)) = split_task(line) else {
        return line.to_string();
    };
    let mut out = content.to_string();

    // Right to left, so earlier spans stay valid
    for group in find_groups(content).iter().rev() {
        let remaining: Vec<&str> = group
            .entries
            .iter()
            .filter(|e| !keys.contains(&canonical_key(e.key)))
            .map(|e| &content[e.span.clone()])
            .collect();
        if remaining.len() == group.entries.len() {
            continue;
        }
        let span = group.span.clone();
        if remaining.is_empty() {
            let range = if out[..span.start].ends_with(' ') {
                span.start - 1..span.end
            } else if out[span.end..].starts_with(' ') {
                span.start..span.end + 1
            } else {
                span
            };
            out.replace_range(range, "");
        } else {
            out.replace_range(span, &format!("({})", remaining.join(" ")));
        }
    }
    format!("{}{}", head, out)
}

/// Add an entry to the last metadata group, or open a group before the
/// first tag, or at the end of the line.
fn append_entry(line: &str, entry: &str) -> String {
    let Some((head, content)) = split_task(line) else {
        return line.to_string();
    };
    let mut out = content.to_string();
    let last_entry_end = find_groups(content)
        .last()
        .and_then(|g| g.entries.last().map(|e| e.span.end));

    if let Some(at) = last_entry_end {
        out.insert_str(at, &format!(" {}", entry));
    } else if let Some(at) = first_tag_offset(content) {
        out.insert_str(at, &format!("({}) ", entry));
    } else {
        out.insert_str(content.trim_end().len(), &format!(" ({})", entry));
    }
    format!("{}{}", head, out)
}

/// Replace the first entry with `key` in place, or append if there is none
fn set_entry(line: &str, key: &str, entry: &str) -> String {
    let Some((head, content)) = split_task(line) else {
        return line.to_string();
    };
    let existing = find_groups(content)
        .iter()
        .flat_map(|g| g.entries.iter())
        .find(|e| canonical_key(e.key) == key)
        .map(|e| e.span.clone());
    match existing {
        Some(span) => {
            let mut out = content.to_string();
            out.replace_range(span, entry);
            format!("{}{}", head, out)
        }
        None => append_entry(line, entry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::Priority;
    use crate::parse::outline_parser::parse_lines;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn find_ref(src: &SourceText, description: &str) -> TaskRef {
        let parsed = parse_lines(&src.lines);
        parsed
            .outline
            .all_tasks()
            .into_iter()
            .find(|t| t.description == description)
            .map(|t| t.task_ref())
            .unwrap()
    }

    fn id_of(src: &SourceText, description: &str) -> String {
        find_ref(src, description).id
    }

    fn toggled(text: &str, description: &str, today: &str) -> (String, Toggled) {
        let mut src = SourceText::parse(text);
        let target = find_ref(&src, description);
        let outcome = toggle(&mut src, &target, date(today)).unwrap();
        (src.serialize(), outcome)
    }

    // -----------------------------------------------------------------------
    // toggle
    // -----------------------------------------------------------------------

    #[test]
    fn test_toggle_appends_done_into_group() {
        let (text, outcome) = toggled("Work:\n    - [ ] Buy milk (due:2025-07-01)\n", "Buy milk", "2025-07-02");
        assert_eq!(text, "Work:\n    - [x] Buy milk (due:2025-07-01 done:2025-07-02)\n");
        assert_eq!(outcome, Toggled::Checked { done: date("2025-07-02") });
    }

    #[test]
    fn test_toggle_synthesizes_group_before_tags() {
        let (text, _) = toggled("Work:\n    - [ ] Call mom +family @phone\n", "Call mom", "2025-07-02");
        assert_eq!(text, "Work:\n    - [x] Call mom (done:2025-07-02) +family @phone\n");

        let (text, _) = toggled("Work:\n    - [ ] Plain\n", "Plain", "2025-07-02");
        assert_eq!(text, "Work:\n    - [x] Plain (done:2025-07-02)\n");
    }

    #[test]
    fn test_toggle_twice_restores_line() {
        for line in [
            "    - [ ] Buy milk (due:2025-07-01)",
            "    - [ ] Call mom +family @phone",
            "    - [ ] Plain",
            "\t- [ ] Tabbed (priority:B)  +x",
        ] {
            let original = format!("Work:\n{}\n# trailing comment\n", line);
            let mut src = SourceText::parse(&original);
            let target = src_ref(&src);
            toggle(&mut src, &target, date("2025-07-02")).unwrap();
            toggle(&mut src, &target, date("2025-07-02")).unwrap();
            assert_eq!(src.serialize(), original);
        }
    }

    fn src_ref(src: &SourceText) -> TaskRef {
        parse_lines(&src.lines).outline.all_tasks()[0].task_ref()
    }

    #[test]
    fn test_toggle_strips_followup_and_keeps_existing_done() {
        let (text, _) = toggled(
            "Work:\n    - [ ] Invoice (followup:2025-07-10 priority:A done:2025-06-30)\n",
            "Invoice",
            "2025-07-02",
        );
        assert_eq!(text, "Work:\n    - [x] Invoice (priority:A done:2025-06-30)\n");

        let (text, _) = toggled("Work:\n    - [ ] Ping (followup_date:2025-07-10)\n", "Ping", "2025-07-02");
        assert_eq!(text, "Work:\n    - [x] Ping (done:2025-07-02)\n");
    }

    #[test]
    fn test_untoggle_removes_done_and_empty_group() {
        let (text, outcome) = toggled(
            "Work:\n    - [X] Old (done:2025-06-01) +home\n    - [x] Other (due:2025-06-01  done:2025-06-02)\n",
            "Old",
            "2025-07-02",
        );
        assert_eq!(outcome, Toggled::Unchecked);
        assert_eq!(
            text,
            "Work:\n    - [ ] Old +home\n    - [x] Other (due:2025-06-01  done:2025-06-02)\n"
        );

        let (text, _) = toggled(
            "Work:\n    - [x] Other (due:2025-06-01  done:2025-06-02)\n",
            "Other",
            "2025-07-02",
        );
        assert_eq!(text, "Work:\n    - [ ] Other (due:2025-06-01)\n");
    }

    #[test]
    fn test_legacy_mark_converts() {
        let (text, outcome) = toggled("Work:\n    - [%] Legacy (followup:2025-07-01)\n", "Legacy", "2025-07-02");
        assert_eq!(outcome, Toggled::Converted);
        assert_eq!(text, "Work:\n    - [ ] Legacy (followup:2025-07-01)\n");
    }

    #[test]
    fn test_recurring_toggle_twice_restores_line() {
        let original = "Home:\n    - [ ] Water (due:2025-07-01 every:weekly:Mon)\n";
        let mut src = SourceText::parse(original);
        let target = src_ref(&src);
        let outcome = toggle(&mut src, &target, date("2025-07-02")).unwrap();
        assert_eq!(outcome, Toggled::Checked { done: date("2025-07-02") });
        assert_eq!(
            src.lines[1],
            "    - [x] Water (due:2025-07-01 every:weekly:Mon done:2025-07-02)"
        );
        toggle(&mut src, &target, date("2025-07-02")).unwrap();
        assert_eq!(src.serialize(), original);
    }

    fn advanced(text: &str, description: &str, today: &str) -> (String, NaiveDate) {
        let mut src = SourceText::parse(text);
        let id = id_of(&src, description);
        let next = advance(&mut src, &id, date(today)).unwrap();
        (src.serialize(), next)
    }

    #[test]
    fn test_advance_moves_due_and_records_rec() {
        let (text, next) = advanced(
            "Home:\n    - [ ] Water plants (due:2025-07-01 every:weekly:Mon)\n",
            "Water plants",
            "2025-07-02",
        );
        assert_eq!(next, date("2025-07-07"));
        assert_eq!(
            text,
            "Home:\n    - [ ] Water plants (due:2025-07-07 every:weekly:Mon rec:2025-07-02)\n"
        );

        // Due still ahead of today: advance from due, replace the old rec
        let (text, _) = advanced(
            "Home:\n    - [ ] Rent (due:2025-07-01 every:monthly:1 rec:2025-06-01)\n",
            "Rent",
            "2025-06-28",
        );
        assert_eq!(
            text,
            "Home:\n    - [ ] Rent (due:2025-08-01 every:monthly:1 rec:2025-06-28)\n"
        );
    }

    #[test]
    fn test_advance_reopens_checked_task() {
        let (text, _) = advanced(
            "Home:\n    - [x] Water (due:2025-07-01 every:daily done:2025-07-01) +garden\n",
            "Water",
            "2025-07-02",
        );
        assert_eq!(
            text,
            "Home:\n    - [ ] Water (due:2025-07-03 every:daily rec:2025-07-02) +garden\n"
        );
    }

    #[test]
    fn test_advance_requires_recurrence_and_due() {
        for text in [
            "Home:\n    - [ ] Water (due:2025-07-01)\n",
            "Home:\n    - [ ] Water (every:daily)\n",
            "Home:\n    - [ ] Water (every:daily due:someday)\n",
        ] {
            let mut src = SourceText::parse(text);
            let id = id_of(&src, "Water");
            let err = advance(&mut src, &id, date("2025-07-02")).unwrap_err();
            assert!(matches!(err, TaskError::InvalidFields(_)));
            assert_eq!(src.serialize(), text);
        }
        let mut src = SourceText::parse("Home:\n");
        assert!(matches!(
            advance(&mut src, "nope", date("2025-07-02")),
            Err(TaskError::NotFound(_))
        ));
    }

    #[test]
    fn test_toggle_matches_area_description_depth() {
        let text = "Work:\n    - [ ] Same\nHome:\n    - [ ] Same\n        - [ ] Same\n";
        let mut src = SourceText::parse(text);
        let target = TaskRef {
            id: String::new(),
            area: Some("Home".into()),
            description: "Same".into(),
            depth: 2,
        };
        toggle(&mut src, &target, date("2025-07-02")).unwrap();
        assert_eq!(src.lines[4], "        - [x] Same (done:2025-07-02)");
        assert_eq!(src.lines[1], "    - [ ] Same");
        assert_eq!(src.lines[3], "    - [ ] Same");
    }

    #[test]
    fn test_toggle_not_found_leaves_source_alone() {
        let mut src = SourceText::parse("Work:\n    - [ ] A\n");
        let before = src.clone();
        let target = TaskRef {
            id: "nope".into(),
            area: Some("Work".into()),
            description: "B".into(),
            depth: 1,
        };
        let err = toggle(&mut src, &target, date("2025-07-02")).unwrap_err();
        assert!(matches!(err, TaskError::NotFound(ref id) if id == "nope"));
        assert_eq!(src, before);
    }

    #[test]
    fn test_toggle_keeps_crlf() {
        let (text, _) = toggled("Work:\r\n    - [ ] A\r\n    - [ ] B\r\n", "A", "2025-07-02");
        assert_eq!(text, "Work:\r\n    - [x] A (done:2025-07-02)\r\n    - [ ] B\r\n");
    }

    // -----------------------------------------------------------------------
    // delete
    // -----------------------------------------------------------------------

    #[test]
    fn test_delete_task_with_subtask_and_note() {
        let text = "Work:\n    - [ ] Parent\n        - [ ] Child\n        a note\n    - [ ] Sibling\n";
        let mut src = SourceText::parse(text);
        let id = id_of(&src, "Parent");
        let removed = delete_task(&mut src, &id).unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(src.serialize(), "Work:\n    - [ ] Sibling\n");
    }

    #[test]
    fn test_delete_blank_line_rules() {
        let text = "\
Work:
    - [ ] Parent

        - [ ] Child after blank

    - [ ] Sibling
Home:
    - [ ] Last

# comment
";
        let mut src = SourceText::parse(text);
        let id = id_of(&src, "Parent");
        let removed = delete_task(&mut src, &id).unwrap();
        assert_eq!(removed, vec!["    - [ ] Parent", "", "        - [ ] Child after blank"]);
        assert_eq!(
            src.serialize(),
            "Work:\n\n    - [ ] Sibling\nHome:\n    - [ ] Last\n\n# comment\n"
        );

        let id = id_of(&src, "Last");
        delete_task(&mut src, &id).unwrap();
        assert_eq!(src.serialize(), "Work:\n\n    - [ ] Sibling\nHome:\n\n# comment\n");
    }

    #[test]
    fn test_delete_stops_at_area_header() {
        let text = "Work:\n    - [ ] A\nHome:\n    - [ ] B\n";
        let mut src = SourceText::parse(text);
        let id = id_of(&src, "A");
        delete_task(&mut src, &id).unwrap();
        assert_eq!(src.serialize(), "Work:\nHome:\n    - [ ] B\n");
    }

    #[test]
    fn test_delete_unknown_id() {
        let mut src = SourceText::parse("Work:\n    - [ ] A\n");
        assert!(matches!(delete_task(&mut src, "000000000000"), Err(TaskError::NotFound(_))));
    }

    // -----------------------------------------------------------------------
    // edit
    // -----------------------------------------------------------------------

    #[test]
    fn test_edit_keeps_mark_and_carried_metadata() {
        let text = "\
Work:
\t- [x] Old title (priority:C done:2025-06-01 effort:2h id:abcd1234) +old
\t    old note

\t    second old note
\t    - [ ] Child
";
        let mut src = SourceText::parse(text);
        let mut fields = TaskFields::new("New title");
        fields.priority = Some(Priority::A);
        fields.projects = vec!["new".into()];
        fields.notes = vec!["fresh note".into()];
        edit_task(&mut src, "abcd1234", &fields).unwrap();
        assert_eq!(
            src.serialize(),
            "\
Work:
\t- [x] New title (priority:A done:2025-06-01 effort:2h id:abcd1234) +new
\t    fresh note
\t    - [ ] Child
"
        );
    }

    #[test]
    fn test_edit_task_line_leaves_notes_verbatim() {
        let text = "\
Work:
    - [ ] Old (priority:C)
          odd indent note

        after a blank
    - [ ] Next
";
        let mut src = SourceText::parse(text);
        let id = id_of(&src, "Old");
        let mut fields = TaskFields::new("New");
        fields.notes = vec!["ignored".into()];
        edit_task_line(&mut src, &id, &fields).unwrap();
        assert_eq!(src.serialize(), text.replace("Old (priority:C)", "New"));
    }

    #[test]
    fn test_edit_drops_malformed_editable_values() {
        let mut src = SourceText::parse("Work:\n    - [ ] A (priority:Z due:soon)\n");
        let id = id_of(&src, "A");
        edit_task(&mut src, &id, &TaskFields::new("A")).unwrap();
        assert_eq!(src.lines[1], "    - [ ] A");
    }

    #[test]
    fn test_edit_rejects_invalid_fields() {
        let mut src = SourceText::parse("Work:\n    - [ ] A\n");
        let id = id_of(&src, "A");
        let before = src.clone();
        for bad in ["", "?", "two\nlines", "sneaky +tag", "hidden (due:2025-07-01)"] {
            let err = edit_task(&mut src, &id, &TaskFields::new(bad)).unwrap_err();
            assert!(matches!(err, TaskError::InvalidFields(_)), "{:?}", bad);
        }
        let mut fields = TaskFields::new("A");
        fields.notes = vec!["- [ ] not a note".into()];
        assert!(edit_task(&mut src, &id, &fields).is_err());

        let mut fields = TaskFields::new("A");
        fields.onhold = Some(DateValue::Text("ask (later)".into()));
        assert!(edit_task(&mut src, &id, &fields).is_err());
        fields.onhold = Some(DateValue::Text("ask due:2025-07-01".into()));
        assert!(edit_task(&mut src, &id, &fields).is_err());
        assert_eq!(src, before);
    }

    // -----------------------------------------------------------------------
    // create / add subtask
    // -----------------------------------------------------------------------

    #[test]
    fn test_create_after_last_line_of_area() {
        let text = "Work:\n    - [ ] A\n        note\n\nHome:\n    - [ ] B\n";
        let mut src = SourceText::parse(text);
        let mut fields = TaskFields::new("New");
        fields.due = Some(date("2025-07-03"));
        let at = create_task(&mut src, "Work", &fields, &[]).unwrap();
        assert_eq!(at, 3);
        assert_eq!(
            src.serialize(),
            "Work:\n    - [ ] A\n        note\n    - [ ] New (due:2025-07-03)\n\nHome:\n    - [ ] B\n"
        );
    }

    #[test]
    fn test_create_in_empty_area() {
        let mut src = SourceText::parse("Work:\n\nHome:\n");
        create_task(&mut src, "Work", &TaskFields::new("First"), &[]).unwrap();
        assert_eq!(src.serialize(), "Work:\n    - [ ] First\n\nHome:\n");
    }

    #[test]
    fn test_create_appends_missing_area() {
        let mut src = SourceText::parse("Work:\n    - [ ] A\n");
        let token = vec![Metadata::Id("0badcafe".into())];
        let at = create_task(&mut src, "Errands", &TaskFields::new("Stamps"), &token).unwrap();
        assert_eq!(at, 4);
        assert_eq!(
            src.serialize(),
            "Work:\n    - [ ] A\n\nErrands:\n    - [ ] Stamps (id:0badcafe)\n"
        );

        let mut empty = SourceText::parse("");
        create_task(&mut empty, "Work", &TaskFields::new("X"), &[]).unwrap();
        assert_eq!(empty.serialize(), "Work:\n    - [ ] X\n");
    }

    #[test]
    fn test_create_rejects_bad_area() {
        let mut src = SourceText::parse("");
        for area in ["", "# Notes", "Two\nlines"] {
            assert!(create_task(&mut src, area, &TaskFields::new("X"), &[]).is_err(), "{:?}", area);
        }
    }

    #[test]
    fn test_add_subtask_after_existing_children() {
        let text = "\
Work:
    - [ ] Parent
        parent note
        - [ ] Child
            child note

    - [ ] Sibling
";
        let mut src = SourceText::parse(text);
        let id = id_of(&src, "Parent");
        let mut fields = TaskFields::new("New child");
        fields.notes = vec!["with a note".into()];
        let at = add_subtask(&mut src, &id, &fields, &[]).unwrap();
        assert_eq!(at, 5);
        assert_eq!(
            src.serialize(),
            "\
Work:
    - [ ] Parent
        parent note
        - [ ] Child
            child note
        - [ ] New child
            with a note

    - [ ] Sibling
"
        );
        let parsed = parse_lines(&src.lines);
        assert_eq!(parsed.outline.top_level_tasks()[0].subtasks.len(), 2);
    }

    #[test]
    fn test_subtask_uses_parent_prefix() {
        let mut src = SourceText::parse("Work:\n\t- [ ] Parent\n");
        let id = id_of(&src, "Parent");
        add_subtask(&mut src, &id, &TaskFields::new("Child"), &[]).unwrap();
        assert_eq!(src.lines[2], "\t    - [ ] Child");
    }

    #[test]
    fn test_subtask_under_unindented_parent_nests() {
        let mut src = SourceText::parse("Work:\n- [ ] Parent\n    - [ ] Sibling\n");
        let id = id_of(&src, "Parent");
        let at = add_subtask(&mut src, &id, &TaskFields::new("Child"), &[]).unwrap();
        assert_eq!(at, 2);
        assert_eq!(
            src.serialize(),
            "Work:\n- [ ] Parent\n        - [ ] Child\n    - [ ] Sibling\n"
        );

        let parsed = parse_lines(&src.lines);
        let tops = parsed.outline.top_level_tasks();
        assert_eq!(tops.len(), 2);
        assert_eq!(tops[0].subtasks[0].description, "Child");
        assert_eq!(tops[0].subtasks[0].depth, 2);
    }

    #[test]
    fn test_delete_unindented_task_keeps_depth_one_sibling() {
        let mut src = SourceText::parse("Work:\n- [ ] A\n        - [ ] A1\n    - [ ] B\n");
        let id = id_of(&src, "A");
        let removed = delete_task(&mut src, &id).unwrap();
        assert_eq!(removed, vec!["- [ ] A", "        - [ ] A1"]);
        assert_eq!(src.serialize(), "Work:\n    - [ ] B\n");
    }

    #[test]
    fn test_token_survives_insertion_above() {
        let mut src = SourceText::parse("Work:\n    - [ ] Keep (id:abcd1234)\n");
        create_task(&mut src, "Work", &TaskFields::new("Other"), &[]).unwrap();
        src.lines.insert(1, "    - [ ] Inserted above".to_string());
        assert_eq!(locate_by_id(&src.lines, "abcd1234"), Some(2));
    }

    #[test]
    fn test_comments_and_malformed_lines_survive() {
        let text = "# header comment\nstray text\nWork:\n    - [ ] A\n# mid comment\n    - [ ] B\n";
        let mut src = SourceText::parse(text);
        let target = find_ref(&src, "A");
        toggle(&mut src, &target, date("2025-07-02")).unwrap();
        let id = id_of(&src, "B");
        delete_task(&mut src, &id).unwrap();
        assert_eq!(
            src.serialize(),
            "# header comment\nstray text\nWork:\n    - [x] A (done:2025-07-02)\n# mid comment\n"
        );
    }
}
