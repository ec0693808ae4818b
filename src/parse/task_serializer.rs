use crate::model::task::{Mark, Metadata, TaskFields};
use crate::parse::line::{INDENT_UNIT, indent_width};

/// Render a task line in canonical form:
/// `<prefix>- [m] description (key:value …) +project @context`
///
/// `extra` entries (done, rec, id, unknown keys) follow the editable ones.
pub fn render_task_line(prefix: &str, mark: Mark, fields: &TaskFields, extra: &[Metadata]) -> String {
    let mut line = format!("{}- [{}] {}", prefix, mark.checkbox_char(), fields.description.trim());

    let entries: Vec<String> = fields
        .metadata()
        .iter()
        .chain(extra)
        .map(|m| m.to_string())
        .collect();
    if !entries.is_empty() {
        line.push_str(&format!(" ({})", entries.join(" ")));
    }

    for project in &fields.projects {
        line.push_str(&format!(" +{}", project));
    }
    for context in &fields.contexts {
        line.push_str(&format!(" @{}", context));
    }
    line
}

/// Render note lines one level deeper than the task's own prefix
pub fn render_notes(prefix: &str, notes: &[String]) -> Vec<String> {
    let indent = format!("{}{}", prefix, " ".repeat(INDENT_UNIT));
    notes
        .iter()
        .map(|note| {
            let note = note.trim();
            if note.is_empty() {
                String::new()
            } else {
                format!("{}{}", indent, note)
            }
        })
        .collect()
}

/// Indentation prefix for a child of a line with `prefix`: one level
/// deeper, and at least depth 2, the first depth that nests under a task.
pub fn child_prefix(prefix: &str) -> String {
    let width = indent_width(prefix);
    let depth = (width / INDENT_UNIT + 1).max(2);
    format!("{}{}", prefix, " ".repeat(depth * INDENT_UNIT - width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{DateValue, Priority};
    use crate::parse::metadata::extract;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_minimal_line() {
        let fields = TaskFields::new("Buy milk");
        assert_eq!(
            render_task_line("    ", Mark::Unchecked, &fields, &[]),
            "    - [ ] Buy milk"
        );
    }

    #[test]
    fn test_full_line() {
        let mut fields = TaskFields::new("Plan trip");
        fields.priority = Some(Priority::B);
        fields.due = NaiveDate::from_ymd_opt(2025, 7, 1);
        fields.onhold = Some(DateValue::Text("waiting on Bob".into()));
        fields.projects = vec!["travel".into()];
        fields.contexts = vec!["home".into(), "laptop".into()];
        let extra = vec![Metadata::Id("abcd1234".into())];
        let line = render_task_line("        ", Mark::Checked, &fields, &extra);
        assert_eq!(
            line,
            "        - [x] Plan trip (priority:B due:2025-07-01 onhold:waiting on Bob id:abcd1234) +travel @home @laptop"
        );
    }

    #[test]
    fn test_rendered_line_parses_back() {
        let mut fields = TaskFields::new("Water plants");
        fields.every = Some("weekly:Sat".parse().unwrap());
        fields.progress = Some("40%".parse().unwrap());
        fields.projects = vec!["garden".into()];
        let line = render_task_line("", Mark::Unchecked, &fields, &[]);
        let content = line.strip_prefix("- [ ] ").unwrap();
        let ex = extract(content);
        assert_eq!(ex.description, "Water plants");
        assert_eq!(ex.metadata, fields.metadata());
        assert_eq!(ex.projects, fields.projects);
        assert!(ex.problems.is_empty());
    }

    #[test]
    fn test_notes_indent() {
        let notes = vec!["first".to_string(), String::new(), "  second ".to_string()];
        assert_eq!(
            render_notes("\t", &notes),
            vec!["\t    first", "", "\t    second"]
        );
        assert_eq!(child_prefix("    "), "        ");
        assert_eq!(child_prefix("\t"), "\t    ");
        // Depth 0 and 1 are both top level
        assert_eq!(child_prefix(""), "        ");
        assert_eq!(child_prefix("  "), "        ");
        // Off-grid indentation snaps to the next level
        assert_eq!(child_prefix("      "), "        ");
        assert_eq!(child_prefix("         "), "            ");
    }
}
