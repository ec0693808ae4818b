use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Checkbox mark as written in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Unchecked,
    Checked,
    /// `[%]`, the old way of flagging a follow-up
    LegacyFollowUp,
}

impl Mark {
    /// The character written inside the checkbox `[ ]`
    pub fn checkbox_char(self) -> char {
        match self {
            Mark::Unchecked => ' ',
            Mark::Checked => 'x',
            Mark::LegacyFollowUp => '%',
        }
    }

    /// Parse a checkbox character into a mark
    pub fn from_checkbox_char(c: char) -> Option<Mark> {
        match c {
            ' ' => Some(Mark::Unchecked),
            'x' | 'X' => Some(Mark::Checked),
            '%' => Some(Mark::LegacyFollowUp),
            _ => None,
        }
    }
}

/// The single canonical state of a task. Always derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Incomplete,
    Done,
    OnHold,
    FollowUp,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Incomplete => write!(f, "incomplete"),
            Status::Done => write!(f, "done"),
            Status::OnHold => write!(f, "onhold"),
            Status::FollowUp => write!(f, "followup"),
        }
    }
}

/// Priority letter, A (highest) through F
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Priority {
    pub const ALL: [Priority; 6] = [
        Priority::A,
        Priority::B,
        Priority::C,
        Priority::D,
        Priority::E,
        Priority::F,
    ];

    /// Parse a single letter, case-insensitive
    pub fn from_letter(s: &str) -> Option<Priority> {
        let mut chars = s.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        match c.to_ascii_uppercase() {
            'A' => Some(Priority::A),
            'B' => Some(Priority::B),
            'C' => Some(Priority::C),
            'D' => Some(Priority::D),
            'E' => Some(Priority::E),
            'F' => Some(Priority::F),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Priority::A => 'A',
            Priority::B => 'B',
            Priority::C => 'C',
            Priority::D => 'D',
            Priority::E => 'E',
            Priority::F => 'F',
        }
    }

    /// Sort rank, 0 for A
    pub fn rank(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// A date-valued metadata entry. Values that are not `YYYY-MM-DD` are kept
/// as text: for `onhold`/`followup` that is a free-text condition, for
/// `due`/`done` it is a malformed date that sorts as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateValue {
    Date(NaiveDate),
    Text(String),
}

impl DateValue {
    pub fn parse(raw: &str) -> DateValue {
        match parse_iso_date(raw) {
            Some(date) => DateValue::Date(date),
            None => DateValue::Text(raw.trim().to_string()),
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            DateValue::Date(d) => Some(*d),
            DateValue::Text(_) => None,
        }
    }
}

impl fmt::Display for DateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            DateValue::Text(t) => write!(f, "{}", t),
        }
    }
}

/// Strict `YYYY-MM-DD`
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let bytes = raw.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    if !bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit())
    {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Recurrence rule from `every:`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Recurrence {
    Daily,
    Weekly(Weekday),
    /// Day of month, clamped to the month's length
    Monthly(u32),
    Yearly { month: u32, day: u32 },
    /// Every N days
    Custom(u32),
}

impl Recurrence {
    /// First occurrence strictly after `date`
    pub fn next_after(&self, date: NaiveDate) -> NaiveDate {
        match *self {
            Recurrence::Daily => date + Duration::days(1),
            Recurrence::Weekly(weekday) => {
                let target = weekday.num_days_from_monday() as i64;
                let current = date.weekday().num_days_from_monday() as i64;
                let mut ahead = (target - current).rem_euclid(7);
                if ahead == 0 {
                    ahead = 7;
                }
                date + Duration::days(ahead)
            }
            Recurrence::Monthly(day) => {
                let this_month = clamped_date(date.year(), date.month(), day);
                if this_month > date {
                    this_month
                } else {
                    let (y, m) = if date.month() == 12 {
                        (date.year() + 1, 1)
                    } else {
                        (date.year(), date.month() + 1)
                    };
                    clamped_date(y, m, day)
                }
            }
            Recurrence::Yearly { month, day } => {
                let this_year = clamped_date(date.year(), month, day);
                if this_year > date {
                    this_year
                } else {
                    clamped_date(date.year() + 1, month, day)
                }
            }
            Recurrence::Custom(days) => date + Duration::days(days as i64),
        }
    }
}

/// Build a date, pulling the day back to the month's last valid day.
fn clamped_date(year: i32, month: u32, day: u32) -> NaiveDate {
    let mut d = day.min(31);
    loop {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, d) {
            return date;
        }
        if d <= 1 {
            return NaiveDate::MIN;
        }
        d -= 1;
    }
}

impl FromStr for Recurrence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, arg) = match s.split_once(':') {
            Some((k, a)) => (k, Some(a)),
            None => (s, None),
        };
        match (kind.to_ascii_lowercase().as_str(), arg) {
            ("daily", None) => Ok(Recurrence::Daily),
            ("weekly", Some(day)) => day
                .parse::<Weekday>()
                .map(Recurrence::Weekly)
                .map_err(|_| format!("invalid weekday '{}'", day)),
            ("monthly", Some(day)) => match day.parse::<u32>() {
                Ok(d) if (1..=31).contains(&d) => Ok(Recurrence::Monthly(d)),
                _ => Err(format!("invalid day of month '{}'", day)),
            },
            ("yearly", Some(md)) => {
                let parsed = md.split_once('-').and_then(|(m, d)| {
                    let m = m.parse::<u32>().ok()?;
                    let d = d.parse::<u32>().ok()?;
                    // 2000 is a leap year, so 02-29 is accepted
                    NaiveDate::from_ymd_opt(2000, m, d).map(|_| (m, d))
                });
                parsed
                    .map(|(month, day)| Recurrence::Yearly { month, day })
                    .ok_or_else(|| format!("invalid month-day '{}'", md))
            }
            ("custom", Some(n)) => match n.strip_suffix('d').and_then(|n| n.parse::<u32>().ok()) {
                Some(days) if days > 0 => Ok(Recurrence::Custom(days)),
                _ => Err(format!("invalid interval '{}' (expected e.g. 3d)", n)),
            },
            _ => Err(format!("unknown recurrence '{}'", s)),
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recurrence::Daily => write!(f, "daily"),
            Recurrence::Weekly(day) => write!(f, "weekly:{}", day),
            Recurrence::Monthly(day) => write!(f, "monthly:{}", day),
            Recurrence::Yearly { month, day } => write!(f, "yearly:{:02}-{:02}", month, day),
            Recurrence::Custom(days) => write!(f, "custom:{}d", days),
        }
    }
}

impl From<Recurrence> for String {
    fn from(r: Recurrence) -> String {
        r.to_string()
    }
}

impl TryFrom<String> for Recurrence {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Completion percentage from `progress:NN%`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Progress(pub u8);

impl FromStr for Progress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .trim()
            .strip_suffix('%')
            .ok_or_else(|| format!("invalid progress '{}' (expected NN%)", s))?;
        match digits.parse::<u8>() {
            Ok(n) if n <= 100 => Ok(Progress(n)),
            _ => Err(format!("invalid progress '{}' (expected 0-100%)", s)),
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// A single `key:value` metadata entry on a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Metadata {
    /// `priority:A`
    Priority(Priority),
    /// `due:2025-07-01`
    Due(DateValue),
    /// `done:2025-07-01`
    Done(DateValue),
    /// `followup:2025-07-01` or `followup_date:…`
    FollowUp(DateValue),
    /// `onhold:2025-07-01` or `onhold:waiting on Bob`
    OnHold(DateValue),
    /// `every:weekly:Mon`
    Every(Recurrence),
    /// `progress:40%`
    Progress(Progress),
    /// `rec:2025-07-01`, last completion of a recurring task
    Rec(DateValue),
    /// `id:3f9a0c1e`, persisted identity token
    Id(String),
    /// Anything else, kept verbatim
    Other { key: String, value: String },
}

impl Metadata {
    /// Canonical key name for this entry
    pub fn key(&self) -> &str {
        match self {
            Metadata::Priority(_) => "priority",
            Metadata::Due(_) => "due",
            Metadata::Done(_) => "done",
            Metadata::FollowUp(_) => "followup",
            Metadata::OnHold(_) => "onhold",
            Metadata::Every(_) => "every",
            Metadata::Progress(_) => "progress",
            Metadata::Rec(_) => "rec",
            Metadata::Id(_) => "id",
            Metadata::Other { key, .. } => key,
        }
    }

    pub fn value_text(&self) -> String {
        match self {
            Metadata::Priority(p) => p.to_string(),
            Metadata::Due(v)
            | Metadata::Done(v)
            | Metadata::FollowUp(v)
            | Metadata::OnHold(v)
            | Metadata::Rec(v) => v.to_string(),
            Metadata::Every(r) => r.to_string(),
            Metadata::Progress(p) => p.to_string(),
            Metadata::Id(id) => id.clone(),
            Metadata::Other { value, .. } => value.clone(),
        }
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key(), self.value_text())
    }
}

/// The handle a caller uses to address one task in the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: String,
    pub area: Option<String>,
    pub description: String,
    pub depth: usize,
}

/// A task with all its parsed fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Persisted `id:` token if present, otherwise derived from position
    pub id: String,
    /// Description with tags and metadata stripped
    pub description: String,
    /// Owning area, `None` before the first header
    pub area: Option<String>,
    /// Indentation width / 4
    pub depth: usize,
    pub mark: Mark,
    /// Own metadata entries, in file order
    pub metadata: Vec<Metadata>,
    /// Values taken from ancestors for keys this task does not set itself
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherited: Vec<Metadata>,
    /// `+project` tags; the first is primary
    pub projects: Vec<String>,
    /// `@context` tags; the first is primary
    pub contexts: Vec<String>,
    pub notes: Vec<String>,
    pub subtasks: Vec<Task>,
    /// Source line (0-indexed) at parse time
    pub line: usize,
}

impl Task {
    fn own(&self, key: &str) -> Option<&Metadata> {
        self.metadata.iter().find(|m| m.key() == key)
    }

    fn own_or_inherited(&self, key: &str) -> Option<&Metadata> {
        self.own(key)
            .or_else(|| self.inherited.iter().find(|m| m.key() == key))
    }

    pub fn priority(&self) -> Option<Priority> {
        match self.own_or_inherited("priority") {
            Some(Metadata::Priority(p)) => Some(*p),
            _ => None,
        }
    }

    /// Effective due date. An explicit but malformed `due:` blocks inheritance.
    pub fn due(&self) -> Option<NaiveDate> {
        match self.own_or_inherited("due") {
            Some(Metadata::Due(v)) => v.as_date(),
            _ => None,
        }
    }

    pub fn done_date(&self) -> Option<NaiveDate> {
        match self.own("done") {
            Some(Metadata::Done(v)) => v.as_date(),
            _ => None,
        }
    }

    /// Raw `onhold:` value, expired or not
    pub fn onhold(&self) -> Option<&DateValue> {
        match self.own("onhold") {
            Some(Metadata::OnHold(v)) => Some(v),
            _ => None,
        }
    }

    pub fn followup(&self) -> Option<&DateValue> {
        match self.own("followup") {
            Some(Metadata::FollowUp(v)) => Some(v),
            _ => None,
        }
    }

    pub fn recurrence(&self) -> Option<Recurrence> {
        match self.own("every") {
            Some(Metadata::Every(r)) => Some(*r),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<Progress> {
        match self.own("progress") {
            Some(Metadata::Progress(p)) => Some(*p),
            _ => None,
        }
    }

    /// Persisted identity token, if the line carries one
    pub fn token(&self) -> Option<&str> {
        match self.own("id") {
            Some(Metadata::Id(id)) => Some(id),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.mark == Mark::Checked
    }

    pub fn primary_project(&self) -> Option<&str> {
        self.projects.first().map(|s| s.as_str())
    }

    pub fn extra_projects(&self) -> &[String] {
        self.projects.get(1..).unwrap_or(&[])
    }

    pub fn primary_context(&self) -> Option<&str> {
        self.contexts.first().map(|s| s.as_str())
    }

    pub fn extra_contexts(&self) -> &[String] {
        self.contexts.get(1..).unwrap_or(&[])
    }

    pub fn task_ref(&self) -> TaskRef {
        TaskRef {
            id: self.id.clone(),
            area: self.area.clone(),
            description: self.description.clone(),
            depth: self.depth,
        }
    }

    /// Visit this task and all descendants, depth-first
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Task)) {
        f(self);
        for sub in &self.subtasks {
            sub.walk(f);
        }
    }
}

/// Editable fields for creating or rewriting a task line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFields {
    pub description: String,
    pub priority: Option<Priority>,
    pub due: Option<NaiveDate>,
    pub onhold: Option<DateValue>,
    pub followup: Option<DateValue>,
    pub every: Option<Recurrence>,
    pub progress: Option<Progress>,
    pub projects: Vec<String>,
    pub contexts: Vec<String>,
    pub notes: Vec<String>,
}

impl TaskFields {
    pub fn new(description: impl Into<String>) -> Self {
        TaskFields {
            description: description.into(),
            ..Default::default()
        }
    }

    /// Metadata entries these fields produce, in canonical order
    pub fn metadata(&self) -> Vec<Metadata> {
        let mut out = Vec::new();
        if let Some(p) = self.priority {
            out.push(Metadata::Priority(p));
        }
        if let Some(d) = self.due {
            out.push(Metadata::Due(DateValue::Date(d)));
        }
        if let Some(r) = self.every {
            out.push(Metadata::Every(r));
        }
        if let Some(ref v) = self.onhold {
            out.push(Metadata::OnHold(v.clone()));
        }
        if let Some(ref v) = self.followup {
            out.push(Metadata::FollowUp(v.clone()));
        }
        if let Some(p) = self.progress {
            out.push(Metadata::Progress(p));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_mark_chars() {
        assert_eq!(Mark::from_checkbox_char(' '), Some(Mark::Unchecked));
        assert_eq!(Mark::from_checkbox_char('X'), Some(Mark::Checked));
        assert_eq!(Mark::from_checkbox_char('%'), Some(Mark::LegacyFollowUp));
        assert_eq!(Mark::from_checkbox_char('>'), None);
        assert_eq!(Mark::Checked.checkbox_char(), 'x');
    }

    #[test]
    fn test_priority_letters() {
        assert_eq!(Priority::from_letter("a"), Some(Priority::A));
        assert_eq!(Priority::from_letter("F"), Some(Priority::F));
        assert_eq!(Priority::from_letter("G"), None);
        assert_eq!(Priority::from_letter("AB"), None);
        assert!(Priority::A.rank() < Priority::C.rank());
    }

    #[test]
    fn test_strict_iso_dates() {
        assert_eq!(parse_iso_date("2025-07-01"), Some(date("2025-07-01")));
        assert_eq!(parse_iso_date("2025-7-1"), None);
        assert_eq!(parse_iso_date("2025-02-30"), None);
        assert_eq!(parse_iso_date("tomorrow"), None);
        assert_eq!(
            DateValue::parse("waiting on Bob"),
            DateValue::Text("waiting on Bob".into())
        );
    }

    #[test]
    fn test_recurrence_parse_and_display() {
        for raw in ["daily", "weekly:Mon", "monthly:31", "yearly:02-29", "custom:10d"] {
            let r: Recurrence = raw.parse().unwrap();
            assert_eq!(r.to_string(), raw);
        }
        assert!("weekly".parse::<Recurrence>().is_err());
        assert!("monthly:32".parse::<Recurrence>().is_err());
        assert!("custom:0d".parse::<Recurrence>().is_err());
        assert!("fortnightly".parse::<Recurrence>().is_err());
    }

    #[test]
    fn test_recurrence_next_after() {
        // 2025-07-01 is a Tuesday
        let tue = date("2025-07-01");
        assert_eq!(Recurrence::Daily.next_after(tue), date("2025-07-02"));
        assert_eq!(
            Recurrence::Weekly(Weekday::Mon).next_after(tue),
            date("2025-07-07")
        );
        assert_eq!(
            Recurrence::Weekly(Weekday::Tue).next_after(tue),
            date("2025-07-08")
        );
        assert_eq!(
            Recurrence::Monthly(31).next_after(date("2025-01-31")),
            date("2025-02-28")
        );
        assert_eq!(
            Recurrence::Monthly(15).next_after(date("2025-12-20")),
            date("2026-01-15")
        );
        assert_eq!(
            Recurrence::Yearly { month: 7, day: 4 }.next_after(date("2025-07-04")),
            date("2026-07-04")
        );
        assert_eq!(Recurrence::Custom(3).next_after(tue), date("2025-07-04"));
    }

    #[test]
    fn test_progress_parse() {
        assert_eq!("40%".parse::<Progress>(), Ok(Progress(40)));
        assert!("40".parse::<Progress>().is_err());
        assert!("140%".parse::<Progress>().is_err());
    }

    #[test]
    fn test_metadata_display() {
        assert_eq!(Metadata::Priority(Priority::B).to_string(), "priority:B");
        assert_eq!(
            Metadata::Due(DateValue::parse("2025-07-01")).to_string(),
            "due:2025-07-01"
        );
        assert_eq!(
            Metadata::Every(Recurrence::Weekly(Weekday::Fri)).to_string(),
            "every:weekly:Fri"
        );
        assert_eq!(
            Metadata::Other {
                key: "effort".into(),
                value: "2h".into()
            }
            .to_string(),
            "effort:2h"
        );
    }

    #[test]
    fn test_explicit_value_beats_inherited() {
        let task = Task {
            id: "x".into(),
            description: "Sub".into(),
            area: None,
            depth: 2,
            mark: Mark::Unchecked,
            metadata: vec![Metadata::Due(DateValue::Text("soon".into()))],
            inherited: vec![
                Metadata::Due(DateValue::parse("2025-07-01")),
                Metadata::Priority(Priority::A),
            ],
            projects: vec!["home".into(), "garden".into()],
            contexts: Vec::new(),
            notes: Vec::new(),
            subtasks: Vec::new(),
            line: 0,
        };
        assert_eq!(task.due(), None);
        assert_eq!(task.priority(), Some(Priority::A));
        assert_eq!(task.primary_project(), Some("home"));
        assert_eq!(task.extra_projects(), &["garden".to_string()]);
        assert!(task.extra_contexts().is_empty());
    }
}
