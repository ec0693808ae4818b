use crate::model::task::Metadata;
use crate::parse::identity::derive_id;
use crate::parse::line::{LineKind, TaskLine, classify};
use crate::parse::metadata::{Extracted, extract};

/// A task line with its content already pulled apart
#[derive(Debug, Clone)]
pub struct ScannedTask<'a> {
    pub line: TaskLine<'a>,
    pub extracted: Extracted,
    pub id: String,
}

impl ScannedTask<'_> {
    /// Empty or `?` content: not a real task
    pub fn is_placeholder(&self) -> bool {
        let d = self.extracted.description.as_str();
        d.is_empty() || d == "?"
    }
}

#[derive(Debug, Clone)]
pub enum ScanKind<'a> {
    Blank,
    Comment,
    Area { name: &'a str },
    Task(ScannedTask<'a>),
    Note { width: usize, text: &'a str },
    Malformed,
}

/// One classified line, with the area it sits in
#[derive(Debug, Clone)]
pub struct ScannedLine<'a> {
    pub index: usize,
    pub raw: &'a str,
    /// Area open at this line; for a header, the area it opens
    pub area: Option<&'a str>,
    pub kind: ScanKind<'a>,
}

impl<'a> ScannedLine<'a> {
    pub fn task(&self) -> Option<&ScannedTask<'a>> {
        match &self.kind {
            ScanKind::Task(t) => Some(t),
            _ => None,
        }
    }
}

/// Classify every line, track the current area and compute task identity.
/// Parser and mutator both go through here so they agree on what a line is.
pub fn scan(lines: &[String]) -> Vec<ScannedLine<'_>> {
    let mut area: Option<&str> = None;
    let mut out = Vec::with_capacity(lines.len());

    for (index, raw) in lines.iter().enumerate() {
        let kind = match classify(raw) {
            LineKind::Blank => ScanKind::Blank,
            LineKind::Comment => ScanKind::Comment,
            LineKind::Malformed => ScanKind::Malformed,
            LineKind::Note { width, text } => ScanKind::Note { width, text },
            LineKind::Area { name } => {
                area = Some(name);
                ScanKind::Area { name }
            }
            LineKind::Task(line) => {
                let extracted = extract(line.content);
                let id = token_of(&extracted.metadata).unwrap_or_else(|| {
                    derive_id(area, &extracted.description, line.depth, index)
                });
                ScanKind::Task(ScannedTask {
                    line,
                    extracted,
                    id,
                })
            }
        };
        out.push(ScannedLine {
            index,
            raw,
            area,
            kind,
        });
    }

    out
}

fn token_of(metadata: &[Metadata]) -> Option<String> {
    metadata.iter().find_map(|m| match m {
        Metadata::Id(id) => Some(id.clone()),
        _ => None,
    })
}
