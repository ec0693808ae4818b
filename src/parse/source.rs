/// Line terminator used by a file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// The raw lines of a task file, plus what is needed to write them back
/// byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub lines: Vec<String>,
    pub line_ending: LineEnding,
    pub trailing_newline: bool,
}

impl Default for SourceText {
    fn default() -> Self {
        SourceText {
            lines: Vec::new(),
            line_ending: LineEnding::Lf,
            // New content written into an empty file gets a final newline
            trailing_newline: true,
        }
    }
}

impl SourceText {
    /// Split file content into lines. The line ending is taken from the
    /// first line break.
    pub fn parse(text: &str) -> SourceText {
        if text.is_empty() {
            return SourceText::default();
        }

        let line_ending = match text.find('\n') {
            Some(i) if i > 0 && text.as_bytes()[i - 1] == b'\r' => LineEnding::CrLf,
            _ => LineEnding::Lf,
        };
        let trailing_newline = text.ends_with('\n');
        let body = if trailing_newline {
            &text[..text.len() - 1]
        } else {
            text
        };

        let mut lines: Vec<String> = body.split('\n').map(|l| l.to_string()).collect();
        if line_ending == LineEnding::CrLf {
            for line in &mut lines {
                if line.ends_with('\r') {
                    line.pop();
                }
            }
        }

        SourceText {
            lines,
            line_ending,
            trailing_newline,
        }
    }

    /// Join the lines back into file content
    pub fn serialize(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let sep = self.line_ending.as_str();
        let mut out = self.lines.join(sep);
        if self.trailing_newline {
            out.push_str(sep);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
