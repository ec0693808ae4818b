pub mod identity;
pub mod line;
pub mod metadata;
pub mod outline_parser;
pub mod scan;
pub mod source;
pub mod task_serializer;

pub use metadata::{extract, fields_from_text};
pub use outline_parser::{Diagnostic, DiagnosticKind, ParsedOutline, parse_lines, parse_outline};
pub use source::{LineEnding, SourceText};
pub use task_serializer::render_task_line;
