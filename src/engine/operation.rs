use crate::engine::errors::BoxError;
use crate::engine::matcher::{LineSpan, Occurrence, Pattern};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Content transformation for [`PatchOperation::UpdateContent`].
pub type UpdateFn = Box<dyn Fn(&str) -> Result<String, BoxError> + Send + Sync>;

/// Helper handed to [`ReplaceFn`]; see [`crate::engine::json::omit`].
pub type OmitFn = fn(&Value, &[&str]) -> Value;

/// Document transformation for [`PatchOperation::EditJson`].
pub type ReplaceFn = Box<dyn Fn(Value, OmitFn) -> Result<Value, BoxError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Before,
    After,
}

/// Insert literal lines next to every targeted anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddLine {
    pub position: Position,
    pub pattern: Pattern,
    pub lines: Vec<String>,
    pub indent: Option<String>,
    pub occurrence: Occurrence,
}

impl AddLine {
    pub fn new<I, S>(position: Position, pattern: Pattern, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            position,
            pattern,
            lines: lines.into_iter().map(Into::into).collect(),
            indent: None,
            occurrence: Occurrence::all(),
        }
    }

    pub fn before<I, S>(pattern: Pattern, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Position::Before, pattern, lines)
    }

    pub fn after<I, S>(pattern: Pattern, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Position::After, pattern, lines)
    }

    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = Some(indent.into());
        self
    }

    pub fn with_occurrence(mut self, occurrence: Occurrence) -> Self {
        self.occurrence = occurrence;
        self
    }

    /// Lines as they will be written, indent applied.
    pub(crate) fn rendered_lines(&self) -> Vec<String> {
        let indent = self.indent.as_deref().unwrap_or("");
        self.lines
            .iter()
            .map(|line| format!("{indent}{line}"))
            .collect()
    }
}

/// Remove every targeted anchor, or a span of lines around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveLine {
    pub pattern: Pattern,
    pub occurrence: Occurrence,
    pub span: Option<LineSpan>,
}

impl RemoveLine {
    pub fn new(pattern: Pattern) -> Self {
        Self {
            pattern,
            occurrence: Occurrence::all(),
            span: None,
        }
    }

    pub fn with_occurrence(mut self, occurrence: Occurrence) -> Self {
        self.occurrence = occurrence;
        self
    }

    pub fn with_span(mut self, span: LineSpan) -> Self {
        self.span = Some(span);
        self
    }
}

/// A single step of a file edit.
pub enum PatchOperation {
    AddLine(AddLine),
    RemoveLine(RemoveLine),
    UpdateContent { update: UpdateFn },
    EditJson { replace: ReplaceFn },
}

impl PatchOperation {
    pub fn update_content<F>(update: F) -> Self
    where
        F: Fn(&str) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        PatchOperation::UpdateContent {
            update: Box::new(update),
        }
    }

    pub fn edit_json<F>(replace: F) -> Self
    where
        F: Fn(Value, OmitFn) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        PatchOperation::EditJson {
            replace: Box::new(replace),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PatchOperation::AddLine(_) => "add-line",
            PatchOperation::RemoveLine(_) => "remove-line",
            PatchOperation::UpdateContent { .. } => "update-content",
            PatchOperation::EditJson { .. } => "edit-json",
        }
    }
}

impl From<AddLine> for PatchOperation {
    fn from(op: AddLine) -> Self {
        PatchOperation::AddLine(op)
    }
}

impl From<RemoveLine> for PatchOperation {
    fn from(op: RemoveLine) -> Self {
        PatchOperation::RemoveLine(op)
    }
}

impl fmt::Debug for PatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOperation::AddLine(op) => f.debug_tuple("AddLine").field(op).finish(),
            PatchOperation::RemoveLine(op) => f.debug_tuple("RemoveLine").field(op).finish(),
            PatchOperation::UpdateContent { .. } => f.write_str("UpdateContent { .. }"),
            PatchOperation::EditJson { .. } => f.write_str("EditJson { .. }"),
        }
    }
}

/// What a single operation did to the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    LinesAdded { anchors: usize, lines: usize },
    LinesRemoved { lines: usize },
    /// No line matched the pattern or the occurrence window was empty.
    AnchorNotFound,
    Rewritten { changed: bool },
}

impl OperationOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(
            self,
            OperationOutcome::AnchorNotFound | OperationOutcome::Rewritten { changed: false }
        )
    }
}
