//! Text patch engine.
//!
//! [`apply_edits`] runs an ordered list of [`PatchOperation`]s over in-memory
//! content and returns the new content. Every operation sees the output of
//! the previous one. Line operations whose anchor is missing leave the
//! content untouched; transformation failures abort the whole sequence.

pub mod errors;
pub mod json;
pub mod lines;
pub mod matcher;
pub mod operation;

pub use errors::{BoxError, PatchError, TransformError};
pub use json::omit;
pub use lines::{LineBuffer, Newline};
pub use matcher::{LineSpan, Occurrence, Pattern};
pub use operation::{
    AddLine, OmitFn, OperationOutcome, PatchOperation, Position, RemoveLine, ReplaceFn, UpdateFn,
};

use tracing::debug;

/// Result of [`apply_edits_with_report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditReport {
    pub content: String,
    /// One entry per operation, in application order.
    pub outcomes: Vec<OperationOutcome>,
}

impl EditReport {
    pub fn anchors_missed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| **outcome == OperationOutcome::AnchorNotFound)
            .count()
    }
}

/// Apply `operations` to `content` in order.
pub fn apply_edits(content: &str, operations: &[PatchOperation]) -> Result<String, PatchError> {
    apply_edits_with_report(content, operations).map(|report| report.content)
}

/// Like [`apply_edits`], also reporting what each operation did.
pub fn apply_edits_with_report(
    content: &str,
    operations: &[PatchOperation],
) -> Result<EditReport, PatchError> {
    let mut current = content.to_string();
    let mut outcomes = Vec::with_capacity(operations.len());

    for (index, operation) in operations.iter().enumerate() {
        let (next, outcome) = apply_operation(&current, operation).map_err(|source| {
            PatchError::Transform {
                index,
                kind: operation.kind(),
                source,
            }
        })?;

        if outcome == OperationOutcome::AnchorNotFound {
            debug!(index, kind = operation.kind(), "anchor not found, skipping");
        }

        current = next;
        outcomes.push(outcome);
    }

    Ok(EditReport {
        content: current,
        outcomes,
    })
}

fn apply_operation(
    content: &str,
    operation: &PatchOperation,
) -> Result<(String, OperationOutcome), TransformError> {
    match operation {
        PatchOperation::AddLine(op) => Ok(add_line(content, op)),
        PatchOperation::RemoveLine(op) => Ok(remove_line(content, op)),
        PatchOperation::UpdateContent { update } => {
            let updated = update(content).map_err(TransformError::Callback)?;
            let changed = updated != content;
            Ok((updated, OperationOutcome::Rewritten { changed }))
        }
        PatchOperation::EditJson { replace } => {
            let updated = json::edit_json(content, replace)?;
            let changed = updated != content;
            Ok((updated, OperationOutcome::Rewritten { changed }))
        }
    }
}

fn add_line(content: &str, op: &AddLine) -> (String, OperationOutcome) {
    let mut buffer = LineBuffer::parse(content);
    let matches = op.pattern.matching_lines(buffer.lines());
    let targets = op.occurrence.select(&matches);
    if targets.is_empty() {
        return (content.to_string(), OperationOutcome::AnchorNotFound);
    }

    let new_lines = op.rendered_lines();

    // Bottom to top so pending anchors keep their indices.
    for &anchor in targets.iter().rev() {
        let at = match op.position {
            Position::Before => anchor,
            Position::After => anchor + 1,
        };
        buffer.insert_at(at, new_lines.iter().cloned());
    }

    let outcome = OperationOutcome::LinesAdded {
        anchors: targets.len(),
        lines: new_lines.len() * targets.len(),
    };
    (buffer.render(), outcome)
}

fn remove_line(content: &str, op: &RemoveLine) -> (String, OperationOutcome) {
    let mut buffer = LineBuffer::parse(content);
    let matches = op.pattern.matching_lines(buffer.lines());
    let targets = op.occurrence.select(&matches);
    let doomed = matcher::removal_set(targets, op.span, buffer.len());
    if doomed.is_empty() {
        return (content.to_string(), OperationOutcome::AnchorNotFound);
    }

    for &index in doomed.iter().rev() {
        buffer.remove(index);
    }

    (
        buffer.render(),
        OperationOutcome::LinesRemoved {
            lines: doomed.len(),
        },
    )
}
