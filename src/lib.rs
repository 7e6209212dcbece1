//! Preset Patcher: declarative project scaffolding recipes
//!
//! A recipe is an ordered list of steps (install packages, patch files, copy
//! templates, delete paths, run commands, apply nested recipes) executed
//! against a project directory.
//!
//! # Architecture
//!
//! All file changes go through the text patch engine in [`engine`]:
//! [`apply_edits`] runs a list of [`PatchOperation`]s over in-memory content.
//! Line operations anchor on regular expressions and do nothing when the
//! anchor is absent. Content and JSON operations take callbacks.
//!
//! The [`recipe`] layer loads TOML recipes, compiles their data-only file
//! operations into engine operations and runs steps through
//! [`Collaborators`].
//!
//! # Safety
//!
//! - Files are patched in memory and written once per step
//! - Atomic file writes (tempfile + fsync + rename)
//! - Project boundary enforcement, `.git` is off limits
//! - UTF-8 validation
//!
//! # Example
//!
//! ```
//! use preset_patcher::{apply_edits, AddLine, PatchOperation, Pattern};
//!
//! let ops = vec![PatchOperation::from(AddLine::after(
//!     Pattern::new("^a$").unwrap(),
//!     ["x"],
//! ))];
//! assert_eq!(apply_edits("a\nb\n", &ops).unwrap(), "a\nx\nb\n");
//! ```

pub mod collab;
pub mod edit;
pub mod engine;
pub mod logging;
pub mod recipe;
pub mod safety;

// Re-exports
pub use collab::{CollaboratorError, Collaborators, SystemCollaborators};
pub use edit::{EditError, EditResult, FileEdit};
pub use engine::{
    apply_edits, apply_edits_with_report, omit, AddLine, BoxError, EditReport, LineSpan,
    Occurrence, OperationOutcome, PatchError, PatchOperation, Pattern, Position, RemoveLine,
    TransformError,
};
pub use recipe::{
    load_from_path, load_from_str, run_recipe, ConfigError, Ecosystem, Recipe, RunContext,
    StepError, StepOutcome,
};
pub use safety::{ProjectGuard, SafetyError};
