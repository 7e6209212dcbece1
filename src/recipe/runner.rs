//! Recipe step runner.
//!
//! Walks a [`Recipe`] in declared order and reports one entry per executed
//! (or skipped) step. Groups and nested presets contribute their children
//! with a `parent > child` label. The run stops at the first failing step.

use crate::collab::{CollaboratorError, Collaborators};
use crate::edit::{EditError, EditResult, FileEdit};
use crate::engine::{OperationOutcome, PatchError};
use crate::recipe::compile::compile_operations;
use crate::recipe::loader::{load_from_path, resolve_recipe_path, ConfigError};
use crate::recipe::schema::{
    Condition, Ecosystem, FileOperation, OneOrMany, Recipe, Step, StepAction,
};
use crate::safety::{ProjectGuard, SafetyError};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where and how a recipe runs.
#[derive(Debug, Clone)]
pub struct RunContext {
    guard: ProjectGuard,
    recipe_dir: PathBuf,
    recipe_file: Option<PathBuf>,
    options: BTreeMap<String, bool>,
    dry_run: bool,
}

impl RunContext {
    /// `recipe_dir` anchors `templates/` and nested preset paths.
    pub fn new(
        project_root: impl AsRef<Path>,
        recipe_dir: impl Into<PathBuf>,
    ) -> Result<Self, SafetyError> {
        Ok(Self {
            guard: ProjectGuard::new(project_root)?,
            recipe_dir: recipe_dir.into(),
            recipe_file: None,
            options: BTreeMap::new(),
            dry_run: false,
        })
    }

    /// Context for a recipe loaded from `recipe_path` (file or directory).
    pub fn for_recipe_path(
        project_root: impl AsRef<Path>,
        recipe_path: &Path,
    ) -> Result<Self, SafetyError> {
        let file = resolve_recipe_path(recipe_path);
        let recipe_dir = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut context = Self::new(project_root, recipe_dir)?;
        context.recipe_file = Some(file.canonicalize().unwrap_or(file));
        Ok(context)
    }

    /// Option values overriding the recipe's declared defaults.
    pub fn with_options(mut self, options: BTreeMap<String, bool>) -> Self {
        self.options = options;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn project_root(&self) -> &Path {
        self.guard.project_root()
    }

    pub fn recipe_dir(&self) -> &Path {
        &self.recipe_dir
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// One file touched by an `edit-files` step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub original: String,
    pub patched: String,
    /// Line operations whose anchor was not found
    pub anchors_missed: usize,
}

impl FileChange {
    pub fn is_changed(&self) -> bool {
        self.original != self.patched
    }
}

/// Result of a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "StepOutcome should be checked"]
pub enum StepOutcome {
    /// Step ran to completion
    Completed { summary: String },
    /// Files were patched (or would be, in a dry run)
    Edited { files: Vec<FileChange> },
    /// `when` condition was false
    Skipped { reason: String },
    /// Dry run: the step would have called out to a collaborator
    Planned { description: String },
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Completed { summary } => write!(f, "{summary}"),
            StepOutcome::Edited { files } => {
                let changed = files.iter().filter(|file| file.is_changed()).count();
                write!(f, "{changed} of {} file(s) changed", files.len())
            }
            StepOutcome::Skipped { reason } => write!(f, "skipped: {reason}"),
            StepOutcome::Planned { description } => write!(f, "would {description}"),
        }
    }
}

#[derive(Debug)]
pub enum StepError {
    /// A file named by `edit-files` does not exist
    MissingFile { path: PathBuf },
    /// Operation failed to compile
    Compile(PatchError),
    Edit(EditError),
    Safety(SafetyError),
    Collaborator(CollaboratorError),
    /// Nested preset failed to load
    Preset { preset: String, source: ConfigError },
    /// Preset applies itself, directly or through others
    PresetCycle { path: PathBuf },
    /// Option override or `when` names an undeclared option
    UnknownOption { option: String },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::MissingFile { path } => {
                write!(f, "file not found: {}", path.display())
            }
            StepError::Compile(e) => write!(f, "invalid operation: {}", e),
            StepError::Edit(e) => write!(f, "edit error: {}", e),
            StepError::Safety(e) => write!(f, "safety check failed: {}", e),
            StepError::Collaborator(e) => write!(f, "{}", e),
            StepError::Preset { preset, source } => {
                write!(f, "failed to load preset '{}': {}", preset, source)
            }
            StepError::PresetCycle { path } => {
                write!(f, "preset cycle detected at {}", path.display())
            }
            StepError::UnknownOption { option } => {
                write!(f, "unknown option '{}'", option)
            }
        }
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StepError::Compile(e) => Some(e),
            StepError::Edit(e) => Some(e),
            StepError::Safety(e) => Some(e),
            StepError::Collaborator(e) => Some(e),
            StepError::Preset { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<PatchError> for StepError {
    fn from(e: PatchError) -> Self {
        StepError::Compile(e)
    }
}

impl From<EditError> for StepError {
    fn from(e: EditError) -> Self {
        StepError::Edit(e)
    }
}

impl From<SafetyError> for StepError {
    fn from(e: SafetyError) -> Self {
        StepError::Safety(e)
    }
}

impl From<CollaboratorError> for StepError {
    fn from(e: CollaboratorError) -> Self {
        StepError::Collaborator(e)
    }
}

pub type StepReport = Vec<(String, Result<StepOutcome, StepError>)>;

/// Declared defaults overlaid with `overrides`; unknown names are rejected.
pub fn resolve_options(
    declared: &BTreeMap<String, bool>,
    overrides: &BTreeMap<String, bool>,
) -> Result<BTreeMap<String, bool>, StepError> {
    let mut resolved = declared.clone();
    for (name, value) in overrides {
        match resolved.get_mut(name) {
            Some(slot) => *slot = *value,
            None => {
                return Err(StepError::UnknownOption {
                    option: name.clone(),
                })
            }
        }
    }
    Ok(resolved)
}

/// Run every step of `recipe` against the project in `context`.
///
/// # Returns
///
/// One `(label, result)` entry per step reached. After the first `Err`
/// entry no further steps run.
pub fn run_recipe(
    recipe: &Recipe,
    context: &RunContext,
    collaborators: &mut dyn Collaborators,
) -> StepReport {
    let options = match resolve_options(&recipe.options, &context.options) {
        Ok(options) => options,
        Err(e) => return vec![(recipe_label(recipe), Err(e))],
    };

    let mut runner = Runner {
        context,
        collaborators,
        report: Vec::new(),
        presets: context.recipe_file.iter().cloned().collect(),
    };
    let _ = runner.run_steps(&recipe.steps, None, &context.recipe_dir, &options);
    runner.report
}

fn recipe_label(recipe: &Recipe) -> String {
    if recipe.meta.name.is_empty() {
        "recipe".to_string()
    } else {
        recipe.meta.name.clone()
    }
}

struct Runner<'a> {
    context: &'a RunContext,
    collaborators: &'a mut dyn Collaborators,
    report: StepReport,
    /// Canonical paths of the presets currently being applied
    presets: Vec<PathBuf>,
}

impl Runner<'_> {
    fn run_steps(
        &mut self,
        steps: &[Step],
        prefix: Option<&str>,
        recipe_dir: &Path,
        options: &BTreeMap<String, bool>,
    ) -> ControlFlow<()> {
        for step in steps {
            let label = match prefix {
                Some(prefix) => format!("{prefix} > {}", step.label()),
                None => step.label(),
            };

            if let Some(when) = &step.when {
                let condition = Condition::parse(when);
                match options.get(condition.option) {
                    Some(value) if condition.holds(*value) => {}
                    Some(_) => {
                        let state = if condition.negated { "enabled" } else { "disabled" };
                        debug!(step = %label, option = condition.option, "condition not met");
                        self.report.push((
                            label,
                            Ok(StepOutcome::Skipped {
                                reason: format!("option '{}' is {state}", condition.option),
                            }),
                        ));
                        continue;
                    }
                    None => {
                        let error = StepError::UnknownOption {
                            option: condition.option.to_string(),
                        };
                        return self.fail(label, error);
                    }
                }
            }

            info!(step = %label, kind = step.action.kind(), "running step");
            let result = match &step.action {
                StepAction::Group { steps } => {
                    self.run_steps(steps, Some(&label), recipe_dir, options)?;
                    continue;
                }
                StepAction::ApplyPreset {
                    preset,
                    inherits_arguments,
                    options: explicit,
                } => {
                    self.apply_preset(
                        &label,
                        preset,
                        *inherits_arguments,
                        explicit,
                        recipe_dir,
                        options,
                    )?;
                    continue;
                }
                StepAction::InstallPackages {
                    ecosystem,
                    packages,
                    dev,
                } => self.install_packages(*ecosystem, packages, *dev),
                StepAction::EditFiles { files, operations } => self.edit_files(files, operations),
                StepAction::ExtractTemplates { from, to } => {
                    self.extract_templates(from, to.as_deref(), recipe_dir)
                }
                StepAction::DeletePaths { paths } => self.delete_paths(paths),
                StepAction::ExecuteCommand { command, arguments } => {
                    self.execute_command(command, arguments)
                }
            };

            match result {
                Ok(outcome) => self.report.push((label, Ok(outcome))),
                Err(error) => return self.fail(label, error),
            }
        }
        ControlFlow::Continue(())
    }

    fn fail(&mut self, label: String, error: StepError) -> ControlFlow<()> {
        warn!(step = %label, error = %error, "step failed");
        self.report.push((label, Err(error)));
        ControlFlow::Break(())
    }

    fn apply_preset(
        &mut self,
        label: &str,
        preset: &str,
        inherits: bool,
        explicit: &BTreeMap<String, bool>,
        recipe_dir: &Path,
        parent_options: &BTreeMap<String, bool>,
    ) -> ControlFlow<()> {
        let file = resolve_recipe_path(&recipe_dir.join(preset));
        let key = file.canonicalize().unwrap_or_else(|_| file.clone());
        if self.presets.contains(&key) {
            return self.fail(label.to_string(), StepError::PresetCycle { path: key });
        }

        let child = match load_from_path(&file) {
            Ok(child) => child,
            Err(source) => {
                let error = StepError::Preset {
                    preset: preset.to_string(),
                    source,
                };
                return self.fail(label.to_string(), error);
            }
        };

        let options = match preset_options(&child, parent_options, inherits, explicit) {
            Ok(options) => options,
            Err(error) => return self.fail(label.to_string(), error),
        };

        info!(preset = %file.display(), "applying nested preset");
        let child_dir = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| recipe_dir.to_path_buf());

        self.presets.push(key);
        let flow = self.run_steps(&child.steps, Some(label), &child_dir, &options);
        self.presets.pop();
        flow
    }

    fn install_packages(
        &mut self,
        ecosystem: Ecosystem,
        packages: &[String],
        dev: bool,
    ) -> Result<StepOutcome, StepError> {
        if self.context.dry_run {
            let kind = if dev { "dev " } else { "" };
            return Ok(StepOutcome::Planned {
                description: format!(
                    "install {ecosystem} {kind}packages: {}",
                    packages.join(", ")
                ),
            });
        }
        self.collaborators.install_packages(ecosystem, packages, dev)?;
        Ok(StepOutcome::Completed {
            summary: format!("installed {} {ecosystem} package(s)", packages.len()),
        })
    }

    fn extract_templates(
        &mut self,
        from: &str,
        to: Option<&str>,
        recipe_dir: &Path,
    ) -> Result<StepOutcome, StepError> {
        let context = self.context;
        let source = recipe_dir.join("templates").join(from);
        let destination = context
            .guard
            .validate_new_path(context.project_root().join(to.unwrap_or(".")))?;

        if context.dry_run {
            return Ok(StepOutcome::Planned {
                description: format!(
                    "copy {} into {}",
                    source.display(),
                    destination.display()
                ),
            });
        }
        let copied = self
            .collaborators
            .extract_templates(&source, &destination)?;
        Ok(StepOutcome::Completed {
            summary: format!("copied {copied} template file(s)"),
        })
    }

    fn delete_paths(&mut self, paths: &[String]) -> Result<StepOutcome, StepError> {
        let context = self.context;
        let mut existing = Vec::new();
        for path in paths {
            let absolute = context.project_root().join(path);
            if !absolute.exists() {
                debug!(path = %absolute.display(), "nothing to delete");
                continue;
            }
            existing.push(context.guard.validate_deletable(&absolute)?);
        }

        if existing.is_empty() {
            warn!(paths = paths.len(), "none of the paths to delete exist");
            return Ok(StepOutcome::Completed {
                summary: "nothing to delete".to_string(),
            });
        }
        if context.dry_run {
            return Ok(StepOutcome::Planned {
                description: format!("delete {} path(s)", existing.len()),
            });
        }
        self.collaborators.delete_paths(&existing)?;
        Ok(StepOutcome::Completed {
            summary: format!("deleted {} path(s)", existing.len()),
        })
    }

    fn execute_command(
        &mut self,
        command: &str,
        arguments: &[String],
    ) -> Result<StepOutcome, StepError> {
        if self.context.dry_run {
            let mut description = format!("run {command}");
            for argument in arguments {
                description.push(' ');
                description.push_str(argument);
            }
            return Ok(StepOutcome::Planned { description });
        }
        self.collaborators.execute_command(command, arguments)?;
        Ok(StepOutcome::Completed {
            summary: format!("ran {command}"),
        })
    }

    /// Patch every file in memory first; nothing is written unless all succeed.
    fn edit_files(
        &mut self,
        files: &OneOrMany,
        operations: &[FileOperation],
    ) -> Result<StepOutcome, StepError> {
        let context = self.context;
        let compiled = compile_operations(operations)?;
        let project_root = context.project_root();

        let mut edits = Vec::with_capacity(files.as_slice().len());
        for file in files.as_slice() {
            let absolute = project_root.join(file);
            if !absolute.exists() {
                return Err(StepError::MissingFile { path: absolute });
            }
            let path = context.guard.validate_path(&absolute)?;
            let mut edit = FileEdit::load(path)?;
            edit.apply(&compiled)?;
            edits.push(edit);
        }

        let mut changes = Vec::with_capacity(edits.len());
        for edit in edits {
            if !context.dry_run {
                match edit.commit()? {
                    EditResult::Applied {
                        file,
                        bytes_written,
                    } => debug!(file = %file.display(), bytes_written, "file written"),
                    EditResult::Unchanged { file } => {
                        debug!(file = %file.display(), "file unchanged")
                    }
                }
            }
            let anchors_missed = edit
                .outcomes()
                .iter()
                .filter(|outcome| **outcome == OperationOutcome::AnchorNotFound)
                .count();
            changes.push(FileChange {
                path: edit.file.clone(),
                original: edit.original().to_string(),
                patched: edit.content().to_string(),
                anchors_missed,
            });
        }

        Ok(StepOutcome::Edited { files: changes })
    }
}

/// Options for a nested preset: its own defaults, then (optionally) the
/// parent's values for options it also declares, then explicit overrides.
fn preset_options(
    child: &Recipe,
    parent: &BTreeMap<String, bool>,
    inherits: bool,
    explicit: &BTreeMap<String, bool>,
) -> Result<BTreeMap<String, bool>, StepError> {
    let mut resolved = child.options.clone();
    if inherits {
        for (name, slot) in resolved.iter_mut() {
            if let Some(value) = parent.get(name) {
                *slot = *value;
            }
        }
    }
    resolve_options(&resolved, explicit)
}
