//! External services a recipe calls into.
//!
//! The runner only talks to these through [`Collaborators`]; the shipped
//! [`SystemCollaborators`] shells out to the package managers and copies
//! template trees from disk.

use crate::recipe::schema::Ecosystem;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}")]
    CommandFailed { command: String, status: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template directory not found: {0}")]
    MissingTemplates(PathBuf),
}

pub trait Collaborators {
    /// Install `packages` for `ecosystem` in the project.
    fn install_packages(
        &mut self,
        ecosystem: Ecosystem,
        packages: &[String],
        dev: bool,
    ) -> Result<(), CollaboratorError>;

    /// Copy the tree under `source` into `destination`, overwriting files.
    /// Returns the number of files copied.
    fn extract_templates(
        &mut self,
        source: &Path,
        destination: &Path,
    ) -> Result<usize, CollaboratorError>;

    /// Delete files or directories; paths are already checked and exist.
    fn delete_paths(&mut self, paths: &[PathBuf]) -> Result<(), CollaboratorError>;

    /// Run `command` with `arguments` from the project root.
    fn execute_command(
        &mut self,
        command: &str,
        arguments: &[String],
    ) -> Result<(), CollaboratorError>;
}

/// Collaborators backed by real processes and the filesystem.
#[derive(Debug, Clone)]
pub struct SystemCollaborators {
    project_root: PathBuf,
}

impl SystemCollaborators {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// Package manager invocation for an install request.
    pub fn install_command(
        ecosystem: Ecosystem,
        packages: &[String],
        dev: bool,
    ) -> (&'static str, Vec<String>) {
        let (program, mut arguments) = match ecosystem {
            Ecosystem::Php => ("composer", vec!["require".to_string()]),
            Ecosystem::Node => ("npm", vec!["install".to_string()]),
        };
        if dev {
            arguments.push(match ecosystem {
                Ecosystem::Php => "--dev".to_string(),
                Ecosystem::Node => "-D".to_string(),
            });
        }
        arguments.extend(packages.iter().cloned());
        (program, arguments)
    }
}

impl Collaborators for SystemCollaborators {
    fn install_packages(
        &mut self,
        ecosystem: Ecosystem,
        packages: &[String],
        dev: bool,
    ) -> Result<(), CollaboratorError> {
        let (program, arguments) = Self::install_command(ecosystem, packages, dev);
        self.execute_command(program, &arguments)
    }

    fn extract_templates(
        &mut self,
        source: &Path,
        destination: &Path,
    ) -> Result<usize, CollaboratorError> {
        if !source.is_dir() {
            return Err(CollaboratorError::MissingTemplates(source.to_path_buf()));
        }

        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| CollaboratorError::Io { path, source }
        };

        let mut copied = 0;
        for entry in WalkDir::new(source).min_depth(1) {
            let entry = entry.map_err(|err| CollaboratorError::Io {
                path: err.path().unwrap_or(source).to_path_buf(),
                source: err.into(),
            })?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .unwrap_or_else(|_| entry.path());
            let target = destination.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map_err(io_error(&target))?;
            } else if entry.file_type().is_file() {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(io_error(parent))?;
                }
                fs::copy(entry.path(), &target).map_err(io_error(&target))?;
                debug!(file = %target.display(), "copied template");
                copied += 1;
            }
        }
        Ok(copied)
    }

    fn delete_paths(&mut self, paths: &[PathBuf]) -> Result<(), CollaboratorError> {
        for path in paths {
            let result = if path.is_dir() {
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            };
            result.map_err(|source| CollaboratorError::Io {
                path: path.clone(),
                source,
            })?;
            debug!(path = %path.display(), "deleted");
        }
        Ok(())
    }

    fn execute_command(
        &mut self,
        command: &str,
        arguments: &[String],
    ) -> Result<(), CollaboratorError> {
        let rendered = std::iter::once(command)
            .chain(arguments.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        info!(command = %rendered, "running");

        let status = Command::new(command)
            .args(arguments)
            .current_dir(&self.project_root)
            .status()
            .map_err(|source| CollaboratorError::Spawn {
                command: rendered.clone(),
                source,
            })?;

        if !status.success() {
            return Err(CollaboratorError::CommandFailed {
                command: rendered,
                status: status.to_string(),
            });
        }
        Ok(())
    }
}
