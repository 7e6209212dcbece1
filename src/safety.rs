use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Project safety checks to keep recipe steps inside the target project.
#[derive(Debug, Clone)]
pub struct ProjectGuard {
    /// Absolute path to project root
    project_root: PathBuf,
    /// Canonical paths to forbidden directories
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside project: {path} (project: {project})")]
    OutsideProject { path: PathBuf, project: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Refusing to delete the project root: {path}")]
    ProjectRoot { path: PathBuf },

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl ProjectGuard {
    /// Create a new guard for the given project root.
    ///
    /// The root is canonicalized to handle symlinks correctly.
    pub fn new(project_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let project_root = project_root.as_ref().canonicalize()?;

        let mut forbidden_paths = Vec::new();
        if let Ok(git_dir) = project_root.join(".git").canonicalize() {
            forbidden_paths.push(git_dir);
        }

        Ok(Self {
            project_root,
            forbidden_paths,
        })
    }

    /// Check an existing path; returns its canonical form.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let canonical = self.absolute(path.as_ref()).canonicalize()?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    /// Check an existing path that is about to be deleted.
    ///
    /// Same as [`validate_path`](Self::validate_path), but the project root
    /// itself is rejected.
    pub fn validate_deletable(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let canonical = self.validate_path(path)?;
        if canonical == self.project_root {
            return Err(SafetyError::ProjectRoot { path: canonical });
        }
        Ok(canonical)
    }

    /// Check a path that may not exist yet (e.g. a template destination).
    ///
    /// The nearest existing ancestor is canonicalized and the remaining
    /// components are appended lexically; `..` in the remainder is rejected.
    pub fn validate_new_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let absolute = self.absolute(path.as_ref());
        if absolute.exists() {
            return self.validate_path(&absolute);
        }

        let mut existing = absolute.as_path();
        let mut remainder = Vec::new();
        while !existing.exists() {
            match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    remainder.push(name.to_os_string());
                    existing = parent;
                }
                _ => {
                    return Err(SafetyError::OutsideProject {
                        path: absolute.clone(),
                        project: self.project_root.clone(),
                    })
                }
            }
        }

        let mut canonical = existing.canonicalize()?;
        for name in remainder.iter().rev() {
            canonical.push(name);
        }
        if canonical
            .components()
            .any(|component| matches!(component, Component::ParentDir))
        {
            return Err(SafetyError::OutsideProject {
                path: canonical,
                project: self.project_root.clone(),
            });
        }

        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.project_root) {
            return Err(SafetyError::OutsideProject {
                path: canonical.to_path_buf(),
                project: self.project_root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    /// Get the project root.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }
}
