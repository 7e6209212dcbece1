use crate::recipe::schema::{Recipe, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up when a recipe directory is given instead of a file.
pub const RECIPE_FILE_NAME: &str = "preset.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Io { .. } => self,
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read recipe from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse recipe TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse recipe TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid recipe ({}): {}", path.display(), source),
                None => write!(f, "invalid recipe: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<Recipe, ConfigError> {
    let recipe: Recipe = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    recipe
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(recipe)
}

/// Load a recipe file, or `preset.toml` inside a directory.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Recipe, ConfigError> {
    let path = resolve_recipe_path(path.as_ref());
    let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(&path))
}

pub fn resolve_recipe_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(RECIPE_FILE_NAME)
    } else {
        path.to_path_buf()
    }
}
