use crate::engine::{Pattern, Position};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Recipe {
    #[serde(default)]
    pub meta: Metadata,
    /// Declared boolean options with their defaults
    #[serde(default)]
    pub options: BTreeMap<String, bool>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Notes shown after a successful run; `backticks` are highlighted
    #[serde(default)]
    pub post_install: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Step {
    #[serde(default)]
    pub title: Option<String>,
    /// Option name, optionally negated with `!`
    #[serde(default)]
    pub when: Option<String>,
    #[serde(flatten)]
    pub action: StepAction,
}

impl Step {
    /// Title, or a label derived from the step type.
    pub fn label(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| self.action.default_label())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StepAction {
    InstallPackages {
        #[serde(rename = "for")]
        ecosystem: Ecosystem,
        packages: Vec<String>,
        #[serde(default)]
        dev: bool,
    },
    Group {
        steps: Vec<Step>,
    },
    EditFiles {
        files: OneOrMany,
        operations: Vec<FileOperation>,
    },
    ExtractTemplates {
        from: String,
        #[serde(default)]
        to: Option<String>,
    },
    DeletePaths {
        paths: Vec<String>,
    },
    ExecuteCommand {
        command: String,
        #[serde(default)]
        arguments: Vec<String>,
    },
    ApplyPreset {
        preset: String,
        #[serde(default)]
        inherits_arguments: bool,
        #[serde(default)]
        options: BTreeMap<String, bool>,
    },
}

impl StepAction {
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::InstallPackages { .. } => "install-packages",
            StepAction::Group { .. } => "group",
            StepAction::EditFiles { .. } => "edit-files",
            StepAction::ExtractTemplates { .. } => "extract-templates",
            StepAction::DeletePaths { .. } => "delete-paths",
            StepAction::ExecuteCommand { .. } => "execute-command",
            StepAction::ApplyPreset { .. } => "apply-preset",
        }
    }

    fn default_label(&self) -> String {
        match self {
            StepAction::InstallPackages { ecosystem, .. } => {
                format!("install {ecosystem} packages")
            }
            StepAction::Group { .. } => "group".to_string(),
            StepAction::EditFiles { files, .. } => format!("edit {}", files.as_slice().join(", ")),
            StepAction::ExtractTemplates { from, .. } => format!("extract {from} templates"),
            StepAction::DeletePaths { .. } => "delete paths".to_string(),
            StepAction::ExecuteCommand { command, .. } => format!("run {command}"),
            StepAction::ApplyPreset { preset, .. } => format!("apply {preset}"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Php,
    Node,
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ecosystem::Php => write!(f, "PHP"),
            Ecosystem::Node => write!(f, "Node"),
        }
    }
}

/// A single string or a list of strings.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn as_slice(&self) -> &[String] {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item),
            OneOrMany::Many(items) => items,
        }
    }
}

/// Data-only form of an engine operation.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FileOperation {
    AddLine {
        position: Position,
        #[serde(rename = "match")]
        pattern: String,
        lines: OneOrMany,
        #[serde(default)]
        indent: Option<String>,
        #[serde(default)]
        start: Option<i64>,
        #[serde(default)]
        count: Option<usize>,
    },
    RemoveLine {
        #[serde(rename = "match")]
        pattern: String,
        #[serde(default)]
        start: Option<i64>,
        #[serde(default)]
        count: Option<usize>,
        #[serde(default)]
        span: Option<SpanDefinition>,
    },
    UpdateContent {
        replace: Vec<Replacement>,
    },
    EditJson {
        actions: Vec<JsonAction>,
    },
}

impl FileOperation {
    fn pattern(&self) -> Option<&str> {
        match self {
            FileOperation::AddLine { pattern, .. } | FileOperation::RemoveLine { pattern, .. } => {
                Some(pattern)
            }
            _ => None,
        }
    }

    fn start(&self) -> Option<i64> {
        match self {
            FileOperation::AddLine { start, .. } | FileOperation::RemoveLine { start, .. } => {
                *start
            }
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SpanDefinition {
    #[serde(default)]
    pub offset: i64,
    pub count: usize,
}

/// One substitution inside an `update-content` operation.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// Literal text to find
    #[serde(default)]
    pub search: Option<String>,
    /// Regular expression to find; `$1`/`${name}` expand in `with`
    #[serde(default)]
    pub pattern: Option<String>,
    pub with: String,
    /// Replace every occurrence instead of the first
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum JsonAction {
    Set {
        path: JsonPath,
        value: Value,
    },
    Merge {
        #[serde(default)]
        path: JsonPath,
        value: Value,
    },
    Omit {
        #[serde(default)]
        path: JsonPath,
        keys: Vec<String>,
    },
    Move {
        from: JsonPath,
        to: JsonPath,
        keys: Vec<String>,
    },
    Remove {
        path: JsonPath,
    },
}

/// Location inside a JSON document: `"a.b"` or `["a", "b.c"]`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(from = "OneOrMany")]
pub struct JsonPath(pub Vec<String>);

impl From<OneOrMany> for JsonPath {
    fn from(raw: OneOrMany) -> Self {
        match raw {
            OneOrMany::One(dotted) if dotted.is_empty() => JsonPath(Vec::new()),
            OneOrMany::One(dotted) => JsonPath(dotted.split('.').map(str::to_string).collect()),
            OneOrMany::Many(segments) => JsonPath(segments),
        }
    }
}

impl JsonPath {
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0.join("."))
        }
    }
}

/// Parsed `when` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition<'a> {
    pub option: &'a str,
    pub negated: bool,
}

impl<'a> Condition<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let raw = raw.trim();
        match raw.strip_prefix('!') {
            Some(rest) => Condition {
                option: rest.trim(),
                negated: true,
            },
            None => Condition {
                option: raw,
                negated: false,
            },
        }
    }

    pub fn holds(&self, value: bool) -> bool {
        value != self.negated
    }
}

impl Recipe {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.steps.is_empty() {
            issues.push(ValidationIssue::EmptyStepList);
        }

        for step in &self.steps {
            self.validate_step(step, &mut issues);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    fn validate_step(&self, step: &Step, issues: &mut Vec<ValidationIssue>) {
        let label = step.label();

        if let Some(when) = &step.when {
            let condition = Condition::parse(when);
            if !self.options.contains_key(condition.option) {
                issues.push(ValidationIssue::UnknownOption {
                    step: label.clone(),
                    option: condition.option.to_string(),
                });
            }
        }

        match &step.action {
            StepAction::InstallPackages { packages, .. } => {
                if packages.iter().all(|p| p.trim().is_empty()) {
                    issues.push(ValidationIssue::MissingField {
                        step: Some(label.clone()),
                        field: "packages",
                    });
                }
            }
            StepAction::Group { steps } => {
                if steps.is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        step: Some(label.clone()),
                        field: "steps",
                    });
                }
                for child in steps {
                    self.validate_step(child, issues);
                }
            }
            StepAction::EditFiles { files, operations } => {
                if files.as_slice().iter().any(|f| f.trim().is_empty())
                    || files.as_slice().is_empty()
                {
                    issues.push(ValidationIssue::MissingField {
                        step: Some(label.clone()),
                        field: "files",
                    });
                }
                if operations.is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        step: Some(label.clone()),
                        field: "operations",
                    });
                }
                for operation in operations {
                    validate_operation(&label, operation, issues);
                }
            }
            StepAction::ExtractTemplates { from, .. } => {
                if from.trim().is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        step: Some(label.clone()),
                        field: "from",
                    });
                }
            }
            StepAction::DeletePaths { paths } => {
                if paths.is_empty() || paths.iter().any(|p| p.trim().is_empty()) {
                    issues.push(ValidationIssue::MissingField {
                        step: Some(label.clone()),
                        field: "paths",
                    });
                }
            }
            StepAction::ExecuteCommand { command, .. } => {
                if command.trim().is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        step: Some(label.clone()),
                        field: "command",
                    });
                }
            }
            StepAction::ApplyPreset { preset, .. } => {
                if preset.trim().is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        step: Some(label.clone()),
                        field: "preset",
                    });
                }
            }
        }
    }
}

fn validate_operation(label: &str, operation: &FileOperation, issues: &mut Vec<ValidationIssue>) {
    if let Some(pattern) = operation.pattern() {
        if pattern.is_empty() {
            issues.push(ValidationIssue::MissingField {
                step: Some(label.to_string()),
                field: "operations.match",
            });
        } else if let Err(err) = Pattern::new(pattern) {
            issues.push(ValidationIssue::InvalidCombo {
                step: Some(label.to_string()),
                message: err.to_string(),
            });
        }
    }

    if operation.start() == Some(0) {
        issues.push(ValidationIssue::InvalidCombo {
            step: Some(label.to_string()),
            message: "start is 1-based (use -1 for the last match)".to_string(),
        });
    }

    match operation {
        FileOperation::AddLine { lines, .. } if lines.as_slice().is_empty() => {
            issues.push(ValidationIssue::MissingField {
                step: Some(label.to_string()),
                field: "operations.lines",
            });
        }
        FileOperation::RemoveLine {
            span: Some(span), ..
        } if span.count == 0 => {
            issues.push(ValidationIssue::InvalidCombo {
                step: Some(label.to_string()),
                message: "span.count must be at least 1".to_string(),
            });
        }
        FileOperation::UpdateContent { replace } => {
            if replace.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    step: Some(label.to_string()),
                    field: "operations.replace",
                });
            }
            for replacement in replace {
                match (&replacement.search, &replacement.pattern) {
                    (Some(search), None) if !search.is_empty() => {}
                    (None, Some(pattern)) => {
                        if let Err(err) = Pattern::new(pattern) {
                            issues.push(ValidationIssue::InvalidCombo {
                                step: Some(label.to_string()),
                                message: err.to_string(),
                            });
                        }
                    }
                    _ => issues.push(ValidationIssue::InvalidCombo {
                        step: Some(label.to_string()),
                        message: "replacement needs exactly one non-empty 'search' or 'pattern'"
                            .to_string(),
                    }),
                }
            }
        }
        FileOperation::EditJson { actions } => {
            if actions.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    step: Some(label.to_string()),
                    field: "operations.actions",
                });
            }
            for action in actions {
                let root_target = match action {
                    JsonAction::Set { path, .. } | JsonAction::Remove { path } => path.is_root(),
                    JsonAction::Move { from, to, .. } => from.is_root() || to.is_root(),
                    _ => false,
                };
                if root_target {
                    issues.push(ValidationIssue::InvalidCombo {
                        step: Some(label.to_string()),
                        message: "edit-json action needs a non-root path".to_string(),
                    });
                }
            }
        }
        _ => {}
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyStepList,
    MissingField {
        step: Option<String>,
        field: &'static str,
    },
    InvalidCombo {
        step: Option<String>,
        message: String,
    },
    UnknownOption {
        step: String,
        option: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyStepList => write!(f, "recipe contains no steps"),
            ValidationIssue::MissingField { step, field } => match step {
                Some(step) => write!(f, "step '{step}' missing required field '{field}'"),
                None => write!(f, "step missing required field '{field}'"),
            },
            ValidationIssue::InvalidCombo { step, message } => match step {
                Some(step) => write!(f, "step '{step}' has invalid configuration: {message}"),
                None => write!(f, "invalid recipe configuration: {message}"),
            },
            ValidationIssue::UnknownOption { step, option } => {
                write!(f, "step '{step}' depends on undeclared option '{option}'")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_parse() {
        assert_eq!(
            Condition::parse("!https"),
            Condition {
                option: "https",
                negated: true
            }
        );
        assert!(Condition::parse("tailwindcss").holds(true));
        assert!(Condition::parse("! https").holds(false));
    }

    #[test]
    fn test_json_path_forms() {
        assert_eq!(
            JsonPath::from(OneOrMany::One("scripts.dev".to_string())).segments(),
            ["scripts", "dev"]
        );
        assert_eq!(
            JsonPath::from(OneOrMany::Many(vec!["lodash.merge".to_string()])).segments(),
            ["lodash.merge"]
        );
        assert!(JsonPath::from(OneOrMany::One(String::new())).is_root());
    }

    #[test]
    fn test_step_label_fallback() {
        let step = Step {
            title: None,
            when: None,
            action: StepAction::ExecuteCommand {
                command: "php".to_string(),
                arguments: vec![],
            },
        };
        assert_eq!(step.label(), "run php");
    }
}
