//! Turns data-only recipe operations into engine operations.
//!
//! `update-content` replacements and `edit-json` actions become closures so
//! recipes on disk stay declarative while the engine keeps its callback API.

use crate::engine::{
    AddLine, LineSpan, Occurrence, OmitFn, PatchError, PatchOperation, Pattern, RemoveLine,
};
use crate::recipe::schema::{FileOperation, JsonAction, JsonPath, Replacement};
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JsonActionError {
    #[error("expected an object at '{path}'")]
    NotAnObject { path: String },

    #[error("merge value for '{path}' must be an object")]
    MergeValueNotObject { path: String },
}

pub fn compile_operations(operations: &[FileOperation]) -> Result<Vec<PatchOperation>, PatchError> {
    operations.iter().map(compile_operation).collect()
}

pub fn compile_operation(operation: &FileOperation) -> Result<PatchOperation, PatchError> {
    match operation {
        FileOperation::AddLine {
            position,
            pattern,
            lines,
            indent,
            start,
            count,
        } => {
            let mut op = AddLine::new(*position, Pattern::new(pattern)?, lines.as_slice())
                .with_occurrence(Occurrence {
                    start: *start,
                    count: *count,
                });
            if let Some(indent) = indent {
                op = op.with_indent(indent.clone());
            }
            Ok(op.into())
        }
        FileOperation::RemoveLine {
            pattern,
            start,
            count,
            span,
        } => {
            let mut op = RemoveLine::new(Pattern::new(pattern)?).with_occurrence(Occurrence {
                start: *start,
                count: *count,
            });
            if let Some(span) = span {
                op = op.with_span(LineSpan::new(span.offset, span.count));
            }
            Ok(op.into())
        }
        FileOperation::UpdateContent { replace } => {
            let replacements = replace
                .iter()
                .map(CompiledReplacement::compile)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(PatchOperation::update_content(move |content| {
                Ok(replacements
                    .iter()
                    .fold(content.to_string(), |acc, r| r.apply(&acc)))
            }))
        }
        FileOperation::EditJson { actions } => {
            let actions = actions.clone();
            Ok(PatchOperation::edit_json(move |mut document, omit| {
                for action in &actions {
                    apply_json_action(&mut document, action, omit)?;
                }
                Ok(document)
            }))
        }
    }
}

enum CompiledReplacement {
    Literal {
        search: String,
        with: String,
        all: bool,
    },
    Regex {
        regex: Regex,
        with: String,
        all: bool,
    },
}

impl CompiledReplacement {
    fn compile(replacement: &Replacement) -> Result<Self, PatchError> {
        match (&replacement.search, &replacement.pattern) {
            (_, Some(pattern)) => {
                let regex = Regex::new(pattern).map_err(|source| PatchError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
                Ok(CompiledReplacement::Regex {
                    regex,
                    with: replacement.with.clone(),
                    all: replacement.all,
                })
            }
            (search, None) => Ok(CompiledReplacement::Literal {
                search: search.clone().unwrap_or_default(),
                with: replacement.with.clone(),
                all: replacement.all,
            }),
        }
    }

    fn apply(&self, content: &str) -> String {
        match self {
            CompiledReplacement::Literal { search, .. } if search.is_empty() => content.to_string(),
            CompiledReplacement::Literal { search, with, all } => {
                if *all {
                    content.replace(search.as_str(), with)
                } else {
                    content.replacen(search.as_str(), with, 1)
                }
            }
            CompiledReplacement::Regex { regex, with, all } => {
                if *all {
                    regex.replace_all(content, with.as_str()).into_owned()
                } else {
                    regex.replace(content, with.as_str()).into_owned()
                }
            }
        }
    }
}

fn apply_json_action(
    document: &mut Value,
    action: &JsonAction,
    omit: OmitFn,
) -> Result<(), JsonActionError> {
    match action {
        JsonAction::Set { path, value } => {
            let Some((last, parent)) = path.segments().split_last() else {
                *document = value.clone();
                return Ok(());
            };
            ensure_object(document, parent)?.insert(last.clone(), value.clone());
        }
        JsonAction::Merge { path, value } => {
            let Value::Object(entries) = value else {
                return Err(JsonActionError::MergeValueNotObject {
                    path: path.to_string(),
                });
            };
            let target = ensure_object(document, path.segments())?;
            for (key, value) in entries {
                target.insert(key.clone(), value.clone());
            }
        }
        JsonAction::Omit { path, keys } => {
            if let Some(target) = lookup(document, path.segments())? {
                *target = omit(target, &as_strs(keys));
            }
        }
        JsonAction::Move { from, to, keys } => move_keys(document, from, to, keys, omit)?,
        JsonAction::Remove { path } => {
            if let Some((last, parent)) = path.segments().split_last() {
                if let Some(target) = lookup(document, parent)? {
                    *target = omit(target, &[last.as_str()]);
                }
            }
        }
    }
    Ok(())
}

/// Keys present in `from` are inserted into `to` (existing keys keep their
/// position) and then dropped from `from`. Missing keys are ignored.
fn move_keys(
    document: &mut Value,
    from: &JsonPath,
    to: &JsonPath,
    keys: &[String],
    omit: OmitFn,
) -> Result<(), JsonActionError> {
    let moved: Vec<(String, Value)> = match lookup(document, from.segments())? {
        Some(Value::Object(source)) => keys
            .iter()
            .filter_map(|key| source.get(key).map(|value| (key.clone(), value.clone())))
            .collect(),
        Some(_) => {
            return Err(JsonActionError::NotAnObject {
                path: from.to_string(),
            })
        }
        None => Vec::new(),
    };
    if moved.is_empty() {
        return Ok(());
    }

    let target = ensure_object(document, to.segments())?;
    for (key, value) in moved {
        target.insert(key, value);
    }

    if let Some(source) = lookup(document, from.segments())? {
        *source = omit(source, &as_strs(keys));
    }
    Ok(())
}

fn as_strs(keys: &[String]) -> Vec<&str> {
    keys.iter().map(String::as_str).collect()
}

fn not_an_object(path: &[String]) -> JsonActionError {
    JsonActionError::NotAnObject {
        path: if path.is_empty() {
            "<root>".to_string()
        } else {
            path.join(".")
        },
    }
}

/// Value at `path`, `None` if a segment is missing.
fn lookup<'a>(
    document: &'a mut Value,
    path: &[String],
) -> Result<Option<&'a mut Value>, JsonActionError> {
    let mut current = document;
    for (depth, segment) in path.iter().enumerate() {
        let map = match current {
            Value::Object(map) => map,
            _ => return Err(not_an_object(&path[..depth])),
        };
        current = match map.get_mut(segment) {
            Some(next) => next,
            None => return Ok(None),
        };
    }
    Ok(Some(current))
}

/// Object at `path`, creating missing objects along the way.
fn ensure_object<'a>(
    document: &'a mut Value,
    path: &[String],
) -> Result<&'a mut Map<String, Value>, JsonActionError> {
    let mut current = document;
    for (depth, segment) in path.iter().enumerate() {
        let map = current
            .as_object_mut()
            .ok_or_else(|| not_an_object(&path[..depth]))?;
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    current.as_object_mut().ok_or_else(|| not_an_object(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{apply_edits, Position};
    use crate::recipe::schema::{OneOrMany, SpanDefinition};
    use serde_json::json;

    fn path(dotted: &str) -> JsonPath {
        JsonPath::from(OneOrMany::One(dotted.to_string()))
    }

    fn run_json(content: &str, actions: Vec<JsonAction>) -> Value {
        let op = compile_operation(&FileOperation::EditJson { actions }).unwrap();
        serde_json::from_str(&apply_edits(content, &[op]).unwrap()).unwrap()
    }

    #[test]
    fn test_literal_replacement_first_only() {
        let op = compile_operation(&FileOperation::UpdateContent {
            replace: vec![Replacement {
                search: Some("vue".to_string()),
                pattern: None,
                with: "svelte".to_string(),
                all: false,
            }],
        })
        .unwrap();
        assert_eq!(apply_edits("vue vue\n", &[op]).unwrap(), "svelte vue\n");
    }

    #[test]
    fn test_regex_replacement_with_captures() {
        let op = compile_operation(&FileOperation::UpdateContent {
            replace: vec![Replacement {
                search: None,
                pattern: Some(r"view\('(?P<page>\w+)'\)".to_string()),
                with: "inertia('${page}')".to_string(),
                all: true,
            }],
        })
        .unwrap();
        assert_eq!(
            apply_edits("view('welcome');\nview('about');\n", &[op]).unwrap(),
            "inertia('welcome');\ninertia('about');\n"
        );
    }

    #[test]
    fn test_replacements_run_in_order() {
        let op = compile_operation(&FileOperation::UpdateContent {
            replace: vec![
                Replacement {
                    search: None,
                    pattern: Some("\n\n".to_string()),
                    with: "\n".to_string(),
                    all: true,
                },
                Replacement {
                    search: Some("a".to_string()),
                    pattern: None,
                    with: "b".to_string(),
                    all: true,
                },
            ],
        })
        .unwrap();
        assert_eq!(apply_edits("a\n\na\n", &[op]).unwrap(), "b\nb\n");
    }

    #[test]
    fn test_add_line_compiles_single_string() {
        let op = compile_operation(&FileOperation::AddLine {
            position: Position::After,
            pattern: "SubstituteBindings::class,".to_string(),
            lines: OneOrMany::One(
                "\\App\\Http\\Middleware\\HandleInertiaRequests::class,".to_string(),
            ),
            indent: Some("    ".to_string()),
            start: None,
            count: None,
        })
        .unwrap();
        assert_eq!(
            apply_edits("    SubstituteBindings::class,\n];\n", &[op]).unwrap(),
            "    SubstituteBindings::class,\n    \\App\\Http\\Middleware\\HandleInertiaRequests::class,\n];\n"
        );
    }

    #[test]
    fn test_remove_line_compiles_span() {
        let op = compile_operation(&FileOperation::RemoveLine {
            pattern: "<style>".to_string(),
            start: None,
            count: None,
            span: Some(SpanDefinition {
                offset: 0,
                count: 2,
            }),
        })
        .unwrap();
        assert_eq!(apply_edits("a\n<style>\nb\nc\n", &[op]).unwrap(), "a\nc\n");
    }

    #[test]
    fn test_invalid_pattern_fails_compilation() {
        let result = compile_operation(&FileOperation::RemoveLine {
            pattern: "(".to_string(),
            start: None,
            count: None,
            span: None,
        });
        assert!(matches!(result, Err(PatchError::InvalidPattern { .. })));
    }

    #[test]
    fn test_json_move_keeps_target_positions() {
        let value = run_json(
            r#"{"dependencies": {"svelte": "old", "axios": "^1"}, "devDependencies": {"svelte": "^3", "vite": "^3", "@inertiajs/inertia": "^0.11"}}"#,
            vec![JsonAction::Move {
                from: path("devDependencies"),
                to: path("dependencies"),
                keys: vec![
                    "svelte".to_string(),
                    "@inertiajs/inertia".to_string(),
                    "missing".to_string(),
                ],
            }],
        );
        let deps: Vec<&String> = value["dependencies"].as_object().unwrap().keys().collect();
        assert_eq!(deps, ["svelte", "axios", "@inertiajs/inertia"]);
        assert_eq!(value["dependencies"]["svelte"], "^3");
        assert_eq!(value["devDependencies"], json!({"vite": "^3"}));
    }

    #[test]
    fn test_json_move_creates_target() {
        let value = run_json(
            r#"{"devDependencies": {"svelte": "^3"}}"#,
            vec![JsonAction::Move {
                from: path("devDependencies"),
                to: path("dependencies"),
                keys: vec!["svelte".to_string()],
            }],
        );
        assert_eq!(
            value,
            json!({"devDependencies": {}, "dependencies": {"svelte": "^3"}})
        );
    }

    #[test]
    fn test_json_set_merge_omit_remove() {
        let value = run_json(
            r#"{"scripts": {"dev": "vite", "build": "vite build"}, "private": true}"#,
            vec![
                JsonAction::Set {
                    path: path("type"),
                    value: json!("module"),
                },
                JsonAction::Merge {
                    path: path("scripts"),
                    value: json!({"preview": "vite preview"}),
                },
                JsonAction::Omit {
                    path: path("scripts"),
                    keys: vec!["build".to_string()],
                },
                JsonAction::Remove {
                    path: path("private"),
                },
            ],
        );
        assert_eq!(
            value,
            json!({"scripts": {"dev": "vite", "preview": "vite preview"}, "type": "module"})
        );
    }

    #[test]
    fn test_json_set_through_scalar_fails() {
        let op = compile_operation(&FileOperation::EditJson {
            actions: vec![JsonAction::Set {
                path: path("name.first"),
                value: json!("x"),
            }],
        })
        .unwrap();
        let err = apply_edits(r#"{"name": "app"}"#, &[op]).unwrap_err();
        assert!(err.to_string().contains("expected an object at 'name'"));
    }
}
