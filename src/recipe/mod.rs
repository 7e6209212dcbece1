pub mod compile;
pub mod loader;
pub mod runner;
pub mod schema;

pub use compile::{compile_operation, compile_operations, JsonActionError};
pub use loader::{
    load_from_path, load_from_str, resolve_recipe_path, ConfigError, RECIPE_FILE_NAME,
};
pub use runner::{
    resolve_options, run_recipe, FileChange, RunContext, StepError, StepOutcome, StepReport,
};
pub use schema::{
    Condition, Ecosystem, FileOperation, JsonAction, JsonPath, Metadata, OneOrMany, Recipe,
    Replacement, SpanDefinition, Step, StepAction, ValidationError, ValidationIssue,
};
