use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use preset_patcher::logging;
use preset_patcher::recipe::{
    load_from_path, resolve_options, run_recipe, Condition, FileChange, Recipe, RunContext,
    Step, StepAction, StepOutcome,
};
use preset_patcher::SystemCollaborators;
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "preset-patcher")]
#[command(about = "Apply declarative scaffolding recipes to a project", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a recipe to a project
    Apply {
        /// Recipe file, or a directory containing preset.toml
        recipe: PathBuf,

        /// Path to project root (defaults to PRESET_PATCHER_PROJECT, then cwd)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Override a recipe option: name=true|false, or just name
        #[arg(short, long = "option", value_parser = parse_option)]
        options: Vec<(String, bool)>,

        /// Dry run - compute changes and planned commands without touching anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Print the steps of a recipe with their resolved conditions
    Show {
        /// Recipe file, or a directory containing preset.toml
        recipe: PathBuf,

        /// Override a recipe option: name=true|false, or just name
        #[arg(short, long = "option", value_parser = parse_option)]
        options: Vec<(String, bool)>,
    },

    /// List recipes found under a directory
    List {
        /// Directory to search (defaults to the current directory)
        dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Apply {
            recipe,
            project,
            options,
            dry_run,
            diff,
        } => cmd_apply(&recipe, project, options, dry_run, diff),

        Commands::Show { recipe, options } => cmd_show(&recipe, options),

        Commands::List { dir } => cmd_list(dir),
    }
}

/// Parse `name=value` (or bare `name`, meaning true).
fn parse_option(raw: &str) -> Result<(String, bool), String> {
    let (name, value) = match raw.split_once('=') {
        Some((name, value)) => (name.trim(), value.trim()),
        None => (raw.trim(), "true"),
    };
    if name.is_empty() {
        return Err(format!("missing option name in '{raw}'"));
    }
    let value = match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => true,
        "false" | "no" | "off" | "0" => false,
        other => return Err(format!("expected true or false for '{name}', got '{other}'")),
    };
    Ok((name.to_string(), value))
}

/// Resolve project path
///
/// Priority order:
/// 1. Explicit --project flag
/// 2. PRESET_PATCHER_PROJECT environment variable
/// 3. Current directory
fn resolve_project(cli_project: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_project {
        return Ok(path.canonicalize()?);
    }

    if let Ok(env_path) = env::var("PRESET_PATCHER_PROJECT") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: PRESET_PATCHER_PROJECT is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    Ok(env::current_dir()?.canonicalize()?)
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
    if !modified.is_empty() && !modified.ends_with('\n') {
        println!();
    }
}

/// Text between backticks is highlighted.
fn highlight_note(note: &str) -> String {
    note.split('`')
        .enumerate()
        .map(|(idx, part)| {
            if idx % 2 == 1 {
                part.cyan().bold().to_string()
            } else {
                part.to_string()
            }
        })
        .collect()
}

fn recipe_name(recipe: &Recipe, path: &Path) -> String {
    if !recipe.meta.name.is_empty() {
        return recipe.meta.name.clone();
    }
    let file = preset_patcher::recipe::resolve_recipe_path(path);
    file.parent()
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| file.display().to_string())
}

fn print_file_changes(files: &[FileChange], dry_run: bool, show_diff: bool) {
    for file in files {
        let verb = match (file.is_changed(), dry_run) {
            (true, true) => "would change",
            (true, false) => "changed",
            (false, _) => "unchanged",
        };
        println!("    {} {}", verb.dimmed(), file.path.display());
        if file.anchors_missed > 0 {
            println!(
                "    {}",
                format!("{} anchor(s) not found", file.anchors_missed).yellow()
            );
        }
        if show_diff && file.is_changed() {
            display_diff(&file.path, &file.original, &file.patched);
        }
    }
}

fn cmd_apply(
    recipe_path: &Path,
    project: Option<PathBuf>,
    options: Vec<(String, bool)>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    // 1. Resolve project path
    let project = resolve_project(project)?;

    // 2. Load recipe and build the run context
    let recipe = load_from_path(recipe_path)?;
    let context = RunContext::for_recipe_path(&project, recipe_path)?
        .with_options(options.into_iter().collect())
        .with_dry_run(dry_run);

    println!("Recipe: {}", recipe_name(&recipe, recipe_path));
    println!("Project: {}", project.display());
    if dry_run {
        println!("{}", "[DRY RUN - nothing will be written or executed]".cyan());
    }
    println!();

    // 3. Run
    let mut collaborators = SystemCollaborators::new(context.project_root());
    let results = run_recipe(&recipe, &context, &mut collaborators);

    // 4. Report results
    let mut total_completed = 0;
    let mut total_skipped = 0;
    let mut total_planned = 0;
    let mut total_failed = 0;

    for (label, result) in results {
        match result {
            Ok(outcome) => {
                let marker = match outcome {
                    StepOutcome::Completed { .. } | StepOutcome::Edited { .. } => "✓".green(),
                    StepOutcome::Skipped { .. } => "⊘".cyan(),
                    StepOutcome::Planned { .. } => "⊙".yellow(),
                };
                println!("{} {}: {}", marker, label, outcome);

                match &outcome {
                    StepOutcome::Edited { files } => {
                        print_file_changes(files, dry_run, show_diff);
                        if dry_run {
                            total_planned += 1;
                        } else {
                            total_completed += 1;
                        }
                    }
                    StepOutcome::Completed { .. } => total_completed += 1,
                    StepOutcome::Skipped { .. } => total_skipped += 1,
                    StepOutcome::Planned { .. } => total_planned += 1,
                }
            }
            Err(e) => {
                eprintln!("{} {}: Error - {}", "✗".red(), label, e);
                total_failed += 1;
            }
        }
    }

    // 5. Summary
    println!();
    println!("{}", "Summary:".bold());
    println!("  {} completed", format!("{}", total_completed).green());
    println!("  {} planned", format!("{}", total_planned).yellow());
    println!("  {} skipped", format!("{}", total_skipped).cyan());
    println!("  {} failed", format!("{}", total_failed).red());

    if total_failed > 0 {
        std::process::exit(1);
    }

    if !dry_run && !recipe.meta.post_install.is_empty() {
        println!();
        for note in &recipe.meta.post_install {
            println!("  {}", highlight_note(note));
        }
    }

    Ok(())
}

fn cmd_show(recipe_path: &Path, options: Vec<(String, bool)>) -> Result<()> {
    let recipe = load_from_path(recipe_path)?;
    let overrides: BTreeMap<String, bool> = options.into_iter().collect();
    let resolved = resolve_options(&recipe.options, &overrides)?;

    println!("{}", recipe_name(&recipe, recipe_path).bold());
    if let Some(description) = &recipe.meta.description {
        println!("{}", description.dimmed());
    }
    if !resolved.is_empty() {
        println!();
        println!("Options:");
        for (name, value) in &resolved {
            println!("  {} = {}", name, value);
        }
    }
    println!();
    print_steps(&recipe.steps, &resolved, 0);
    Ok(())
}

fn print_steps(steps: &[Step], options: &BTreeMap<String, bool>, depth: usize) {
    let indent = "  ".repeat(depth);
    for step in steps {
        let active = step.when.as_deref().map_or(true, |when| {
            let condition = Condition::parse(when);
            options
                .get(condition.option)
                .is_some_and(|value| condition.holds(*value))
        });

        let marker = if active { "•".green() } else { "⊘".dimmed() };
        let mut line = format!(
            "{indent}{marker} {} {}",
            step.label(),
            format!("({})", step.action.kind()).dimmed()
        );
        if let Some(when) = &step.when {
            line.push_str(&format!(" {}", format!("[when {when}]").cyan()));
        }
        println!("{line}");

        match &step.action {
            StepAction::Group { steps } => print_steps(steps, options, depth + 1),
            StepAction::ApplyPreset { preset, .. } => {
                println!("{indent}    {} {}", "→".dimmed(), preset);
            }
            StepAction::EditFiles { operations, .. } => {
                println!(
                    "{indent}    {}",
                    format!("{} operation(s)", operations.len()).dimmed()
                );
            }
            _ => {}
        }
    }
}

fn cmd_list(dir: Option<PathBuf>) -> Result<()> {
    let root = match dir {
        Some(dir) => dir,
        None => env::current_dir()?,
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(&root).max_depth(2) {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
        {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();

    let mut found = 0;
    for file in files {
        let recipe = match load_from_path(&file) {
            Ok(recipe) => recipe,
            Err(e) => {
                tracing::debug!(file = %file.display(), error = %e, "not a recipe");
                continue;
            }
        };
        found += 1;

        println!(
            "{} {}",
            recipe_name(&recipe, &file).bold(),
            format!("({})", file.display()).dimmed()
        );
        if let Some(description) = &recipe.meta.description {
            println!("  {}", description);
        }
        for (name, default) in &recipe.options {
            println!("  {} {} = {}", "option".dimmed(), name, default);
        }
    }

    if found == 0 {
        println!(
            "{}",
            format!("No recipes found under {}", root.display()).yellow()
        );
    }

    Ok(())
}
