//! Integration tests for the recipe runner
//!
//! Runs the shipped `presets/inertia` recipe against a fake Laravel project.
//! Package installs and commands are recorded instead of executed; template
//! extraction and deletion hit the real filesystem.

use preset_patcher::recipe::{
    load_from_path, load_from_str, run_recipe, ConfigError, RunContext, StepError, StepOutcome,
};
use preset_patcher::{CollaboratorError, Collaborators, Ecosystem, SystemCollaborators};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Recorder {
    system: SystemCollaborators,
    calls: Vec<String>,
}

impl Recorder {
    fn new(project: &Path) -> Self {
        Self {
            system: SystemCollaborators::new(project),
            calls: Vec::new(),
        }
    }
}

impl Collaborators for Recorder {
    fn install_packages(
        &mut self,
        ecosystem: Ecosystem,
        packages: &[String],
        dev: bool,
    ) -> Result<(), CollaboratorError> {
        let (program, args) = SystemCollaborators::install_command(ecosystem, packages, dev);
        self.calls.push(format!("{program} {}", args.join(" ")));
        Ok(())
    }

    fn extract_templates(
        &mut self,
        source: &Path,
        destination: &Path,
    ) -> Result<usize, CollaboratorError> {
        self.system.extract_templates(source, destination)
    }

    fn delete_paths(&mut self, paths: &[PathBuf]) -> Result<(), CollaboratorError> {
        self.system.delete_paths(paths)
    }

    fn execute_command(
        &mut self,
        command: &str,
        arguments: &[String],
    ) -> Result<(), CollaboratorError> {
        self.calls.push(format!("{command} {}", arguments.join(" ")));
        Ok(())
    }
}

fn preset_dir(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("presets").join(name)
}

const PACKAGE_JSON: &str = r#"{
    "private": true,
    "scripts": {
        "dev": "vite"
    },
    "devDependencies": {
        "vite": "^2.9.0",
        "svelte": "^3.48.0",
        "@inertiajs/inertia": "^0.11.0",
        "@inertiajs/inertia-svelte": "^0.8.0"
    }
}
"#;

const MIDDLEWARE: &str = r#"<?php

namespace App\Http\Middleware;

class HandleInertiaRequests extends Middleware
{
    public function version(Request $request): ?string
    {
        return parent::version($request);
    }

    public function share(Request $request): array
    {
        return array_merge(parent::share($request), [
            //
        ]);
    }
}
"#;

const KERNEL: &str = r#"<?php

    protected $middlewareGroups = [
        'web' => [
            \Illuminate\Routing\Middleware\SubstituteBindings::class,
        ],

        'api' => [
            \Illuminate\Routing\Middleware\SubstituteBindings::class,
        ],
    ];
"#;

const INERTIA_CONFIG: &str = r#"<?php

return [

    /*
    | Testing
    */

    'testing' => [

        'page_paths' => [

            resource_path('js/Pages'),

        ],
    ],

];
"#;

const VITE_CONFIG: &str = "import { defineConfig } from 'vite'
import laravel from 'vite-plugin-laravel'

export default defineConfig({
\tplugins: [
\t\tlaravel(),
\t],
})
";

const LAYOUT: &str = "<main>
\t<slot />
</main>

<style>
\tmain { margin: 0 auto; }
</style>
";

/// Helper to create a Laravel-shaped project in a temp dir
fn setup_laravel_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let files = [
        ("package.json", PACKAGE_JSON),
        (
            "routes/web.php",
            "<?php\n\nRoute::get('/', function () {\n    return view('welcome');\n});\n",
        ),
        ("app/Http/Middleware/HandleInertiaRequests.php", MIDDLEWARE),
        ("app/Http/Kernel.php", KERNEL),
        ("config/inertia.php", INERTIA_CONFIG),
        ("vite.config.ts", VITE_CONFIG),
        ("resources/views/layouts/default.svelte", LAYOUT),
        ("resources/views/welcome.blade.php", "<h1>Welcome</h1>\n"),
        (
            "tailwind.config.js",
            "module.exports = {\n  content: ['./resources/**/*.vue'],\n}\n",
        ),
    ];
    for (name, content) in files {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

fn read(project: &TempDir, name: &str) -> String {
    fs::read_to_string(project.path().join(name)).unwrap()
}

fn run_inertia(
    project: &TempDir,
    options: &[(&str, bool)],
) -> (Vec<(String, Result<StepOutcome, StepError>)>, Vec<String>) {
    let recipe_path = preset_dir("inertia");
    let recipe = load_from_path(&recipe_path).unwrap();
    let options: BTreeMap<String, bool> = options
        .iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect();
    let context = RunContext::for_recipe_path(project.path(), &recipe_path)
        .unwrap()
        .with_options(options);

    let mut recorder = Recorder::new(project.path());
    let report = run_recipe(&recipe, &context, &mut recorder);
    (report, recorder.calls)
}

#[test]
fn test_shipped_presets_load() {
    for name in ["inertia", "vite", "pest"] {
        let recipe = load_from_path(preset_dir(name)).unwrap();
        assert!(!recipe.steps.is_empty(), "{name} has no steps");
        assert!(recipe.meta.name.starts_with("laravel:"));
    }
}

#[test]
fn test_inertia_full_run() {
    let project = setup_laravel_project();
    let (report, calls) = run_inertia(&project, &[]);

    for (label, result) in &report {
        assert!(result.is_ok(), "{label} failed: {result:?}");
    }

    // Nested presets ran first, with inherited options
    assert_eq!(
        calls,
        [
            "composer require innocenzi/laravel-vite",
            "npm install -D vite vite-plugin-laravel",
            "npm install -D tailwindcss autoprefixer postcss",
            "php artisan vendor:publish --tag=vite-config",
            "composer require --dev pestphp/pest pestphp/pest-plugin-laravel",
            "php artisan pest:install --no-interaction",
            "composer require inertiajs/inertia-laravel",
            "npm install -D svelte svelte-loader @sveltejs/vite-plugin-svelte @inertiajs/progress @inertiajs/inertia @inertiajs/inertia-svelte",
            "php artisan vendor:publish --provider=Inertia\\ServiceProvider",
            "php artisan inertia:middleware",
        ]
    );

    let labels: Vec<&str> = report.iter().map(|(label, _)| label.as_str()).collect();
    assert!(labels.contains(&"install Vite > install PHP dependencies"));
    assert!(labels.contains(&"install Vite > trust local certificates"));
    assert!(labels.contains(&"install Inertia scaffolding > update Vite config"));

    // package.json: runtime packages moved, indentation kept
    let package = read(&project, "package.json");
    assert!(package.contains("\n    \"private\": true"));
    assert!(package.ends_with("}\n"));
    let json: Value = serde_json::from_str(&package).unwrap();
    let deps: Vec<&String> = json["dependencies"].as_object().unwrap().keys().collect();
    assert_eq!(
        deps,
        ["svelte", "@inertiajs/inertia", "@inertiajs/inertia-svelte"]
    );
    let dev: Vec<&String> = json["devDependencies"].as_object().unwrap().keys().collect();
    assert_eq!(dev, ["vite"]);

    // templates extracted, welcome view removed
    assert!(read(&project, "resources/scripts/main.ts").contains("createInertiaApp"));
    assert!(project
        .path()
        .join("resources/scripts/vite/inertia-layout.ts")
        .exists());
    assert!(!project
        .path()
        .join("resources/views/welcome.blade.php")
        .exists());

    assert!(read(&project, "routes/web.php").contains("return inertia('welcome');"));

    let middleware = read(&project, "app/Http/Middleware/HandleInertiaRequests.php");
    assert!(middleware.contains("    {\n        return vite()->getHash();\n    }"));
    assert!(!middleware.contains("parent::version"));
    assert!(!middleware.contains("//"));
    assert!(middleware.contains(
        "array_merge(parent::share($request), [\n            'versions' => [\n            \t'php' => PHP_VERSION,\n"
    ));
    assert!(middleware.contains("\\Illuminate\\Foundation\\Application::VERSION\n            ],\n        ]);"));

    let kernel = read(&project, "app/Http/Kernel.php");
    assert_eq!(kernel.matches("HandleInertiaRequests").count(), 1);
    assert!(kernel.contains(
        "SubstituteBindings::class,\n            \\App\\Http\\Middleware\\HandleInertiaRequests::class,\n        ],\n\n        'api'"
    ));

    let config = read(&project, "config/inertia.php");
    assert!(config.contains("resource_path('views/pages')"));
    assert!(!config.contains("\n\n"));
    assert!(config.contains("return [\n    \n    /*"));

    assert_eq!(
        read(&project, "vite.config.ts"),
        "import { defineConfig } from 'vite'
import laravel from 'vite-plugin-laravel'
import {svelte} from '@sveltejs/vite-plugin-svelte'
import inertia from './resources/scripts/vite/inertia-layout'

export default defineConfig({
\toptimizeDeps: { include: [ '@inertiajs/inertia', ]},
\tplugins: [
\t\tinertia(),
\t\tsvelte(),
\t\tlaravel(),
\t],
})
"
    );

    assert_eq!(
        read(&project, "resources/views/layouts/default.svelte"),
        "<main>\n\t<slot />\n</main>\n"
    );
    assert!(read(&project, "tailwind.config.js").contains("*.svelte"));
}

#[test]
fn test_inertia_without_tailwind_or_pest() {
    let project = setup_laravel_project();
    let (report, calls) = run_inertia(&project, &[("tailwindcss", false), ("pest", false)]);

    assert!(report.iter().all(|(_, result)| result.is_ok()));
    assert!(!calls.iter().any(|call| call.contains("pest")));
    assert!(!calls.iter().any(|call| call.contains("tailwindcss")));

    let skipped = report
        .iter()
        .filter(|(_, result)| matches!(result, Ok(StepOutcome::Skipped { .. })))
        .count();
    // pest preset, tailwind install (inherited), https, inline CSS, tailwind config
    assert_eq!(skipped, 5);

    assert_eq!(read(&project, "resources/views/layouts/default.svelte"), LAYOUT);
    assert!(read(&project, "tailwind.config.js").contains("*.vue"));
}

#[test]
fn test_rerun_reports_unchanged_files() {
    let project = setup_laravel_project();
    let (first, _) = run_inertia(&project, &[]);
    assert!(first.iter().all(|(_, result)| result.is_ok()));

    // routes/web.php no longer contains view('welcome'), so a second run
    // leaves it as is
    let (second, _) = run_inertia(&project, &[]);
    let routes = second
        .iter()
        .find(|(label, _)| label.ends_with("update route file"))
        .unwrap();
    match &routes.1 {
        Ok(StepOutcome::Edited { files }) => assert!(!files[0].is_changed()),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn test_missing_target_stops_run() {
    let project = setup_laravel_project();
    fs::remove_file(project.path().join("config/inertia.php")).unwrap();

    let (report, calls) = run_inertia(&project, &[]);
    let (label, last) = report.last().unwrap();
    assert_eq!(
        label,
        "install Inertia scaffolding > register Inertia pages for testing"
    );
    assert!(matches!(last, Err(StepError::MissingFile { .. })));

    // Steps after the failure never ran
    assert_eq!(read(&project, "vite.config.ts"), VITE_CONFIG);
    assert_eq!(calls.last().unwrap(), "php artisan inertia:middleware");
}

#[test]
fn test_invalid_recipe_reports_every_issue() {
    let err = load_from_str(
        r#"
[options]
ssr = false

[[steps]]
when = "typescript"
type = "edit-files"
files = "a.txt"
operations = [
    { type = "remove-line", match = "(", start = 0 },
    { type = "update-content", replace = [{ search = "a", pattern = "b", with = "c" }] },
]
"#,
    )
    .unwrap_err();

    let source = match err {
        ConfigError::Validation { source, .. } => source,
        other => panic!("expected validation error, got {other}"),
    };
    assert_eq!(source.issues.len(), 4);
    let message = source.to_string();
    assert!(message.contains("undeclared option 'typescript'"));
    assert!(message.contains("start is 1-based"));
    assert!(message.contains("exactly one non-empty 'search' or 'pattern'"));
}

#[test]
fn test_dry_run_leaves_project_untouched() {
    let project = setup_laravel_project();
    let recipe_path = preset_dir("inertia");
    let recipe = load_from_path(&recipe_path).unwrap();
    let context = RunContext::for_recipe_path(project.path(), &recipe_path)
        .unwrap()
        .with_dry_run(true);
    let mut recorder = Recorder::new(project.path());

    let report = run_recipe(&recipe, &context, &mut recorder);
    assert!(report.iter().all(|(_, result)| result.is_ok()));
    assert!(recorder.calls.is_empty());

    let planned = report
        .iter()
        .filter(|(_, result)| matches!(result, Ok(StepOutcome::Planned { .. })))
        .count();
    assert!(planned >= 8);

    let vite = report
        .iter()
        .find(|(label, _)| label.ends_with("update Vite config"))
        .unwrap();
    match &vite.1 {
        Ok(StepOutcome::Edited { files }) => {
            assert!(files[0].is_changed());
            assert!(files[0].patched.contains("svelte(),"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert_eq!(read(&project, "vite.config.ts"), VITE_CONFIG);
    assert!(project
        .path()
        .join("resources/views/welcome.blade.php")
        .exists());
    assert!(!project.path().join("resources/scripts").exists());
}
