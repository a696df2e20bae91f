// tests/example_config.rs

mod common;

use std::fs;
use std::path::Path;

use assetdag::cli::{CliArgs, Command};
use assetdag::config::{ConfigFile, load_from_str};
use assetdag::dag::TaskGraph;

use crate::common::{TestResult, init_tracing, with_timeout};

const DEMO: &str = include_str!("../demos/Assetdag.toml");

#[test]
fn demo_config_is_valid() -> TestResult {
    let cfg = ConfigFile::try_from(load_from_str(DEMO)?)?;
    let graph = TaskGraph::from_config(&cfg, Path::new("/site"))?;

    let requested = assetdag::requested_tasks(&cfg, &[]);
    assert_eq!(requested, vec!["css", "js"]);
    assert_eq!(graph.execution_order(&requested)?, vec!["images", "css", "js"]);

    let css = graph.task("css").unwrap();
    assert_eq!(
        css.artifacts_for(Path::new("style.scss")),
        vec![Path::new("style.css"), Path::new("style.min.css")]
    );
    assert_eq!(css.watch_patterns(), &["library/_src/scss/**/*".to_string()]);
    assert_eq!(
        graph.task("js").unwrap().bundle_artifacts(),
        vec![Path::new("scripts.min.js")]
    );
    Ok(())
}

fn write(root: &Path, rel: &str, contents: &str) -> std::io::Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

const SHELL_CONFIG: &str = r#"
[config]
default = ["css", "js"]

[[task]]
name = "images"
src = "_src/images/**/*"
dest = "images"
steps = [{ kind = "optimize_image", cmd = "cat" }]

[[task]]
name = "css"
src = "_src/scss/style.scss"
dest = "css"
after = ["images"]
steps = [
  { kind = "compile_stylesheet", cmd = "cat {input}" },
  { kind = "rename", extension = "css" },
  { kind = "emit" },
  { kind = "post_process_css", processors = ["tr -d ' \n'"] },
  { kind = "rename", suffix = ".min" },
]

[[task]]
name = "js"
src = "_src/js/**/*.js"
dest = "js"
steps = [
  { kind = "concat", file = "scripts.js", order = "requires" },
  { kind = "rename", suffix = ".min" },
  { kind = "minify_script", cmd = "tr -s ' '" },
]
"#;

fn run_args(root: &Path, tasks: &[&str]) -> CliArgs {
    CliArgs {
        config: root.join("Assetdag.toml").to_string_lossy().into_owned(),
        log_level: None,
        concurrency: None,
        dry_run: false,
        command: Some(Command::Run {
            tasks: tasks.iter().map(|s| s.to_string()).collect(),
        }),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn builds_a_small_site_with_shell_tools() -> TestResult {
    with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        write(root, "Assetdag.toml", SHELL_CONFIG)?;
        write(root, "_src/images/logo.png", "PNG")?;
        write(root, "_src/images/icons/menu.png", "ICON")?;
        write(root, "_src/scss/style.scss", "body { color: red; }\n")?;
        write(root, "_src/scss/_partial.scss", "a { }\n")?;
        write(root, "_src/js/app.js", "// requires: lib.js\napp();")?;
        write(root, "_src/js/lib.js", "function  lib()  {}")?;

        let ok = assetdag::run(run_args(root, &[])).await?;
        assert!(ok);

        assert_eq!(fs::read_to_string(root.join("images/icons/menu.png"))?, "ICON");
        assert_eq!(fs::read_to_string(root.join("css/style.css"))?, "body { color: red; }\n");
        assert_eq!(fs::read_to_string(root.join("css/style.min.css"))?, "body{color:red;}");
        assert!(!root.join("css/_partial.css").exists());
        assert_eq!(
            fs::read_to_string(root.join("js/scripts.min.js"))?,
            "function lib() {}\n// requires: lib.js\napp();"
        );
        assert!(!root.join("js/scripts.js").exists());

        // Nothing changed: everything is up to date and still succeeds.
        let before = fs::metadata(root.join("css/style.min.css"))?.modified()?;
        assert!(assetdag::run(run_args(root, &[])).await?);
        assert_eq!(fs::metadata(root.join("css/style.min.css"))?.modified()?, before);
        Ok(())
    })
    .await
}

#[cfg(unix)]
#[tokio::test]
async fn failing_tool_fails_the_run_and_blocks_dependents() -> TestResult {
    with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        let config = SHELL_CONFIG.replace(
            r#"{ kind = "optimize_image", cmd = "cat" }"#,
            r#"{ kind = "optimize_image", cmd = "echo 'corrupt image' >&2; exit 1" }"#,
        );
        write(root, "Assetdag.toml", &config)?;
        write(root, "_src/images/logo.png", "PNG")?;
        write(root, "_src/scss/style.scss", "body { }\n")?;
        write(root, "_src/js/lib.js", "lib();")?;

        let ok = assetdag::run(run_args(root, &[])).await?;
        assert!(!ok);

        // css depends on images and never ran; js is independent.
        assert!(!root.join("css").exists());
        assert!(root.join("js/scripts.min.js").exists());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn unknown_task_on_command_line_is_an_error() -> TestResult {
    with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir()?;
        write(dir.path(), "Assetdag.toml", SHELL_CONFIG)?;

        let err = assetdag::run(run_args(dir.path(), &["fonts"])).await.unwrap_err();
        assert!(err.is_configuration());
        Ok(())
    })
    .await
}
