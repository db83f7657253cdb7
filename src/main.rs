//! wbs - work breakdown structures over plain Markdown files.

use std::path::{Path, PathBuf};
use std::process;

use chrono::{Days, Local};
use clap::Parser;
use tui_wbs::cli::{Cli, Commands};
use tui_wbs::lock::ProjectLock;
use tui_wbs::models::Project;
use tui_wbs::{Error, config, export, parser};

/// Exit codes: 0 clean, 2 unrecoverable parse, 3 locked, 4 save I/O.
const EXIT_PARSE: i32 = 2;
const EXIT_LOCKED: i32 = 3;
const EXIT_SAVE: i32 = 4;

fn main() {
    let cli = Cli::parse();
    let dir = cli
        .project_dir
        .unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Some(Commands::Check) => check(&dir),
        Some(Commands::Export { output }) => export_project(&dir, &output),
        Some(Commands::Init { name }) => init(&dir, name),
        None => summary(&dir),
    }
}

fn load_or_exit(dir: &Path) -> Project {
    match parser::load_project(dir) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("Error: cannot read project directory {}: {}", dir.display(), e);
            process::exit(EXIT_PARSE);
        }
    }
}

fn summary(dir: &Path) {
    let project = load_or_exit(dir);
    let name = if project.config.name.is_empty() {
        dir.display().to_string()
    } else {
        project.config.name.clone()
    };
    println!("{}", name);
    for doc in &project.documents {
        println!(
            "  {}: {} items",
            doc.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| doc.path.display().to_string()),
            doc.all_nodes().len()
        );
    }
    let total = project.all_nodes().len();
    println!("{} items across {} files", total, project.documents.len());
    if !project.warnings.is_empty() {
        println!("{} warning(s); run `wbs check` for details", project.warnings.len());
    }
}

fn check(dir: &Path) {
    let project = load_or_exit(dir);
    if project.warnings.is_empty() {
        println!("OK: {} items, no warnings", project.all_nodes().len());
        return;
    }
    for warning in &project.warnings {
        println!("{}", warning);
    }
    println!("{} warning(s)", project.warnings.len());
}

fn export_project(dir: &Path, output: &Path) {
    let project = load_or_exit(dir);
    let result = match output.extension().and_then(|e| e.to_str()) {
        Some("csv") => export::export_csv(&project, output),
        Some("mmd") => export::export_mermaid(&project, output),
        Some("md") => export::export_markdown_table(&project, output),
        _ => export::export_json(&project, output),
    };
    match result {
        Ok(()) => println!("Exported to {}", output.display()),
        Err(e) => {
            eprintln!("Error: export failed: {}", e);
            process::exit(EXIT_SAVE);
        }
    }
}

fn sample_content(name: &str) -> String {
    let today = Local::now().date_naive();
    let d = |offset: u64| (today + Days::new(offset)).to_string();
    format!(
        "# {name}\n\
         <!-- status: IN_PROGRESS | priority: HIGH | start: {} | end: {} -->\n\
         \n\
         Project overview memo.\n\
         \n\
         ## Phase 1: Design\n\
         <!-- priority: HIGH | start: {} | end: {} -->\n\
         \n\
         ### Requirements Analysis\n\
         <!-- priority: HIGH | start: {} | end: {} -->\n\
         \n\
         ### Technical Review\n\
         <!-- start: {} | end: {} -->\n\
         \n\
         ## Phase 2: Implementation\n\
         <!-- priority: HIGH | start: {} | end: {} -->\n\
         \n\
         ### Core Development\n\
         <!-- priority: HIGH | start: {} | end: {} -->\n\
         \n\
         ### Testing\n\
         <!-- start: {} | end: {} -->\n",
        d(0),
        d(30),
        d(0),
        d(5),
        d(0),
        d(2),
        d(2),
        d(5),
        d(5),
        d(25),
        d(5),
        d(15),
        d(15),
        d(25),
    )
}

fn init(dir: &Path, name: Option<String>) {
    let (lock, takeover) = match ProjectLock::acquire(dir) {
        Ok(acquired) => acquired,
        Err(Error::Locked { pid }) => {
            eprintln!("Error: project locked by live process {}", pid);
            process::exit(EXIT_LOCKED);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(EXIT_SAVE);
        }
    };
    if let Some(warning) = takeover {
        eprintln!("Warning: {}", warning.message);
    }

    let result = (|| -> tui_wbs::Result<()> {
        let name = name.unwrap_or_else(|| {
            dir.canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .unwrap_or_else(|| "My Project".to_string())
        });
        let sample = dir.join("project.wbs.md");
        if !sample.exists() {
            std::fs::write(&sample, sample_content(&name))?;
            println!("Created {}", sample.display());
        }
        let mut cfg = config::load_config(dir).unwrap_or_else(|_| {
            let mut cfg = config::ProjectConfig::default();
            cfg.ensure_default_views();
            cfg
        });
        if cfg.name.is_empty() {
            cfg.name = name;
        }
        config::save_config(dir, &cfg)?;
        println!("Wrote {}", config::resolve_config_path(dir).display());
        Ok(())
    })();

    let release = lock.release();
    if let Err(e) = result.and(release) {
        eprintln!("Error: init failed: {}", e);
        process::exit(EXIT_SAVE);
    }
}
