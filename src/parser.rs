//! Markdown parser for WBS files.
//!
//! Parses a directory of `*.wbs.md` files into a [`Project`]. Parsing
//! never fails a file load: anything recoverable becomes a
//! [`ParseWarning`] and the tree that could be built is kept. Only an
//! unreadable project directory is an error.

use std::fs;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use chrono::NaiveDate;
use regex::Regex;

use crate::Result;
use crate::config;
use crate::models::{
    Document, Node, ParseWarning, Priority, Project, RawLines, Status, WarningKind,
    duration_to_days,
};

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("invalid heading regex"));
static META_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<!--\s*(.+?)\s*-->\s*$").expect("invalid metadata regex"));

/// One heading plus everything up to the next heading.
struct Section {
    line_num: usize,
    level: u8,
    title: String,
    heading_line: String,
    /// All lines after the heading, verbatim (metadata comment included).
    rest: Vec<String>,
    /// Parsed metadata pairs, in comment order.
    meta: Vec<(String, String)>,
    meta_found: bool,
    /// Body lines only (metadata comment excluded), for the memo.
    body: Vec<String>,
}

/// Parse one markdown string into a document.
pub fn parse_markdown(content: &str, file_name: &str) -> Document {
    let mut doc = Document::new(file_name.into());
    doc.raw_content = content.to_string();

    let mut sections: Vec<Section> = Vec::new();
    for (i, line) in content.split('\n').enumerate() {
        if let Some(caps) = HEADING_RE.captures(line) {
            sections.push(Section {
                line_num: i + 1,
                level: caps[1].len() as u8,
                title: caps[2].trim().to_string(),
                heading_line: line.to_string(),
                rest: Vec::new(),
                meta: Vec::new(),
                meta_found: false,
                body: Vec::new(),
            });
            continue;
        }
        let Some(section) = sections.last_mut() else {
            // Preamble before the first heading is dropped; a document
            // with no headings at all warns below.
            continue;
        };
        section.rest.push(line.to_string());
        let meta_position_open =
            !section.meta_found && section.body.iter().all(|l| l.trim().is_empty());
        if meta_position_open
            && let Some(caps) = META_COMMENT_RE.captures(line.trim())
        {
            section.meta_found = true;
            section.meta = parse_metadata(&caps[1], file_name, i + 1, &mut doc.warnings);
        } else {
            section.body.push(line.to_string());
        }
    }

    if sections.is_empty() {
        doc.warnings.push(ParseWarning::new(
            WarningKind::NoHeadings,
            file_name,
            0,
            "No headings found in file",
        ));
        return doc;
    }

    let nodes: Vec<Node> = sections
        .into_iter()
        .map(|s| build_node(s, file_name, &mut doc.warnings))
        .collect();
    doc.roots = build_forest(nodes, file_name, &mut doc.warnings);
    doc
}

/// Split `key: value | key: value` into ordered pairs.
fn parse_metadata(
    payload: &str,
    file_name: &str,
    line_num: usize,
    warnings: &mut Vec<ParseWarning>,
) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for part in payload.split('|') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let Some((key, value)) = part.split_once(':') else {
            warnings.push(ParseWarning::new(
                WarningKind::InvalidValue,
                file_name,
                line_num,
                format!("Invalid metadata field (no colon): '{}'", part),
            ));
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim().to_string();
        if let Some(slot) = pairs.iter_mut().find(|(k, _)| *k == key) {
            warnings.push(ParseWarning::new(
                WarningKind::DuplicateKey,
                file_name,
                line_num,
                format!("Duplicate metadata key '{}', last value wins", key),
            ));
            slot.1 = value;
        } else {
            pairs.push((key, value));
        }
    }
    pairs
}

const BUILTIN_KEYS: &[&str] = &[
    "status", "assignee", "duration", "priority", "depends", "start", "end", "milestone",
    "progress",
];

fn build_node(section: Section, file_name: &str, warnings: &mut Vec<ParseWarning>) -> Node {
    let mut node = Node::new(section.title, section.level);
    node.source_file = file_name.to_string();
    node.edited = false;

    let line = section.line_num;
    for (key, value) in &section.meta {
        match key.as_str() {
            "status" => {
                node.status = Status::parse(value).unwrap_or_else(|| {
                    warnings.push(ParseWarning::new(
                        WarningKind::InvalidValue,
                        file_name,
                        line,
                        format!("Invalid status: '{}', defaulting to TODO", value),
                    ));
                    Status::Todo
                });
            }
            "priority" => {
                node.priority = Priority::parse(value).unwrap_or_else(|| {
                    warnings.push(ParseWarning::new(
                        WarningKind::InvalidValue,
                        file_name,
                        line,
                        format!("Invalid priority: '{}', defaulting to MEDIUM", value),
                    ));
                    Priority::Medium
                });
            }
            "assignee" => node.assignee = value.clone(),
            "duration" => node.duration = value.clone(),
            "depends" => {
                node.depends = value
                    .split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
            }
            "start" => node.start = parse_date(value, file_name, line, warnings),
            "end" => node.end = parse_date(value, file_name, line, warnings),
            "milestone" => {
                node.milestone = matches!(value.to_lowercase().as_str(), "true" | "yes" | "1");
            }
            "progress" => {
                if !value.is_empty() {
                    match value.parse::<i64>() {
                        Ok(p) => node.progress = Some(p.clamp(0, 100) as u8),
                        Err(_) => warnings.push(ParseWarning::new(
                            WarningKind::InvalidValue,
                            file_name,
                            line,
                            format!("Invalid progress: '{}'", value),
                        )),
                    }
                }
            }
            _ => node.custom_fields.push((key.clone(), value.clone())),
        }
    }

    node.memo = section.body.join("\n").trim().to_string();
    node.raw = Some(RawLines {
        heading: section.heading_line,
        rest: section.rest,
    });
    node.normalize_milestone();

    if let (Some(start), Some(end), Some(days)) =
        (node.start, node.end, duration_to_days(&node.duration))
        && !node.milestone
        && start + chrono::Days::new(days.max(0) as u64) != end
    {
        warnings.push(ParseWarning::new(
            WarningKind::DateConflict,
            file_name,
            line,
            format!(
                "start, end and duration disagree for '{}' (source values kept)",
                node.title
            ),
        ));
    }

    node
}

fn parse_date(
    value: &str,
    file_name: &str,
    line_num: usize,
    warnings: &mut Vec<ParseWarning>,
) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.parse::<NaiveDate>() {
        Ok(d) => Some(d),
        Err(_) => {
            warnings.push(ParseWarning::new(
                WarningKind::InvalidValue,
                file_name,
                line_num,
                format!("Invalid date format: '{}'", value),
            ));
            None
        }
    }
}

/// Fold a flat heading sequence into a forest. A level jump deeper than
/// parent+1 attaches to the nearest shallower ancestor with a warning.
fn build_forest(
    nodes: Vec<Node>,
    file_name: &str,
    warnings: &mut Vec<ParseWarning>,
) -> Vec<Arc<Node>> {
    let mut roots: Vec<Arc<Node>> = Vec::new();
    let mut stack: Vec<Node> = Vec::new();

    fn close_one(stack: &mut Vec<Node>, roots: &mut Vec<Arc<Node>>) {
        if let Some(done) = stack.pop() {
            let done = Arc::new(done);
            match stack.last_mut() {
                Some(parent) => parent.children.push(done),
                None => roots.push(done),
            }
        }
    }

    for node in nodes {
        while stack.last().is_some_and(|open| open.level >= node.level) {
            close_one(&mut stack, &mut roots);
        }
        if let Some(parent) = stack.last()
            && node.level > parent.level + 1
        {
            warnings.push(ParseWarning::new(
                WarningKind::HeadingLevelJump,
                file_name,
                0,
                format!(
                    "Heading level skip: h{} -> h{} for '{}', attaching to '{}'",
                    parent.level, node.level, node.title, parent.title
                ),
            ));
        }
        stack.push(node);
    }
    while !stack.is_empty() {
        close_one(&mut stack, &mut roots);
    }
    roots
}

/// NUL byte in the first 8 KiB means binary.
fn is_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(8192)].contains(&0)
}

/// Parse a single `.wbs.md` file. Unreadable, binary or non-UTF-8
/// files yield an empty document with a file-level warning.
pub fn parse_file(path: &Path) -> Document {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mut doc = Document::new(path.to_path_buf());

    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            doc.warnings.push(ParseWarning::new(
                WarningKind::UnreadableFile,
                &file_name,
                0,
                format!("Cannot read file: {}", e),
            ));
            return doc;
        }
    };
    if is_binary(&bytes) {
        doc.warnings.push(ParseWarning::new(
            WarningKind::UnreadableFile,
            &file_name,
            0,
            "File appears to be binary, skipping",
        ));
        return doc;
    }
    let content = match String::from_utf8(bytes) {
        Ok(c) => c,
        Err(_) => {
            doc.warnings.push(ParseWarning::new(
                WarningKind::UnreadableFile,
                &file_name,
                0,
                "File is not valid UTF-8, skipping",
            ));
            return doc;
        }
    };

    let mut parsed = parse_markdown(&content, &file_name);
    parsed.path = path.to_path_buf();
    parsed
}

/// Parse all `.wbs.md` files in a directory. Only an unreadable
/// directory is an error; everything else degrades to warnings.
pub fn parse_project(dir: &Path) -> Result<Project> {
    let mut project = Project::new(dir.to_path_buf());

    let mut files: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .map(|n| n.to_string_lossy().ends_with(".wbs.md"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();

    if files.is_empty() {
        project.warnings.push(ParseWarning::new(
            WarningKind::NoHeadings,
            dir.display().to_string(),
            0,
            "No *.wbs.md files found in directory",
        ));
        return Ok(project);
    }

    for path in files {
        let doc = parse_file(&path);
        project.warnings.extend(doc.warnings.iter().cloned());
        project.documents.push(doc);
    }

    validate_depends(&mut project);
    Ok(project)
}

/// Load config and documents together; a broken config file degrades
/// to defaults plus a warning.
pub fn load_project(dir: &Path) -> Result<Project> {
    let mut project = parse_project(dir)?;
    match config::load_config(dir) {
        Ok(cfg) => project.config = cfg,
        Err(e) => {
            let mut cfg = config::ProjectConfig::default();
            cfg.ensure_default_views();
            project.config = cfg;
            project.warnings.push(ParseWarning::new(
                WarningKind::InvalidValue,
                dir.display().to_string(),
                0,
                format!("Config ignored: {}", e),
            ));
        }
    }
    Ok(project)
}

/// Project-wide dependency checks: unresolved targets, ambiguous
/// duplicate titles, and cycles.
fn validate_depends(project: &mut Project) {
    use std::collections::{HashMap, HashSet};

    let mut title_counts: HashMap<String, usize> = HashMap::new();
    let mut deps_by_title: HashMap<String, Vec<String>> = HashMap::new();
    let mut unresolved: Vec<ParseWarning> = Vec::new();

    {
        let all = project.all_nodes();
        for node in &all {
            *title_counts.entry(node.title.clone()).or_insert(0) += 1;
            deps_by_title
                .entry(node.title.clone())
                .or_insert_with(|| node.depends.clone());
        }
        for node in &all {
            for dep in &node.depends {
                if !title_counts.contains_key(dep) {
                    unresolved.push(ParseWarning::new(
                        WarningKind::UnresolvedDependency,
                        &node.source_file,
                        0,
                        format!("Node '{}' depends on '{}' which does not exist", node.title, dep),
                    ));
                }
            }
        }
    }

    for (title, count) in &title_counts {
        if *count > 1 {
            project.warnings.push(ParseWarning::new(
                WarningKind::DuplicateTitle,
                "",
                0,
                format!(
                    "Duplicate title '{}' found {} times, depends may be ambiguous",
                    title, count
                ),
            ));
        }
    }
    project.warnings.extend(unresolved);

    fn visit(
        title: &str,
        deps: &HashMap<String, Vec<String>>,
        visited: &mut HashSet<String>,
        on_stack: &mut HashSet<String>,
        warnings: &mut Vec<ParseWarning>,
    ) -> bool {
        visited.insert(title.to_string());
        on_stack.insert(title.to_string());
        for dep in deps.get(title).map(Vec::as_slice).unwrap_or_default() {
            if !visited.contains(dep) {
                if visit(dep, deps, visited, on_stack, warnings) {
                    return true;
                }
            } else if on_stack.contains(dep) {
                warnings.push(ParseWarning::new(
                    WarningKind::CircularDependency,
                    "",
                    0,
                    format!("Circular dependency detected involving '{}' -> '{}'", title, dep),
                ));
                return true;
            }
        }
        on_stack.remove(title);
        false
    }

    let mut visited = HashSet::new();
    let titles: Vec<String> = deps_by_title.keys().cloned().collect();
    for title in titles {
        if !visited.contains(&title) {
            let mut on_stack = HashSet::new();
            visit(
                &title,
                &deps_by_title,
                &mut visited,
                &mut on_stack,
                &mut project.warnings,
            );
        }
    }
}
