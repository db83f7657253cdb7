//! One-way exports: JSON, CSV, Mermaid gantt, and a Markdown table.
//!
//! These are generated on demand and never read back by the parser.

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::Result;
use crate::models::{Node, Project, Status};

fn node_to_json(node: &Node) -> serde_json::Value {
    let mut value = json!({
        "title": node.title,
        "level": node.level,
        "status": node.status,
        "priority": node.priority,
        "assignee": node.assignee,
        "duration": node.duration,
        "depends": node.depends,
        "start": node.start.map(|d| d.to_string()).unwrap_or_default(),
        "end": node.end.map(|d| d.to_string()).unwrap_or_default(),
        "milestone": node.milestone,
        "progress": node.computed_progress(),
        "memo": node.memo,
        "source_file": node.source_file,
    });
    let map = value.as_object_mut().expect("node json is an object");
    for (key, val) in &node.custom_fields {
        map.insert(key.clone(), json!(val));
    }
    if !node.children.is_empty() {
        map.insert(
            "children".to_string(),
            json!(node.children.iter().map(|c| node_to_json(c)).collect::<Vec<_>>()),
        );
    }
    value
}

/// Export the project tree to a JSON file.
pub fn export_json(project: &Project, output: &Path) -> Result<()> {
    let data = json!({
        "project_dir": project.dir.display().to_string(),
        "documents": project.documents.iter().map(|doc| json!({
            "file": doc.path.display().to_string(),
            "nodes": doc.roots.iter().map(|n| node_to_json(n)).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
    });
    fs::write(output, serde_json::to_string_pretty(&data)? + "\n")
        .map_err(crate::Error::Io)?;
    Ok(())
}

fn csv_escape(field: &str) -> String {
    if field.contains(['"', ',', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Export every node as one flat CSV row.
pub fn export_csv(project: &Project, output: &Path) -> Result<()> {
    let headers = [
        "title", "level", "status", "priority", "assignee", "duration", "depends", "start", "end",
        "milestone", "progress", "memo", "source_file",
    ];
    let mut lines = vec![headers.join(",")];
    for node in project.all_nodes() {
        let fields = [
            node.title.clone(),
            node.level.to_string(),
            node.status.to_string(),
            node.priority.to_string(),
            node.assignee.clone(),
            node.duration.clone(),
            node.depends_str(),
            node.start.map(|d| d.to_string()).unwrap_or_default(),
            node.end.map(|d| d.to_string()).unwrap_or_default(),
            node.milestone.to_string(),
            node.computed_progress().to_string(),
            node.memo.replace('\n', " "),
            node.source_file.clone(),
        ];
        lines.push(
            fields
                .iter()
                .map(|f| csv_escape(f))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    fs::write(output, lines.join("\n") + "\n")?;
    Ok(())
}

fn mermaid_status_tag(status: Status) -> &'static str {
    match status {
        Status::Done => "done,",
        Status::InProgress => "active,",
        Status::Todo => "",
    }
}

fn mermaid_task_id(title: &str) -> String {
    title
        .chars()
        .filter(|c| !matches!(c, ':' | '(' | ')'))
        .map(|c| if c == ' ' { '_' } else { c })
        .take(30)
        .collect()
}

/// Export a Mermaid gantt code block (`.mmd`). Level 1 and 2 nodes
/// open sections; dated nodes become tasks.
pub fn export_mermaid(project: &Project, output: &Path) -> Result<()> {
    let mut lines = vec![
        "gantt".to_string(),
        "    dateFormat YYYY-MM-DD".to_string(),
        String::new(),
    ];

    let mut current_section = String::new();
    for node in project.all_nodes() {
        if node.level <= 2 {
            if node.title != current_section {
                lines.push(format!("    section {}", node.title));
                current_section = node.title.clone();
            }
            if node.level == 1 {
                continue;
            }
        }

        let tag = mermaid_status_tag(node.status);
        let task_id = mermaid_task_id(&node.title);
        let Some(start) = node.start else {
            continue;
        };
        if let Some(end) = node.end {
            lines.push(format!(
                "    {} :{} {}, {}, {}",
                node.title, tag, task_id, start, end
            ));
        } else if !node.duration.is_empty() {
            lines.push(format!(
                "    {} :{} {}, {}, {}",
                node.title, tag, task_id, start, node.duration
            ));
        } else {
            lines.push(format!(
                "    {} :{} {}, {}, 1d",
                node.title, tag, task_id, start
            ));
        }
    }

    fs::write(output, lines.join("\n") + "\n")?;
    Ok(())
}

/// Export an indented Markdown table (`.md`).
pub fn export_markdown_table(project: &Project, output: &Path) -> Result<()> {
    let headers = [
        "Title", "Status", "Priority", "Assignee", "Duration", "Start", "End", "Progress",
    ];
    let mut lines = vec![
        format!("| {} |", headers.join(" | ")),
        format!(
            "| {} |",
            headers
                .iter()
                .map(|h| "-".repeat(h.len()))
                .collect::<Vec<_>>()
                .join(" | ")
        ),
    ];
    for node in project.all_nodes() {
        let indent = "  ".repeat(node.level.saturating_sub(1) as usize);
        let row = [
            format!("{}{}", indent, node.title),
            node.status.to_string(),
            node.priority.to_string(),
            node.assignee.clone(),
            node.duration.clone(),
            node.start.map(|d| d.to_string()).unwrap_or_default(),
            node.end.map(|d| d.to_string()).unwrap_or_default(),
            format!("{}%", node.computed_progress()),
        ];
        lines.push(format!("| {} |", row.join(" | ")));
    }
    fs::write(output, lines.join("\n") + "\n")?;
    Ok(())
}
