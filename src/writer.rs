//! Markdown writer - round-trip preserving.
//!
//! An unmodified document serializes byte-for-byte to the content it
//! was parsed from. In a modified document, unedited nodes replay their
//! raw source lines and only edited nodes get a regenerated heading and
//! metadata comment. Persistence goes through backup + temp file +
//! rename so readers never observe partial content.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::{Document, Node, Priority, Project, Status};
use crate::{Error, Result};

/// Metadata comment for an edited node: non-default fields only, in
/// canonical order, then custom fields in config-declared order.
fn build_meta_comment(node: &Node, custom_order: &[String]) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    if node.status != Status::Todo {
        parts.push(format!("status: {}", node.status));
    }
    if !node.assignee.is_empty() {
        parts.push(format!("assignee: {}", node.assignee));
    }
    if !node.duration.is_empty() {
        parts.push(format!("duration: {}", node.duration));
    }
    if node.priority != Priority::Medium {
        parts.push(format!("priority: {}", node.priority));
    }
    if !node.depends.is_empty() {
        parts.push(format!("depends: {}", node.depends_str()));
    }
    if let Some(start) = node.start {
        parts.push(format!("start: {}", start));
    }
    // A milestone's end is defined equal to its start; don't repeat it.
    if let Some(end) = node.end
        && !node.milestone
    {
        parts.push(format!("end: {}", end));
    }
    if node.milestone {
        parts.push("milestone: true".to_string());
    }
    if let Some(progress) = node.progress {
        parts.push(format!("progress: {}", progress));
    }

    let mut remaining: Vec<&(String, String)> = node.custom_fields.iter().collect();
    for id in custom_order {
        if let Some(pos) = remaining.iter().position(|(k, _)| k == id) {
            let (k, v) = remaining.remove(pos);
            parts.push(format!("{}: {}", k, v));
        }
    }
    for (k, v) in remaining {
        parts.push(format!("{}: {}", k, v));
    }

    if parts.is_empty() {
        None
    } else {
        Some(format!("<!-- {} -->", parts.join(" | ")))
    }
}

fn serialize_node(node: &Arc<Node>, custom_order: &[String], lines: &mut Vec<String>) {
    match (&node.raw, node.edited) {
        (Some(raw), false) => {
            lines.push(raw.heading.clone());
            lines.extend(raw.rest.iter().cloned());
        }
        _ => {
            lines.push(format!("{} {}", "#".repeat(node.level as usize), node.title));
            if let Some(meta) = build_meta_comment(node, custom_order) {
                lines.push(meta);
            }
            lines.push(String::new());
            if !node.memo.is_empty() {
                lines.extend(node.memo.split('\n').map(String::from));
                lines.push(String::new());
            }
        }
    }
    for child in &node.children {
        serialize_node(child, custom_order, lines);
    }
}

/// Serialize a document back to markdown.
///
/// An unmodified document returns `raw_content` verbatim, which is the
/// byte-perfect round-trip guarantee.
pub fn serialize_document(doc: &Document, custom_order: &[String]) -> String {
    if !doc.modified {
        return doc.raw_content.clone();
    }

    let mut lines: Vec<String> = Vec::new();
    for root in &doc.roots {
        serialize_node(root, custom_order, &mut lines);
    }
    let mut result = lines.join("\n");
    let wants_newline = doc.raw_content.is_empty() || doc.raw_content.ends_with('\n');
    if wants_newline && !result.ends_with('\n') {
        result.push('\n');
    }
    result
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

/// Path of the backup written before each save.
pub fn backup_path(path: &Path) -> PathBuf {
    sibling_path(path, ".bak")
}

fn temp_path(path: &Path) -> PathBuf {
    sibling_path(path, ".tmp")
}

/// Persist one document: backup, temp write + fsync, rename.
///
/// A crash before the rename leaves the original file untouched; after
/// it, the new bytes are in place. The `.bak` copy of the pre-save
/// bytes survives either way.
pub fn write_document(doc: &mut Document, custom_order: &[String]) -> Result<()> {
    let content = serialize_document(doc, custom_order);
    let target = doc.path.clone();

    if target.exists() {
        // Best effort: a failed backup must not block the save itself.
        let _ = fs::copy(&target, backup_path(&target));
    }

    let tmp = temp_path(&target);
    let write_result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &target)?;
        Ok(())
    })();
    if let Err(e) = write_result {
        let _ = fs::remove_file(&tmp);
        return Err(Error::Io(e));
    }

    doc.raw_content = content;
    doc.modified = false;
    Ok(())
}

/// Write every modified document in the project, after re-verifying
/// the advisory lock (a lost lock aborts before any byte is written).
pub fn write_project(project: &mut Project) -> Result<()> {
    if let Some(lock) = &project.lock {
        lock.verify()?;
    }
    let custom_order = project.config.custom_column_ids();
    for doc in &mut project.documents {
        if doc.modified {
            write_document(doc, &custom_order)?;
        }
    }
    Ok(())
}
