//! Mutation commands and the undo/redo log.
//!
//! Every user edit goes through [`CommandLog::apply`] as a typed
//! [`Command`]. A command either produces a new project tree (copying
//! only the spine down to the edited node) or fails with a typed error
//! and leaves the project untouched. The log keeps whole-project
//! snapshots for undo/redo; snapshots are cheap because unchanged
//! subtrees are shared via `Arc`.

use std::sync::Arc;

use chrono::{Days, NaiveDate};

use crate::config::ColumnType;
use crate::models::{
    Document, Node, NodeId, Priority, Project, Status, days_to_duration, duration_to_days,
};
use crate::{Error, Result};

/// A named, invertible mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Append a new node under `parent`.
    AddChild { parent: NodeId, title: String },
    /// Insert a new node right after `anchor`, at the same level.
    AddSibling { anchor: NodeId, title: String },
    /// Remove a node and its whole subtree.
    Delete { id: NodeId },
    /// Rename a node and rewrite every `depends` reference to it.
    RenameTitle { id: NodeId, title: String },
    /// Set one field from its string form, with date arithmetic and
    /// ancestor aggregation for start/end/duration.
    SetField {
        id: NodeId,
        field: String,
        value: String,
    },
    SetStatus { id: NodeId, status: Status },
    MoveUp { id: NodeId },
    MoveDown { id: NodeId },
    /// Reparent under the preceding sibling, one level deeper.
    Indent { id: NodeId },
    /// Move out to just after the current parent, one level up.
    Outdent { id: NodeId },
    /// Move to a destination index among the current siblings.
    ReorderInColumn { id: NodeId, index: usize },
}

/// Undo history depth.
const MAX_UNDO_DEPTH: usize = 50;

/// Undo/redo stacks over whole-project snapshots.
#[derive(Debug, Default)]
pub struct CommandLog {
    undo: Vec<Vec<Document>>,
    redo: Vec<Vec<Document>>,
}

impl CommandLog {
    pub fn new() -> Self {
        CommandLog::default()
    }

    /// Apply a command. On success the prior state is pushed onto the
    /// undo stack and the redo stack is cleared; on failure the
    /// project is left exactly as it was.
    pub fn apply(&mut self, project: &mut Project, command: Command) -> Result<()> {
        let snapshot = project.documents.clone();
        match run(project, command) {
            Ok(()) => {
                self.undo.push(snapshot);
                if self.undo.len() > MAX_UNDO_DEPTH {
                    self.undo.remove(0);
                }
                self.redo.clear();
                Ok(())
            }
            Err(e) => {
                project.documents = snapshot;
                Err(e)
            }
        }
    }

    /// Revert to the previous snapshot. Returns false when there is
    /// nothing to undo.
    pub fn undo(&mut self, project: &mut Project) -> bool {
        match self.undo.pop() {
            Some(prev) => {
                self.redo
                    .push(std::mem::replace(&mut project.documents, prev));
                true
            }
            None => false,
        }
    }

    /// Re-apply the last undone snapshot.
    pub fn redo(&mut self, project: &mut Project) -> bool {
        match self.redo.pop() {
            Some(next) => {
                self.undo
                    .push(std::mem::replace(&mut project.documents, next));
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
}

fn run(project: &mut Project, command: Command) -> Result<()> {
    match command {
        Command::AddChild { parent, title } => add_child(project, parent, &title),
        Command::AddSibling { anchor, title } => add_sibling(project, anchor, &title),
        Command::Delete { id } => delete(project, id),
        Command::RenameTitle { id, title } => rename_title(project, id, &title),
        Command::SetField { id, field, value } => set_field(project, id, &field, &value),
        Command::SetStatus { id, status } => update_node(project, id, &mut |n| n.status = status),
        Command::MoveUp { id } => move_in_siblings(project, id, -1),
        Command::MoveDown { id } => move_in_siblings(project, id, 1),
        Command::Indent { id } => indent(project, id),
        Command::Outdent { id } => outdent(project, id),
        Command::ReorderInColumn { id, index } => reorder(project, id, index),
    }
}

// ── Forest rewriting ───────────────────────────────────────────────

type Forest = Vec<Arc<Node>>;

/// Rewrite the node with `id` through `f`, copying only the spine.
/// The edited bit is set on the target; ancestors keep theirs.
fn rewrite_tree(node: &Arc<Node>, id: NodeId, f: &mut dyn FnMut(&mut Node)) -> Option<Arc<Node>> {
    if node.id == id {
        let mut n = (**node).clone();
        f(&mut n);
        n.edited = true;
        n.normalize_milestone();
        return Some(Arc::new(n));
    }
    for (i, child) in node.children.iter().enumerate() {
        if let Some(new_child) = rewrite_tree(child, id, f) {
            let mut n = (**node).clone();
            n.children[i] = new_child;
            return Some(Arc::new(n));
        }
    }
    None
}

fn rewrite_forest(roots: &[Arc<Node>], id: NodeId, f: &mut dyn FnMut(&mut Node)) -> Option<Forest> {
    for (i, root) in roots.iter().enumerate() {
        if let Some(new_root) = rewrite_tree(root, id, f) {
            let mut out = roots.to_vec();
            out[i] = new_root;
            return Some(out);
        }
    }
    None
}

/// Apply `f` to the node with `id`, wherever it lives.
fn update_node(project: &mut Project, id: NodeId, f: &mut dyn FnMut(&mut Node)) -> Result<()> {
    for doc in &mut project.documents {
        if let Some(new_roots) = rewrite_forest(&doc.roots, id, f) {
            doc.roots = new_roots;
            doc.modified = true;
            return Ok(());
        }
    }
    Err(Error::NodeNotFound)
}

/// Append a child without marking the parent edited: the parent's own
/// heading and metadata are untouched by gaining a child.
fn append_child_in_forest(roots: &[Arc<Node>], parent: NodeId, child: Arc<Node>) -> Option<Forest> {
    for (i, root) in roots.iter().enumerate() {
        if root.id == parent {
            let mut n = (**root).clone();
            n.children.push(child);
            let mut out = roots.to_vec();
            out[i] = Arc::new(n);
            return Some(out);
        }
        if let Some(new_children) = append_child_in_forest(&root.children, parent, child.clone()) {
            let mut n = (**root).clone();
            n.children = new_children;
            let mut out = roots.to_vec();
            out[i] = Arc::new(n);
            return Some(out);
        }
    }
    None
}

fn remove_from_forest(roots: &[Arc<Node>], id: NodeId) -> Option<(Forest, Arc<Node>)> {
    if let Some(pos) = roots.iter().position(|n| n.id == id) {
        let mut out = roots.to_vec();
        let removed = out.remove(pos);
        return Some((out, removed));
    }
    for (i, node) in roots.iter().enumerate() {
        if let Some((new_children, removed)) = remove_from_forest(&node.children, id) {
            let mut n = (**node).clone();
            n.children = new_children;
            let mut out = roots.to_vec();
            out[i] = Arc::new(n);
            return Some((out, removed));
        }
    }
    None
}

/// Find the sibling list containing `id` and rebuild it through `f`,
/// which receives the list and the node's index.
fn edit_sibling_list(
    roots: &[Arc<Node>],
    id: NodeId,
    f: &mut dyn FnMut(&[Arc<Node>], usize) -> Result<Forest>,
) -> Option<Result<Forest>> {
    if let Some(pos) = roots.iter().position(|n| n.id == id) {
        return Some(f(roots, pos));
    }
    for (i, node) in roots.iter().enumerate() {
        if let Some(result) = edit_sibling_list(&node.children, id, f) {
            return Some(result.map(|new_children| {
                let mut n = (**node).clone();
                n.children = new_children;
                let mut out = roots.to_vec();
                out[i] = Arc::new(n);
                out
            }));
        }
    }
    None
}

/// Shift every heading level in the subtree; levels changing means
/// every node in it rewrites its heading line.
fn bump_levels(node: &Arc<Node>, delta: i8) -> Arc<Node> {
    let mut n = (**node).clone();
    n.level = (n.level as i8 + delta).clamp(1, 6) as u8;
    n.edited = true;
    n.children = n.children.iter().map(|c| bump_levels(c, delta)).collect();
    Arc::new(n)
}

/// Ancestor ids of `id`, nearest parent first.
fn ancestors_of(project: &Project, id: NodeId) -> Vec<NodeId> {
    fn walk(node: &Arc<Node>, id: NodeId, path: &mut Vec<NodeId>) -> bool {
        if node.id == id {
            return true;
        }
        path.push(node.id);
        for child in &node.children {
            if walk(child, id, path) {
                return true;
            }
        }
        path.pop();
        false
    }
    for doc in &project.documents {
        for root in &doc.roots {
            let mut path = Vec::new();
            if walk(root, id, &mut path) {
                path.reverse();
                return path;
            }
        }
    }
    Vec::new()
}

// ── Command bodies ─────────────────────────────────────────────────

fn validated_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::FieldTypeMismatch("title must not be empty".into()));
    }
    Ok(title.to_string())
}

fn add_child(project: &mut Project, parent: NodeId, title: &str) -> Result<()> {
    let title = validated_title(title)?;
    let anchor = project.find_node(parent).ok_or(Error::NodeNotFound)?;
    if anchor.level >= 6 {
        return Err(Error::InvalidLevel);
    }
    let mut node = Node::new(title, anchor.level + 1);
    node.source_file = anchor.source_file.clone();
    let node = Arc::new(node);

    for doc in &mut project.documents {
        if let Some(new_roots) = append_child_in_forest(&doc.roots, parent, node.clone()) {
            doc.roots = new_roots;
            doc.modified = true;
            return Ok(());
        }
    }
    Err(Error::NodeNotFound)
}

fn add_sibling(project: &mut Project, anchor: NodeId, title: &str) -> Result<()> {
    let title = validated_title(title)?;
    let sibling = project.find_node(anchor).ok_or(Error::NodeNotFound)?;
    let mut node = Node::new(title, sibling.level);
    node.source_file = sibling.source_file.clone();
    let node = Arc::new(node);

    for doc in &mut project.documents {
        let result = edit_sibling_list(&doc.roots, anchor, &mut |list, pos| {
            let mut out = list.to_vec();
            out.insert(pos + 1, node.clone());
            Ok(out)
        });
        if let Some(result) = result {
            doc.roots = result?;
            doc.modified = true;
            return Ok(());
        }
    }
    Err(Error::NodeNotFound)
}

fn delete(project: &mut Project, id: NodeId) -> Result<()> {
    for doc in &mut project.documents {
        if let Some((new_roots, _removed)) = remove_from_forest(&doc.roots, id) {
            doc.roots = new_roots;
            doc.modified = true;
            return Ok(());
        }
    }
    Err(Error::NodeNotFound)
}

fn rename_title(project: &mut Project, id: NodeId, title: &str) -> Result<()> {
    let title = validated_title(title)?;
    let old_title = project
        .find_node(id)
        .ok_or(Error::NodeNotFound)?
        .title
        .clone();
    update_node(project, id, &mut |n| n.title = title.clone())?;
    if old_title == title {
        return Ok(());
    }

    // Rewriting the references is part of the same command, so a
    // single undo restores both the title and the depends entries.
    let referencing: Vec<NodeId> = project
        .all_nodes()
        .into_iter()
        .filter(|n| n.depends.iter().any(|d| *d == old_title))
        .map(|n| n.id)
        .collect();
    for ref_id in referencing {
        update_node(project, ref_id, &mut |n| {
            for dep in &mut n.depends {
                if *dep == old_title {
                    *dep = title.clone();
                }
            }
        })?;
    }
    Ok(())
}

fn move_in_siblings(project: &mut Project, id: NodeId, delta: isize) -> Result<()> {
    for doc in &mut project.documents {
        let result = edit_sibling_list(&doc.roots, id, &mut |list, pos| {
            let target = pos as isize + delta;
            if target < 0 || target >= list.len() as isize {
                return Err(Error::OutOfRange);
            }
            let mut out = list.to_vec();
            out.swap(pos, target as usize);
            Ok(out)
        });
        if let Some(result) = result {
            doc.roots = result?;
            doc.modified = true;
            return Ok(());
        }
    }
    Err(Error::NodeNotFound)
}

fn reorder(project: &mut Project, id: NodeId, index: usize) -> Result<()> {
    for doc in &mut project.documents {
        let result = edit_sibling_list(&doc.roots, id, &mut |list, pos| {
            if index >= list.len() {
                return Err(Error::OutOfRange);
            }
            let mut out = list.to_vec();
            let node = out.remove(pos);
            out.insert(index.min(out.len()), node);
            Ok(out)
        });
        if let Some(result) = result {
            doc.roots = result?;
            doc.modified = true;
            return Ok(());
        }
    }
    Err(Error::NodeNotFound)
}

fn indent(project: &mut Project, id: NodeId) -> Result<()> {
    for doc in &mut project.documents {
        let result = edit_sibling_list(&doc.roots, id, &mut |list, pos| {
            if pos == 0 {
                return Err(Error::NoAnchor);
            }
            let node = &list[pos];
            if node.max_level() >= 6 {
                return Err(Error::InvalidLevel);
            }
            let moved = bump_levels(node, 1);
            let mut prev = (*list[pos - 1]).clone();
            prev.children.push(moved);
            let mut out = list.to_vec();
            out[pos - 1] = Arc::new(prev);
            out.remove(pos);
            Ok(out)
        });
        if let Some(result) = result {
            doc.roots = result?;
            doc.modified = true;
            return Ok(());
        }
    }
    Err(Error::NodeNotFound)
}

/// Move the subtree out to just after its parent. The node's former
/// following siblings stay with the old parent.
fn outdent_in_forest(roots: &[Arc<Node>], id: NodeId) -> Option<Result<Forest>> {
    for (i, node) in roots.iter().enumerate() {
        if let Some(pos) = node.children.iter().position(|c| c.id == id) {
            let mut parent = (**node).clone();
            let child = parent.children.remove(pos);
            let moved = bump_levels(&child, -1);
            let mut out = roots.to_vec();
            out[i] = Arc::new(parent);
            out.insert(i + 1, moved);
            return Some(Ok(out));
        }
        if let Some(result) = outdent_in_forest(&node.children, id) {
            return Some(result.map(|new_children| {
                let mut n = (**node).clone();
                n.children = new_children;
                let mut out = roots.to_vec();
                out[i] = Arc::new(n);
                out
            }));
        }
    }
    None
}

fn outdent(project: &mut Project, id: NodeId) -> Result<()> {
    for doc in &mut project.documents {
        if doc.roots.iter().any(|n| n.id == id) {
            // Root nodes are level 1 already.
            return Err(Error::InvalidLevel);
        }
        if let Some(result) = outdent_in_forest(&doc.roots, id) {
            doc.roots = result?;
            doc.modified = true;
            return Ok(());
        }
    }
    Err(Error::NodeNotFound)
}

// ── Field edits ────────────────────────────────────────────────────

fn set_field(project: &mut Project, id: NodeId, field: &str, value: &str) -> Result<()> {
    let current = project.find_node(id).ok_or(Error::NodeNotFound)?.clone();
    match field {
        "title" => rename_title(project, id, value),
        "status" => {
            let status = Status::parse(value)
                .ok_or_else(|| Error::FieldTypeMismatch(format!("invalid status '{}'", value)))?;
            update_node(project, id, &mut |n| n.status = status)
        }
        "priority" => {
            let priority = Priority::parse(value)
                .ok_or_else(|| Error::FieldTypeMismatch(format!("invalid priority '{}'", value)))?;
            update_node(project, id, &mut |n| n.priority = priority)
        }
        "assignee" => {
            let value = value.trim().to_string();
            update_node(project, id, &mut |n| n.assignee = value.clone())
        }
        "memo" => {
            let value = value.to_string();
            update_node(project, id, &mut |n| n.memo = value.clone())
        }
        "depends" => {
            let deps: Vec<String> = value
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            update_node(project, id, &mut |n| n.depends = deps.clone())
        }
        "milestone" => {
            let flag = parse_bool(value)
                .ok_or_else(|| Error::FieldTypeMismatch(format!("invalid boolean '{}'", value)))?;
            update_node(project, id, &mut |n| n.milestone = flag)
        }
        "progress" => {
            if !current.children.is_empty() {
                return Err(Error::ComputedField);
            }
            let progress = if value.trim().is_empty() {
                None
            } else {
                let p: i64 = value.trim().parse().map_err(|_| {
                    Error::FieldTypeMismatch(format!("invalid progress '{}'", value))
                })?;
                if !(0..=100).contains(&p) {
                    return Err(Error::FieldTypeMismatch("progress must be 0-100".into()));
                }
                Some(p as u8)
            };
            update_node(project, id, &mut |n| n.progress = progress)
        }
        "start" | "end" => set_date_field(project, id, &current, field, value),
        "duration" => set_duration_field(project, id, &current, value),
        other => set_custom_field(project, id, other, value),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Set start or end. When the other two members of
/// {start, end, duration} allow it, the third is derived in the same
/// command, and ancestor dates re-aggregate afterwards.
fn set_date_field(
    project: &mut Project,
    id: NodeId,
    current: &Node,
    field: &str,
    value: &str,
) -> Result<()> {
    if value.trim().is_empty() {
        update_node(project, id, &mut |n| {
            if field == "start" {
                n.start = None;
                n.start_pinned = false;
            } else {
                n.end = None;
                n.end_pinned = false;
            }
        })?;
        return Ok(());
    }

    let date: NaiveDate = value
        .trim()
        .parse()
        .map_err(|_| Error::FieldTypeMismatch(format!("invalid date '{}' (use YYYY-MM-DD)", value)))?;

    let mut new_start = current.start;
    let mut new_end = current.end;
    let mut new_duration = current.duration.clone();
    if field == "start" {
        new_start = Some(date);
        if let Some(days) = duration_to_days(&current.duration) {
            new_end = Some(date + Days::new(days.max(0) as u64));
        } else if let Some(end) = current.end {
            let diff = (end - date).num_days();
            if diff > 0 {
                new_duration = days_to_duration(diff);
            }
        }
    } else {
        new_end = Some(date);
        if let Some(start) = current.start {
            let diff = (date - start).num_days();
            if diff > 0 {
                new_duration = days_to_duration(diff);
            }
        } else if let Some(days) = duration_to_days(&current.duration) {
            new_start = Some(date - Days::new(days.max(0) as u64));
        }
    }

    update_node(project, id, &mut |n| {
        n.start = new_start;
        n.end = new_end;
        n.duration = new_duration.clone();
        if field == "start" {
            n.start_pinned = true;
        } else {
            n.end_pinned = true;
        }
    })?;
    propagate_dates_to_parents(project, id);
    Ok(())
}

fn set_duration_field(project: &mut Project, id: NodeId, current: &Node, value: &str) -> Result<()> {
    let duration = value.trim().to_string();
    let mut new_start = current.start;
    let mut new_end = current.end;
    if let Some(days) = duration_to_days(&duration) {
        let days = Days::new(days.max(0) as u64);
        if let Some(start) = current.start {
            new_end = Some(start + days);
        } else if let Some(end) = current.end {
            new_start = Some(end - days);
        }
    }
    update_node(project, id, &mut |n| {
        n.duration = duration.clone();
        n.start = new_start;
        n.end = new_end;
    })?;
    propagate_dates_to_parents(project, id);
    Ok(())
}

fn set_custom_field(project: &mut Project, id: NodeId, field: &str, value: &str) -> Result<()> {
    let Some(col) = project.config.custom_column(field).cloned() else {
        return Err(Error::UnknownColumn(field.to_string()));
    };
    let value = value.trim().to_string();
    if !value.is_empty() {
        match col.column_type {
            ColumnType::String => {}
            ColumnType::Enum => {
                if !col.values.iter().any(|v| *v == value) {
                    return Err(Error::FieldTypeMismatch(format!(
                        "'{}' is not one of {:?}",
                        value, col.values
                    )));
                }
            }
            ColumnType::Date => {
                value.parse::<NaiveDate>().map_err(|_| {
                    Error::FieldTypeMismatch(format!("invalid date '{}' (use YYYY-MM-DD)", value))
                })?;
            }
            ColumnType::Number => {
                value.parse::<f64>().map_err(|_| {
                    Error::FieldTypeMismatch(format!("invalid number '{}'", value))
                })?;
            }
            ColumnType::Boolean => {
                parse_bool(&value).ok_or_else(|| {
                    Error::FieldTypeMismatch(format!("invalid boolean '{}'", value))
                })?;
            }
        }
    }
    let field = field.to_string();
    update_node(project, id, &mut |n| {
        n.set_custom_field(&field, value.clone())
    })
}

/// Re-aggregate ancestor start/end to the children's min/max, stopping
/// at the first ancestor that needs no change. A date the user set
/// directly this session stays pinned.
fn propagate_dates_to_parents(project: &mut Project, id: NodeId) {
    for ancestor_id in ancestors_of(project, id) {
        let Some(parent) = project.find_node(ancestor_id) else {
            break;
        };
        let min_start = parent.children.iter().filter_map(|c| c.start).min();
        let max_end = parent.children.iter().filter_map(|c| c.end).max();

        let set_start = match min_start {
            Some(s) if !parent.start_pinned && parent.start != Some(s) => Some(s),
            _ => None,
        };
        let set_end = match max_end {
            Some(e) if !parent.end_pinned && parent.end != Some(e) => Some(e),
            _ => None,
        };
        if set_start.is_none() && set_end.is_none() {
            break;
        }
        let _ = update_node(project, ancestor_id, &mut |n| {
            if let Some(s) = set_start {
                n.start = Some(s);
            }
            if let Some(e) = set_end {
                n.end = Some(e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_markdown;
    use crate::writer::serialize_document;
    use std::path::PathBuf;

    fn project_from(content: &str) -> Project {
        let mut project = Project::new(PathBuf::from("."));
        project.documents.push(parse_markdown(content, "a.wbs.md"));
        project
    }

    fn id_of(project: &Project, title: &str) -> NodeId {
        project.find_by_title(title).unwrap().id
    }

    fn titles_in_order(project: &Project) -> Vec<String> {
        project
            .all_nodes()
            .into_iter()
            .map(|n| n.title.clone())
            .collect()
    }

    #[test]
    fn test_add_child_appends_one_level_deeper() {
        let mut project = project_from("# A\n## B\n");
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        log.apply(
            &mut project,
            Command::AddChild {
                parent: a,
                title: "C".to_string(),
            },
        )
        .unwrap();
        let c = project.find_by_title("C").unwrap();
        assert_eq!(c.level, 2);
        assert_eq!(titles_in_order(&project), ["A", "B", "C"]);
        assert!(project.documents[0].modified);
    }

    #[test]
    fn test_add_sibling_inserts_after_anchor() {
        let mut project = project_from("# A\n# B\n");
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        log.apply(
            &mut project,
            Command::AddSibling {
                anchor: a,
                title: "Mid".to_string(),
            },
        )
        .unwrap();
        assert_eq!(titles_in_order(&project), ["A", "Mid", "B"]);
    }

    #[test]
    fn test_empty_title_rejected() {
        let mut project = project_from("# A\n");
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        let err = log
            .apply(
                &mut project,
                Command::AddChild {
                    parent: a,
                    title: "   ".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::FieldTypeMismatch(_)));
        assert!(!project.documents[0].modified);
    }

    #[test]
    fn test_delete_removes_subtree() {
        let mut project = project_from("# A\n## B\n### C\n# D\n");
        let mut log = CommandLog::new();
        let b = id_of(&project, "B");
        log.apply(&mut project, Command::Delete { id: b }).unwrap();
        assert_eq!(titles_in_order(&project), ["A", "D"]);
    }

    #[test]
    fn test_rename_rewrites_depends_and_undo_restores() {
        let mut project = project_from("# A\n# B\n<!-- depends: A -->\n");
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        log.apply(
            &mut project,
            Command::RenameTitle {
                id: a,
                title: "A2".to_string(),
            },
        )
        .unwrap();
        assert_eq!(
            project.find_by_title("B").unwrap().depends,
            vec!["A2".to_string()]
        );

        assert!(log.undo(&mut project));
        assert_eq!(
            project.find_by_title("B").unwrap().depends,
            vec!["A".to_string()]
        );
        assert!(project.find_by_title("A").is_some());
    }

    #[test]
    fn test_undo_inverts_command_sequence() {
        let content = "# A\n<!-- status: TODO -->\n## B\n# C\n";
        let mut project = project_from(content);
        let before = serialize_document(&project.documents[0], &[]);
        let mut log = CommandLog::new();

        let a = id_of(&project, "A");
        let b = id_of(&project, "B");
        log.apply(&mut project, Command::SetStatus { id: a, status: Status::Done })
            .unwrap();
        log.apply(
            &mut project,
            Command::SetField {
                id: b,
                field: "assignee".to_string(),
                value: "kim".to_string(),
            },
        )
        .unwrap();
        log.apply(&mut project, Command::Delete { id: b }).unwrap();

        assert!(log.undo(&mut project));
        assert!(log.undo(&mut project));
        assert!(log.undo(&mut project));
        assert!(!log.can_undo());

        let mut restored = project.documents[0].clone();
        restored.modified = false;
        assert_eq!(serialize_document(&restored, &[]), before);
        assert_eq!(titles_in_order(&project), ["A", "B", "C"]);
    }

    #[test]
    fn test_redo_reapplies_and_new_command_clears_redo() {
        let mut project = project_from("# A\n");
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        log.apply(&mut project, Command::SetStatus { id: a, status: Status::Done })
            .unwrap();
        log.undo(&mut project);
        assert_eq!(project.find_by_title("A").unwrap().status, Status::Todo);
        assert!(log.redo(&mut project));
        assert_eq!(project.find_by_title("A").unwrap().status, Status::Done);

        log.undo(&mut project);
        log.apply(&mut project, Command::SetStatus { id: a, status: Status::InProgress })
            .unwrap();
        assert!(!log.can_redo());
    }

    #[test]
    fn test_move_up_down_and_edges() {
        let mut project = project_from("# A\n# B\n# C\n");
        let mut log = CommandLog::new();
        let b = id_of(&project, "B");
        log.apply(&mut project, Command::MoveUp { id: b }).unwrap();
        assert_eq!(titles_in_order(&project), ["B", "A", "C"]);
        let err = log
            .apply(&mut project, Command::MoveUp { id: b })
            .unwrap_err();
        assert!(matches!(err, Error::OutOfRange));
        assert_eq!(titles_in_order(&project), ["B", "A", "C"]);

        let c = id_of(&project, "C");
        let err = log
            .apply(&mut project, Command::MoveDown { id: c })
            .unwrap_err();
        assert!(matches!(err, Error::OutOfRange));
    }

    #[test]
    fn test_reorder_in_column() {
        let mut project = project_from("# A\n# B\n# C\n");
        let mut log = CommandLog::new();
        let c = id_of(&project, "C");
        log.apply(&mut project, Command::ReorderInColumn { id: c, index: 0 })
            .unwrap();
        assert_eq!(titles_in_order(&project), ["C", "A", "B"]);

        let err = log
            .apply(&mut project, Command::ReorderInColumn { id: c, index: 9 })
            .unwrap_err();
        assert!(matches!(err, Error::OutOfRange));
    }

    #[test]
    fn test_indent_reparents_under_preceding_sibling() {
        let mut project = project_from("# A\n# B\n## B1\n");
        let mut log = CommandLog::new();
        let b = id_of(&project, "B");
        log.apply(&mut project, Command::Indent { id: b }).unwrap();
        let a = project.find_by_title("A").unwrap();
        assert_eq!(a.children.len(), 1);
        assert_eq!(a.children[0].title, "B");
        assert_eq!(a.children[0].level, 2);
        assert_eq!(a.children[0].children[0].level, 3);
    }

    #[test]
    fn test_indent_without_anchor_fails() {
        let mut project = project_from("# A\n## B\n");
        let mut log = CommandLog::new();
        let b = id_of(&project, "B");
        let err = log.apply(&mut project, Command::Indent { id: b }).unwrap_err();
        assert!(matches!(err, Error::NoAnchor));
    }

    #[test]
    fn test_indent_past_level_six_fails() {
        let mut project = project_from("###### X\n###### Y\n");
        let mut log = CommandLog::new();
        let y = id_of(&project, "Y");
        let err = log.apply(&mut project, Command::Indent { id: y }).unwrap_err();
        assert!(matches!(err, Error::InvalidLevel));
    }

    #[test]
    fn test_outdent_moves_after_parent() {
        let mut project = project_from("# A\n## B\n## C\n# D\n");
        let mut log = CommandLog::new();
        let b = id_of(&project, "B");
        log.apply(&mut project, Command::Outdent { id: b }).unwrap();
        assert_eq!(titles_in_order(&project), ["A", "C", "B", "D"]);
        assert_eq!(project.find_by_title("B").unwrap().level, 1);
    }

    #[test]
    fn test_outdent_at_root_fails() {
        let mut project = project_from("# A\n");
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        let err = log.apply(&mut project, Command::Outdent { id: a }).unwrap_err();
        assert!(matches!(err, Error::InvalidLevel));
    }

    #[test]
    fn test_set_progress_on_parent_is_computed_field() {
        let mut project = project_from("# A\n## B\n");
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        let err = log
            .apply(
                &mut project,
                Command::SetField {
                    id: a,
                    field: "progress".to_string(),
                    value: "50".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::ComputedField));
    }

    #[test]
    fn test_set_progress_on_leaf() {
        let mut project = project_from("# A\n");
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        log.apply(
            &mut project,
            Command::SetField {
                id: a,
                field: "progress".to_string(),
                value: "40".to_string(),
            },
        )
        .unwrap();
        assert_eq!(project.find_by_title("A").unwrap().progress, Some(40));

        let err = log
            .apply(
                &mut project,
                Command::SetField {
                    id: a,
                    field: "progress".to_string(),
                    value: "140".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::FieldTypeMismatch(_)));
    }

    #[test]
    fn test_invalid_enum_value_rejected() {
        let mut project = project_from("# A\n");
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        let err = log
            .apply(
                &mut project,
                Command::SetField {
                    id: a,
                    field: "status".to_string(),
                    value: "WIP".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::FieldTypeMismatch(_)));
    }

    #[test]
    fn test_unknown_column_rejected() {
        let mut project = project_from("# A\n");
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        for field in ["file", "owner"] {
            let err = log
                .apply(
                    &mut project,
                    Command::SetField {
                        id: a,
                        field: field.to_string(),
                        value: "x".to_string(),
                    },
                )
                .unwrap_err();
            assert!(matches!(err, Error::UnknownColumn(_)), "field {}", field);
        }
    }

    #[test]
    fn test_declared_custom_enum_validates() {
        use crate::config::{ColumnDef, ColumnType};
        let mut project = project_from("# A\n");
        project.config.custom_columns.push(ColumnDef {
            id: "team".to_string(),
            name: "Team".to_string(),
            column_type: ColumnType::Enum,
            values: vec!["core".to_string(), "infra".to_string()],
            required: false,
        });
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        log.apply(
            &mut project,
            Command::SetField {
                id: a,
                field: "team".to_string(),
                value: "core".to_string(),
            },
        )
        .unwrap();
        assert_eq!(
            project.find_by_title("A").unwrap().custom_field("team"),
            Some("core")
        );
        let err = log
            .apply(
                &mut project,
                Command::SetField {
                    id: a,
                    field: "team".to_string(),
                    value: "sales".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::FieldTypeMismatch(_)));
    }

    #[test]
    fn test_start_plus_duration_fills_end() {
        let mut project = project_from("# A\n<!-- duration: 5d -->\n");
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        log.apply(
            &mut project,
            Command::SetField {
                id: a,
                field: "start".to_string(),
                value: "2026-03-02".to_string(),
            },
        )
        .unwrap();
        let node = project.find_by_title("A").unwrap();
        assert_eq!(node.start, NaiveDate::from_ymd_opt(2026, 3, 2));
        assert_eq!(node.end, NaiveDate::from_ymd_opt(2026, 3, 7));
    }

    #[test]
    fn test_end_after_start_fills_duration() {
        let mut project = project_from("# A\n<!-- start: 2026-03-02 -->\n");
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        log.apply(
            &mut project,
            Command::SetField {
                id: a,
                field: "end".to_string(),
                value: "2026-03-09".to_string(),
            },
        )
        .unwrap();
        let node = project.find_by_title("A").unwrap();
        assert_eq!(node.duration, "7d");
    }

    #[test]
    fn test_duration_with_end_only_fills_start() {
        let mut project = project_from("# A\n<!-- end: 2026-03-09 -->\n");
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        log.apply(
            &mut project,
            Command::SetField {
                id: a,
                field: "duration".to_string(),
                value: "7d".to_string(),
            },
        )
        .unwrap();
        let node = project.find_by_title("A").unwrap();
        assert_eq!(node.start, NaiveDate::from_ymd_opt(2026, 3, 2));
    }

    #[test]
    fn test_bad_date_rejected() {
        let mut project = project_from("# A\n");
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        let err = log
            .apply(
                &mut project,
                Command::SetField {
                    id: a,
                    field: "start".to_string(),
                    value: "03/02/2026".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::FieldTypeMismatch(_)));
    }

    #[test]
    fn test_child_dates_aggregate_to_ancestors() {
        let mut project = project_from("# A\n## B\n<!-- start: 2026-03-02 | end: 2026-03-05 -->\n");
        let mut log = CommandLog::new();
        let b = id_of(&project, "B");
        log.apply(
            &mut project,
            Command::SetField {
                id: b,
                field: "end".to_string(),
                value: "2026-03-20".to_string(),
            },
        )
        .unwrap();
        let a = project.find_by_title("A").unwrap();
        assert_eq!(a.start, NaiveDate::from_ymd_opt(2026, 3, 2));
        assert_eq!(a.end, NaiveDate::from_ymd_opt(2026, 3, 20));
    }

    #[test]
    fn test_pinned_ancestor_date_not_overwritten() {
        let mut project = project_from(
            "# A\n<!-- end: 2026-06-30 -->\n## B\n<!-- start: 2026-03-02 | end: 2026-03-05 -->\n",
        );
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        let b = id_of(&project, "B");
        // The user pins A's end directly, then edits the child.
        log.apply(
            &mut project,
            Command::SetField {
                id: a,
                field: "end".to_string(),
                value: "2026-06-30".to_string(),
            },
        )
        .unwrap();
        log.apply(
            &mut project,
            Command::SetField {
                id: b,
                field: "end".to_string(),
                value: "2026-03-20".to_string(),
            },
        )
        .unwrap();
        let a = project.find_by_title("A").unwrap();
        assert_eq!(a.end, NaiveDate::from_ymd_opt(2026, 6, 30));
    }

    #[test]
    fn test_milestone_set_forces_end_to_start() {
        let mut project = project_from("# A\n<!-- start: 2026-03-06 | end: 2026-04-01 -->\n");
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        log.apply(
            &mut project,
            Command::SetField {
                id: a,
                field: "milestone".to_string(),
                value: "true".to_string(),
            },
        )
        .unwrap();
        let node = project.find_by_title("A").unwrap();
        assert!(node.milestone);
        assert_eq!(node.end, NaiveDate::from_ymd_opt(2026, 3, 6));
    }

    #[test]
    fn test_date_consistency_after_any_date_edit() {
        // After a start/end/duration edit, the set values satisfy
        // end >= start and at most one of the three is missing.
        let mut project = project_from("# A\n<!-- duration: 3d -->\n# B\n");
        let mut log = CommandLog::new();
        for (title, field, value) in [
            ("A", "start", "2026-03-02"),
            ("B", "end", "2026-03-10"),
            ("B", "duration", "2d"),
        ] {
            let id = id_of(&project, title);
            log.apply(
                &mut project,
                Command::SetField {
                    id,
                    field: field.to_string(),
                    value: value.to_string(),
                },
            )
            .unwrap();
        }
        for title in ["A", "B"] {
            let n = project.find_by_title(title).unwrap();
            let missing = [
                n.start.is_none(),
                n.end.is_none(),
                n.duration.is_empty(),
            ]
            .iter()
            .filter(|m| **m)
            .count();
            assert!(missing <= 1, "{} has {} missing date fields", title, missing);
            if let (Some(s), Some(e)) = (n.start, n.end) {
                assert!(e >= s);
            }
        }
    }

    #[test]
    fn test_failed_command_leaves_stacks_untouched() {
        let mut project = project_from("# A\n");
        let mut log = CommandLog::new();
        let a = id_of(&project, "A");
        let _ = log.apply(&mut project, Command::MoveUp { id: a });
        assert!(!log.can_undo());
        assert!(!project.documents[0].modified);
    }
}
