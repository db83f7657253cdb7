//! View projection: from a project plus a view config to display rows.
//!
//! The projection is pure: the same (project, view, today) inputs
//! always produce the same rows. Filtering keeps a node when it or any
//! descendant matches; sorting reorders each parent's child list and
//! keeps ties in document order; gantt views cap the visible depth.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::{ColumnType, FilterOp, FilterSpec, ProjectConfig, SortDirection, SortSpec, ViewConfig, ViewType};
use crate::gantt::GanttRow;
use crate::models::{
    MILESTONE_ICON, Node, NodeId, Priority, Status, format_date, has_incomplete_dependencies,
    title_map,
};

/// One renderable row of the table projection.
#[derive(Debug, Clone)]
pub struct DisplayRow {
    pub node_id: NodeId,
    /// Heading level of the node (tree depth, 1-based).
    pub depth: u8,
    /// Rendered cell text per visible column id, in column order.
    pub cells: Vec<(String, String)>,
    /// TODO node whose start date has arrived.
    pub delayed: bool,
    /// Node with a missing or unfinished dependency.
    pub blocked: bool,
    pub milestone: bool,
}

impl DisplayRow {
    /// Cell text for a column id, if visible in this view.
    pub fn cell(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(id, _)| id == column)
            .map(|(_, text)| text.as_str())
    }
}

/// A kanban column: bucket key plus its cards in row order.
#[derive(Debug, Clone)]
pub struct KanbanColumn {
    pub key: String,
    pub rows: Vec<DisplayRow>,
}

// ── Field access ───────────────────────────────────────────────────

/// String form of a node field for filtering and sorting. Empty means
/// missing for the optional fields.
fn field_text(node: &Node, column: &str) -> String {
    match column {
        "title" => node.title.clone(),
        "status" => node.status.as_str().to_string(),
        "priority" => node.priority.as_str().to_string(),
        "assignee" => node.assignee.clone(),
        "duration" => node.duration.clone(),
        "start" => node.start.map(|d| d.to_string()).unwrap_or_default(),
        "end" => node.end.map(|d| d.to_string()).unwrap_or_default(),
        "milestone" => if node.milestone { "true" } else { "false" }.to_string(),
        "progress" => node.computed_progress().to_string(),
        "depends" => node.depends_str(),
        "memo" => node.memo.clone(),
        "file" => node.source_file.clone(),
        other => node.custom_field(other).unwrap_or_default().to_string(),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum ColKind {
    Text,
    Date,
    Number,
}

fn column_kind(column: &str, config: &ProjectConfig) -> ColKind {
    match column {
        "start" | "end" => ColKind::Date,
        "progress" => ColKind::Number,
        other => match config.custom_column(other).map(|c| c.column_type) {
            Some(ColumnType::Date) => ColKind::Date,
            Some(ColumnType::Number) => ColKind::Number,
            _ => ColKind::Text,
        },
    }
}

/// Ordered comparison of a field value against a literal, typed by the
/// column. `None` when either side does not parse.
fn typed_cmp(value: &str, literal: &str, kind: ColKind) -> Option<std::cmp::Ordering> {
    match kind {
        ColKind::Date => {
            let a: NaiveDate = value.trim().parse().ok()?;
            let b: NaiveDate = literal.trim().parse().ok()?;
            Some(a.cmp(&b))
        }
        ColKind::Number => {
            let a: f64 = value.trim().parse().ok()?;
            let b: f64 = literal.trim().parse().ok()?;
            a.partial_cmp(&b)
        }
        ColKind::Text => Some(value.to_lowercase().cmp(&literal.trim().to_lowercase())),
    }
}

fn node_matches(node: &Node, filter: &FilterSpec, config: &ProjectConfig) -> bool {
    let value = field_text(node, &filter.column);
    let literal = filter.value.as_str();
    let kind = column_kind(&filter.column, config);

    match filter.op {
        FilterOp::Eq => value.to_lowercase() == literal.trim().to_lowercase(),
        FilterOp::Ne => value.to_lowercase() != literal.trim().to_lowercase(),
        _ if value.is_empty() => false,
        FilterOp::Contains => value.to_lowercase().contains(&literal.trim().to_lowercase()),
        FilterOp::In | FilterOp::NotIn => {
            let found = literal
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .any(|s| s == value.to_lowercase());
            (filter.op == FilterOp::In) == found
        }
        FilterOp::Lt => typed_cmp(&value, literal, kind).is_some_and(|o| o.is_lt()),
        FilterOp::Le => typed_cmp(&value, literal, kind).is_some_and(|o| o.is_le()),
        FilterOp::Gt => typed_cmp(&value, literal, kind).is_some_and(|o| o.is_gt()),
        FilterOp::Ge => typed_cmp(&value, literal, kind).is_some_and(|o| o.is_ge()),
        FilterOp::Between => match literal.split_once("..") {
            Some((lo, hi)) => {
                typed_cmp(&value, lo, kind).is_some_and(|o| o.is_ge())
                    && typed_cmp(&value, hi, kind).is_some_and(|o| o.is_le())
            }
            None => false,
        },
    }
}

// ── Filter and sort over the tree ──────────────────────────────────

/// Keep a node when it matches every predicate or any descendant does.
fn filter_tree(node: &Arc<Node>, filters: &[FilterSpec], config: &ProjectConfig) -> Option<Arc<Node>> {
    let kept: Vec<Arc<Node>> = node
        .children
        .iter()
        .filter_map(|c| filter_tree(c, filters, config))
        .collect();
    let self_matches = filters.iter().all(|f| node_matches(node, f, config));
    if !self_matches && kept.is_empty() {
        return None;
    }
    if kept.len() == node.children.len()
        && kept.iter().zip(&node.children).all(|(a, b)| Arc::ptr_eq(a, b))
    {
        return Some(node.clone());
    }
    let mut n = (**node).clone();
    n.children = kept;
    Some(Arc::new(n))
}

fn sort_cmp(a: &Node, b: &Node, column: &str, config: &ProjectConfig) -> std::cmp::Ordering {
    match column {
        "status" => a.status.sort_rank().cmp(&b.status.sort_rank()),
        "priority" => a.priority.sort_rank().cmp(&b.priority.sort_rank()),
        _ => field_text(a, column)
            .to_lowercase()
            .cmp(&field_text(b, column).to_lowercase()),
    }
}

/// Sort each sibling list recursively. The sort is stable, so ties
/// keep their document order.
fn sort_forest(roots: &[Arc<Node>], sort: &SortSpec, config: &ProjectConfig) -> Vec<Arc<Node>> {
    let mut sorted = roots.to_vec();
    sorted.sort_by(|a, b| {
        let ord = sort_cmp(a, b, &sort.column, config);
        match sort.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
    sorted
        .into_iter()
        .map(|node| {
            let children = sort_forest(&node.children, sort, config);
            if children.iter().zip(&node.children).all(|(a, b)| Arc::ptr_eq(a, b)) {
                node
            } else {
                let mut n = (*node).clone();
                n.children = children;
                Arc::new(n)
            }
        })
        .collect()
}

/// Root forest of the view: all documents' roots with the view's
/// filters and sort applied.
fn visible_roots(project: &crate::models::Project, view: &ViewConfig) -> Vec<Arc<Node>> {
    let mut roots: Vec<Arc<Node>> = project.all_roots().into_iter().cloned().collect();
    if !view.filters.is_empty() {
        roots = roots
            .iter()
            .filter_map(|r| filter_tree(r, &view.filters, &project.config))
            .collect();
    }
    if let Some(sort) = &view.sort {
        roots = sort_forest(&roots, sort, &project.config);
    }
    roots
}

struct VisibleNode {
    node: Arc<Node>,
    band: usize,
}

fn flatten(roots: &[Arc<Node>], max_level: Option<u8>) -> Vec<VisibleNode> {
    fn walk(node: &Arc<Node>, band: usize, max_level: Option<u8>, out: &mut Vec<VisibleNode>) {
        if max_level.is_some_and(|max| node.level > max) {
            return;
        }
        out.push(VisibleNode {
            node: node.clone(),
            band,
        });
        for child in &node.children {
            walk(child, band, max_level, out);
        }
    }
    let mut out = Vec::new();
    for (band, root) in roots.iter().enumerate() {
        walk(root, band, max_level, &mut out);
    }
    out
}

fn depth_cap(view: &ViewConfig) -> Option<u8> {
    match view.view_type {
        ViewType::TableGantt => Some(view.gantt_level),
        _ => None,
    }
}

// ── Projections ────────────────────────────────────────────────────

fn render_cell(node: &Node, column: &str, config: &ProjectConfig) -> String {
    match column {
        "status" => format!("{} {}", node.status.icon(), node.status),
        "priority" => format!("{} {}", node.priority.icon(), node.priority),
        "start" => format_date(node.start, &config.date_format),
        "end" => format_date(node.end, &config.date_format),
        "progress" => format!("{}%", node.computed_progress()),
        "milestone" => {
            if node.milestone {
                MILESTONE_ICON.to_string()
            } else {
                String::new()
            }
        }
        "memo" => node.memo.replace('\n', " ").chars().take(40).collect(),
        _ => field_text(node, column),
    }
}

fn display_row(
    node: &Node,
    view: &ViewConfig,
    config: &ProjectConfig,
    titles: &HashMap<String, &Node>,
    today: NaiveDate,
) -> DisplayRow {
    let cells = view
        .columns
        .iter()
        .map(|col| (col.clone(), render_cell(node, col, config)))
        .collect();
    DisplayRow {
        node_id: node.id,
        depth: node.level,
        cells,
        delayed: node.status == Status::Todo && node.start.is_some_and(|s| s <= today),
        blocked: has_incomplete_dependencies(node, titles),
        milestone: node.milestone,
    }
}

/// Project the table rows for a view.
pub fn project_rows(
    project: &crate::models::Project,
    view: &ViewConfig,
    today: NaiveDate,
) -> Vec<DisplayRow> {
    let titles = title_map(project);
    let roots = visible_roots(project, view);
    flatten(&roots, depth_cap(view))
        .iter()
        .map(|v| display_row(&v.node, view, &project.config, &titles, today))
        .collect()
}

/// Gantt input rows, one-for-one with [`project_rows`] for the same
/// view so the chart tracks the table.
pub fn gantt_rows(
    project: &crate::models::Project,
    view: &ViewConfig,
    _today: NaiveDate,
) -> Vec<GanttRow> {
    let roots = visible_roots(project, view);
    flatten(&roots, depth_cap(view))
        .iter()
        .map(|v| GanttRow {
            node_id: v.node.id,
            start: v.node.start,
            end: v.node.end,
            milestone: v.node.milestone,
            status: v.node.status,
            progress: v.node.computed_progress(),
            has_depends: !v.node.depends.is_empty(),
            band: v.band,
        })
        .collect()
}

/// Bucket the flattened rows of a kanban view by its group-by column.
/// Enum columns use declared value order; everything else orders
/// buckets by first appearance.
pub fn kanban_columns(
    project: &crate::models::Project,
    view: &ViewConfig,
    today: NaiveDate,
) -> Vec<KanbanColumn> {
    let titles = title_map(project);
    let roots = visible_roots(project, view);
    let rows = flatten(&roots, None);

    let mut columns: Vec<KanbanColumn> = Vec::new();
    let declared: Vec<String> = match view.group_by.as_str() {
        "status" => Status::ALL.iter().map(|s| s.as_str().to_string()).collect(),
        "priority" => Priority::ALL.iter().map(|p| p.as_str().to_string()).collect(),
        other => project
            .config
            .custom_column(other)
            .filter(|c| c.column_type == ColumnType::Enum)
            .map(|c| c.values.clone())
            .unwrap_or_default(),
    };
    for key in declared {
        columns.push(KanbanColumn {
            key,
            rows: Vec::new(),
        });
    }

    for v in &rows {
        let mut key = field_text(&v.node, &view.group_by);
        if key.is_empty() {
            key = if view.group_by == "assignee" {
                "(unassigned)".to_string()
            } else {
                "(none)".to_string()
            };
        }
        let row = display_row(&v.node, view, &project.config, &titles, today);
        match columns.iter_mut().find(|c| c.key == key) {
            Some(col) => col.rows.push(row),
            None => columns.push(KanbanColumn {
                key,
                rows: vec![row],
            }),
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Project;
    use crate::parser::parse_markdown;
    use std::path::PathBuf;

    fn project_from(content: &str) -> Project {
        let mut project = Project::new(PathBuf::from("."));
        project.documents.push(parse_markdown(content, "a.wbs.md"));
        project.config.ensure_default_views();
        project
    }

    fn table_view(project: &Project) -> ViewConfig {
        project.config.view("default-table").unwrap().clone()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn row_titles(rows: &[DisplayRow]) -> Vec<String> {
        rows.iter()
            .map(|r| r.cell("title").unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_rows_follow_document_order() {
        let project = project_from("# A\n## B\n# C\n");
        let rows = project_rows(&project, &table_view(&project), today());
        assert_eq!(row_titles(&rows), ["A", "B", "C"]);
        assert_eq!(rows[0].depth, 1);
        assert_eq!(rows[1].depth, 2);
    }

    #[test]
    fn test_eq_filter_keeps_matching_subtrees() {
        let project = project_from(
            "# A\n<!-- status: DONE -->\n## A1\n<!-- status: TODO -->\n# B\n<!-- status: TODO -->\n",
        );
        let mut view = table_view(&project);
        view.filters.push(FilterSpec {
            column: "status".to_string(),
            op: FilterOp::Eq,
            value: "TODO".to_string(),
        });
        let rows = project_rows(&project, &view, today());
        // A stays because its child matches.
        assert_eq!(row_titles(&rows), ["A", "A1", "B"]);
    }

    #[test]
    fn test_filters_combine_with_and() {
        let project = project_from(
            "# A\n<!-- status: TODO | assignee: kim -->\n# B\n<!-- status: TODO -->\n",
        );
        let mut view = table_view(&project);
        view.filters.push(FilterSpec {
            column: "status".to_string(),
            op: FilterOp::Eq,
            value: "TODO".to_string(),
        });
        view.filters.push(FilterSpec {
            column: "assignee".to_string(),
            op: FilterOp::Eq,
            value: "kim".to_string(),
        });
        let rows = project_rows(&project, &view, today());
        assert_eq!(row_titles(&rows), ["A"]);
    }

    #[test]
    fn test_missing_value_excluded_on_ordered_ops() {
        let project = project_from("# A\n<!-- start: 2026-03-01 -->\n# B\n");
        let mut view = table_view(&project);
        view.filters.push(FilterSpec {
            column: "start".to_string(),
            op: FilterOp::Le,
            value: "2026-03-05".to_string(),
        });
        let rows = project_rows(&project, &view, today());
        assert_eq!(row_titles(&rows), ["A"]);
    }

    #[test]
    fn test_missing_value_matches_empty_eq() {
        let project = project_from("# A\n<!-- assignee: kim -->\n# B\n");
        let mut view = table_view(&project);
        view.filters.push(FilterSpec {
            column: "assignee".to_string(),
            op: FilterOp::Eq,
            value: "".to_string(),
        });
        let rows = project_rows(&project, &view, today());
        assert_eq!(row_titles(&rows), ["B"]);
    }

    #[test]
    fn test_in_and_between_ops() {
        let project = project_from(
            "# A\n<!-- priority: HIGH | start: 2026-03-02 -->\n\
             # B\n<!-- priority: LOW | start: 2026-04-01 -->\n\
             # C\n<!-- priority: MEDIUM | start: 2026-03-20 -->\n",
        );
        let mut view = table_view(&project);
        view.filters.push(FilterSpec {
            column: "priority".to_string(),
            op: FilterOp::In,
            value: "HIGH, MEDIUM".to_string(),
        });
        let rows = project_rows(&project, &view, today());
        assert_eq!(row_titles(&rows), ["A", "C"]);

        let mut view = table_view(&project);
        view.filters.push(FilterSpec {
            column: "start".to_string(),
            op: FilterOp::Between,
            value: "2026-03-01..2026-03-31".to_string(),
        });
        let rows = project_rows(&project, &view, today());
        assert_eq!(row_titles(&rows), ["A", "C"]);
    }

    #[test]
    fn test_sort_by_status_with_stable_ties() {
        let project = project_from(
            "# B\n<!-- status: DONE -->\n# A\n<!-- status: TODO -->\n# C\n<!-- status: TODO -->\n",
        );
        let mut view = table_view(&project);
        view.sort = Some(SortSpec {
            column: "status".to_string(),
            direction: SortDirection::Asc,
        });
        let rows = project_rows(&project, &view, today());
        // TODO before DONE; A before C by document order.
        assert_eq!(row_titles(&rows), ["A", "C", "B"]);
    }

    #[test]
    fn test_sort_desc_and_tree_preserved() {
        let project = project_from("# P\n## A\n## C\n## B\n");
        let mut view = table_view(&project);
        view.sort = Some(SortSpec {
            column: "title".to_string(),
            direction: SortDirection::Desc,
        });
        let rows = project_rows(&project, &view, today());
        assert_eq!(row_titles(&rows), ["P", "C", "B", "A"]);
    }

    #[test]
    fn test_gantt_depth_cap() {
        let project = project_from("# A\n## B\n### C\n#### D\n");
        let mut view = project.config.view("default-gantt").unwrap().clone();
        view.gantt_level = 2;
        let rows = project_rows(&project, &view, today());
        assert_eq!(row_titles(&rows), ["A", "B"]);
        assert!(rows.iter().all(|r| r.depth <= 2));
        let grows = gantt_rows(&project, &view, today());
        assert_eq!(grows.len(), rows.len());
    }

    #[test]
    fn test_delayed_flag() {
        let project = project_from(
            "# Late\n<!-- status: TODO | start: 2026-03-01 -->\n\
             # Future\n<!-- status: TODO | start: 2026-04-01 -->\n\
             # Going\n<!-- status: IN_PROGRESS | start: 2026-03-01 -->\n",
        );
        let rows = project_rows(&project, &table_view(&project), today());
        assert!(rows[0].delayed);
        assert!(!rows[1].delayed);
        assert!(!rows[2].delayed);
    }

    #[test]
    fn test_blocked_flag() {
        let project = project_from(
            "# A\n<!-- status: TODO -->\n# B\n<!-- depends: A -->\n# C\n<!-- depends: Ghost -->\n",
        );
        let rows = project_rows(&project, &table_view(&project), today());
        assert!(!rows[0].blocked);
        assert!(rows[1].blocked);
        assert!(rows[2].blocked);
    }

    #[test]
    fn test_progress_cell_is_computed() {
        let project = project_from(
            "# P\n## A\n<!-- status: DONE -->\n## B\n<!-- status: DONE -->\n## C\n",
        );
        let rows = project_rows(&project, &table_view(&project), today());
        assert_eq!(rows[0].cell("progress"), Some("66%"));
    }

    #[test]
    fn test_kanban_status_columns_in_enum_order() {
        let project = project_from(
            "# A\n<!-- status: DONE -->\n# B\n<!-- status: TODO -->\n# C\n<!-- status: IN_PROGRESS -->\n",
        );
        let view = project.config.view("default-kanban").unwrap().clone();
        let columns = kanban_columns(&project, &view, today());
        let keys: Vec<&str> = columns.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, ["TODO", "IN_PROGRESS", "DONE"]);
        assert_eq!(columns[0].rows.len(), 1);
        assert_eq!(columns[1].rows.len(), 1);
        assert_eq!(columns[2].rows.len(), 1);
    }

    #[test]
    fn test_kanban_assignee_buckets_by_first_appearance() {
        let project = project_from(
            "# A\n<!-- assignee: kim -->\n# B\n<!-- assignee: lee -->\n# C\n<!-- assignee: kim -->\n# D\n",
        );
        let mut view = project.config.view("default-kanban").unwrap().clone();
        view.group_by = "assignee".to_string();
        let columns = kanban_columns(&project, &view, today());
        let keys: Vec<&str> = columns.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, ["kim", "lee", "(unassigned)"]);
        assert_eq!(columns[0].rows.len(), 2);
    }

    #[test]
    fn test_projection_is_pure() {
        let project = project_from("# A\n## B\n");
        let view = table_view(&project);
        let a = project_rows(&project, &view, today());
        let b = project_rows(&project, &view, today());
        assert_eq!(row_titles(&a), row_titles(&b));
        assert_eq!(a.len(), b.len());
    }
}
