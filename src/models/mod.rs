//! Data models for tui-wbs entities.
//!
//! This module defines the core value types:
//! - `Node` - one work item (a Markdown heading plus its metadata)
//! - `Document` - one `.wbs.md` file and its forest of root nodes
//! - `Project` - a directory of documents plus configuration
//! - `ParseWarning` - recoverable problems collected while loading
//!
//! Nodes are immutable values: every edit builds a new node and copies
//! the spine from the root down to it, sharing untouched subtrees via
//! `Arc`. That makes a whole-project snapshot for the undo stack a
//! shallow clone.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ProjectConfig;

/// Work item status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl Status {
    /// All statuses in kanban column / sort order.
    pub const ALL: [Status; 3] = [Status::Todo, Status::InProgress, Status::Done];

    /// Parse the on-disk form, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "TODO" => Some(Status::Todo),
            "IN_PROGRESS" => Some(Status::InProgress),
            "DONE" => Some(Status::Done),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "TODO",
            Status::InProgress => "IN_PROGRESS",
            Status::Done => "DONE",
        }
    }

    /// The next status in the TODO -> IN_PROGRESS -> DONE cycle.
    pub fn cycled(&self) -> Status {
        match self {
            Status::Todo => Status::InProgress,
            Status::InProgress => Status::Done,
            Status::Done => Status::Todo,
        }
    }

    /// Single-character display icon.
    pub fn icon(&self) -> char {
        match self {
            Status::Todo => '○',
            Status::InProgress => '◐',
            Status::Done => '●',
        }
    }

    /// Rank used by sort descriptors: TODO < IN_PROGRESS < DONE.
    pub fn sort_rank(&self) -> u8 {
        match self {
            Status::Todo => 0,
            Status::InProgress => 1,
            Status::Done => 2,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Work item priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// All priorities in sort order: HIGH < MEDIUM < LOW.
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "HIGH" => Some(Priority::High),
            "MEDIUM" => Some(Priority::Medium),
            "LOW" => Some(Priority::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }

    pub fn icon(&self) -> char {
        match self {
            Priority::High => '◆',
            Priority::Medium => '▲',
            Priority::Low => '▽',
        }
    }

    pub fn sort_rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Display icon for milestone nodes.
pub const MILESTONE_ICON: char = '◇';

/// Opaque per-process node identity. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        NodeId(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Raw source lines a node was parsed from, replayed verbatim on write
/// as long as the node stays unedited. The metadata comment stays in
/// `rest` at its original position so replay is byte-exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLines {
    /// The heading line, exactly as read.
    pub heading: String,
    /// Every following line up to the next heading, in order.
    pub rest: Vec<String>,
}

/// A single node in the WBS tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// Node title (the heading text, verbatim).
    pub title: String,
    /// Heading level: 1 = `#`, 2 = `##`, ... up to 6.
    pub level: u8,
    pub status: Status,
    pub priority: Priority,
    /// Assigned person, may be empty.
    pub assignee: String,
    /// Free-form duration such as `5d`, `2w`. May be empty.
    pub duration: String,
    /// Titles of nodes this one depends on, in source order.
    pub depends: Vec<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Zero-duration node pinned to `start`; forces `end == start`.
    pub milestone: bool,
    /// Explicit progress 0-100. `None` means derived (see
    /// [`Node::computed_progress`]).
    pub progress: Option<u8>,
    /// Raw body text between this heading and the next.
    pub memo: String,
    /// Custom fields in source order.
    pub custom_fields: Vec<(String, String)>,
    /// Relative path of the file this node came from.
    pub source_file: String,
    pub children: Vec<Arc<Node>>,

    /// Source lines for round-trip replay. `None` for nodes created
    /// in-session.
    pub raw: Option<RawLines>,
    /// Set by any command that touches this node's own fields; the
    /// writer regenerates the heading and metadata only when set.
    pub edited: bool,
    /// Session-only: the user set `start` directly, so ancestor date
    /// aggregation must not overwrite it.
    pub start_pinned: bool,
    /// Session-only counterpart for `end`.
    pub end_pinned: bool,
}

impl Node {
    /// Create a fresh in-session node with default fields.
    pub fn new(title: impl Into<String>, level: u8) -> Self {
        Node {
            id: NodeId::new(),
            title: title.into(),
            level: level.clamp(1, 6),
            status: Status::default(),
            priority: Priority::default(),
            assignee: String::new(),
            duration: String::new(),
            depends: Vec::new(),
            start: None,
            end: None,
            milestone: false,
            progress: None,
            memo: String::new(),
            custom_fields: Vec::new(),
            source_file: String::new(),
            children: Vec::new(),
            raw: None,
            edited: true,
            start_pinned: false,
            end_pinned: false,
        }
    }

    /// This node followed by all descendants, depth first.
    pub fn all_nodes(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Node>) {
        out.push(self);
        for child in &self.children {
            child.collect(out);
        }
    }

    /// Number of nodes in this subtree including self.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(|c| c.subtree_len()).sum::<usize>()
    }

    /// Deepest heading level in this subtree.
    pub fn max_level(&self) -> u8 {
        self.children
            .iter()
            .map(|c| c.max_level())
            .max()
            .map_or(self.level, |m| m.max(self.level))
    }

    /// Primary display icon: milestone marker wins over status.
    pub fn display_icon(&self) -> char {
        if self.milestone {
            MILESTONE_ICON
        } else {
            self.status.icon()
        }
    }

    /// Progress for display and layout.
    ///
    /// A node with children derives `floor(100 * done / total)` over all
    /// transitive non-milestone descendants; a leaf reports its explicit
    /// value (clamped), defaulting to 100 when DONE and 0 otherwise.
    pub fn computed_progress(&self) -> u8 {
        if self.children.is_empty() {
            return match self.progress {
                Some(p) => p.min(100),
                None if self.status == Status::Done => 100,
                None => 0,
            };
        }
        let mut total = 0u32;
        let mut done = 0u32;
        for node in self.all_nodes().into_iter().skip(1) {
            if node.milestone {
                continue;
            }
            total += 1;
            if node.status == Status::Done {
                done += 1;
            }
        }
        if total == 0 {
            0
        } else {
            (done * 100 / total) as u8
        }
    }

    /// Force the milestone geometry invariant: `end == start`.
    pub fn normalize_milestone(&mut self) {
        if self.milestone && self.start.is_some() {
            self.end = self.start;
        }
    }

    /// Look up a custom field by id.
    pub fn custom_field(&self, id: &str) -> Option<&str> {
        self.custom_fields
            .iter()
            .find(|(k, _)| k == id)
            .map(|(_, v)| v.as_str())
    }

    /// Set or append a custom field, keeping declaration order.
    pub fn set_custom_field(&mut self, id: &str, value: String) {
        if let Some(slot) = self.custom_fields.iter_mut().find(|(k, _)| k == id) {
            slot.1 = value;
        } else {
            self.custom_fields.push((id.to_string(), value));
        }
    }

    /// Depends entries re-joined in the on-disk form.
    pub fn depends_str(&self) -> String {
        self.depends.join("; ")
    }
}

// ── Durations ──────────────────────────────────────────────────────

/// Parse a duration like `5d` or `2.5w` into (value, unit). A bare
/// number means days. Returns `None` on anything else.
pub fn parse_duration(s: &str) -> Option<(f64, String)> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let split = s.find(|c: char| c.is_ascii_alphabetic()).unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    let value: f64 = num.trim().parse().ok()?;
    if !unit.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let unit = if unit.is_empty() { "d" } else { unit };
    Some((value, unit.to_lowercase()))
}

/// Convert a duration string to whole days. `5d` -> 5, `2w` -> 14,
/// `8h` -> 1. Returns `None` when the string does not parse.
pub fn duration_to_days(s: &str) -> Option<i64> {
    let (value, unit) = parse_duration(s)?;
    let days = match unit.as_str() {
        "d" | "day" | "days" => value,
        "w" | "week" | "weeks" => value * 7.0,
        "m" | "month" | "months" => value * 30.0,
        "h" | "hour" | "hours" => {
            if value <= 0.0 {
                return Some(0);
            }
            (value / 8.0).max(1.0)
        }
        _ => value,
    };
    Some((days as i64).max(1))
}

/// Convert whole days back to the canonical `Nd` form.
pub fn days_to_duration(days: i64) -> String {
    if days <= 0 {
        "0d".to_string()
    } else {
        format!("{}d", days)
    }
}

/// Step a duration string by `delta` in its own unit. An empty string
/// stepped up becomes `1d`; unparseable strings pass through.
pub fn adjust_duration(duration: &str, delta: i64) -> String {
    match parse_duration(duration) {
        None => {
            if duration.trim().is_empty() && delta > 0 {
                "1d".to_string()
            } else {
                duration.to_string()
            }
        }
        Some((value, unit)) => {
            let new_value = (value + delta as f64).max(0.0);
            if new_value.fract() == 0.0 {
                format!("{}{}", new_value as i64, unit)
            } else {
                format!("{}{}", new_value, unit)
            }
        }
    }
}

// ── Date display ───────────────────────────────────────────────────

/// Supported date display presets, in selection order.
pub const DATE_FORMAT_PRESETS: &[(&str, &str)] = &[
    ("YYYY-MM-DD", "%Y-%m-%d"),
    ("MM/DD/YYYY", "%m/%d/%Y"),
    ("DD/MM/YYYY", "%d/%m/%Y"),
    ("DD.MM.YYYY", "%d.%m.%Y"),
    ("YYYY/MM/DD", "%Y/%m/%d"),
    ("MMM DD, YYYY", "%b %d, %Y"),
    ("MM-DD", "%m-%d"),
];

/// Default date display preset.
pub const DEFAULT_DATE_FORMAT: &str = "MM-DD";

/// Format a date for display under a preset name. Unknown presets fall
/// back to ISO; `None` renders empty.
pub fn format_date(d: Option<NaiveDate>, preset: &str) -> String {
    let Some(d) = d else {
        return String::new();
    };
    match DATE_FORMAT_PRESETS.iter().find(|(name, _)| *name == preset) {
        Some((_, fmt)) => d.format(fmt).to_string(),
        None => d.to_string(),
    }
}

// ── Warnings ───────────────────────────────────────────────────────

/// Classification of a recoverable load-time problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    HeadingLevelJump,
    InvalidValue,
    DuplicateKey,
    UnresolvedDependency,
    DuplicateTitle,
    CircularDependency,
    DateConflict,
    UnreadableFile,
    NoHeadings,
    StaleLockTakenOver,
}

/// A warning generated during parsing or lock handling. Warnings are
/// collected, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    pub kind: WarningKind,
    pub file: String,
    pub line: usize,
    pub message: String,
}

impl ParseWarning {
    pub fn new(kind: WarningKind, file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        ParseWarning {
            kind,
            file: file.into(),
            line,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.message)
    }
}

// ── Documents and projects ─────────────────────────────────────────

/// One parsed `.wbs.md` file.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    /// The raw bytes last read, replayed verbatim while unmodified.
    pub raw_content: String,
    /// One root per top-level heading, in source order.
    pub roots: Vec<Arc<Node>>,
    pub modified: bool,
    pub warnings: Vec<ParseWarning>,
}

impl Document {
    pub fn new(path: PathBuf) -> Self {
        Document {
            path,
            raw_content: String::new(),
            roots: Vec::new(),
            modified: false,
            warnings: Vec::new(),
        }
    }

    /// Every node in this document, depth first across roots.
    pub fn all_nodes(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        for root in &self.roots {
            root.collect(&mut out);
        }
        out
    }
}

/// A folder-based WBS project.
#[derive(Debug)]
pub struct Project {
    pub dir: PathBuf,
    /// Documents ordered by relative path, lexicographically.
    pub documents: Vec<Document>,
    pub config: ProjectConfig,
    /// Merged warnings from every document plus project-level checks.
    pub warnings: Vec<ParseWarning>,
    /// Advisory lock, when held by this process.
    pub lock: Option<crate::lock::ProjectLock>,
}

impl Project {
    pub fn new(dir: PathBuf) -> Self {
        Project {
            dir,
            documents: Vec::new(),
            config: ProjectConfig::default(),
            warnings: Vec::new(),
            lock: None,
        }
    }

    /// Every node across all documents, in project order.
    pub fn all_nodes(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        for doc in &self.documents {
            for root in &doc.roots {
                root.collect(&mut out);
            }
        }
        out
    }

    /// All root nodes across documents, in project order.
    pub fn all_roots(&self) -> Vec<&Arc<Node>> {
        self.documents.iter().flat_map(|d| d.roots.iter()).collect()
    }

    /// First node (document order) with the given title.
    pub fn find_by_title(&self, title: &str) -> Option<&Node> {
        self.all_nodes().into_iter().find(|n| n.title == title)
    }

    /// First node with the given id.
    pub fn find_node(&self, id: NodeId) -> Option<&Node> {
        self.all_nodes().into_iter().find(|n| n.id == id)
    }

    /// True when any document carries unsaved edits.
    pub fn is_modified(&self) -> bool {
        self.documents.iter().any(|d| d.modified)
    }
}

/// Map from title to the first node carrying it, in document order.
/// Dependency resolution always takes the first occurrence.
pub fn title_map(project: &Project) -> std::collections::HashMap<String, &Node> {
    let mut map = std::collections::HashMap::new();
    for node in project.all_nodes() {
        map.entry(node.title.clone()).or_insert(node);
    }
    map
}

/// True when any dependency of `node` is missing or not DONE.
pub fn has_incomplete_dependencies(
    node: &Node,
    titles: &std::collections::HashMap<String, &Node>,
) -> bool {
    node.depends.iter().any(|dep| {
        titles
            .get(dep.as_str())
            .is_none_or(|n| n.status != Status::Done)
    })
}
