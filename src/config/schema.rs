//! Config value types for `.tui-wbs/config.toml`.
//!
//! This module provides:
//! - Rust structs for the project configuration schema
//! - Parse/as_str pairs for the enum-like string fields
//! - Defaults and validation

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::gantt::Scale;

/// Built-in column ids, in canonical display order.
pub const BUILTIN_COLUMNS: &[&str] = &[
    "title", "status", "assignee", "duration", "priority", "start", "end", "progress", "depends",
    "milestone", "memo", "file",
];

/// True when the id names a built-in column.
pub fn is_builtin_column(id: &str) -> bool {
    BUILTIN_COLUMNS.contains(&id)
}

/// How a view lays its rows out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewType {
    #[default]
    #[serde(rename = "table")]
    Table,
    #[serde(rename = "table+gantt")]
    TableGantt,
    #[serde(rename = "kanban")]
    Kanban,
}

impl ViewType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "table" => Some(ViewType::Table),
            "table+gantt" => Some(ViewType::TableGantt),
            "kanban" => Some(ViewType::Kanban),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewType::Table => "table",
            ViewType::TableGantt => "table+gantt",
            ViewType::Kanban => "kanban",
        }
    }
}

/// Value type of a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    String,
    Enum,
    Date,
    Number,
    Boolean,
}

impl ColumnType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "string" | "text" => Some(ColumnType::String),
            "enum" => Some(ColumnType::Enum),
            "date" => Some(ColumnType::Date),
            "number" => Some(ColumnType::Number),
            "boolean" | "bool" => Some(ColumnType::Boolean),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Enum => "enum",
            ColumnType::Date => "date",
            ColumnType::Number => "number",
            ColumnType::Boolean => "boolean",
        }
    }
}

/// Definition of a custom column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDef {
    pub id: String,
    pub name: String,
    pub column_type: ColumnType,
    /// Allowed values when `column_type` is `Enum`, in declared order.
    pub values: Vec<String>,
    pub required: bool,
}

impl ColumnDef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnDef {
            id: id.into(),
            name: name.into(),
            column_type,
            values: Vec::new(),
            required: false,
        }
    }
}

/// Comparison operator of a filter predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterOp {
    #[default]
    Eq,
    Ne,
    In,
    NotIn,
    Contains,
    Lt,
    Le,
    Gt,
    Ge,
    Between,
}

impl FilterOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "eq" => Some(FilterOp::Eq),
            "ne" | "neq" => Some(FilterOp::Ne),
            "in" => Some(FilterOp::In),
            "not_in" => Some(FilterOp::NotIn),
            "contains" => Some(FilterOp::Contains),
            "lt" => Some(FilterOp::Lt),
            "le" => Some(FilterOp::Le),
            "gt" => Some(FilterOp::Gt),
            "ge" => Some(FilterOp::Ge),
            "between" => Some(FilterOp::Between),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Ne => "ne",
            FilterOp::In => "in",
            FilterOp::NotIn => "not_in",
            FilterOp::Contains => "contains",
            FilterOp::Lt => "lt",
            FilterOp::Le => "le",
            FilterOp::Gt => "gt",
            FilterOp::Ge => "ge",
            FilterOp::Between => "between",
        }
    }
}

/// One filter predicate; predicates on a view combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub column: String,
    pub op: FilterOp,
    /// Literal operand. `in`/`not_in` split on commas; `between` takes
    /// `lo..hi`.
    pub value: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Sort descriptor: keyed column plus direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

/// Declarative description of one view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    pub id: String,
    pub name: String,
    pub view_type: ViewType,
    pub columns: Vec<String>,
    pub filters: Vec<FilterSpec>,
    pub sort: Option<SortSpec>,
    /// Grouping column for kanban views.
    pub group_by: String,
    pub gantt_scale: Scale,
    /// Maximum WBS depth shown in gantt views.
    pub gantt_level: u8,
    /// Per-column width overrides, persisted per view.
    pub column_widths: BTreeMap<String, u16>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            id: String::new(),
            name: "Table".to_string(),
            view_type: ViewType::Table,
            columns: default_columns(),
            filters: Vec::new(),
            sort: None,
            group_by: "status".to_string(),
            gantt_scale: Scale::Week,
            gantt_level: 3,
            column_widths: BTreeMap::new(),
        }
    }
}

impl ViewConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, view_type: ViewType) -> Self {
        ViewConfig {
            id: id.into(),
            name: name.into(),
            view_type,
            ..ViewConfig::default()
        }
    }
}

/// Gantt cell widths per scale, in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleWidths {
    pub day: u16,
    pub week: u16,
    pub month: u16,
    pub quarter: u16,
    pub year: u16,
}

impl Default for ScaleWidths {
    fn default() -> Self {
        // Week cells carry one character per day so the weekday strip
        // and in-cell date offsets line up.
        ScaleWidths {
            day: 2,
            week: 7,
            month: 6,
            quarter: 6,
            year: 6,
        }
    }
}

impl ScaleWidths {
    pub fn get(&self, scale: Scale) -> u16 {
        match scale {
            Scale::Day => self.day,
            Scale::Week => self.week,
            Scale::Month => self.month,
            Scale::Quarter => self.quarter,
            Scale::Year => self.year,
        }
    }

    pub fn set(&mut self, scale: Scale, width: u16) {
        let slot = match scale {
            Scale::Day => &mut self.day,
            Scale::Week => &mut self.week,
            Scale::Month => &mut self.month,
            Scale::Quarter => &mut self.quarter,
            Scale::Year => &mut self.year,
        };
        *slot = width.max(1);
    }
}

fn default_columns() -> Vec<String> {
    ["title", "status", "priority", "progress", "assignee", "start", "end", "duration"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Project-level configuration stored in `.tui-wbs/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub name: String,
    pub default_view: String,
    /// Date display preset name (see `models::DATE_FORMAT_PRESETS`).
    pub date_format: String,
    /// Column list seeded into newly created views.
    pub default_columns: Vec<String>,
    pub custom_columns: Vec<ColumnDef>,
    /// Non-working dates that receive distinct gantt shading.
    pub holidays: Vec<NaiveDate>,
    pub scale_widths: ScaleWidths,
    pub views: Vec<ViewConfig>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        ProjectConfig {
            name: String::new(),
            default_view: String::new(),
            date_format: crate::models::DEFAULT_DATE_FORMAT.to_string(),
            default_columns: default_columns(),
            custom_columns: Vec::new(),
            holidays: Vec::new(),
            scale_widths: ScaleWidths::default(),
            views: Vec::new(),
        }
    }
}

impl ProjectConfig {
    /// Find a view by id.
    pub fn view(&self, id: &str) -> Option<&ViewConfig> {
        self.views.iter().find(|v| v.id == id)
    }

    /// The ids of declared custom columns, in declared order.
    pub fn custom_column_ids(&self) -> Vec<String> {
        self.custom_columns.iter().map(|c| c.id.clone()).collect()
    }

    /// Find a custom column definition by id.
    pub fn custom_column(&self, id: &str) -> Option<&ColumnDef> {
        self.custom_columns.iter().find(|c| c.id == id)
    }

    /// Seed the default views (and default view id) on first run.
    pub fn ensure_default_views(&mut self) {
        if self.views.is_empty() {
            let table = ViewConfig::new("default-table", "Table", ViewType::Table);
            let mut gantt = ViewConfig::new("default-gantt", "Gantt", ViewType::TableGantt);
            gantt.columns = ["title", "status", "progress", "assignee", "start", "end"]
                .into_iter()
                .map(String::from)
                .collect();
            let mut kanban = ViewConfig::new("default-kanban", "Board", ViewType::Kanban);
            kanban.columns = ["title", "priority", "assignee"]
                .into_iter()
                .map(String::from)
                .collect();
            if self.default_view.is_empty() {
                self.default_view = table.id.clone();
            }
            self.views.extend([table, gantt, kanban]);
        }
    }

    /// Check invariants the config file cannot express: unique view
    /// ids and custom columns not shadowing built-ins.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for view in &self.views {
            if !seen.insert(view.id.as_str()) {
                return Err(format!("duplicate view id '{}'", view.id));
            }
        }
        for col in &self.custom_columns {
            if is_builtin_column(&col.id) {
                return Err(format!("custom column '{}' shadows a built-in column", col.id));
            }
        }
        Ok(())
    }
}
