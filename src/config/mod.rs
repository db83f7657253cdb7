//! Project configuration: load/save of `.tui-wbs/config.toml`.
//!
//! Reads are tolerant (missing keys fall back to defaults, a missing
//! file is the default config); writes go through `toml_edit` so user
//! comments and key order in an existing file survive a rewrite.

pub mod schema;

pub use schema::{
    BUILTIN_COLUMNS, ColumnDef, ColumnType, FilterOp, FilterSpec, ProjectConfig, ScaleWidths,
    SortDirection, SortSpec, ViewConfig, ViewType, is_builtin_column,
};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use toml_edit::{Array, ArrayOfTables, DocumentMut, InlineTable, Item, Table, value};

use crate::gantt::Scale;
use crate::{Error, Result};

/// Directory holding project-level state (config, lock).
pub const CONFIG_DIR: &str = ".tui-wbs";
/// Primary config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.toml";
/// Fallback config file at the project root.
pub const FALLBACK_FILE: &str = ".tui-wbs.toml";

/// Primary config path for a project directory.
pub fn config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// The config file to read: the primary path when present, else the
/// root fallback, else the primary path again (for error messages).
pub fn resolve_config_path(project_dir: &Path) -> PathBuf {
    let primary = config_path(project_dir);
    if primary.exists() {
        return primary;
    }
    let fallback = project_dir.join(FALLBACK_FILE);
    if fallback.exists() { fallback } else { primary }
}

/// Load the project configuration. A missing file yields the default
/// config (with default views seeded); a syntactically broken file is
/// a `ConfigParse` error.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig> {
    let path = resolve_config_path(project_dir);
    let mut config = ProjectConfig::default();
    if !path.exists() {
        config.ensure_default_views();
        return Ok(config);
    }

    let text = fs::read_to_string(&path)?;
    let doc: DocumentMut = text
        .parse()
        .map_err(|e| Error::ConfigParse(format!("{}: {}", path.display(), e)))?;

    if let Some(project) = doc.get("project").and_then(Item::as_table) {
        if let Some(name) = project.get("name").and_then(Item::as_str) {
            config.name = name.to_string();
        }
        if let Some(view) = project.get("default_view").and_then(Item::as_str) {
            config.default_view = view.to_string();
        }
        if let Some(fmt) = project.get("date_format").and_then(Item::as_str) {
            if crate::models::DATE_FORMAT_PRESETS.iter().any(|(n, _)| *n == fmt) {
                config.date_format = fmt.to_string();
            }
        }
        if let Some(cols) = project.get("default_columns").and_then(Item::as_array) {
            config.default_columns = string_array(cols);
        }
        if let Some(days) = project.get("holidays").and_then(Item::as_array) {
            config.holidays = days
                .iter()
                .filter_map(|v| v.as_str())
                .filter_map(|s| s.parse::<NaiveDate>().ok())
                .collect();
        }
    }

    if let Some(widths) = doc
        .get("gantt")
        .and_then(Item::as_table)
        .and_then(|g| g.get("widths"))
        .and_then(Item::as_table)
    {
        for scale in Scale::ALL {
            if let Some(w) = widths.get(scale.as_str()).and_then(Item::as_integer) {
                config.scale_widths.set(scale, w.clamp(1, 64) as u16);
            }
        }
    }

    if let Some(customs) = doc
        .get("columns")
        .and_then(Item::as_table)
        .and_then(|c| c.get("custom"))
        .and_then(Item::as_array_of_tables)
    {
        for t in customs.iter() {
            let mut col = ColumnDef::default();
            if let Some(id) = t.get("id").and_then(Item::as_str) {
                col.id = id.to_string();
            }
            if let Some(name) = t.get("name").and_then(Item::as_str) {
                col.name = name.to_string();
            }
            if let Some(ty) = t.get("type").and_then(Item::as_str) {
                col.column_type = ColumnType::parse(ty).unwrap_or_default();
            }
            if let Some(values) = t.get("values").and_then(Item::as_array) {
                col.values = string_array(values);
            }
            if let Some(req) = t.get("required").and_then(Item::as_bool) {
                col.required = req;
            }
            if !col.id.is_empty() {
                config.custom_columns.push(col);
            }
        }
    }

    if let Some(views) = doc.get("views").and_then(Item::as_array_of_tables) {
        for t in views.iter() {
            config.views.push(parse_view(t));
        }
    }

    config.ensure_default_views();
    Ok(config)
}

fn parse_view(t: &Table) -> ViewConfig {
    let mut view = ViewConfig::default();
    if let Some(id) = t.get("id").and_then(Item::as_str) {
        view.id = id.to_string();
    }
    if let Some(name) = t.get("name").and_then(Item::as_str) {
        view.name = name.to_string();
    }
    if let Some(ty) = t.get("type").and_then(Item::as_str) {
        view.view_type = ViewType::parse(ty).unwrap_or_default();
    }
    if let Some(cols) = t.get("columns").and_then(Item::as_array) {
        view.columns = string_array(cols);
    }
    if let Some(sort) = t.get("sort").and_then(Item::as_inline_table) {
        let column = sort
            .get("field")
            .and_then(|v| v.as_str())
            .unwrap_or("title")
            .to_string();
        let direction = sort
            .get("order")
            .and_then(|v| v.as_str())
            .and_then(SortDirection::parse)
            .unwrap_or_default();
        view.sort = Some(SortSpec { column, direction });
    }
    if let Some(group) = t.get("group_by").and_then(Item::as_str) {
        view.group_by = group.to_string();
    }
    if let Some(scale) = t.get("gantt_scale").and_then(Item::as_str) {
        view.gantt_scale = Scale::parse(scale).unwrap_or_default();
    }
    if let Some(level) = t.get("gantt_level").and_then(Item::as_integer) {
        view.gantt_level = level.clamp(1, 6) as u8;
    }
    if let Some(widths) = t.get("column_widths").and_then(Item::as_inline_table) {
        for (key, val) in widths.iter() {
            if let Some(w) = val.as_integer() {
                view.column_widths.insert(key.to_string(), w.clamp(1, 200) as u16);
            }
        }
    }
    if let Some(filters) = t.get("filters").and_then(Item::as_array_of_tables) {
        for f in filters.iter() {
            view.filters.push(FilterSpec {
                column: f
                    .get("field")
                    .and_then(Item::as_str)
                    .unwrap_or_default()
                    .to_string(),
                op: f
                    .get("operator")
                    .and_then(Item::as_str)
                    .and_then(FilterOp::parse)
                    .unwrap_or_default(),
                value: f
                    .get("value")
                    .and_then(Item::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
    }
    view
}

/// Save the project configuration, editing the existing TOML document
/// in place so comments and key order survive.
pub fn save_config(project_dir: &Path, config: &ProjectConfig) -> Result<()> {
    let path = resolve_config_path(project_dir);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut doc: DocumentMut = match fs::read_to_string(&path) {
        Ok(text) => text.parse().unwrap_or_default(),
        Err(_) => DocumentMut::new(),
    };

    if doc.get("project").and_then(Item::as_table).is_none() {
        doc["project"] = Item::Table(Table::new());
    }
    let project = &mut doc["project"];
    project["name"] = value(config.name.as_str());
    project["default_view"] = value(config.default_view.as_str());
    project["date_format"] = value(config.date_format.as_str());
    project["default_columns"] = value(str_array(&config.default_columns));
    if !config.holidays.is_empty() {
        let mut days = Array::new();
        for d in &config.holidays {
            days.push(d.to_string());
        }
        project["holidays"] = value(days);
    }

    if config.scale_widths != ScaleWidths::default()
        || doc.get("gantt").is_some()
    {
        if doc.get("gantt").and_then(Item::as_table).is_none() {
            doc["gantt"] = Item::Table(Table::new());
        }
        let mut widths = Table::new();
        for scale in Scale::ALL {
            widths[scale.as_str()] = value(config.scale_widths.get(scale) as i64);
        }
        doc["gantt"]["widths"] = Item::Table(widths);
    }

    if config.custom_columns.is_empty() {
        doc.remove("columns");
    } else {
        if doc.get("columns").and_then(Item::as_table).is_none() {
            doc["columns"] = Item::Table(Table::new());
        }
        let mut customs = ArrayOfTables::new();
        for col in &config.custom_columns {
            let mut t = Table::new();
            t["id"] = value(col.id.as_str());
            t["name"] = value(col.name.as_str());
            t["type"] = value(col.column_type.as_str());
            if !col.values.is_empty() {
                t["values"] = value(str_array(&col.values));
            }
            if col.required {
                t["required"] = value(true);
            }
            customs.push(t);
        }
        doc["columns"]["custom"] = Item::ArrayOfTables(customs);
    }

    let mut views = ArrayOfTables::new();
    for view in &config.views {
        views.push(view_table(view));
    }
    doc["views"] = Item::ArrayOfTables(views);

    fs::write(&path, doc.to_string())?;
    Ok(())
}

fn view_table(view: &ViewConfig) -> Table {
    let mut t = Table::new();
    t["id"] = value(view.id.as_str());
    t["name"] = value(view.name.as_str());
    t["type"] = value(view.view_type.as_str());
    t["columns"] = value(str_array(&view.columns));
    if let Some(sort) = &view.sort {
        let mut it = InlineTable::new();
        it.insert("field", sort.column.as_str().into());
        it.insert("order", sort.direction.as_str().into());
        t["sort"] = value(it);
    }
    if !view.column_widths.is_empty() {
        let mut it = InlineTable::new();
        for (col, width) in &view.column_widths {
            it.insert(col.as_str(), (*width as i64).into());
        }
        t["column_widths"] = value(it);
    }
    match view.view_type {
        ViewType::TableGantt => {
            t["gantt_scale"] = value(view.gantt_scale.as_str());
            t["gantt_level"] = value(view.gantt_level as i64);
        }
        ViewType::Kanban => {
            t["group_by"] = value(view.group_by.as_str());
        }
        ViewType::Table => {}
    }
    if !view.filters.is_empty() {
        let mut filters = ArrayOfTables::new();
        for f in &view.filters {
            let mut ft = Table::new();
            ft["field"] = value(f.column.as_str());
            ft["operator"] = value(f.op.as_str());
            ft["value"] = value(f.value.as_str());
            filters.push(ft);
        }
        t["filters"] = Item::ArrayOfTables(filters);
    }
    t
}

fn string_array(arr: &Array) -> Vec<String> {
    arr.iter()
        .filter_map(|v| v.as_str())
        .map(String::from)
        .collect()
}

fn str_array(items: &[String]) -> Array {
    let mut arr = Array::new();
    for item in items {
        arr.push(item.as_str());
    }
    arr
}
