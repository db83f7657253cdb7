//! Gantt layout engine.
//!
//! `Timeline` maps calendar dates onto character columns for a chosen
//! scale; `render` assembles the header bands and bar rows into a grid
//! of `(char, fg, bg)` cells. Nothing here knows about the terminal:
//! the renderer owns scrolling and color resolution.

pub mod render;

pub use render::{Cell, GanttGrid, GanttOptions, layout};

use chrono::{Datelike, Days, NaiveDate};

use crate::models::{NodeId, Status};

/// Time unit represented by one gantt cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Scale {
    Day,
    #[default]
    Week,
    Month,
    Quarter,
    Year,
}

impl Scale {
    pub const ALL: [Scale; 5] = [
        Scale::Day,
        Scale::Week,
        Scale::Month,
        Scale::Quarter,
        Scale::Year,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" => Some(Scale::Day),
            "week" => Some(Scale::Week),
            "month" => Some(Scale::Month),
            "quarter" => Some(Scale::Quarter),
            "year" => Some(Scale::Year),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scale::Day => "day",
            Scale::Week => "week",
            Scale::Month => "month",
            Scale::Quarter => "quarter",
            Scale::Year => "year",
        }
    }
}

impl std::fmt::Display for Scale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of gantt input, produced by the view projection so the chart
/// tracks the table row for row.
#[derive(Debug, Clone)]
pub struct GanttRow {
    pub node_id: NodeId,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub milestone: bool,
    pub status: Status,
    /// Computed progress 0-100, drives the bar fill.
    pub progress: u8,
    pub has_depends: bool,
    /// Index of the top-level subtree this row belongs to; drives row
    /// banding.
    pub band: usize,
}

/// Trailing margin, in cells, past the latest date.
const TRAILING_CELLS: i64 = 2;

/// Date-to-column arithmetic for one scale at one cell width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    pub scale: Scale,
    pub cell_width: usize,
    /// Calendar anchor of column 0: the Monday on-or-before the
    /// earliest date for day/week scales, the first day of the covering
    /// month/quarter/year otherwise.
    pub origin: NaiveDate,
    /// Total cell count covered by the layout.
    pub cells: usize,
}

impl Timeline {
    /// Build a timeline spanning `min_date..=max_date` (callers fold
    /// today into the range so the today rule is always on the chart).
    pub fn build(scale: Scale, cell_width: usize, min_date: NaiveDate, max_date: NaiveDate) -> Self {
        let cell_width = cell_width.max(1);
        let origin = snap_origin(scale, min_date);
        let mut tl = Timeline {
            scale,
            cell_width,
            origin,
            cells: 1,
        };
        let last = tl.cell_index(max_date.max(min_date)).max(0);
        tl.cells = (last + 1 + TRAILING_CELLS) as usize;
        tl
    }

    /// Index of the cell containing `d`, negative before the origin.
    pub fn cell_index(&self, d: NaiveDate) -> i64 {
        match self.scale {
            Scale::Day => (d - self.origin).num_days(),
            Scale::Week => (d - self.origin).num_days().div_euclid(7),
            Scale::Month => months_between(self.origin, d),
            Scale::Quarter => quarters_between(self.origin, d),
            Scale::Year => d.year() as i64 - self.origin.year() as i64,
        }
    }

    /// Character column of a date. Week cells place each day on its own
    /// character; other scales land on the cell's left edge. Dates
    /// before the origin clamp to column 0.
    pub fn date_to_col(&self, d: NaiveDate) -> usize {
        let base = self.cell_index(d) * self.cell_width as i64;
        let col = if self.scale == Scale::Week && self.cell_width == 7 {
            let days = (d - self.origin).num_days();
            days.div_euclid(7) * 7 + days.rem_euclid(7)
        } else {
            base
        };
        col.max(0) as usize
    }

    /// Date represented by a character column. Day and week scales map
    /// one character to one day; coarser scales answer the cell start.
    pub fn col_to_date(&self, col: usize) -> NaiveDate {
        let cell = (col / self.cell_width) as u64;
        match self.scale {
            Scale::Day => self.origin + Days::new(cell),
            Scale::Week if self.cell_width == 7 => self.origin + Days::new(col as u64),
            Scale::Week => self.origin + Days::new(cell * 7),
            Scale::Month => add_months(self.origin, cell as i32),
            Scale::Quarter => add_months(self.origin, cell as i32 * 3),
            Scale::Year => NaiveDate::from_ymd_opt(self.origin.year() + cell as i32, 1, 1)
                .unwrap_or(self.origin),
        }
    }

    /// Total layout width in characters.
    pub fn width_chars(&self) -> usize {
        self.cells * self.cell_width
    }

    /// True when the column falls on a Saturday or Sunday. Only the
    /// day and week scales resolve single days.
    pub fn is_weekend_col(&self, col: usize) -> bool {
        match self.scale {
            Scale::Day | Scale::Week => {
                self.col_to_date(col).weekday().num_days_from_monday() >= 5
            }
            _ => false,
        }
    }
}

fn snap_origin(scale: Scale, d: NaiveDate) -> NaiveDate {
    match scale {
        Scale::Day | Scale::Week => {
            d - Days::new(d.weekday().num_days_from_monday() as u64)
        }
        Scale::Month => d.with_day(1).unwrap_or(d),
        Scale::Quarter => {
            let month = (d.month0() / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(d.year(), month, 1).unwrap_or(d)
        }
        Scale::Year => NaiveDate::from_ymd_opt(d.year(), 1, 1).unwrap_or(d),
    }
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 * 12 + to.month0() as i64) - (from.year() as i64 * 12 + from.month0() as i64)
}

fn quarters_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 * 4 + (to.month0() / 3) as i64)
        - (from.year() as i64 * 4 + (from.month0() / 3) as i64)
}

fn add_months(d: NaiveDate, months: i32) -> NaiveDate {
    let total = d.year() * 12 + d.month0() as i32 + months;
    NaiveDate::from_ymd_opt(total.div_euclid(12), total.rem_euclid(12) as u32 + 1, 1).unwrap_or(d)
}
