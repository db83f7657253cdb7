//! Grid assembly for the gantt chart.
//!
//! Produces header bands and one bar row per table row as plain
//! `(char, fg, bg)` cells. Overlay order: row banding, weekend shading,
//! holiday shading, today rule, milestone rules, cursor highlight.
//! Later overlays win on color; glyph overlays never overwrite bar
//! glyphs.

use std::collections::HashSet;

use chrono::{Datelike, Days, NaiveDate};

use super::{GanttRow, Scale, Timeline};
use crate::models::NodeId;
use crate::theme::{Color, bar_color};

/// One rendered character cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
}

impl Cell {
    fn blank(bg: Color) -> Self {
        Cell {
            ch: ' ',
            fg: Color::Default,
            bg,
        }
    }
}

/// Inputs that are not part of the row data itself.
#[derive(Debug, Clone, Default)]
pub struct GanttOptions {
    pub holidays: Vec<NaiveDate>,
    /// Node under the table cursor; its row gets the full-row highlight.
    pub cursor: Option<NodeId>,
}

/// The assembled chart: header rows on top, one row of cells per input
/// row. Horizontal scrolling over `width_chars` is the renderer's job.
#[derive(Debug, Clone)]
pub struct GanttGrid {
    pub timeline: Timeline,
    pub header: Vec<Vec<Cell>>,
    pub rows: Vec<Vec<Cell>>,
    pub today_col: Option<usize>,
}

/// Lay out rows under a scale. `today` drives both the timeline range
/// and the today rule so the chart never starts after it.
pub fn layout(
    rows: &[GanttRow],
    scale: Scale,
    cell_width: usize,
    today: NaiveDate,
    opts: &GanttOptions,
) -> GanttGrid {
    let mut min_date = today;
    let mut max_date = today;
    for row in rows {
        for d in [row.start, row.end].into_iter().flatten() {
            min_date = min_date.min(d);
            max_date = max_date.max(d);
        }
    }

    let timeline = Timeline::build(scale, cell_width, min_date, max_date);
    let width = timeline.width_chars();
    let holidays: HashSet<NaiveDate> = opts.holidays.iter().copied().collect();
    let today_col = Some(timeline.date_to_col(today)).filter(|c| *c < width);
    let milestone_cols: Vec<usize> = rows
        .iter()
        .filter(|r| r.milestone)
        .filter_map(|r| r.start)
        .map(|d| timeline.date_to_col(d))
        .filter(|c| *c < width)
        .collect();

    let header = header_rows(&timeline, &holidays);
    let body = rows
        .iter()
        .map(|row| {
            render_row(
                row,
                &timeline,
                &holidays,
                today_col,
                &milestone_cols,
                opts.cursor == Some(row.node_id),
            )
        })
        .collect();

    GanttGrid {
        timeline,
        header,
        rows: body,
        today_col,
    }
}

/// Background for a character column before date-dependent shading:
/// alternating bands, by cell parity in headers and by top-level
/// subtree parity in data rows.
fn band_bg(parity: bool) -> Color {
    if parity { Color::BandBg } else { Color::Default }
}

fn shade_bg(timeline: &Timeline, holidays: &HashSet<NaiveDate>, col: usize, base: Color) -> Color {
    let mut bg = base;
    if timeline.is_weekend_col(col) {
        bg = Color::WeekendBg;
    }
    if matches!(timeline.scale, Scale::Day | Scale::Week) && holidays.contains(&timeline.col_to_date(col)) {
        bg = Color::HolidayBg;
    }
    bg
}

fn header_rows(timeline: &Timeline, holidays: &HashSet<NaiveDate>) -> Vec<Vec<Cell>> {
    let width = timeline.width_chars();
    let cw = timeline.cell_width;
    let cell_starts: Vec<NaiveDate> = (0..timeline.cells)
        .map(|i| timeline.col_to_date(i * cw))
        .collect();

    // Year scale: the single band row carries the year labels.
    if timeline.scale == Scale::Year {
        let mut row = Vec::with_capacity(width);
        for (i, start) in cell_starts.iter().enumerate() {
            push_label(&mut row, &start.year().to_string(), cw, band_bg(i % 2 == 1));
        }
        row.truncate(width);
        return vec![row];
    }

    // Band row: merged runs of months (day/week) or years (month/quarter).
    let mut band = Vec::with_capacity(width);
    let mut run_start = 0usize;
    let mut run_parity = false;
    while run_start < cell_starts.len() {
        let key = band_key(timeline.scale, cell_starts[run_start]);
        let mut run_end = run_start + 1;
        while run_end < cell_starts.len() && band_key(timeline.scale, cell_starts[run_end]) == key {
            run_end += 1;
        }
        let span = (run_end - run_start) * cw;
        push_label(&mut band, &band_label(timeline.scale, cell_starts[run_start]), span, band_bg(run_parity));
        run_parity = !run_parity;
        run_start = run_end;
    }
    band.truncate(width);

    // Label row: one label per cell, date-shaded on day/week scales.
    let mut labels = Vec::with_capacity(width);
    for (i, start) in cell_starts.iter().enumerate() {
        let text = cell_label(timeline.scale, *start);
        let from = labels.len();
        push_label(&mut labels, &text, cw, band_bg(i % 2 == 1));
        for (offset, cell) in labels[from..].iter_mut().enumerate() {
            let bg = shade_bg(timeline, holidays, from + offset, cell.bg);
            cell.bg = bg;
        }
    }
    labels.truncate(width);

    let mut rows = vec![band, labels];

    // Week scale adds the weekday strip, one character per day.
    if timeline.scale == Scale::Week && cw == 7 {
        const DAY_ABBR: [char; 7] = ['M', 'T', 'W', 'T', 'F', 'S', 'S'];
        let mut strip = Vec::with_capacity(width);
        for i in 0..timeline.cells {
            for (day, ch) in DAY_ABBR.iter().enumerate() {
                let col = i * 7 + day;
                strip.push(Cell {
                    ch: *ch,
                    fg: Color::HeaderText,
                    bg: shade_bg(timeline, holidays, col, band_bg(i % 2 == 1)),
                });
            }
        }
        strip.truncate(width);
        rows.push(strip);
    }

    rows
}

fn band_key(scale: Scale, d: NaiveDate) -> (i32, u32) {
    match scale {
        Scale::Day | Scale::Week => (d.year(), d.month()),
        _ => (d.year(), 0),
    }
}

fn band_label(scale: Scale, d: NaiveDate) -> String {
    match scale {
        Scale::Day | Scale::Week => d.format("%b %y").to_string(),
        _ => d.format("%Y").to_string(),
    }
}

fn cell_label(scale: Scale, d: NaiveDate) -> String {
    match scale {
        Scale::Day => d.format("%d").to_string(),
        Scale::Week => format!("W{}", d.iso_week().week()),
        Scale::Month => d.format("%b").to_string(),
        Scale::Quarter => format!("Q{}", d.month0() / 3 + 1),
        Scale::Year => d.format("%Y").to_string(),
    }
}

/// Append `text` centered over `span` columns of header cells.
fn push_label(out: &mut Vec<Cell>, text: &str, span: usize, bg: Color) {
    let chars: Vec<char> = text.chars().take(span).collect();
    let pad = span - chars.len();
    let left = pad / 2;
    for i in 0..span {
        let ch = if i >= left && i - left < chars.len() {
            chars[i - left]
        } else {
            ' '
        };
        out.push(Cell {
            ch,
            fg: Color::HeaderText,
            bg,
        });
    }
}

fn render_row(
    row: &GanttRow,
    timeline: &Timeline,
    holidays: &HashSet<NaiveDate>,
    today_col: Option<usize>,
    milestone_cols: &[usize],
    highlighted: bool,
) -> Vec<Cell> {
    let width = timeline.width_chars();
    let parity = row.band % 2 == 1;
    let mut cells: Vec<Cell> = (0..width)
        .map(|col| Cell::blank(shade_bg(timeline, holidays, col, band_bg(parity))))
        .collect();

    if row.milestone {
        if let Some(start) = row.start {
            let col = timeline.date_to_col(start);
            if col < width {
                cells[col] = Cell {
                    ch: '◆',
                    fg: Color::MilestoneMarker,
                    bg: cells[col].bg,
                };
            }
        }
    } else if let Some(start) = row.start {
        let end = row.end.unwrap_or(start).max(start);
        let start_col = timeline.date_to_col(start);
        let end_col = timeline
            .date_to_col(end + Days::new(1))
            .saturating_sub(1)
            .max(start_col);
        let bar_len = end_col - start_col + 1;
        let filled = bar_len * row.progress.min(100) as usize / 100;
        let fg = bar_color(row.status);
        for (i, col) in (start_col..=end_col).enumerate() {
            if col >= width {
                break;
            }
            let ch = if i < filled { '█' } else { '░' };
            let fg = if i == 0 && row.has_depends {
                Color::DependencyHint
            } else {
                fg
            };
            cells[col] = Cell {
                ch,
                fg,
                bg: cells[col].bg,
            };
        }
    }

    // Vertical rules only claim blank cells; bars keep their glyphs.
    if let Some(col) = today_col
        && cells[col].ch == ' '
    {
        cells[col].ch = '│';
        cells[col].fg = Color::TodayMarker;
    }
    for &col in milestone_cols {
        if cells[col].ch == ' ' {
            cells[col].ch = '┆';
            cells[col].fg = Color::MilestoneMarker;
        }
    }

    if highlighted {
        for cell in &mut cells {
            cell.bg = Color::HighlightBg;
        }
    }

    cells
}
