//! Renderer-agnostic color roles.
//!
//! The table and gantt layers emit `(char, fg, bg)` cells tagged with
//! these roles; the terminal layer owns the mapping to concrete colors.

use crate::models::Status;

/// A semantic color role carried by a rendered cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Color {
    /// Terminal default foreground or background.
    #[default]
    Default,
    /// Header band and label text.
    HeaderText,
    /// Alternating band background (header groups, top-level subtrees).
    BandBg,
    /// Saturday/Sunday column background.
    WeekendBg,
    /// Declared holiday column background.
    HolidayBg,
    /// Cursor row background.
    HighlightBg,
    /// Today rule and marker.
    TodayMarker,
    /// Milestone glyph and rule.
    MilestoneMarker,
    /// Bar color for TODO nodes.
    BarTodo,
    /// Bar color for IN_PROGRESS nodes.
    BarInProgress,
    /// Bar color for DONE nodes.
    BarDone,
    /// Left-edge tint on a bar whose node has dependencies.
    DependencyHint,
    /// Delayed-start row accent (TODO past its start date).
    Delayed,
}

/// Bar color for a node's status.
pub fn bar_color(status: Status) -> Color {
    match status {
        Status::Todo => Color::BarTodo,
        Status::InProgress => Color::BarInProgress,
        Status::Done => Color::BarDone,
    }
}
