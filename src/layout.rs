//! Vertical centering of text lines and the designer's editing operations.
//!
//! Every operation takes a badge by reference and returns the edited copy.

use crate::geometry::DesignBox;
use crate::model::{self, Align, Badge, BadgeLine, LinePosition, LineSize, MAX_LINES};
use crate::normalize::{self, clamp_size_norm, resolve_size, MIN_SIZE_NORM};
use crate::style::DEFAULT_BACKGROUND_COLOR;
use crate::text_metrics::{self, FontVariant};
use serde::Deserialize;

/// Line pitch as a multiple of the font size.
pub const LINE_SPACING_FACTOR: f64 = 1.2;

/// Horizontal clearance kept on each side when shrinking text to fit.
pub const FIT_MARGIN_PX: f64 = 12.0;
pub const MIN_FONT_PX: f64 = 8.0;

const MIN_Y_NORM: f64 = 0.1;
const MAX_Y_NORM: f64 = 0.9;
/// `y_norm` of lines that were never laid out.
const UNPLACED_Y_NORM: f64 = 0.5;

const NEW_LINE_TEXT: &str = "Line Text";
const FIRST_LINE_SIZE: f64 = 0.20;
const OTHER_LINE_SIZE: f64 = 0.143;

/// Stacks the lines as one block centered vertically in the design box.
///
/// Only `y` changes: horizontal positions are kept (upgraded to fractions
/// when needed) and sizes are untouched. Idempotent.
pub fn center_lines(lines: &[BadgeLine], design_box: &DesignBox) -> Vec<BadgeLine> {
    let sizes: Vec<f64> = lines
        .iter()
        .map(|line| resolve_size(line, design_box))
        .collect();
    let total: f64 = sizes.iter().map(|size| size * LINE_SPACING_FACTOR).sum();
    let mut running = design_box.height / 2.0 - total / 2.0;

    lines
        .iter()
        .zip(&sizes)
        .map(|(line, &size)| {
            let y = running + size / 2.0;
            running += size * LINE_SPACING_FACTOR;
            let y_norm = (y / design_box.height).clamp(MIN_Y_NORM, MAX_Y_NORM);
            BadgeLine {
                position: LinePosition::Norm {
                    x: x_norm(line, design_box),
                    y: y_norm,
                },
                ..line.clone()
            }
        })
        .collect()
}

fn x_norm(line: &BadgeLine, design_box: &DesignBox) -> f64 {
    match line.position {
        LinePosition::Norm { x, .. } => x,
        LinePosition::Pixel { x: Some(x), .. } if x.is_finite() => {
            ((x - design_box.x) / design_box.width).clamp(0.0, 1.0)
        }
        _ => 0.5,
    }
}

fn is_unplaced(line: &BadgeLine) -> bool {
    match line.position {
        LinePosition::Norm { y, .. } => y == UNPLACED_Y_NORM,
        LinePosition::Unplaced => true,
        LinePosition::Pixel { .. } => false,
    }
}

/// Centers the lines of a freshly created or imported badge whose lines all
/// still sit at the unplaced sentinel.
pub fn layout_if_unplaced(badge: &Badge, design_box: &DesignBox) -> Badge {
    if badge.lines.is_empty() || !badge.lines.iter().all(is_unplaced) {
        return badge.clone();
    }
    tracing::debug!(badge = %badge.id, "laying out unplaced lines");
    with_lines(badge, center_lines(&badge.lines, design_box))
}

fn with_lines(badge: &Badge, lines: Vec<BadgeLine>) -> Badge {
    Badge {
        lines,
        ..badge.clone()
    }
}

/// Appends a "Line Text" line unless the badge is full.
pub fn add_line(badge: &Badge, design_box: &DesignBox) -> Badge {
    if badge.lines.len() >= MAX_LINES {
        return badge.clone();
    }
    let badge = normalize::canonicalize(badge, design_box);
    let size = if badge.lines.is_empty() {
        FIRST_LINE_SIZE
    } else {
        OTHER_LINE_SIZE
    };
    let mut lines = badge.lines.clone();
    lines.push(BadgeLine::new(next_line_id(&lines), NEW_LINE_TEXT, size));
    with_lines(&badge, center_lines(&lines, design_box))
}

fn next_line_id(lines: &[BadgeLine]) -> String {
    let mut n = lines.len() + 1;
    loop {
        let id = format!("line-{n}");
        if lines.iter().all(|line| line.id != id) {
            return id;
        }
        n += 1;
    }
}

/// Removes the line at `index`; the last remaining line is never removed.
pub fn remove_line(badge: &Badge, index: usize, design_box: &DesignBox) -> Badge {
    if badge.lines.len() <= 1 || index >= badge.lines.len() {
        return badge.clone();
    }
    let badge = normalize::canonicalize(badge, design_box);
    let mut lines = badge.lines.clone();
    lines.remove(index);
    with_lines(&badge, center_lines(&lines, design_box))
}

/// Partial update of one line. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineEdit {
    pub text: Option<String>,
    pub color: Option<String>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub font_family: Option<String>,
    pub align: Option<Align>,
    pub size_norm: Option<f64>,
}

impl LineEdit {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    fn refits(&self) -> bool {
        self.text.is_some() || self.font_family.is_some()
    }
}

/// Applies `edit` to the line at `index`.
///
/// A new text or font shrinks the line until it fits the design box width
/// minus [`FIT_MARGIN_PX`] on each side.
pub fn edit_line(badge: &Badge, index: usize, edit: &LineEdit, design_box: &DesignBox) -> Badge {
    if index >= badge.lines.len() {
        tracing::debug!(badge = %badge.id, index, "edit targets a missing line");
        return badge.clone();
    }
    let badge = normalize::canonicalize(badge, design_box);
    let mut lines = badge.lines.clone();
    let line = &mut lines[index];

    if let Some(text) = &edit.text {
        line.text = text.clone();
    }
    if let Some(color) = &edit.color {
        line.color = color.clone();
    }
    if let Some(bold) = edit.bold {
        line.bold = bold;
    }
    if let Some(italic) = edit.italic {
        line.italic = italic;
    }
    if let Some(underline) = edit.underline {
        line.underline = underline;
    }
    if let Some(family) = &edit.font_family {
        line.font_family = family.clone();
    }
    if let Some(align) = edit.align {
        line.align = align;
    }
    if let Some(size) = edit.size_norm {
        line.size = LineSize::Norm(clamp_size_norm(size));
    }
    if edit.refits() {
        line.size = LineSize::Norm(fit_size_norm(line, design_box));
    }

    with_lines(&badge, center_lines(&lines, design_box))
}

/// Largest size not above the line's current one at which its text fits.
fn fit_size_norm(line: &BadgeLine, design_box: &DesignBox) -> f64 {
    let current = line.size_norm().unwrap_or(normalize::DEFAULT_SIZE_NORM);
    let available = design_box.width - 2.0 * FIT_MARGIN_PX;
    let font_px = resolve_size(line, design_box);
    let variant = FontVariant {
        bold: line.bold,
        italic: line.italic,
    };
    let width = text_metrics::text_width(&line.text, font_px, &line.font_family, variant);
    if width <= available || width <= 0.0 || available <= 0.0 {
        return current;
    }
    let floor = (MIN_FONT_PX / design_box.height).max(MIN_SIZE_NORM);
    let fitted = (font_px * available / width) / design_box.height;
    tracing::debug!(line = %line.id, from = current, to = fitted, "shrinking line to fit");
    clamp_size_norm(fitted.max(floor).min(current))
}

/// Back to the two default lines on a white background. Keeps the badge
/// id, template and backing.
pub fn reset(badge: &Badge, design_box: &DesignBox) -> Badge {
    Badge {
        lines: center_lines(&model::default_lines(), design_box),
        background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
        background_image: None,
        logo: None,
        ..badge.clone()
    }
}
