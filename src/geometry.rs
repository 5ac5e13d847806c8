//! Path geometry for template shapes.
//!
//! Template outlines arrive as SVG path data in an arbitrary native
//! coordinate space. This module parses them, checks that every subpath is
//! closed, computes exact bounds (cubic and quadratic extrema included) and
//! maps them into badge pixel space.

use kurbo::{Affine, BezPath, PathEl, Point, Shape, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use thiserror::Error;

/// A subpath whose end lands this close to its start (relative to the path
/// extent) counts as closed even without a trailing `Z`.
const CLOSE_TOLERANCE_RATIO: f64 = 1e-3;

/// Axis-aligned rectangle in badge pixel space that text and images are
/// positioned relative to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DesignBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DesignBox {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Pixel point for fractional coordinates of this box.
    pub fn denormalize(&self, x_norm: f64, y_norm: f64) -> Point {
        Point::new(
            self.x + x_norm * self.width,
            self.y + y_norm * self.height,
        )
    }

    /// Fractional coordinates of a pixel point; inverse of [`Self::denormalize`].
    pub fn normalize(&self, point: Point) -> (f64, f64) {
        (
            (point.x - self.x) / self.width,
            (point.y - self.y) / self.height,
        )
    }

    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }

    fn from_rect(rect: kurbo::Rect) -> Self {
        Self::new(rect.x0, rect.y0, rect.width(), rect.height())
    }
}

/// The coordinate space a template's paths were authored in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewBox {
    /// Parses the SVG `viewBox` attribute syntax (`"0 0 3150 1150"`, commas allowed).
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<f64> = value
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            &[min_x, min_y, width, height]
                if width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite() =>
            {
                Some(Self {
                    min_x,
                    min_y,
                    width,
                    height,
                })
            }
            _ => None,
        }
    }

    /// Transform from this viewBox into a `width_px` x `height_px` canvas.
    ///
    /// The two axes scale independently; a template that deliberately
    /// stretches gets a non-uniform transform.
    pub fn to_pixels(&self, width_px: f64, height_px: f64) -> Affine {
        let scale_x = width_px / self.width;
        let scale_y = height_px / self.height;
        Affine::scale_non_uniform(scale_x, scale_y)
            * Affine::translate(Vec2::new(-self.min_x, -self.min_y))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("path has no drawing segments")]
    Empty,
    #[error("subpath {subpath} is not closed")]
    Open { subpath: usize },
    #[error("path contains non-finite coordinates")]
    NonFinite,
}

/// Parses SVG path data into a closed shape.
///
/// Arcs are converted to cubic segments by the parser, so downstream code
/// only deals with lines, quadratics and cubics.
pub fn parse_closed_path(data: &str) -> Result<BezPath, PathError> {
    let path = BezPath::from_svg(data).map_err(|err| PathError::Syntax(err.to_string()))?;
    let drawing = path
        .elements()
        .iter()
        .any(|el| !matches!(el, PathEl::MoveTo(_) | PathEl::ClosePath));
    if !drawing {
        return Err(PathError::Empty);
    }
    let bounds = path.bounding_box();
    if ![bounds.x0, bounds.y0, bounds.x1, bounds.y1]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(PathError::NonFinite);
    }
    let tolerance = bounds.width().hypot(bounds.height()) * CLOSE_TOLERANCE_RATIO;
    check_closed(&path, tolerance)?;
    Ok(path)
}

fn check_closed(path: &BezPath, tolerance: f64) -> Result<(), PathError> {
    let mut subpath = 0usize;
    let mut start: Option<Point> = None;
    let mut current = Point::ZERO;
    let mut closed = true;

    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                if let Some(s) = start {
                    if !closed && current.distance(s) > tolerance {
                        return Err(PathError::Open { subpath });
                    }
                    subpath += 1;
                }
                start = Some(p);
                current = p;
                closed = false;
            }
            PathEl::LineTo(p) | PathEl::QuadTo(_, p) | PathEl::CurveTo(_, _, p) => {
                current = p;
                closed = false;
            }
            PathEl::ClosePath => {
                closed = true;
                if let Some(s) = start {
                    current = s;
                }
            }
        }
    }

    match start {
        Some(s) if !closed && current.distance(s) > tolerance => Err(PathError::Open { subpath }),
        _ => Ok(()),
    }
}

/// Exact axis-aligned bounds of a path, including curve extrema.
///
/// Returns `None` for a path without any extent.
pub fn path_bounds(path: &BezPath) -> Option<DesignBox> {
    if path.elements().is_empty() {
        return None;
    }
    let bounds = DesignBox::from_rect(path.bounding_box());
    bounds.is_valid().then_some(bounds)
}

/// Splits a path at every `MoveTo`.
pub fn subpaths(path: &BezPath) -> Vec<BezPath> {
    let mut out: Vec<Vec<PathEl>> = Vec::new();
    for el in path.elements() {
        match (el, out.last_mut()) {
            (PathEl::MoveTo(_), _) | (_, None) => out.push(vec![*el]),
            (_, Some(current)) => current.push(*el),
        }
    }
    out.into_iter().map(BezPath::from_vec).collect()
}

/// The subpath with the largest bounds.
///
/// Cut-line artwork often stores both edges of the line as concentric
/// contours; filling or clipping with both leaves only the band between
/// them.
pub fn enclosing_contour(path: &BezPath) -> BezPath {
    subpaths(path)
        .into_iter()
        .max_by(|a, b| a.bounding_box().area().total_cmp(&b.bounding_box().area()))
        .unwrap_or_else(|| path.clone())
}

pub fn transformed(path: &BezPath, transform: Affine) -> BezPath {
    let mut out = path.clone();
    out.apply_affine(transform);
    out
}

/// Serializes a path as compact, deterministic SVG path data.
pub fn to_path_data(path: &BezPath) -> String {
    let mut d = String::new();
    for el in path.elements() {
        if !d.is_empty() {
            d.push(' ');
        }
        match *el {
            PathEl::MoveTo(p) => {
                let _ = write!(d, "M{} {}", fmt_num(p.x), fmt_num(p.y));
            }
            PathEl::LineTo(p) => {
                let _ = write!(d, "L{} {}", fmt_num(p.x), fmt_num(p.y));
            }
            PathEl::QuadTo(c, p) => {
                let _ = write!(
                    d,
                    "Q{} {} {} {}",
                    fmt_num(c.x),
                    fmt_num(c.y),
                    fmt_num(p.x),
                    fmt_num(p.y)
                );
            }
            PathEl::CurveTo(c1, c2, p) => {
                let _ = write!(
                    d,
                    "C{} {} {} {} {} {}",
                    fmt_num(c1.x),
                    fmt_num(c1.y),
                    fmt_num(c2.x),
                    fmt_num(c2.y),
                    fmt_num(p.x),
                    fmt_num(p.y)
                );
            }
            PathEl::ClosePath => d.push('Z'),
        }
    }
    d
}

/// Formats a coordinate with at most three decimals and no trailing zeros.
pub fn fmt_num(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    // avoid "-0"
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    let text = format!("{rounded:.3}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rectangle_bounds_are_exact() {
        let path = parse_closed_path("M10 20 L110 20 L110 70 L10 70 Z").unwrap();
        let bounds = path_bounds(&path).unwrap();
        assert_eq!(bounds, DesignBox::new(10.0, 20.0, 100.0, 50.0));
    }

    #[test]
    fn arc_circle_bounds_use_curve_extrema() {
        // Two half-circle arcs of radius 50 centred on (100, 100).
        let path = parse_closed_path("M50 100 A50 50 0 1 0 150 100 A50 50 0 1 0 50 100 Z").unwrap();
        let bounds = path_bounds(&path).unwrap();
        // Arcs become cubic approximations within the parser's 0.1 tolerance.
        assert_relative_eq!(bounds.x, 50.0, epsilon = 0.1);
        assert_relative_eq!(bounds.y, 50.0, epsilon = 0.1);
        assert_relative_eq!(bounds.width, 100.0, epsilon = 0.2);
        assert_relative_eq!(bounds.height, 100.0, epsilon = 0.2);
    }

    #[test]
    fn cubic_bounds_are_tighter_than_control_hull() {
        // Control points reach y = 100, the curve itself peaks at y = 75.
        let path = parse_closed_path("M0 0 C0 100 100 100 100 0 Z").unwrap();
        let bounds = path_bounds(&path).unwrap();
        assert_relative_eq!(bounds.height, 75.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.width, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn geometric_closure_without_z_is_accepted() {
        let path = parse_closed_path("M0 0 l100 0 0 50 -100 0 0 -50 m5 5 l90 0 0 40 -90 0 z");
        assert!(path.is_ok());
    }

    #[test]
    fn open_subpath_is_rejected() {
        let err = parse_closed_path("M0 0 L100 0 L100 50").unwrap_err();
        assert_eq!(err, PathError::Open { subpath: 0 });
        assert_eq!(err.to_string(), "subpath 0 is not closed");
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn malformed_data_is_a_syntax_error() {
        assert!(matches!(
            parse_closed_path("M0 0 L banana Z"),
            Err(PathError::Syntax(_))
        ));
        assert_eq!(parse_closed_path("M0 0 Z"), Err(PathError::Empty));
    }

    #[test]
    fn concentric_contours_keep_the_outer_one() {
        let path = parse_closed_path("M10 10 L90 10 L90 40 L10 40 Z M0 0 L0 50 L100 50 L100 0 Z").unwrap();
        assert_eq!(subpaths(&path).len(), 2);
        let outer = enclosing_contour(&path);
        assert_eq!(subpaths(&outer).len(), 1);
        assert_eq!(path_bounds(&outer).unwrap(), DesignBox::new(0.0, 0.0, 100.0, 50.0));
        assert!(outer.contains(Point::new(50.0, 25.0)));
        // The ring itself has a hole where the text goes.
        assert!(!path.contains(Point::new(50.0, 25.0)));
    }

    #[test]
    fn viewbox_maps_to_pixels_with_independent_axes() {
        let vb = ViewBox::parse("0 0 3150 1150").unwrap();
        let path = parse_closed_path("M0 0 L3150 0 L3150 1150 L0 1150 Z").unwrap();
        let px = transformed(&path, vb.to_pixels(288.0, 96.0));
        let bounds = path_bounds(&px).unwrap();
        assert_relative_eq!(bounds.width, 288.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.height, 96.0, epsilon = 1e-9);
    }

    #[test]
    fn viewbox_origin_is_translated_away() {
        let vb = ViewBox::parse("100,50 200,100").unwrap();
        let path = parse_closed_path("M100 50 L300 50 L300 150 L100 150 Z").unwrap();
        let bounds = path_bounds(&transformed(&path, vb.to_pixels(400.0, 200.0))).unwrap();
        assert_eq!(bounds, DesignBox::new(0.0, 0.0, 400.0, 200.0));
        assert!(ViewBox::parse("0 0 0 10").is_none());
        assert!(ViewBox::parse("0 0 10").is_none());
    }

    #[test]
    fn normalize_round_trips() {
        let b = DesignBox::new(9.5, 8.25, 270.0, 79.0);
        let (x, y) = b.normalize(b.denormalize(0.37, 0.81));
        assert_relative_eq!(x, 0.37, epsilon = 1e-12);
        assert_relative_eq!(y, 0.81, epsilon = 1e-12);
    }

    #[test]
    fn numbers_are_compact() {
        assert_eq!(fmt_num(96.0), "96");
        assert_eq!(fmt_num(9.4317), "9.432");
        assert_eq!(fmt_num(-0.0001), "0");
        assert_eq!(fmt_num(0.5), "0.5");
    }

    #[test]
    fn path_data_serialization_is_stable() {
        let path = parse_closed_path("M0 0 L10.5 0 Q12 3 10.5 6 C5 9 1 9 0 6 Z").unwrap();
        assert_eq!(to_path_data(&path), "M0 0 L10.5 0 Q12 3 10.5 6 C5 9 1 9 0 6 Z");
    }
}
