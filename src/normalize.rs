//! Conversion between stored badge coordinates and design-box pixels, plus
//! template migration.

use crate::geometry::DesignBox;
use crate::model::{Align, Badge, BadgeImage, BadgeLine, ImagePlacement, ImageRole, LinePosition, LineSize};
use crate::template::Template;
use kurbo::Point;
use std::fmt;

pub const MIN_SIZE_NORM: f64 = 0.05;
pub const MAX_SIZE_NORM: f64 = 0.5;
pub const DEFAULT_SIZE_NORM: f64 = 0.15;

/// Sizes below this read poorly once printed.
const SMALL_SIZE_NORM: f64 = 0.08;
const LARGE_SIZE_NORM: f64 = 0.3;
/// Relative difference between the width and height scale factors above
/// which a migration reports an aspect change.
const ASPECT_TOLERANCE: f64 = 0.1;

/// Default logo edge as a fraction of the design-box height.
const LOGO_SIZE_RATIO: f64 = 0.3;

/// Clamps a size fraction into `[0.05, 0.5]`. Total over `f64`: NaN maps to
/// the default size.
pub fn clamp_size_norm(value: f64) -> f64 {
    if value.is_nan() {
        return DEFAULT_SIZE_NORM;
    }
    value.clamp(MIN_SIZE_NORM, MAX_SIZE_NORM)
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.5 } else { value.clamp(0.0, 1.0) }
}

/// Pixel position of a line's anchor. Always finite and inside `design_box`.
pub fn resolve_position(line: &BadgeLine, design_box: &DesignBox) -> Point {
    let center = design_box.center();
    match line.position {
        LinePosition::Norm { x, y } => design_box.denormalize(clamp_unit(x), clamp_unit(y)),
        LinePosition::Pixel { x, y } => Point::new(
            clamp_pixel(x, center.x, design_box.x, design_box.right()),
            clamp_pixel(y, center.y, design_box.y, design_box.bottom()),
        ),
        LinePosition::Unplaced => center,
    }
}

fn clamp_pixel(value: Option<f64>, fallback: f64, min: f64, max: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(min, max),
        _ => fallback,
    }
}

/// Font size in pixels.
pub fn resolve_size(line: &BadgeLine, design_box: &DesignBox) -> f64 {
    match line.size {
        LineSize::Norm(size) => (clamp_size_norm(size) * design_box.height).round(),
        LineSize::Pixel(px) if px.is_finite() && px > 0.0 => px,
        _ => design_box.height * DEFAULT_SIZE_NORM,
    }
}

/// Normalized form of a single line against `design_box`.
pub fn canonical_line(line: &BadgeLine, design_box: &DesignBox) -> BadgeLine {
    let position = match line.position {
        LinePosition::Norm { x, y } => LinePosition::Norm { x, y },
        _ => {
            let (x, y) = design_box.normalize(resolve_position(line, design_box));
            LinePosition::Norm { x, y }
        }
    };
    let size = match line.size {
        LineSize::Norm(size) => LineSize::Norm(clamp_size_norm(size)),
        _ => LineSize::Norm(clamp_size_norm(
            resolve_size(line, design_box) / design_box.height,
        )),
    };
    BadgeLine {
        position,
        size,
        ..line.clone()
    }
}

/// Pixel frame of an image: top-left corner, intrinsic size and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageFrame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

pub fn image_frame(image: &BadgeImage, role: ImageRole, design_box: &DesignBox) -> ImageFrame {
    let b = design_box;
    let scale = image.scale;
    let positive = |v: Option<f64>| v.filter(|v| v.is_finite() && *v > 0.0);
    let (x, y, width, height) = match image.placement {
        ImagePlacement::Anchor {
            x_norm,
            y_norm,
            width_px,
            height_px,
        } => {
            let origin = b.denormalize(x_norm, y_norm);
            (origin.x, origin.y, width_px, height_px)
        }
        ImagePlacement::LegacyLogo {
            x,
            y,
            width_px,
            height_px,
        } => {
            let side = (LOGO_SIZE_RATIO * b.height).round();
            (
                x.unwrap_or(b.x + 0.1 * b.width),
                y.unwrap_or(b.y + 0.2 * b.height),
                positive(width_px).unwrap_or(side),
                positive(height_px).unwrap_or(side),
            )
        }
        ImagePlacement::LegacyBackground {
            offset_x,
            offset_y,
            width_px,
            height_px,
        } => {
            let width = positive(width_px).unwrap_or(b.width);
            let height = positive(height_px).unwrap_or(b.height);
            let center = b.center();
            (
                center.x - width * scale / 2.0 + offset_x,
                center.y - height * scale / 2.0 + offset_y,
                width,
                height,
            )
        }
    };
    let finite_or = |v: f64, fallback: f64| if v.is_finite() { v } else { fallback };
    let fallback_side = match role {
        ImageRole::Logo => (LOGO_SIZE_RATIO * b.height).round(),
        ImageRole::Background => b.height,
    };
    ImageFrame {
        x: finite_or(x, b.x),
        y: finite_or(y, b.y),
        width: finite_or(width, fallback_side).max(0.0),
        height: finite_or(height, fallback_side).max(0.0),
        scale,
    }
}

/// Upgrades an image to the anchor convention.
pub fn canonical_image(image: &BadgeImage, role: ImageRole, design_box: &DesignBox) -> BadgeImage {
    if image.is_canonical() {
        return image.clone();
    }
    let frame = image_frame(image, role, design_box);
    let (x_norm, y_norm) = design_box.normalize(Point::new(frame.x, frame.y));
    BadgeImage {
        src: image.src.clone(),
        placement: ImagePlacement::Anchor {
            x_norm,
            y_norm,
            width_px: frame.width,
            height_px: frame.height,
        },
        scale: frame.scale,
    }
}

/// Rewrites every legacy position, size and image of `badge` in the
/// normalized convention. Idempotent.
pub fn canonicalize(badge: &Badge, design_box: &DesignBox) -> Badge {
    Badge {
        lines: badge
            .lines
            .iter()
            .map(|line| canonical_line(line, design_box))
            .collect(),
        background_image: badge
            .background_image
            .as_ref()
            .map(|img| canonical_image(img, ImageRole::Background, design_box)),
        logo: badge
            .logo
            .as_ref()
            .map(|img| canonical_image(img, ImageRole::Logo, design_box)),
        ..badge.clone()
    }
}

/// Non-blocking observation about how well a badge fits a template.
#[derive(Debug, Clone, PartialEq)]
pub enum CompatibilityWarning {
    /// A rescaled size left the allowed band during migration.
    SizeClamped {
        line: usize,
        requested: f64,
        applied: f64,
    },
    /// The design box changed shape; text may sit differently.
    AspectRatioChanged { scale_x: f64, scale_y: f64 },
    PositionOutOfBounds { line: usize, axis: char, value: f64 },
    SizeOutsideRange { line: usize, size_norm: f64 },
    TooManyLines { count: usize, recommended: usize },
    NonCenteredAlignment { template: String },
}

impl fmt::Display for CompatibilityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeClamped {
                line,
                requested,
                applied,
            } => write!(
                f,
                "Line {} font size {requested:.3} was clamped to {applied:.3}",
                line + 1
            ),
            Self::AspectRatioChanged { scale_x, scale_y } => write!(
                f,
                "Design area changes proportions (width x{scale_x:.3}, height x{scale_y:.3})"
            ),
            Self::PositionOutOfBounds { line, axis, value } => write!(
                f,
                "Line {} {} position is out of bounds ({value:.3})",
                line + 1,
                axis.to_ascii_uppercase()
            ),
            Self::SizeOutsideRange { line, size_norm } => write!(
                f,
                "Line {} font size is outside recommended range ({size_norm:.3})",
                line + 1
            ),
            Self::TooManyLines { count, recommended } => write!(
                f,
                "Template works best with {recommended} or fewer text lines ({count} used)"
            ),
            Self::NonCenteredAlignment { template } => {
                write!(f, "Template {template} works best with center-aligned text")
            }
        }
    }
}

/// Moves a badge onto another template.
///
/// Normalized positions carry over unchanged (clamped to the box); sizes
/// follow the design-box height. Warnings never block the migration.
pub fn migrate(badge: &Badge, old: &Template, new: &Template) -> (Badge, Vec<CompatibilityWarning>) {
    if old.id == new.id {
        return (badge.clone(), Vec::new());
    }
    let from = &old.design_box;
    let to = &new.design_box;
    let scale_x = to.width / from.width;
    let scale_y = to.height / from.height;
    tracing::debug!(from = %old.id, to = %new.id, scale_x, scale_y, "migrating badge");

    let mut warnings = Vec::new();
    let canonical = canonicalize(badge, from);
    let lines = canonical
        .lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let position = match line.position {
                LinePosition::Norm { x, y } => LinePosition::Norm {
                    x: clamp_unit(x),
                    y: clamp_unit(y),
                },
                other => other,
            };
            let size = match line.size {
                LineSize::Norm(size) => {
                    let requested = size * scale_y;
                    let applied = clamp_size_norm(requested);
                    if (applied - requested).abs() > 1e-9 {
                        warnings.push(CompatibilityWarning::SizeClamped {
                            line: index,
                            requested,
                            applied,
                        });
                    }
                    LineSize::Norm(applied)
                }
                other => other,
            };
            BadgeLine {
                position,
                size,
                ..line.clone()
            }
        })
        .collect();

    if (scale_y / scale_x - 1.0).abs() > ASPECT_TOLERANCE {
        warnings.push(CompatibilityWarning::AspectRatioChanged { scale_x, scale_y });
    }

    let migrated = Badge {
        template_id: new.id.clone(),
        lines,
        ..canonical
    };
    warnings.extend(constraint_warnings(&migrated, new));
    for warning in &warnings {
        tracing::debug!(badge = %badge.id, %warning, "migration warning");
    }
    (migrated, warnings)
}

fn constraint_warnings(badge: &Badge, template: &Template) -> Vec<CompatibilityWarning> {
    let mut warnings = Vec::new();
    if let Some(recommended) = template.constraints.max_recommended_lines
        && badge.lines.len() > recommended
    {
        warnings.push(CompatibilityWarning::TooManyLines {
            count: badge.lines.len(),
            recommended,
        });
    }
    if template.constraints.center_align_only
        && badge.lines.iter().any(|line| line.align != Align::Center)
    {
        warnings.push(CompatibilityWarning::NonCenteredAlignment {
            template: template.id.clone(),
        });
    }
    warnings
}

/// Everything about `badge` that may print poorly on `template`.
pub fn check_compatibility(badge: &Badge, template: &Template) -> Vec<CompatibilityWarning> {
    let design_box = &template.design_box;
    let mut warnings = Vec::new();
    for (index, line) in badge.lines.iter().enumerate() {
        let (x, y) = match line.position {
            LinePosition::Norm { x, y } => (x, y),
            LinePosition::Pixel { x, y } => design_box.normalize(Point::new(
                x.unwrap_or(design_box.center().x),
                y.unwrap_or(design_box.center().y),
            )),
            LinePosition::Unplaced => (0.5, 0.5),
        };
        for (axis, value) in [('x', x), ('y', y)] {
            if !(0.0..=1.0).contains(&value) {
                warnings.push(CompatibilityWarning::PositionOutOfBounds { line: index, axis, value });
            }
        }
        let size_norm = match line.size {
            LineSize::Norm(size) => size,
            _ => resolve_size(line, design_box) / design_box.height,
        };
        if !(MIN_SIZE_NORM..=MAX_SIZE_NORM).contains(&size_norm) {
            warnings.push(CompatibilityWarning::SizeOutsideRange {
                line: index,
                size_norm,
            });
        }
    }
    warnings.extend(constraint_warnings(badge, template));
    warnings
}

/// Advisory suggestions for improving a design on `template`.
pub fn suggest_optimizations(badge: &Badge, template: &Template) -> Vec<String> {
    let mut suggestions = Vec::new();
    if let Some(recommended) = template.constraints.max_recommended_lines
        && badge.lines.len() >= recommended
    {
        suggestions.push(format!(
            "Consider reducing text lines for better fit in the {} shape",
            template.name
        ));
    }
    if template.constraints.center_align_only
        && badge.lines.iter().any(|line| line.align != Align::Center)
    {
        suggestions.push(format!("Center alignment recommended for {}", template.name));
    }
    for (index, line) in badge.lines.iter().enumerate() {
        let size_norm = canonical_line(line, &template.design_box)
            .size_norm()
            .unwrap_or(DEFAULT_SIZE_NORM);
        if size_norm < SMALL_SIZE_NORM {
            suggestions.push(format!(
                "Line {} font size may be too small for readability",
                index + 1
            ));
        }
        if size_norm > LARGE_SIZE_NORM {
            suggestions.push(format!(
                "Line {} font size may be too large for template",
                index + 1
            ));
        }
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::tests::rect_template;
    use crate::template::TemplateConstraints;
    use approx::assert_relative_eq;

    fn design_box() -> DesignBox {
        DesignBox::new(0.0, 0.0, 288.0, 96.0)
    }

    fn line_at(position: LinePosition, size: LineSize) -> BadgeLine {
        BadgeLine {
            position,
            size,
            ..BadgeLine::new("l", "Text", 0.15)
        }
    }

    #[test]
    fn clamp_size_norm_is_total() {
        for value in [-1.0, 0.0, 0.01, 0.2, 1.0, 7.5, f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let clamped = clamp_size_norm(value);
            assert!((MIN_SIZE_NORM..=MAX_SIZE_NORM).contains(&clamped), "{value}");
        }
        assert_eq!(clamp_size_norm(f64::NAN), DEFAULT_SIZE_NORM);
        assert_eq!(clamp_size_norm(0.2), 0.2);
        assert_eq!(clamp_size_norm(-3.0), MIN_SIZE_NORM);
    }

    #[test]
    fn positions_resolve_inside_the_box() {
        let b = DesignBox::new(10.0, 5.0, 200.0, 80.0);
        let norm = line_at(LinePosition::Norm { x: 0.25, y: 0.5 }, LineSize::Unset);
        assert_eq!(resolve_position(&norm, &b), Point::new(60.0, 45.0));

        let wild = line_at(LinePosition::Norm { x: 4.0, y: f64::NAN }, LineSize::Unset);
        assert_eq!(resolve_position(&wild, &b), Point::new(210.0, 45.0));

        let pixel = line_at(
            LinePosition::Pixel {
                x: Some(-50.0),
                y: None,
            },
            LineSize::Unset,
        );
        assert_eq!(resolve_position(&pixel, &b), Point::new(10.0, 45.0));

        let unplaced = line_at(LinePosition::Unplaced, LineSize::Unset);
        assert_eq!(resolve_position(&unplaced, &b), b.center());
    }

    #[test]
    fn resolve_position_round_trips_through_norm() {
        let b = DesignBox::new(9.6, 4.8, 268.8, 86.4);
        let line = line_at(LinePosition::Norm { x: 0.31, y: 0.77 }, LineSize::Unset);
        let (x, y) = b.normalize(resolve_position(&line, &b));
        assert_relative_eq!(x, 0.31, epsilon = 1e-9);
        assert_relative_eq!(y, 0.77, epsilon = 1e-9);
    }

    #[test]
    fn sizes_resolve_by_variant() {
        let b = design_box();
        assert_eq!(resolve_size(&line_at(LinePosition::Unplaced, LineSize::Norm(0.2)), &b), 19.0);
        assert_eq!(resolve_size(&line_at(LinePosition::Unplaced, LineSize::Pixel(18.0)), &b), 18.0);
        assert_relative_eq!(
            resolve_size(&line_at(LinePosition::Unplaced, LineSize::Pixel(-4.0)), &b),
            14.4,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            resolve_size(&line_at(LinePosition::Unplaced, LineSize::Unset), &b),
            14.4,
            epsilon = 1e-9
        );
    }

    #[test]
    fn canonicalize_upgrades_legacy_lines_once() {
        let b = design_box();
        let mut badge = Badge::new_default("rect-1x3");
        badge.lines[0] = line_at(
            LinePosition::Pixel {
                x: Some(72.0),
                y: Some(24.0),
            },
            LineSize::Pixel(24.0),
        );
        let once = canonicalize(&badge, &b);
        assert_eq!(once.lines[0].position, LinePosition::Norm { x: 0.25, y: 0.25 });
        assert_eq!(once.lines[0].size, LineSize::Norm(0.25));
        assert_eq!(canonicalize(&once, &b), once);
    }

    #[test]
    fn legacy_logo_defaults() {
        let b = design_box();
        let logo = BadgeImage {
            src: "logo.png".into(),
            placement: ImagePlacement::LegacyLogo {
                x: None,
                y: None,
                width_px: None,
                height_px: None,
            },
            scale: 1.0,
        };
        let frame = image_frame(&logo, ImageRole::Logo, &b);
        assert_relative_eq!(frame.x, 28.8, epsilon = 1e-9);
        assert_relative_eq!(frame.y, 19.2, epsilon = 1e-9);
        assert_eq!((frame.width, frame.height), (29.0, 29.0));
    }

    #[test]
    fn legacy_background_is_centered_with_offset() {
        let b = design_box();
        let bg = BadgeImage {
            src: "bg.png".into(),
            placement: ImagePlacement::LegacyBackground {
                offset_x: 10.0,
                offset_y: -5.0,
                width_px: Some(100.0),
                height_px: Some(50.0),
            },
            scale: 2.0,
        };
        let frame = image_frame(&bg, ImageRole::Background, &b);
        assert_relative_eq!(frame.x, 144.0 - 100.0 + 10.0);
        assert_relative_eq!(frame.y, 48.0 - 50.0 - 5.0);

        let canonical = canonical_image(&bg, ImageRole::Background, &b);
        assert!(canonical.is_canonical());
        let again = image_frame(&canonical, ImageRole::Background, &b);
        assert_relative_eq!(again.x, frame.x, epsilon = 1e-9);
        assert_relative_eq!(again.y, frame.y, epsilon = 1e-9);
        assert_eq!(again.scale, 2.0);
    }

    #[test]
    fn migration_to_same_template_is_a_no_op() {
        let t = rect_template("rect-1x3", 3.0, 1.0);
        let badge = Badge::new_default("rect-1x3");
        let (migrated, warnings) = migrate(&badge, &t, &t);
        assert_eq!(migrated, badge);
        assert!(warnings.is_empty());
    }

    #[test]
    fn migration_rescales_sizes_by_height() {
        let small = rect_template("rect-1x3", 3.0, 1.0);
        let tall = rect_template("rect-1_5x3", 3.0, 1.5);
        let mut badge = Badge::new_default("rect-1x3");
        badge.lines[0].size = LineSize::Norm(0.4);
        badge.lines[1].size = LineSize::Norm(0.2);
        badge.lines[1].position = LinePosition::Norm { x: 1.4, y: 0.3 };

        let (migrated, warnings) = migrate(&badge, &small, &tall);
        assert_eq!(migrated.template_id, "rect-1_5x3");
        assert_eq!(migrated.lines[0].size, LineSize::Norm(0.5));
        assert_relative_eq!(migrated.lines[1].size_norm().unwrap(), 0.3, epsilon = 1e-12);
        assert_eq!(migrated.lines[1].position, LinePosition::Norm { x: 1.0, y: 0.3 });
        assert!(warnings.iter().any(|w| matches!(w, CompatibilityWarning::SizeClamped { line: 0, .. })));
        assert!(warnings.iter().any(|w| matches!(w, CompatibilityWarning::AspectRatioChanged { .. })));
    }

    #[test]
    fn constraints_drive_compatibility() {
        let mut oval = rect_template("oval-1_5x3", 3.0, 1.5);
        oval.constraints = TemplateConstraints {
            center_align_only: true,
            ..TemplateConstraints::default()
        };
        let mut house = rect_template("house-1_5x3", 3.0, 1.5);
        house.constraints.max_recommended_lines = Some(3);

        let mut badge = Badge::new_default("oval-1_5x3");
        badge.lines[0].align = Align::Left;
        badge.lines.push(BadgeLine::new("line-3", "Three", 0.06));
        badge.lines.push(BadgeLine::new("line-4", "Four", 0.143));

        let oval_warnings = check_compatibility(&badge, &oval);
        assert_eq!(
            oval_warnings,
            vec![CompatibilityWarning::NonCenteredAlignment {
                template: "oval-1_5x3".into()
            }]
        );
        let house_warnings = check_compatibility(&badge, &house);
        assert_eq!(
            house_warnings,
            vec![CompatibilityWarning::TooManyLines {
                count: 4,
                recommended: 3
            }]
        );
        assert_eq!(
            house_warnings[0].to_string(),
            "Template works best with 3 or fewer text lines (4 used)"
        );

        let suggestions = suggest_optimizations(&badge, &house);
        assert!(suggestions.iter().any(|s| s.contains("reducing text lines")));
        assert!(suggestions.iter().any(|s| s.starts_with("Line 3") && s.contains("too small")));
    }

    #[test]
    fn out_of_bounds_positions_are_reported() {
        let t = rect_template("rect-1x3", 3.0, 1.0);
        let mut badge = Badge::new_default("rect-1x3");
        badge.lines[1].position = LinePosition::Norm { x: -0.2, y: 0.5 };
        let warnings = check_compatibility(&badge, &t);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].to_string(), "Line 2 X position is out of bounds (-0.200)");
    }
}
