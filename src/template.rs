use crate::error::TemplateError;
use crate::geometry::{self, DesignBox, PathError, ViewBox};
use kurbo::{Affine, BezPath};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DPI: f64 = 96.0;
pub const MM_PER_INCH: f64 = 25.4;

/// Id of the template handed out when a requested template cannot be loaded.
pub const FALLBACK_TEMPLATE_ID: &str = "fallback-rect";

/// Advisory, template-specific layout constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateConstraints {
    /// More lines than this still render, but produce a compatibility warning.
    pub max_recommended_lines: Option<usize>,
    /// Left/right aligned text degrades on this shape.
    pub center_align_only: bool,
    /// UI guidance only; the engine never insets content by it.
    pub safe_inset_px: Option<f64>,
}

/// Source definition of a template, as stored in a bundle or manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(alias = "widthInches")]
    pub width_in: f64,
    #[serde(alias = "heightInches")]
    pub height_in: f64,
    #[serde(default)]
    pub inner_path: Option<String>,
    #[serde(default)]
    pub outline_path: Option<String>,
    /// `viewBox` attribute of the source artwork; absent means the paths are
    /// already in pixel units.
    #[serde(default)]
    pub view_box: Option<String>,
    #[serde(default)]
    pub constraints: TemplateConstraints,
}

/// A resolved template: pixel dimensions, design box and pre-scaled paths.
#[derive(Debug, Clone)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub width_in: f64,
    pub height_in: f64,
    pub width_px: f64,
    pub height_px: f64,
    pub dpi: f64,
    pub design_box: DesignBox,
    pub inner: BezPath,
    pub outline: Option<BezPath>,
    pub constraints: TemplateConstraints,
}

impl Template {
    /// Builds the pixel-space template from its source definition.
    pub fn resolve(spec: &TemplateSpec, dpi: f64) -> Result<Self, TemplateError> {
        let id = spec.id.clone();
        let valid_size = |v: f64| v.is_finite() && v > 0.0;
        if !valid_size(spec.width_in) || !valid_size(spec.height_in) || !valid_size(dpi) {
            return Err(TemplateError::InvalidDimensions {
                id,
                width_in: spec.width_in,
                height_in: spec.height_in,
            });
        }
        let width_px = (spec.width_in * dpi).round();
        let height_px = (spec.height_in * dpi).round();

        let inner_data = spec
            .inner_path
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| TemplateError::MissingGeometry { id: id.clone() })?;
        let mut inner_native = parse(&id, "inner", inner_data)?;
        let contours = geometry::subpaths(&inner_native).len();
        if contours > 1 {
            tracing::debug!(template = %id, contours, "keeping the enclosing contour of the inner path");
            inner_native = geometry::enclosing_contour(&inner_native);
        }
        let outline_native = spec
            .outline_path
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(|d| parse(&id, "outline", d))
            .transpose()?;

        let to_px = match spec.view_box.as_deref() {
            Some(raw) => match ViewBox::parse(raw) {
                Some(view_box) => view_box.to_pixels(width_px, height_px),
                None => {
                    return Err(TemplateError::InvalidPath {
                        id,
                        reason: format!("unreadable viewBox `{raw}`"),
                    });
                }
            },
            None => Affine::IDENTITY,
        };

        let inner = geometry::transformed(&inner_native, to_px);
        let outline = outline_native.map(|path| geometry::transformed(&path, to_px));
        let design_box = match geometry::path_bounds(&inner) {
            Some(bounds) => bounds,
            None => {
                tracing::warn!(template = %id, "inner path has no area, using full canvas as design box");
                DesignBox::new(0.0, 0.0, width_px, height_px)
            }
        };

        tracing::debug!(
            template = %id,
            width_px,
            height_px,
            x = design_box.x,
            y = design_box.y,
            width = design_box.width,
            height = design_box.height,
            "resolved template geometry"
        );

        Ok(Self {
            name: if spec.name.is_empty() {
                id.clone()
            } else {
                spec.name.clone()
            },
            id,
            width_in: spec.width_in,
            height_in: spec.height_in,
            width_px,
            height_px,
            dpi,
            design_box,
            inner,
            outline,
            constraints: spec.constraints.clone(),
        })
    }

    /// The 3x1 inch rounded rectangle used whenever a template cannot be loaded.
    pub fn fallback(dpi: f64) -> Self {
        let spec = fallback_spec();
        match Self::resolve(&spec, dpi) {
            Ok(template) => template,
            // The fallback geometry is a constant; only a broken dpi can fail it.
            Err(_) => Self::resolve(&spec, DEFAULT_DPI).unwrap_or_else(|_| unreachable_fallback()),
        }
    }

    /// Path drawn as the visible cut edge.
    pub fn edge(&self) -> &BezPath {
        self.outline.as_ref().unwrap_or(&self.inner)
    }

    /// Physical page size in millimetres, for PDF sinks.
    pub fn page_size_mm(&self) -> (f64, f64) {
        (
            self.width_px / self.dpi * MM_PER_INCH,
            self.height_px / self.dpi * MM_PER_INCH,
        )
    }
}

fn parse(id: &str, which: &str, data: &str) -> Result<BezPath, TemplateError> {
    geometry::parse_closed_path(data).map_err(|err: PathError| TemplateError::InvalidPath {
        id: id.to_string(),
        reason: format!("{which} path: {err}"),
    })
}

pub(crate) fn fallback_spec() -> TemplateSpec {
    TemplateSpec {
        id: FALLBACK_TEMPLATE_ID.to_string(),
        name: "Rectangle 1×3".to_string(),
        width_in: 3.0,
        height_in: 1.0,
        inner_path: Some(
            "M25,0 L275,0 A25,25 0 0,1 300,25 L300,75 A25,25 0 0,1 275,100 L25,100 A25,25 0 0,1 0,75 L0,25 A25,25 0 0,1 25,0 Z"
                .to_string(),
        ),
        outline_path: None,
        view_box: Some("0 0 300 100".to_string()),
        constraints: TemplateConstraints::default(),
    }
}

fn unreachable_fallback() -> Template {
    let width_px = 3.0 * DEFAULT_DPI;
    let height_px = DEFAULT_DPI;
    let inner = kurbo::Shape::to_path(&kurbo::Rect::new(0.0, 0.0, width_px, height_px), 0.1);
    Template {
        id: FALLBACK_TEMPLATE_ID.to_string(),
        name: "Rectangle 1×3".to_string(),
        width_in: 3.0,
        height_in: 1.0,
        width_px,
        height_px,
        dpi: DEFAULT_DPI,
        design_box: DesignBox::new(0.0, 0.0, width_px, height_px),
        inner,
        outline: None,
        constraints: TemplateConstraints::default(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Plain rectangle template whose design box is the whole canvas.
    pub(crate) fn rect_spec(id: &str, width_in: f64, height_in: f64) -> TemplateSpec {
        let w = width_in * 100.0;
        let h = height_in * 100.0;
        TemplateSpec {
            id: id.to_string(),
            name: id.to_string(),
            width_in,
            height_in,
            inner_path: Some(format!("M0 0 L{w} 0 L{w} {h} L0 {h} Z")),
            outline_path: None,
            view_box: Some(format!("0 0 {w} {h}")),
            constraints: TemplateConstraints::default(),
        }
    }

    pub(crate) fn rect_template(id: &str, width_in: f64, height_in: f64) -> Template {
        Template::resolve(&rect_spec(id, width_in, height_in), DEFAULT_DPI).unwrap()
    }

    #[test]
    fn rect_design_box_covers_canvas() {
        let t = rect_template("rect-1x3", 3.0, 1.0);
        assert_eq!(t.width_px, 288.0);
        assert_eq!(t.height_px, 96.0);
        assert_relative_eq!(t.design_box.width, 288.0, epsilon = 1e-9);
        assert_relative_eq!(t.design_box.height, 96.0, epsilon = 1e-9);
        assert!(t.outline.is_none());
        assert!(std::ptr::eq(t.edge(), &t.inner));
    }

    #[test]
    fn inset_inner_path_shrinks_design_box() {
        let spec = TemplateSpec {
            inner_path: Some("M100 50 L2900 50 L2900 950 L100 950 Z".into()),
            outline_path: Some("M0 0 L3000 0 L3000 1000 L0 1000 Z".into()),
            view_box: Some("0 0 3000 1000".into()),
            ..rect_spec("inset", 3.0, 1.0)
        };
        let t = Template::resolve(&spec, DEFAULT_DPI).unwrap();
        assert_relative_eq!(t.design_box.x, 9.6, epsilon = 1e-9);
        assert_relative_eq!(t.design_box.y, 4.8, epsilon = 1e-9);
        assert_relative_eq!(t.design_box.width, 268.8, epsilon = 1e-9);
        assert_relative_eq!(t.design_box.height, 86.4, epsilon = 1e-9);
        assert!(t.outline.is_some());
    }

    #[test]
    fn double_edged_inner_path_clips_to_the_outer_edge() {
        let spec = TemplateSpec {
            inner_path: Some("M2900 100 L2900 900 L100 900 L100 100 Z M2950 50 L50 50 L50 950 L2950 950 Z".into()),
            view_box: Some("0 0 3000 1000".into()),
            ..rect_spec("double", 3.0, 1.0)
        };
        let t = Template::resolve(&spec, DEFAULT_DPI).unwrap();
        assert_eq!(geometry::subpaths(&t.inner).len(), 1);
        assert_relative_eq!(t.design_box.x, 4.8, epsilon = 1e-9);
        assert_relative_eq!(t.design_box.width, 278.4, epsilon = 1e-9);
        assert!(kurbo::Shape::contains(&t.inner, t.design_box.center()));
    }

    #[test]
    fn missing_inner_is_missing_geometry() {
        let spec = TemplateSpec {
            inner_path: None,
            ..rect_spec("blank", 3.0, 1.0)
        };
        assert!(matches!(
            Template::resolve(&spec, DEFAULT_DPI),
            Err(TemplateError::MissingGeometry { id }) if id == "blank"
        ));
    }

    #[test]
    fn malformed_paths_are_invalid() {
        let spec = TemplateSpec {
            inner_path: Some("M0 0 L10 0 L10".into()),
            ..rect_spec("broken", 3.0, 1.0)
        };
        assert!(matches!(
            Template::resolve(&spec, DEFAULT_DPI),
            Err(TemplateError::InvalidPath { .. })
        ));

        let bad_outline = TemplateSpec {
            outline_path: Some("M0 0 L10 0".into()),
            ..rect_spec("open-outline", 3.0, 1.0)
        };
        assert!(matches!(
            Template::resolve(&bad_outline, DEFAULT_DPI),
            Err(TemplateError::InvalidPath { reason, .. }) if reason.starts_with("outline")
        ));
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let spec = rect_spec("flat", 3.0, 0.0);
        assert!(matches!(
            Template::resolve(&spec, DEFAULT_DPI),
            Err(TemplateError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn fallback_is_a_three_by_one_rectangle() {
        let t = Template::fallback(DEFAULT_DPI);
        assert_eq!(t.id, FALLBACK_TEMPLATE_ID);
        assert_eq!((t.width_px, t.height_px), (288.0, 96.0));
        assert_relative_eq!(t.design_box.width, 288.0, epsilon = 0.1);
        assert_relative_eq!(t.design_box.height, 96.0, epsilon = 0.1);
    }

    #[test]
    fn page_size_is_in_millimetres() {
        let t = rect_template("rect-1x3", 3.0, 1.0);
        let (w, h) = t.page_size_mm();
        assert_relative_eq!(w, 76.2, epsilon = 1e-9);
        assert_relative_eq!(h, 25.4, epsilon = 1e-9);
    }
}
