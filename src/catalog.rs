//! Compiled-in catalog of the production badge shapes.
//!
//! Path data is kept in the engineering coordinate space of each shape's
//! artwork; [`crate::template::Template::resolve`] scales it into pixels.

use crate::template::{TemplateConstraints, TemplateSpec};

struct Shape {
    id: &'static str,
    name: &'static str,
    width_in: f64,
    height_in: f64,
    view_box: &'static str,
    inner: &'static str,
    outline: Option<&'static str>,
    safe_inset_px: f64,
    max_recommended_lines: Option<usize>,
    center_align_only: bool,
}

const SHAPES: &[Shape] = &[
    Shape {
        id: "rect-1x3",
        name: "Rounded Rectangle 1×3",
        width_in: 3.0,
        height_in: 1.0,
        view_box: "0 0 3150 1150",
        inner: "M2819.47 102.78l-2493.03 0c-123.32,0 -223.67,100.09 -223.67,223.12l0 494.13c0,125.28 102.17,227.19 227.75,227.19l2488.94 0c125.58,0 227.75,-101.9 227.75,-227.19l0 -490.06c0,-125.26 -102.15,-227.19 -227.75,-227.19l0.01 0z",
        outline: Some("M2820.92 78.48c138.19,0 250.61,112.43 250.61,250.61l0 491.83c0,138.19 -112.43,250.61 -250.61,250.61l-2491.83 0c-138.18,0 -250.61,-112.43 -250.61,-250.61l0 -495.92c0,-135.93 110.6,-246.53 246.53,-246.53l2495.92 0 0 0 -0.01 0.01zm0 -3.47l-2495.92 0c-138.07,0 -250,111.93 -250,250l0 495.92c0,140.33 113.76,254.08 254.08,254.08l2491.83 0c140.33,0 254.08,-113.76 254.08,-254.08l0 -491.83c0,-140.33 -113.76,-254.08 -254.08,-254.08l0 0 0.01 -0.01z"),
        safe_inset_px: 6.0,
        max_recommended_lines: None,
        center_align_only: false,
    },
    Shape {
        id: "rect-1_5x3",
        name: "Rounded Rectangle 1.5×3",
        width_in: 3.0,
        height_in: 1.5,
        view_box: "0 0 3150 1650",
        inner: "M2823.55 102.79l-2497.11 0c-123.32,0 -223.67,100.22 -223.67,223.4l0 997.64c0,123.19 100.35,223.4 223.67,223.4l2497.1 0c123.35,0 223.67,-100.21 223.67,-223.4l0 -997.64c0,-123.18 -100.33,-223.4 -223.67,-223.4l0.01 0 -0 0z",
        outline: Some("M2825 78.48c135.93,0 246.53,110.6 246.53,246.53l0 1000c0,135.93 -110.6,246.53 -246.53,246.53l-2500 0c-135.93,0 -246.53,-110.6 -246.53,-246.53l0 -1000c0,-135.93 110.6,-246.53 246.53,-246.53l2500 0 0 0zm0 -3.47l-2500 0c-138.07,0 -250,111.93 -250,250l0 1000c0,138.07 111.93,250 250,250l2500 0c138.07,0 250,-111.93 250,-250l0 -1000c0,-138.07 -111.93,-250 -250,-250l0 0z"),
        safe_inset_px: 6.0,
        max_recommended_lines: None,
        center_align_only: false,
    },
    Shape {
        id: "square-1x3",
        name: "Square Corner 1×3",
        width_in: 3.0,
        height_in: 1.0,
        view_box: "0 0 3150 1150",
        inner: "M3044.32 104.61l0 940.79 -2938.64 0 0 -940.79 2938.64 0z",
        outline: None,
        safe_inset_px: 6.0,
        max_recommended_lines: None,
        center_align_only: false,
    },
    Shape {
        id: "square-1_5x3",
        name: "Square Corner 1.5×3",
        width_in: 3.0,
        height_in: 1.5,
        view_box: "0 0 3150 1650",
        inner: "M3044.32 105.13l0 1439.73 -2938.64 0 0 -1439.73 2938.64 0 0 0z",
        outline: None,
        safe_inset_px: 6.0,
        max_recommended_lines: None,
        center_align_only: false,
    },
    Shape {
        id: "oval-1_5x3",
        name: "Oval 1.5×3",
        width_in: 3.0,
        height_in: 1.5,
        view_box: "0 0 3150 1650",
        inner: "M1575 265.11c618.9,0 1122.4,251.17 1122.4,559.9 0,308.73 -503.5,559.9 -1122.4,559.9 -618.9,0 -1122.4,-251.17 -1122.4,-559.9 0,-308.73 503.5,-559.9 1122.4,-559.9l0 0z",
        outline: None,
        safe_inset_px: 0.0,
        max_recommended_lines: None,
        center_align_only: true,
    },
    Shape {
        id: "house-1_5x3",
        name: "House Outline 1.5×3",
        width_in: 3.0,
        height_in: 1.5,
        view_box: "0 0 3150 1650",
        inner: "M3039.34 734.02l-435.13 -458.08c-5.33,-5.63 -12.83,-8.85 -20.58,-8.85l-952.82 0 0 -131.08c0,-15.64 -12.72,-28.36 -28.39,-28.36l-196.72 0c-15.65,0 -28.39,12.72 -28.39,28.36l0 131.08 -308.29 0 -170.4 -148.87c-11.06,-9.81 -26.69,-15.43 -42.94,-15.43 -15.57,0 -29.92,5.31 -39.32,14.5l-703.78 614.89c-13.75,12.02 -9.53,27.02 -7.9,31.32 1.63,4.32 8.35,18.39 26.6,18.39l115.58 0 0 703.14c0,34.29 27.93,62.21 62.28,62.21l2563.61 0c34.35,0 62.28,-27.89 62.28,-62.19l0 -703.14 83.71 0c17.36,0 24.36,-13.14 26.1,-17.17 1.74,-4.03 6.46,-18.14 -5.48,-30.71l0 0 -0.01 -0.01z",
        outline: Some("M854.83 78.48c21.71,0 42.85,7.71 58,21.18l163.1 142.67 0.98 0.86 277.6 0 0 -108.82c0,-28.13 22.87,-51 51,-51l196.96 0c28.13,0 51,22.87 51,51l0 108.82 931.35 0c13.93,0 27.42,5.79 37,15.9l435.63 459.17c14.26,15.03 18.03,36.19 9.85,55.22 -8.18,19.04 -26.14,30.86 -46.85,30.86l-61.24 0 0 682.25c0,46.83 -38.1,84.93 -84.93,84.93l-2566.61 0c-46.83,0 -84.93,-38.1 -84.93,-84.93l0 -682.25 -93.15 0c-26.04,0 -41.74,-17.08 -47.74,-33.06 -6,-15.98 -5.43,-39.17 14.17,-56.32l703.61 -615.44c13.87,-13.57 33.47,-21.04 55.21,-21.04l0 0 -0.01 0zm0 -3.47c-21.37,0 -42.48,7.19 -57.64,22.03l-703.48 615.31c-37.86,33.11 -14.44,95.47 35.86,95.47l89.68 0 0 678.78c0,48.82 39.58,88.4 88.4,88.4l2566.6 0c48.83,0 88.4,-39.58 88.4,-88.4l0 -678.78 57.76 0c47.83,0 72.43,-57.25 39.52,-91.94l-435.63 -459.17c-10.28,-10.85 -24.57,-16.98 -39.52,-16.98l-927.87 0 0 -105.35c0,-30.08 -24.39,-54.47 -54.47,-54.47l-196.96 0c-30.08,0 -54.47,24.39 -54.47,54.47l0 105.35 -272.82 0 -163.1 -142.68c-16.36,-14.53 -38.46,-22.03 -60.28,-22.03l0 0 0.02 -0.01z"),
        safe_inset_px: 0.0,
        max_recommended_lines: Some(3),
        center_align_only: false,
    },
];

/// Definitions of every built-in shape, in catalog order.
pub fn builtin_specs() -> Vec<TemplateSpec> {
    SHAPES.iter().map(Shape::to_spec).collect()
}

impl Shape {
    fn to_spec(&self) -> TemplateSpec {
        TemplateSpec {
            id: self.id.to_string(),
            name: self.name.to_string(),
            width_in: self.width_in,
            height_in: self.height_in,
            inner_path: Some(self.inner.to_string()),
            outline_path: self.outline.map(str::to_string),
            view_box: Some(self.view_box.to_string()),
            constraints: TemplateConstraints {
                max_recommended_lines: self.max_recommended_lines,
                center_align_only: self.center_align_only,
                safe_inset_px: Some(self.safe_inset_px),
            },
        }
    }
}
