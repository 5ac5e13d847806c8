use crate::fonts;
use crate::geometry::{fmt_num, to_path_data};
use crate::model::{Align, Badge, BadgeImage, ImageRole};
use crate::normalize::{self, ImageFrame};
use crate::style::{self, ColorRole, LayerOrder, RenderStyle};
use crate::template::Template;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Stroke the cut edge on top of the design.
    pub show_outline: bool,
}

impl RenderOptions {
    pub fn preview() -> Self {
        Self { show_outline: true }
    }
}

/// A badge with every coordinate, size, color and font already resolved
/// against its template. The SVG writer only ever sees this form.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBadge {
    pub badge_id: String,
    pub width: f64,
    pub height: f64,
    pub clip_id: String,
    pub inner_path: String,
    pub edge_path: String,
    pub background_color: String,
    pub background_image: Option<ResolvedImage>,
    pub logo: Option<ResolvedImage>,
    pub lines: Vec<ResolvedLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImage {
    pub role: ImageRole,
    pub href: String,
    pub frame: ImageFrame,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLine {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub anchor: &'static str,
    pub font_family: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub fill: String,
}

pub fn resolve_badge(badge: &Badge, template: &Template, style: &RenderStyle) -> ResolvedBadge {
    let design_box = &template.design_box;
    let lines = badge
        .lines
        .iter()
        .map(|line| {
            let anchor_point = normalize::resolve_position(line, design_box);
            ResolvedLine {
                text: line.text.clone(),
                x: anchor_point.x,
                y: anchor_point.y,
                font_size: normalize::resolve_size(line, design_box),
                anchor: text_anchor(line.align),
                font_family: fonts::font_stack(&line.font_family, &style.fallback_font),
                bold: line.bold,
                italic: line.italic,
                underline: line.underline,
                fill: style::normalize_color(&line.color, ColorRole::Text),
            }
        })
        .collect();
    let resolve_image = |image: &BadgeImage, role: ImageRole| ResolvedImage {
        role,
        href: image.src.clone(),
        frame: normalize::image_frame(image, role, design_box),
    };

    ResolvedBadge {
        badge_id: badge.id.clone(),
        width: template.width_px,
        height: template.height_px,
        clip_id: clip_id(&badge.id),
        inner_path: to_path_data(&template.inner),
        edge_path: to_path_data(template.edge()),
        background_color: style::normalize_color(&badge.background_color, ColorRole::Background),
        background_image: badge
            .background_image
            .as_ref()
            .map(|img| resolve_image(img, ImageRole::Background)),
        logo: badge.logo.as_ref().map(|img| resolve_image(img, ImageRole::Logo)),
        lines,
    }
}

fn text_anchor(align: Align) -> &'static str {
    match align {
        Align::Left => "start",
        Align::Center => "middle",
        Align::Right => "end",
    }
}

fn clip_id(badge_id: &str) -> String {
    let sanitized: String = badge_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "badge-clip".to_string()
    } else {
        format!("badge-clip-{sanitized}")
    }
}

/// Renders `badge` on `template` as a standalone SVG document.
///
/// Pure: identical inputs give byte-identical output.
pub fn render(badge: &Badge, template: &Template, options: RenderOptions, style: &RenderStyle) -> String {
    render_resolved(&resolve_badge(badge, template, style), options, style)
}

pub fn render_resolved(badge: &ResolvedBadge, options: RenderOptions, style: &RenderStyle) -> String {
    let mut svg = String::new();
    let pad = style.padding.max(0.0);
    let view_w = badge.width + 2.0 * pad;
    let view_h = badge.height + 2.0 * pad;

    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"{x} {y} {w} {h}\">",
        x = fmt_num(-pad),
        y = fmt_num(-pad),
        w = fmt_num(view_w),
        h = fmt_num(view_h),
    );

    let clip_id = escape_xml(&badge.clip_id);
    let _ = write!(
        svg,
        "<defs><clipPath id=\"{clip_id}\" clipPathUnits=\"userSpaceOnUse\"><path d=\"{}\"/></clipPath></defs>",
        badge.inner_path
    );
    let _ = write!(
        svg,
        "<path d=\"{}\" fill=\"{}\"/>",
        badge.inner_path,
        escape_xml(&badge.background_color)
    );

    let _ = write!(svg, "<g clip-path=\"url(#{clip_id})\">");
    if let Some(image) = &badge.background_image {
        push_image(&mut svg, image, "xMidYMid slice");
    }
    match style.layer_order {
        LayerOrder::LogoBelowText => {
            push_logo(&mut svg, badge);
            push_lines(&mut svg, badge);
        }
        LayerOrder::LogoAboveText => {
            push_lines(&mut svg, badge);
            push_logo(&mut svg, badge);
        }
    }
    svg.push_str("</g>");

    if options.show_outline {
        let _ = write!(
            svg,
            "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"/>",
            badge.edge_path,
            escape_xml(&style.outline_color),
            fmt_num(style.outline_width)
        );
    }

    svg.push_str("</svg>");
    tracing::debug!(
        badge = %badge.badge_id,
        lines = badge.lines.len(),
        bytes = svg.len(),
        "rendered badge svg"
    );
    svg
}

fn push_logo(svg: &mut String, badge: &ResolvedBadge) {
    if let Some(logo) = &badge.logo {
        push_image(svg, logo, "xMidYMid meet");
    }
}

fn push_image(svg: &mut String, image: &ResolvedImage, preserve: &str) {
    let frame = &image.frame;
    let _ = write!(
        svg,
        "<g transform=\"translate({} {}) scale({})\"><image href=\"{}\" x=\"0\" y=\"0\" width=\"{}\" height=\"{}\" preserveAspectRatio=\"{preserve}\"/></g>",
        fmt_num(frame.x),
        fmt_num(frame.y),
        fmt_num(frame.scale),
        escape_xml(&image.href),
        fmt_num(frame.width),
        fmt_num(frame.height),
    );
}

fn push_lines(svg: &mut String, badge: &ResolvedBadge) {
    for line in badge.lines.iter().filter(|line| !line.text.is_empty()) {
        let _ = write!(
            svg,
            "<text x=\"{}\" y=\"{}\" font-size=\"{}\" text-anchor=\"{}\" dominant-baseline=\"middle\" font-family=\"{}\" font-weight=\"{}\" font-style=\"{}\" fill=\"{}\"",
            fmt_num(line.x),
            fmt_num(line.y),
            fmt_num(line.font_size),
            line.anchor,
            escape_xml(&line.font_family),
            if line.bold { "bold" } else { "normal" },
            if line.italic { "italic" } else { "normal" },
            escape_xml(&line.fill),
        );
        if line.underline {
            svg.push_str(" text-decoration=\"underline\"");
        }
        let _ = write!(svg, ">{}</text>", escape_xml(&line.text));
    }
}

pub fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout;
    use crate::model::{BadgeLine, LinePosition};
    use crate::template::tests::rect_template;

    fn hello_badge() -> Badge {
        let mut badge = Badge::new_default("rect-1x3");
        badge.id = "hello".into();
        badge.background_color = "#FF0000".into();
        badge.lines = vec![BadgeLine::new("line-1", "HELLO", 0.2)];
        badge
    }

    #[test]
    fn renders_background_and_centered_text() {
        let t = rect_template("rect-1x3", 3.0, 1.0);
        let svg = render(&hello_badge(), &t, RenderOptions::default(), &RenderStyle::default());
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("viewBox=\"0 0 288 96\""));
        assert!(svg.contains("fill=\"#FF0000\"/>"));
        assert!(svg.contains("text-anchor=\"middle\""));
        assert!(svg.contains("fill=\"#000000\">HELLO</text>"));
        assert!(svg.contains("clipPathUnits=\"userSpaceOnUse\""));
        assert!(svg.contains("clip-path=\"url(#badge-clip-hello)\""));
        assert!(!svg.contains("stroke="));
    }

    #[test]
    fn output_is_deterministic() {
        let t = rect_template("rect-1x3", 3.0, 1.0);
        let badge = layout::layout_if_unplaced(&Badge::new_default("rect-1x3"), &t.design_box);
        let style = RenderStyle::default();
        let a = render(&badge, &t, RenderOptions::preview(), &style);
        let b = render(&badge, &t, RenderOptions::preview(), &style);
        assert_eq!(a, b);
    }

    #[test]
    fn text_is_escaped() {
        let t = rect_template("rect-1x3", 3.0, 1.0);
        let mut badge = hello_badge();
        badge.lines[0].text = "<Tom & \"Jerry\">".into();
        let svg = render(&badge, &t, RenderOptions::default(), &RenderStyle::default());
        assert!(svg.contains(">&lt;Tom &amp; &quot;Jerry&quot;&gt;</text>"));
    }

    #[test]
    fn alignment_maps_to_text_anchor() {
        let t = rect_template("rect-1x3", 3.0, 1.0);
        let mut badge = hello_badge();
        badge.lines[0].align = Align::Left;
        badge.lines.push(BadgeLine {
            align: Align::Right,
            bold: true,
            italic: true,
            ..BadgeLine::new("line-2", "R", 0.1)
        });
        let svg = render(&badge, &t, RenderOptions::default(), &RenderStyle::default());
        assert!(svg.contains("text-anchor=\"start\""));
        assert!(svg.contains("text-anchor=\"end\""));
        assert!(svg.contains("font-weight=\"bold\" font-style=\"italic\""));
    }

    #[test]
    fn padding_expands_the_viewbox() {
        let t = rect_template("rect-1x3", 3.0, 1.0);
        let style = RenderStyle {
            padding: 4.0,
            ..RenderStyle::default()
        };
        let svg = render(&hello_badge(), &t, RenderOptions::default(), &style);
        assert!(svg.contains("width=\"296\" height=\"104\" viewBox=\"-4 -4 296 104\""));
    }

    #[test]
    fn outline_is_drawn_last() {
        let t = rect_template("rect-1x3", 3.0, 1.0);
        let svg = render(&hello_badge(), &t, RenderOptions::preview(), &RenderStyle::default());
        let outline = svg
            .find("fill=\"none\" stroke=\"#222222\" stroke-width=\"1.25\"")
            .unwrap();
        assert!(outline > svg.find("</g>").unwrap());
    }

    #[test]
    fn layer_order_moves_the_logo() {
        let t = rect_template("rect-1x3", 3.0, 1.0);
        let mut badge = hello_badge();
        badge.logo = Some(BadgeImage::anchored("logo.png", 0.1, 0.2, 29.0, 29.0));
        let below = render(&badge, &t, RenderOptions::default(), &RenderStyle::default());
        assert!(below.find("logo.png").unwrap() < below.find("<text").unwrap());

        let style = RenderStyle {
            layer_order: LayerOrder::LogoAboveText,
            ..RenderStyle::default()
        };
        let above = render(&badge, &t, RenderOptions::default(), &style);
        assert!(above.find("logo.png").unwrap() > above.find("<text").unwrap());
        assert!(above.contains("preserveAspectRatio=\"xMidYMid meet\""));
    }

    #[test]
    fn background_image_sits_first_in_the_clip_group() {
        let t = rect_template("rect-1x3", 3.0, 1.0);
        let mut badge = hello_badge();
        badge.background_image = Some(BadgeImage::anchored("https://example.invalid/bg.png", 0.0, 0.0, 288.0, 96.0));
        let svg = render(&badge, &t, RenderOptions::default(), &RenderStyle::default());
        let group = svg.find("<g clip-path").unwrap();
        let image = svg.find("https://example.invalid/bg.png").unwrap();
        assert!(image > group && image < svg.find("<text").unwrap());
        assert!(svg.contains("preserveAspectRatio=\"xMidYMid slice\""));
        assert!(svg.contains("translate(0 0) scale(1)"));
    }

    #[test]
    fn bad_values_are_substituted() {
        let t = rect_template("rect-1x3", 3.0, 1.0);
        let mut badge = hello_badge();
        badge.background_color = "not-a-color".into();
        badge.lines[0].color = "#GGG".into();
        badge.lines[0].font_family = "Wingdings Deluxe".into();
        badge.lines[0].position = LinePosition::Norm {
            x: f64::NAN,
            y: 7.0,
        };
        let resolved = resolve_badge(&badge, &t, &RenderStyle::default());
        assert_eq!(resolved.background_color, "#FFFFFF");
        assert_eq!(resolved.lines[0].fill, "#000000");
        assert_eq!(resolved.lines[0].font_family, "sans-serif");
        assert!(resolved.lines[0].x.is_finite());
        assert!(resolved.lines[0].y <= t.design_box.bottom());
    }

    #[test]
    fn clip_ids_are_sanitized() {
        assert_eq!(clip_id("a b/c"), "badge-clip-a-b-c");
        assert_eq!(clip_id(""), "badge-clip");
    }
}
