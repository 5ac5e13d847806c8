use badgesmith::catalog::builtin_specs;
use badgesmith::layout;
use badgesmith::style::LayerOrder;
use badgesmith::template::{DEFAULT_DPI, Template};
use badgesmith::{Badge, RenderOptions, RenderStyle, render};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreviewOptions {
    show_outline: Option<bool>,
    padding: Option<f64>,
    layer_order: Option<LayerOrder>,
    template_id: Option<String>,
}

fn build_style(options: &PreviewOptions) -> RenderStyle {
    let mut style = RenderStyle::print();
    if let Some(padding) = options.padding {
        style.padding = padding.max(0.0);
    }
    if let Some(layer_order) = options.layer_order {
        style.layer_order = layer_order;
    }
    style
}

/// Built-in template by id; unknown or broken ids preview on the fallback.
fn builtin_template(id: &str) -> Template {
    builtin_specs()
        .iter()
        .find(|spec| spec.id == id)
        .and_then(|spec| Template::resolve(spec, DEFAULT_DPI).ok())
        .unwrap_or_else(|| Template::fallback(DEFAULT_DPI))
}

fn render_preview(badge_json: &str, options: PreviewOptions) -> Result<String, String> {
    let badge = Badge::from_json(badge_json).map_err(|error| error.to_string())?;
    let template_id = options
        .template_id
        .clone()
        .unwrap_or_else(|| badge.template_id.clone());
    let template = builtin_template(&template_id);
    let badge = layout::layout_if_unplaced(&badge, &template.design_box);
    let render_options = RenderOptions {
        show_outline: options.show_outline.unwrap_or(true),
    };
    Ok(render(&badge, &template, render_options, &build_style(&options)))
}

#[wasm_bindgen]
pub fn render_badge_svg(badge_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<PreviewOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        PreviewOptions::default()
    };

    render_preview(badge_json, options).map_err(|error| JsValue::from_str(&error))
}
