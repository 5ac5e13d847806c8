use crate::style::{LayerOrder, RenderStyle};
use crate::template::DEFAULT_DPI;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What to do with a background image or logo that cannot be loaded at
/// rasterization time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImagePolicy {
    /// Fail the export with `ExportError::ImageLoad`.
    #[default]
    Strict,
    /// Drop the failing image and render everything else.
    Omit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    pub png_scale: f64,
    pub pdf_scale: f64,
    pub tiff_scale: f64,
    pub max_concurrency: usize,
    pub image_policy: ImagePolicy,
    /// Base directory for relative image paths.
    pub resources_dir: Option<PathBuf>,
    pub font_dirs: Vec<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            png_scale: 2.0,
            pdf_scale: 3.0,
            tiff_scale: 4.0,
            max_concurrency: 4,
            image_policy: ImagePolicy::Strict,
            resources_dir: None,
            font_dirs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub dpi: f64,
    pub fetch_timeout_ms: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub fallback_on_error: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            fetch_timeout_ms: 5000,
            max_attempts: 3,
            retry_backoff_ms: 100,
            fallback_on_error: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub style: RenderStyle,
    pub export: ExportConfig,
    pub templates: ResolverConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StyleFile {
    padding: Option<f64>,
    outline_color: Option<String>,
    outline_width: Option<f64>,
    layer_order: Option<LayerOrder>,
    fallback_font: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ExportFile {
    png_scale: Option<f64>,
    pdf_scale: Option<f64>,
    tiff_scale: Option<f64>,
    max_concurrency: Option<usize>,
    image_policy: Option<ImagePolicy>,
    resources_dir: Option<PathBuf>,
    font_dirs: Option<Vec<PathBuf>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TemplatesFile {
    dpi: Option<f64>,
    fetch_timeout_ms: Option<u64>,
    max_attempts: Option<u32>,
    retry_backoff_ms: Option<u64>,
    fallback_on_error: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    style: Option<StyleFile>,
    export: Option<ExportFile>,
    templates: Option<TemplatesFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Overlays a JSON config document on the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = serde_json::from_str(contents)?;

    if let Some(style) = parsed.style {
        if let Some(v) = style.padding {
            config.style.padding = v.max(0.0);
        }
        if let Some(v) = style.outline_color {
            config.style.outline_color = v;
        }
        if let Some(v) = style.outline_width {
            config.style.outline_width = v;
        }
        if let Some(v) = style.layer_order {
            config.style.layer_order = v;
        }
        if let Some(v) = style.fallback_font {
            config.style.fallback_font = v;
        }
    }

    if let Some(export) = parsed.export {
        if let Some(v) = export.png_scale {
            config.export.png_scale = v;
        }
        if let Some(v) = export.pdf_scale {
            config.export.pdf_scale = v;
        }
        if let Some(v) = export.tiff_scale {
            config.export.tiff_scale = v;
        }
        if let Some(v) = export.max_concurrency {
            config.export.max_concurrency = v.max(1);
        }
        if let Some(v) = export.image_policy {
            config.export.image_policy = v;
        }
        if let Some(v) = export.resources_dir {
            config.export.resources_dir = Some(v);
        }
        if let Some(v) = export.font_dirs {
            config.export.font_dirs = v;
        }
    }

    if let Some(templates) = parsed.templates {
        if let Some(v) = templates.dpi {
            config.templates.dpi = v;
        }
        if let Some(v) = templates.fetch_timeout_ms {
            config.templates.fetch_timeout_ms = v;
        }
        if let Some(v) = templates.max_attempts {
            config.templates.max_attempts = v.max(1);
        }
        if let Some(v) = templates.retry_backoff_ms {
            config.templates.retry_backoff_ms = v;
        }
        if let Some(v) = templates.fallback_on_error {
            config.templates.fallback_on_error = v;
        }
    }

    Ok(config)
}
