use crate::config::{ExportConfig, ImagePolicy};
use crate::error::{ExportError, ImageLoadError};
use crate::export::RasterImage;
use crate::fonts::{self, FontCategory};
use crate::render::{ResolvedBadge, ResolvedImage};
use base64::{Engine, engine::general_purpose::STANDARD};
use resvg::tiny_skia::{Pixmap, Transform};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use usvg::fontdb;

const SUPPORTED_IMAGE_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

/// Installed families tried, in order, when a generic family does not
/// resolve to any face.
const GENERIC_CANDIDATES: &[(FontCategory, &[&str])] = &[
    (
        FontCategory::SansSerif,
        &["Roboto", "Arial", "Helvetica", "Liberation Sans", "DejaVu Sans", "Noto Sans"],
    ),
    (
        FontCategory::Serif,
        &["Times New Roman", "Liberation Serif", "DejaVu Serif", "Noto Serif"],
    ),
    (
        FontCategory::Monospace,
        &["Courier New", "Liberation Mono", "DejaVu Sans Mono", "Noto Sans Mono"],
    ),
];

/// SVG to bitmap conversion with a shared font database.
#[derive(Clone)]
pub struct Rasterizer {
    fontdb: Arc<fontdb::Database>,
    resources_dir: Option<PathBuf>,
    image_policy: ImagePolicy,
}

impl std::fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rasterizer")
            .field("faces", &self.fontdb.len())
            .field("resources_dir", &self.resources_dir)
            .field("image_policy", &self.image_policy)
            .finish()
    }
}

impl Rasterizer {
    /// Loads system fonts plus every configured font directory.
    pub fn new(config: &ExportConfig) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        for dir in &config.font_dirs {
            db.load_fonts_dir(dir);
        }
        bind_generic_families(&mut db);
        tracing::debug!(faces = db.len(), "rasterizer font database ready");
        Self {
            fontdb: Arc::new(db),
            resources_dir: config.resources_dir.clone(),
            image_policy: config.image_policy,
        }
    }

    /// Checks every image reference of `badge` before rasterization.
    ///
    /// Under [`ImagePolicy::Omit`] failing images are removed from the badge;
    /// under [`ImagePolicy::Strict`] the first failure is returned.
    pub fn prepare(&self, badge: &mut ResolvedBadge) -> Result<(), ExportError> {
        let background = self.check(&badge.badge_id, badge.background_image.take())?;
        badge.background_image = background;
        let logo = self.check(&badge.badge_id, badge.logo.take())?;
        badge.logo = logo;
        Ok(())
    }

    fn check(&self, badge_id: &str, image: Option<ResolvedImage>) -> Result<Option<ResolvedImage>, ExportError> {
        let Some(image) = image else {
            return Ok(None);
        };
        match probe_image(&image.href, self.resources_dir.as_deref()) {
            Ok(()) => Ok(Some(image)),
            Err(source) => match self.image_policy {
                ImagePolicy::Strict => Err(ExportError::ImageLoad {
                    role: image.role.as_str(),
                    source,
                }),
                ImagePolicy::Omit => {
                    tracing::warn!(
                        badge = badge_id,
                        role = image.role.as_str(),
                        error = %source,
                        "dropping image that cannot be loaded"
                    );
                    Ok(None)
                }
            },
        }
    }

    /// Renders `svg` into a `ceil(width·scale) × ceil(height·scale)` PNG.
    pub fn rasterize(&self, svg: &str, width_px: f64, height_px: f64, scale: f64) -> Result<RasterImage, ExportError> {
        let pixmap = self.render_pixmap(svg, width_px, height_px, scale)?;
        let png = pixmap
            .encode_png()
            .map_err(|err| ExportError::Encoding(err.to_string()))?;
        let (width, height) = (pixmap.width(), pixmap.height());
        tracing::debug!(width, height, bytes = png.len(), "rasterized badge");
        Ok(RasterImage { width, height, png })
    }

    fn render_pixmap(&self, svg: &str, width_px: f64, height_px: f64, scale: f64) -> Result<Pixmap, ExportError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(ExportError::Rasterize(format!("invalid scale {scale}")));
        }
        let width = (width_px * scale).ceil();
        let height = (height_px * scale).ceil();
        if !(width >= 1.0 && height >= 1.0 && width <= u32::MAX as f64 && height <= u32::MAX as f64) {
            return Err(ExportError::Rasterize(format!(
                "invalid bitmap size {width}x{height}"
            )));
        }
        let (width, height) = (width as u32, height as u32);

        let mut opt = usvg::Options::default();
        opt.fontdb = self.fontdb.clone();
        opt.font_family = fonts::DEFAULT_FAMILY.to_string();
        opt.resources_dir = self.resources_dir.clone();

        let tree = usvg::Tree::from_str(svg, &opt).map_err(|err| ExportError::Rasterize(err.to_string()))?;
        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| ExportError::Rasterize(format!("failed to allocate {width}x{height} pixmap")))?;

        let size = tree.size();
        let transform = Transform::from_scale(width as f32 / size.width(), height as f32 / size.height());
        resvg::render(&tree, transform, &mut pixmap.as_mut());
        Ok(pixmap)
    }
}

/// Points every generic family that resolves to nothing (fontdb maps
/// `sans-serif` to Arial) at an installed face, so text never silently
/// disappears from raster output.
fn bind_generic_families(db: &mut fontdb::Database) {
    for &(category, candidates) in GENERIC_CANDIDATES {
        let view: &fontdb::Database = db;
        if resolves(view, generic_family(category)) {
            continue;
        }
        let installed = candidates
            .iter()
            .copied()
            .find(|name| resolves(view, fontdb::Family::Name(*name)))
            .map(str::to_string)
            .or_else(|| first_installed_family(view, category));
        let Some(name) = installed else {
            tracing::warn!(generic = category.generic(), "no installed font for generic family");
            continue;
        };
        tracing::debug!(generic = category.generic(), family = %name, "binding generic font family");
        match category {
            FontCategory::SansSerif => db.set_sans_serif_family(name),
            FontCategory::Serif => db.set_serif_family(name),
            FontCategory::Monospace => db.set_monospace_family(name),
        }
    }
}

fn generic_family(category: FontCategory) -> fontdb::Family<'static> {
    match category {
        FontCategory::SansSerif => fontdb::Family::SansSerif,
        FontCategory::Serif => fontdb::Family::Serif,
        FontCategory::Monospace => fontdb::Family::Monospace,
    }
}

fn resolves(db: &fontdb::Database, family: fontdb::Family<'_>) -> bool {
    let families = [family];
    let query = fontdb::Query {
        families: &families,
        ..fontdb::Query::default()
    };
    db.query(&query).is_some()
}

/// First face's family, preferring monospaced faces for `monospace`.
fn first_installed_family(db: &fontdb::Database, category: FontCategory) -> Option<String> {
    let wants_mono = category == FontCategory::Monospace;
    db.faces()
        .find(|face| !wants_mono || face.monospaced)
        .or_else(|| db.faces().next())
        .and_then(|face| face.families.first())
        .map(|(name, _)| name.clone())
}

/// Verifies that an image reference can be loaded offline.
pub fn probe_image(href: &str, resources_dir: Option<&Path>) -> Result<(), ImageLoadError> {
    let href = href.trim();
    if href.is_empty() {
        return Err(ImageLoadError::Empty);
    }
    if let Some(rest) = href.strip_prefix("data:") {
        return probe_data_uri(rest);
    }
    if href.starts_with("http://") || href.starts_with("https://") || href.starts_with("//") {
        return Err(ImageLoadError::Remote(href.to_string()));
    }
    let raw = href.strip_prefix("file://").unwrap_or(href);
    let path = Path::new(raw);
    let path = match resources_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    };
    if path.is_file() {
        Ok(())
    } else {
        Err(ImageLoadError::MissingFile(path.display().to_string()))
    }
}

fn probe_data_uri(rest: &str) -> Result<(), ImageLoadError> {
    let Some((header, payload)) = rest.split_once(',') else {
        return Err(ImageLoadError::BadPayload("missing `,` separator".into()));
    };
    let mut params = header.split(';');
    let media_type = params.next().unwrap_or_default().trim().to_ascii_lowercase();
    if !SUPPORTED_IMAGE_TYPES.contains(&media_type.as_str()) {
        return Err(ImageLoadError::UnsupportedMediaType(media_type));
    }
    let is_base64 = params.any(|p| p.trim().eq_ignore_ascii_case("base64"));
    if is_base64 {
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|err| ImageLoadError::BadPayload(err.to_string()))?;
        if bytes.is_empty() {
            return Err(ImageLoadError::BadPayload("empty payload".into()));
        }
    } else if payload.trim().is_empty() {
        return Err(ImageLoadError::BadPayload("empty payload".into()));
    }
    Ok(())
}
