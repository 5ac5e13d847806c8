//! Badge value objects and their JSON shape.
//!
//! The serialized form is the camelCase JSON the designer persists. It has
//! accumulated several generations of fields (absolute pixel `x`/`y` and
//! `fontSize` next to the normalized `xNorm`/`yNorm`/`sizeNorm`), so the
//! in-memory types carry tagged variants instead of a bag of optionals.
//! [`crate::normalize::canonicalize`] upgrades legacy variants to the
//! normalized form.

use crate::normalize::clamp_size_norm;
use crate::style::{DEFAULT_BACKGROUND_COLOR, DEFAULT_TEXT_COLOR};
use serde::{Deserialize, Serialize};

pub const MAX_LINES: usize = 4;
pub const DEFAULT_TEMPLATE_ID: &str = "rect-1x3";
pub const DEFAULT_FONT_FAMILY: &str = crate::fonts::DEFAULT_FAMILY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    #[default]
    Center,
    Right,
}

impl Align {
    /// Lenient parse; anything unrecognized centers.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Self::Left,
            "right" | "end" => Self::Right,
            _ => Self::Center,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backing {
    #[default]
    Pin,
    Magnetic,
    Adhesive,
}

impl Backing {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pin" => Some(Self::Pin),
            "magnetic" => Some(Self::Magnetic),
            "adhesive" => Some(Self::Adhesive),
            _ => None,
        }
    }
}

/// Where a line sits inside the design box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinePosition {
    /// Fractions of the design box; the canonical form.
    Norm { x: f64, y: f64 },
    /// Absolute template pixels from older designs. A missing axis resolves
    /// to the design-box center.
    Pixel { x: Option<f64>, y: Option<f64> },
    /// No position data at all.
    Unplaced,
}

/// Font size of a line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineSize {
    /// Fraction of the design-box height, kept within `[0.05, 0.5]`.
    Norm(f64),
    /// Legacy absolute `fontSize` in pixels.
    Pixel(f64),
    Unset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawLine", into = "RawLine")]
pub struct BadgeLine {
    pub id: String,
    pub text: String,
    pub position: LinePosition,
    pub size: LineSize,
    pub color: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub font_family: String,
    pub align: Align,
}

impl BadgeLine {
    /// A centered black Roboto line at the vertical-center sentinel.
    pub fn new(id: impl Into<String>, text: impl Into<String>, size_norm: f64) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            position: LinePosition::Norm { x: 0.5, y: 0.5 },
            size: LineSize::Norm(clamp_size_norm(size_norm)),
            color: DEFAULT_TEXT_COLOR.to_string(),
            bold: false,
            italic: false,
            underline: false,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            align: Align::Center,
        }
    }

    pub fn size_norm(&self) -> Option<f64> {
        match self.size {
            LineSize::Norm(size) => Some(size),
            _ => None,
        }
    }

    pub fn y_norm(&self) -> Option<f64> {
        match self.position {
            LinePosition::Norm { y, .. } => Some(y),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawLine {
    id: String,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    x_norm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    y_norm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_norm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    font_size: Option<f64>,
    #[serde(skip_serializing)]
    size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    bold: Option<bool>,
    italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    underline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    align: Option<String>,
}

impl From<RawLine> for BadgeLine {
    fn from(raw: RawLine) -> Self {
        let position = if raw.x_norm.is_some() || raw.y_norm.is_some() {
            LinePosition::Norm {
                x: raw.x_norm.unwrap_or(0.5),
                y: raw.y_norm.unwrap_or(0.5),
            }
        } else if raw.x.is_some() || raw.y.is_some() {
            LinePosition::Pixel { x: raw.x, y: raw.y }
        } else {
            LinePosition::Unplaced
        };
        let size = match (raw.size_norm, raw.font_size.or(raw.size)) {
            (Some(norm), _) => LineSize::Norm(clamp_size_norm(norm)),
            (None, Some(px)) => LineSize::Pixel(px),
            (None, None) => LineSize::Unset,
        };
        Self {
            id: raw.id,
            text: raw.text,
            position,
            size,
            color: raw
                .color
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TEXT_COLOR.to_string()),
            bold: raw.bold.unwrap_or(false),
            italic: raw.italic.unwrap_or(false),
            underline: raw.underline.unwrap_or(false),
            font_family: raw
                .font_family
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
            align: raw.align.as_deref().map(Align::parse).unwrap_or_default(),
        }
    }
}

impl From<BadgeLine> for RawLine {
    fn from(line: BadgeLine) -> Self {
        let mut raw = RawLine {
            id: line.id,
            text: line.text,
            color: Some(line.color),
            bold: Some(line.bold),
            italic: Some(line.italic),
            underline: line.underline.then_some(true),
            font_family: Some(line.font_family),
            align: Some(line.align.as_str().to_string()),
            ..RawLine::default()
        };
        match line.position {
            LinePosition::Norm { x, y } => {
                raw.x_norm = Some(x);
                raw.y_norm = Some(y);
            }
            LinePosition::Pixel { x, y } => {
                raw.x = x;
                raw.y = y;
            }
            LinePosition::Unplaced => {}
        }
        match line.size {
            LineSize::Norm(size) => raw.size_norm = Some(size),
            LineSize::Pixel(px) => raw.font_size = Some(px),
            LineSize::Unset => {}
        }
        raw
    }
}

/// How an image is placed inside the badge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImagePlacement {
    /// Canonical: top-left corner in design-box fractions plus the intrinsic
    /// pixel size of the image.
    Anchor {
        x_norm: f64,
        y_norm: f64,
        width_px: f64,
        height_px: f64,
    },
    /// Logo from older designs: absolute top-left in template pixels.
    LegacyLogo {
        x: Option<f64>,
        y: Option<f64>,
        width_px: Option<f64>,
        height_px: Option<f64>,
    },
    /// Background from older designs: centered on the design box, shifted
    /// by an offset.
    LegacyBackground {
        offset_x: f64,
        offset_y: f64,
        width_px: Option<f64>,
        height_px: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BadgeImage {
    /// Data URI, file path or URL.
    pub src: String,
    pub placement: ImagePlacement,
    /// Uniform scale, always positive.
    pub scale: f64,
}

impl BadgeImage {
    pub fn anchored(src: impl Into<String>, x_norm: f64, y_norm: f64, width_px: f64, height_px: f64) -> Self {
        Self {
            src: src.into(),
            placement: ImagePlacement::Anchor {
                x_norm,
                y_norm,
                width_px,
                height_px,
            },
            scale: 1.0,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = sanitize_scale(Some(scale));
        self
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self.placement, ImagePlacement::Anchor { .. })
    }
}

pub(crate) fn sanitize_scale(scale: Option<f64>) -> f64 {
    match scale {
        Some(s) if s.is_finite() && s > 0.0 => s,
        _ => 1.0,
    }
}

/// Which badge slot an image occupies; decides its legacy convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Background,
    Logo,
}

impl ImageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Logo => "logo",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawImage {
    src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    x_norm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    y_norm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    width_px: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height_px: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    y: Option<f64>,
}

impl RawImage {
    fn into_image(self, role: ImageRole) -> BadgeImage {
        let placement = match (self.x_norm, self.y_norm, self.width_px, self.height_px) {
            (Some(x_norm), Some(y_norm), Some(width_px), Some(height_px)) => ImagePlacement::Anchor {
                x_norm,
                y_norm,
                width_px,
                height_px,
            },
            _ => match role {
                ImageRole::Logo => ImagePlacement::LegacyLogo {
                    x: self.x,
                    y: self.y,
                    width_px: self.width_px,
                    height_px: self.height_px,
                },
                ImageRole::Background => ImagePlacement::LegacyBackground {
                    offset_x: self.offset_x.unwrap_or(0.0),
                    offset_y: self.offset_y.unwrap_or(0.0),
                    width_px: self.width_px,
                    height_px: self.height_px,
                },
            },
        };
        BadgeImage {
            src: self.src,
            placement,
            scale: sanitize_scale(self.scale),
        }
    }
}

impl From<BadgeImage> for RawImage {
    fn from(image: BadgeImage) -> Self {
        let mut raw = RawImage {
            src: image.src,
            scale: Some(image.scale),
            ..RawImage::default()
        };
        match image.placement {
            ImagePlacement::Anchor {
                x_norm,
                y_norm,
                width_px,
                height_px,
            } => {
                raw.x_norm = Some(x_norm);
                raw.y_norm = Some(y_norm);
                raw.width_px = Some(width_px);
                raw.height_px = Some(height_px);
            }
            ImagePlacement::LegacyLogo {
                x,
                y,
                width_px,
                height_px,
            } => {
                raw.x = x;
                raw.y = y;
                raw.width_px = width_px;
                raw.height_px = height_px;
            }
            ImagePlacement::LegacyBackground {
                offset_x,
                offset_y,
                width_px,
                height_px,
            } => {
                raw.offset_x = Some(offset_x);
                raw.offset_y = Some(offset_y);
                raw.width_px = width_px;
                raw.height_px = height_px;
            }
        }
        raw
    }
}

/// A complete badge design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawBadge", into = "RawBadge")]
pub struct Badge {
    pub id: String,
    pub template_id: String,
    /// Top-to-bottom, between one and [`MAX_LINES`] entries.
    pub lines: Vec<BadgeLine>,
    pub background_color: String,
    pub background_image: Option<BadgeImage>,
    pub logo: Option<BadgeImage>,
    pub backing: Backing,
}

impl Badge {
    /// The designer's starting point: name and title lines, white background.
    pub fn new_default(template_id: impl Into<String>) -> Self {
        Self {
            id: "badge".to_string(),
            template_id: template_id.into(),
            lines: default_lines(),
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            background_image: None,
            logo: None,
            backing: Backing::Pin,
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Parses either a single badge object or an array of badges.
    pub fn list_from_json(json: &str) -> serde_json::Result<Vec<Self>> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        match value {
            serde_json::Value::Array(_) => serde_json::from_value(value),
            other => Ok(vec![serde_json::from_value(other)?]),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub(crate) fn default_lines() -> Vec<BadgeLine> {
    vec![
        BadgeLine::new("line-1", "Your Name", 0.20),
        BadgeLine::new("line-2", "Title", 0.143),
    ]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawBadge {
    id: Option<String>,
    template_id: Option<String>,
    lines: Vec<BadgeLine>,
    background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    background_image: Option<RawImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logo: Option<RawImage>,
    backing: Option<String>,
}

impl From<RawBadge> for Badge {
    fn from(raw: RawBadge) -> Self {
        let id = raw
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| "badge".to_string());
        let mut lines = raw.lines;
        if lines.is_empty() {
            tracing::debug!(badge = %id, "badge has no lines, adding an empty one");
            lines.push(BadgeLine::new("line-1", "", 0.15));
        }
        if lines.len() > MAX_LINES {
            tracing::warn!(
                badge = %id,
                count = lines.len(),
                max = MAX_LINES,
                "badge has too many lines, truncating"
            );
            lines.truncate(MAX_LINES);
        }
        for (index, line) in lines.iter_mut().enumerate() {
            if line.id.is_empty() {
                line.id = format!("line-{}", index + 1);
            }
        }
        let backing = match raw.backing.as_deref() {
            None => Backing::Pin,
            Some(value) => Backing::parse(value).unwrap_or_else(|| {
                tracing::warn!(badge = %id, backing = value, "unknown backing, using pin");
                Backing::Pin
            }),
        };
        Self {
            template_id: raw
                .template_id
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TEMPLATE_ID.to_string()),
            id,
            lines,
            background_color: raw
                .background_color
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BACKGROUND_COLOR.to_string()),
            background_image: raw
                .background_image
                .filter(|img| !img.src.is_empty())
                .map(|img| img.into_image(ImageRole::Background)),
            logo: raw
                .logo
                .filter(|img| !img.src.is_empty())
                .map(|img| img.into_image(ImageRole::Logo)),
            backing,
        }
    }
}

impl From<Badge> for RawBadge {
    fn from(badge: Badge) -> Self {
        let backing = match badge.backing {
            Backing::Pin => "pin",
            Backing::Magnetic => "magnetic",
            Backing::Adhesive => "adhesive",
        };
        RawBadge {
            id: Some(badge.id),
            template_id: Some(badge.template_id),
            lines: badge.lines,
            background_color: Some(badge.background_color),
            background_image: badge.background_image.map(RawImage::from),
            logo: badge.logo.map(RawImage::from),
            backing: Some(backing.to_string()),
        }
    }
}
