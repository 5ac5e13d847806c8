use serde::{Deserialize, Serialize};

pub const DEFAULT_TEXT_COLOR: &str = "#000000";
pub const DEFAULT_BACKGROUND_COLOR: &str = "#FFFFFF";

/// Stacking of the logo relative to the text lines inside the clip group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerOrder {
    #[default]
    LogoBelowText,
    LogoAboveText,
}

/// Presentation settings shared by preview and export renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderStyle {
    pub padding: f64,
    pub outline_color: String,
    pub outline_width: f64,
    pub layer_order: LayerOrder,
    pub fallback_font: String,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self::print()
    }
}

impl RenderStyle {
    pub fn print() -> Self {
        Self {
            padding: 0.0,
            outline_color: "#222222".to_string(),
            outline_width: 1.25,
            layer_order: LayerOrder::LogoBelowText,
            fallback_font: "sans-serif".to_string(),
        }
    }

    /// Thumbnail variant: a little breathing room around the cut edge.
    pub fn thumbnail() -> Self {
        Self {
            padding: 4.0,
            ..Self::print()
        }
    }
}

/// Which fallback applies when a color cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRole {
    Text,
    Background,
}

impl ColorRole {
    fn fallback(self) -> &'static str {
        match self {
            Self::Text => DEFAULT_TEXT_COLOR,
            Self::Background => DEFAULT_BACKGROUND_COLOR,
        }
    }
}

/// Normalizes a user color to uppercase hex, or the role's fallback.
pub fn normalize_color(value: &str, role: ColorRole) -> String {
    match parse_color(value) {
        Some(hex) => hex,
        None => {
            tracing::warn!(color = value, ?role, "invalid color, using fallback");
            role.fallback().to_string()
        }
    }
}

/// Accepts `#RGB`, `#RRGGBB`, `#RRGGBBAA` and `rgb(r, g, b)`.
pub fn parse_color(value: &str) -> Option<String> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        return match hex.len() {
            3 => {
                let expanded: String = hex.chars().flat_map(|c| [c, c]).collect();
                Some(format!("#{}", expanded.to_ascii_uppercase()))
            }
            6 | 8 => Some(format!("#{}", hex.to_ascii_uppercase())),
            _ => None,
        };
    }
    let lower = value.to_ascii_lowercase();
    let inner = lower.strip_prefix("rgb(")?.strip_suffix(')')?;
    let channels: Vec<u8> = inner
        .split(',')
        .map(|part| part.trim().parse::<u8>().ok())
        .collect::<Option<_>>()?;
    match channels.as_slice() {
        [r, g, b] => Some(format!("#{r:02X}{g:02X}{b:02X}")),
        _ => None,
    }
}
