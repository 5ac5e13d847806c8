use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use ttf_parser::Face;

/// Average advance of a Latin glyph as a fraction of the font size, used
/// when no face is installed for a family.
const AVERAGE_ADVANCE: f64 = 0.56;
const BOLD_WIDENING: f64 = 1.06;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

/// Face selection for a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FontVariant {
    pub bold: bool,
    pub italic: bool,
}

/// Measured advance width of `text`, or `None` when no installed face
/// matches `font_family`.
pub fn measure_text_width(
    text: &str,
    font_size: f64,
    font_family: &str,
    variant: FontVariant,
) -> Option<f64> {
    if text.is_empty() || font_size <= 0.0 {
        return Some(0.0);
    }
    let mut guard = TEXT_MEASURER.lock().ok()?;
    guard.measure(text, font_size, font_family, variant)
}

/// Width estimate from the average Latin advance.
pub fn estimate_text_width(text: &str, font_size: f64, variant: FontVariant) -> f64 {
    let count = text.chars().filter(|c| *c != '\n').count() as f64;
    let widening = if variant.bold { BOLD_WIDENING } else { 1.0 };
    count * font_size * AVERAGE_ADVANCE * widening
}

/// Measured width when a face is available, estimated otherwise.
pub fn text_width(text: &str, font_size: f64, font_family: &str, variant: FontVariant) -> f64 {
    measure_text_width(text, font_size, font_family, variant)
        .unwrap_or_else(|| estimate_text_width(text, font_size, variant))
}

/// Adds every font file under `dir` to the measurement database.
pub fn load_font_dir(dir: &Path) {
    if let Ok(mut guard) = TEXT_MEASURER.lock() {
        guard.db.load_fonts_dir(dir);
        guard.cache.clear();
        tracing::debug!(dir = %dir.display(), faces = guard.db.len(), "loaded font directory");
    }
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    cache: HashMap<(String, FontVariant), Option<FontFace>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            cache: HashMap::new(),
        }
    }

    fn measure(
        &mut self,
        text: &str,
        font_size: f64,
        font_family: &str,
        variant: FontVariant,
    ) -> Option<f64> {
        let key = (normalize_family_key(font_family), variant);
        if !self.cache.contains_key(&key) {
            let face = self.load_face(font_family, variant);
            if face.is_none() {
                tracing::debug!(family = font_family, "no installed face, estimating text width");
            }
            self.cache.insert(key.clone(), face);
        }
        let face = self.cache.get_mut(&key)?.as_mut()?;
        Some(face.measure_width(&text.replace('\t', "    "), font_size))
    }

    fn load_face(&mut self, font_family: &str, variant: FontVariant) -> Option<FontFace> {
        let names: Vec<String> = font_family
            .split(',')
            .map(|part| part.trim().trim_matches('"').trim_matches('\'').to_string())
            .filter(|name| !name.is_empty())
            .collect();
        let mut families: Vec<Family<'_>> = names
            .iter()
            .map(|name| match name.to_ascii_lowercase().as_str() {
                "serif" => Family::Serif,
                "sans-serif" => Family::SansSerif,
                "monospace" => Family::Monospace,
                "cursive" => Family::Cursive,
                "fantasy" => Family::Fantasy,
                _ => Family::Name(name.as_str()),
            })
            .collect();
        if families.is_empty() {
            families.push(Family::SansSerif);
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: if variant.bold {
                Weight::BOLD
            } else {
                Weight::NORMAL
            },
            stretch: Stretch::Normal,
            style: if variant.italic {
                Style::Italic
            } else {
                Style::Normal
            },
        };
        let id = self.db.query(&query)?;
        self.db
            .with_face_data(id, |data, index| FontFace::new(data.to_vec(), index))
            .flatten()
    }
}

struct FontFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    ascii_advances: [u16; 128],
    advance_cache: HashMap<char, Option<u16>>,
}

impl FontFace {
    fn new(data: Vec<u8>, index: u32) -> Option<Self> {
        let face = Face::parse(&data, index).ok()?;
        let units_per_em = face.units_per_em().max(1);
        let mut ascii_advances = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph) = face.glyph_index(byte as char) {
                ascii_advances[byte as usize] = face.glyph_hor_advance(glyph).unwrap_or(0);
            }
        }
        Some(Self {
            data,
            index,
            units_per_em,
            ascii_advances,
            advance_cache: HashMap::new(),
        })
    }

    fn measure_width(&mut self, text: &str, font_size: f64) -> f64 {
        let scale = font_size / f64::from(self.units_per_em);
        let missing = font_size * AVERAGE_ADVANCE;
        let mut width = 0.0;
        let mut face: Option<Face<'_>> = None;

        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            let advance = if ch.is_ascii() {
                Some(self.ascii_advances[ch as usize]).filter(|a| *a > 0)
            } else if let Some(cached) = self.advance_cache.get(&ch) {
                *cached
            } else {
                if face.is_none() {
                    face = Face::parse(&self.data, self.index).ok();
                }
                let value = face.as_ref().and_then(|f| {
                    f.glyph_index(ch)
                        .and_then(|glyph| f.glyph_hor_advance(glyph))
                });
                self.advance_cache.insert(ch, value);
                value
            };
            width += match advance {
                Some(units) => f64::from(units) * scale,
                None => missing,
            };
        }
        width.max(0.0)
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_no_width() {
        assert_eq!(
            measure_text_width("", 12.0, "Roboto", FontVariant::default()),
            Some(0.0)
        );
        assert_eq!(text_width("", 12.0, "Roboto", FontVariant::default()), 0.0);
    }

    #[test]
    fn estimate_scales_with_length_and_weight() {
        let regular = estimate_text_width("Badge", 20.0, FontVariant::default());
        assert!((regular - 5.0 * 20.0 * 0.56).abs() < 1e-9);
        let bold = estimate_text_width(
            "Badge",
            20.0,
            FontVariant {
                bold: true,
                italic: false,
            },
        );
        assert!(bold > regular);
    }

    #[test]
    fn text_width_grows_with_text() {
        let short = text_width("Ab", 16.0, "sans-serif", FontVariant::default());
        let long = text_width("Abcdefgh", 16.0, "sans-serif", FontVariant::default());
        assert!(long > short);
    }
}
