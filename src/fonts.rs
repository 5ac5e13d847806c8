/// Generic CSS family a named font falls back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontCategory {
    SansSerif,
    Serif,
    Monospace,
}

impl FontCategory {
    pub fn generic(self) -> &'static str {
        match self {
            Self::SansSerif => "sans-serif",
            Self::Serif => "serif",
            Self::Monospace => "monospace",
        }
    }
}

pub const DEFAULT_FAMILY: &str = "Roboto";

/// Families offered by the designer.
pub const KNOWN_FAMILIES: &[(&str, FontCategory)] = &[
    ("Roboto", FontCategory::SansSerif),
    ("Inter", FontCategory::SansSerif),
    ("Open Sans", FontCategory::SansSerif),
    ("Lato", FontCategory::SansSerif),
    ("Montserrat", FontCategory::SansSerif),
    ("Oswald", FontCategory::SansSerif),
    ("Source Sans 3", FontCategory::SansSerif),
    ("Raleway", FontCategory::SansSerif),
    ("PT Sans", FontCategory::SansSerif),
    ("Cabin", FontCategory::SansSerif),
    ("Nunito", FontCategory::SansSerif),
    ("Noto Sans", FontCategory::SansSerif),
    ("Roboto Mono", FontCategory::Monospace),
    ("Merriweather", FontCategory::Serif),
    ("Noto Serif", FontCategory::Serif),
    ("Roboto Serif", FontCategory::Serif),
    ("Roboto Slab", FontCategory::Serif),
    ("Georgia", FontCategory::Serif),
];

/// Looks up a designer family, ignoring case and surrounding quotes.
pub fn lookup(family: &str) -> Option<(&'static str, FontCategory)> {
    let wanted = family.trim().trim_matches(|c| c == '"' || c == '\'');
    KNOWN_FAMILIES
        .iter()
        .copied()
        .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
}

/// CSS `font-family` value for a line: the known family plus its generic
/// fallback, or `fallback` alone for an unknown family.
pub fn font_stack(family: &str, fallback: &str) -> String {
    match lookup(family) {
        Some((name, category)) => format!("'{name}', {}", category.generic()),
        None => {
            tracing::warn!(family, fallback, "unknown font family, substituting");
            fallback.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_families_get_their_generic() {
        assert_eq!(font_stack("Roboto", "sans-serif"), "'Roboto', sans-serif");
        assert_eq!(font_stack("roboto mono", "sans-serif"), "'Roboto Mono', monospace");
        assert_eq!(font_stack("\"Georgia\"", "sans-serif"), "'Georgia', serif");
    }

    #[test]
    fn unknown_family_uses_fallback() {
        assert_eq!(font_stack("Comic Papyrus", "sans-serif"), "sans-serif");
        assert!(lookup("").is_none());
    }

    #[test]
    fn default_family_is_known() {
        assert!(lookup(DEFAULT_FAMILY).is_some());
    }
}
