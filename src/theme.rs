//! Colour themes for the terminal view.

/// A colour theme: background, foreground, and accent (used for own messages).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub name: &'static str,
    pub background: &'static str,
    pub color: &'static str,
    pub primary_color: &'static str,
}

/// Built-in themes, selectable with `/theme N` (1-based).
pub const THEMES: &[Theme] = &[
    Theme { name: "midnight", background: "#1A1A2E", color: "#FFFFFF", primary_color: "#0F3460" },
    Theme { name: "wine", background: "#461220", color: "#FFFFFF", primary_color: "#E94560" },
    Theme { name: "dusk", background: "#192A51", color: "#FFFFFF", primary_color: "#967AA1" },
    Theme { name: "peach", background: "#F7B267", color: "#000000", primary_color: "#F4845F" },
    Theme { name: "coral", background: "#F25F5C", color: "#000000", primary_color: "#642B36" },
    Theme { name: "ember", background: "#231F20", color: "#FFF", primary_color: "#BB4430" },
];

impl Default for Theme {
    fn default() -> Self {
        THEMES[0]
    }
}

impl Theme {
    /// Theme by 1-based index.
    pub fn by_index(index: usize) -> Option<Theme> {
        index.checked_sub(1).and_then(|i| THEMES.get(i).copied())
    }

    /// Accent colour as RGB.
    pub fn primary_rgb(&self) -> Option<(u8, u8, u8)> {
        parse_hex(self.primary_color)
    }
}

/// Parse `#RRGGBB` or `#RGB` into an RGB triple.
pub fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_index_is_one_based() {
        assert_eq!(Theme::by_index(1), Some(THEMES[0]));
        assert_eq!(Theme::by_index(6).map(|t| t.name), Some("ember"));
        assert_eq!(Theme::by_index(0), None);
        assert_eq!(Theme::by_index(7), None);
    }

    #[test]
    fn parse_long_hex() {
        assert_eq!(parse_hex("#E94560"), Some((0xE9, 0x45, 0x60)));
    }

    #[test]
    fn parse_short_hex() {
        assert_eq!(parse_hex("#FFF"), Some((255, 255, 255)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_hex("#12"), None);
        assert_eq!(parse_hex("#GGGGGG"), None);
    }

    #[test]
    fn every_theme_has_parseable_colours() {
        for theme in THEMES {
            assert!(theme.primary_rgb().is_some(), "{}", theme.name);
            assert!(parse_hex(theme.background).is_some(), "{}", theme.name);
            assert!(parse_hex(theme.color).is_some(), "{}", theme.name);
        }
    }
}
