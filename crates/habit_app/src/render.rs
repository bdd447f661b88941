use ansi_term::Colour;
use habit_core::heatmap::{HeatmapGrid, Shade, EMPTY_SHADE};

/// Terminal background the alpha shades are blended against. The mobile
/// app renders its heatmaps on black too.
const BACKGROUND: (u8, u8, u8) = (0, 0, 0);

const CELL: &str = "■ ";

/// Lays the column-major grid out as seven weekday rows, Sunday on top.
pub fn render_grid(grid: &HeatmapGrid) -> String {
    let rows = grid.weeks.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = String::new();
    for row in 0..rows {
        for week in &grid.weeks {
            match week.get(row).map(|cell| &cell.shade) {
                None | Some(Shade::Transparent) => out.push_str("  "),
                Some(Shade::Empty) => out.push_str(&paint(EMPTY_SHADE)),
                Some(Shade::Color(spec)) => out.push_str(&paint(spec)),
            }
        }
        out.push('\n');
    }
    out
}

/// Swatch in the habit's own colour for list output.
pub fn swatch(color: &str) -> String {
    paint(color)
}

fn paint(spec: &str) -> String {
    match blended_rgb(spec) {
        Some((r, g, b)) => Colour::RGB(r, g, b).paint(CELL).to_string(),
        None => CELL.to_string(),
    }
}

/// Parses `#RRGGBB` or `#RRGGBBAA` and pre-blends the alpha channel
/// against the terminal background.
pub fn blended_rgb(spec: &str) -> Option<(u8, u8, u8)> {
    let hex = spec.strip_prefix('#')?;
    if hex.len() != 6 && hex.len() != 8 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    let alpha = if hex.len() == 8 {
        u8::from_str_radix(&hex[6..8], 16).ok()? as f64 / 255.0
    } else {
        1.0
    };

    let blend =
        |fg: u8, bg: u8| (fg as f64 * alpha + bg as f64 * (1.0 - alpha)).round() as u8;
    Some((
        blend(r, BACKGROUND.0),
        blend(g, BACKGROUND.1),
        blend(b, BACKGROUND.2),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_opacity_passes_channels_through() {
        assert_eq!(blended_rgb("#3B82F6"), Some((0x3B, 0x82, 0xF6)));
        assert_eq!(blended_rgb("#3B82F6FF"), Some((0x3B, 0x82, 0xF6)));
    }

    #[test]
    fn alpha_darkens_towards_the_background() {
        // 0x33 is 20% opacity; on black every channel scales by 0.2.
        let (r, g, b) = blended_rgb("#FF804033").unwrap();
        assert_eq!((r, g, b), (51, 26, 13));
        // Zero alpha disappears into the background entirely.
        assert_eq!(blended_rgb("#FF804000"), Some((0, 0, 0)));
    }

    #[test]
    fn malformed_specs_are_rejected() {
        assert_eq!(blended_rgb("tomato"), None);
        assert_eq!(blended_rgb("#12345"), None);
        assert_eq!(blended_rgb("#GGGGGG"), None);
    }
}
