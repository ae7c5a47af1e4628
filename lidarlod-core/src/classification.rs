//! ASPRS classification palette and color resolution

/// Display color for a classification code, if the palette defines one.
pub fn classification_color(classification: u8) -> Option<[u8; 3]> {
    let rgb = match classification {
        2 => [161, 82, 46],        // ground
        3 => [0, 255, 1],          // low vegetation
        4 => [0, 204, 0],          // medium vegetation
        5 => [0, 153, 0],          // high vegetation
        6 => [255, 168, 0],        // building
        7 => [255, 0, 255],        // low point
        8 => [0, 0, 255],          // model key point
        9 => [255, 255, 0],        // water
        10 => [255, 255, 255],     // rail
        11..=16 => [255, 255, 0],  // road surface, overlap, wires, towers
        _ => return None,
    };
    Some(rgb)
}

/// Resolve normalised RGB channels for a point.
///
/// A non-zero stored channel wins and is divided by 255. A zero channel falls
/// back to the classification palette, then to 1.0.
pub fn resolve_color(color: Option<[u16; 3]>, classification: u8) -> [f64; 3] {
    let stored = color.unwrap_or([0, 0, 0]);
    let palette = classification_color(classification);

    let mut out = [1.0; 3];
    for (i, channel) in out.iter_mut().enumerate() {
        if stored[i] != 0 {
            *channel = stored[i] as f64 / 255.0;
        } else if let Some(rgb) = palette {
            *channel = rgb[i] as f64 / 255.0;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_stored_color_wins() {
        let c = resolve_color(Some([255, 51, 0]), 2);
        assert_relative_eq!(c[0], 1.0);
        assert_relative_eq!(c[1], 0.2);
        // zero channel falls back to the ground palette
        assert_relative_eq!(c[2], 46.0 / 255.0);
    }

    #[test]
    fn test_unclassified_without_color_is_white() {
        assert_eq!(resolve_color(None, 0), [1.0, 1.0, 1.0]);
        assert_eq!(resolve_color(None, 1), [1.0, 1.0, 1.0]);
        assert_eq!(resolve_color(None, 17), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_palette_lookup() {
        assert_eq!(classification_color(8), Some([0, 0, 255]));
        assert_eq!(classification_color(9), Some([255, 255, 0]));
        assert_eq!(classification_color(10), Some([255, 255, 255]));
        assert_eq!(classification_color(12), Some([255, 255, 0]));
        assert_eq!(classification_color(16), Some([255, 255, 0]));
        assert_eq!(classification_color(17), None);
        assert_eq!(classification_color(1), None);
    }
}
