use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::Table;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: (table, column) → Color32
// ---------------------------------------------------------------------------

/// One colour per plotted series, stable while the set of series is stable.
#[derive(Debug, Clone, Default)]
pub struct SeriesColors {
    mapping: BTreeMap<(String, String), Color32>,
}

impl SeriesColors {
    /// Assign colours to every value column of `tables`, in listing order.
    pub fn for_tables<'a>(tables: impl IntoIterator<Item = &'a Table>) -> Self {
        let keys: Vec<(String, String)> = tables
            .into_iter()
            .flat_map(|t| {
                t.value_columns()
                    .map(move |c| (t.name.clone(), c.name.clone()))
            })
            .collect();
        let palette = generate_palette(keys.len());
        SeriesColors {
            mapping: keys.into_iter().zip(palette).collect(),
        }
    }

    pub fn color_for(&self, table: &str, column: &str) -> Color32 {
        self.mapping
            .get(&(table.to_string(), column.to_string()))
            .copied()
            .unwrap_or(Color32::GRAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::{table, FREQ};

    #[test]
    fn palette_has_distinct_colours() {
        let p = generate_palette(6);
        assert_eq!(p.len(), 6);
        for (i, a) in p.iter().enumerate() {
            assert!(p[i + 1..].iter().all(|b| a != b));
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn every_value_column_gets_its_own_colour() {
        let a = table("a", &[(FREQ, &[1.0]), ("I", &[1.0]), ("J", &[1.0])]);
        let b = table("b", &[(FREQ, &[1.0]), ("I", &[1.0])]);
        let colors = SeriesColors::for_tables([&a, &b]);
        assert_ne!(colors.color_for("a", "I"), colors.color_for("b", "I"));
        assert_ne!(colors.color_for("a", "I"), colors.color_for("a", "J"));
        assert_eq!(colors.color_for("a", FREQ), Color32::GRAY);
    }
}
