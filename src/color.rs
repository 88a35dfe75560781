use std::collections::BTreeMap;

use eframe::egui::Color32;
use hazard_lens::data::schema::DatasetKind;
use palette::{Hsl, IntoColor, Mix, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

fn to_color32(rgb: Srgb) -> Color32 {
    Color32::from_rgb(
        (rgb.red.clamp(0.0, 1.0) * 255.0) as u8,
        (rgb.green.clamp(0.0, 1.0) * 255.0) as u8,
        (rgb.blue.clamp(0.0, 1.0) * 255.0) as u8,
    )
}

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            to_color32(hsl.into_color())
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Sequential ramps: risk intensity → Color32
// ---------------------------------------------------------------------------

/// Light→dark ramp per hazard (Blues / Oranges / Reds).
pub fn risk_color(kind: DatasetKind, t: f64) -> Color32 {
    let hue = match kind {
        DatasetKind::Wind => 210.0,
        DatasetKind::Drought => 30.0,
        DatasetKind::Wildfire => 0.0,
        DatasetKind::Census | DatasetKind::Health => 270.0,
    };
    let light = Hsl::new(hue, 0.6, 0.85);
    let dark = Hsl::new(hue, 0.85, 0.3);
    let mixed = light.mix(dark, t.clamp(0.0, 1.0) as f32);
    to_color32(mixed.into_color())
}

// ---------------------------------------------------------------------------
// Category colours: bivariate label → Color32
// ---------------------------------------------------------------------------

/// Maps joint bucket labels to distinct colours.
#[derive(Debug, Clone)]
pub struct CategoryColors {
    mapping: BTreeMap<String, Color32>,
    default_color: Color32,
}

impl CategoryColors {
    pub fn new<'a>(labels: impl IntoIterator<Item = &'a String>) -> Self {
        let labels: Vec<&String> = labels.into_iter().collect();
        let palette = generate_palette(labels.len());
        CategoryColors {
            mapping: labels
                .into_iter()
                .zip(palette)
                .map(|(l, c)| (l.clone(), c))
                .collect(),
            default_color: Color32::GRAY,
        }
    }

    pub fn color_for(&self, label: &str) -> Color32 {
        self.mapping
            .get(label)
            .copied()
            .unwrap_or(self.default_color)
    }
}
